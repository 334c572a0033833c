//! Password reset codes.

use chrono::{DateTime, Utc};

use solestore_core::Email;

/// A pending reset code. Only the code's hash is ever stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetCode {
    /// Account the code resets.
    pub email: Email,
    /// After this instant the code is rejected.
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetCode {
    /// Whether the code is still usable at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}
