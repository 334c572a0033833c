//! Authentication service.
//!
//! Provides password and Google sign-in, plus password reset by emailed
//! code.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{TimeDelta, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::instrument;

use solestore_core::{Email, User, UserId};

use crate::db::{PasswordResetStore, RepositoryError, UserStore};
use crate::services::email::{Mailer, RESET_CODE_TTL_MINUTES, generate_reset_code};
use crate::services::identity::IdentityVerifier;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
///
/// Handles registration, login, Google sign-in and password resets.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    resets: &'a dyn PasswordResetStore,
    identity: &'a dyn IdentityVerifier,
    mailer: &'a dyn Mailer,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        users: &'a dyn UserStore,
        resets: &'a dyn PasswordResetStore,
        identity: &'a dyn IdentityVerifier,
        mailer: &'a dyn Mailer,
    ) -> Self {
        Self {
            users,
            resets,
            identity,
            mailer,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = User::new(email, random_display_name(), Utc::now());
        self.users
            .create(&user, Some(&password_hash))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Exchange a Google ID token for a user, creating the account on first
    /// sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Identity` if the token is rejected.
    #[instrument(skip_all)]
    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<User, AuthError> {
        let identity = self.identity.verify(id_token).await?;

        if let Some(user) = self.users.get_by_email(&identity.email).await? {
            return Ok(user);
        }

        let name = identity.name.unwrap_or_else(random_display_name);
        let mut user = User::new(identity.email, name, Utc::now());
        user.photo_url = identity.photo_url.unwrap_or_default();

        match self.users.create(&user, None).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "user created from Google sign-in");
                Ok(user)
            }
            // Lost a race with a concurrent first sign-in.
            Err(RepositoryError::Conflict(_)) => self
                .users
                .get_by_email(&user.email)
                .await?
                .ok_or(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Email a single-use reset code.
    ///
    /// Unknown emails succeed silently so the endpoint cannot be used to
    /// discover which accounts exist.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for malformed input and
    /// `AuthError::Mail` if the code could not be sent.
    #[instrument(skip_all)]
    pub async fn send_reset_code(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        if self.users.get_by_email(&email).await?.is_none() {
            tracing::debug!(email = %email.masked(), "reset requested for unknown email");
            return Ok(());
        }

        let code = generate_reset_code();
        let expires_at = Utc::now() + TimeDelta::minutes(RESET_CODE_TTL_MINUTES);
        self.resets
            .insert(&hash_reset_code(&code), &email, expires_at)
            .await?;

        self.mailer.send_password_reset(&email, &code).await?;
        tracing::info!(email = %email.masked(), "reset code sent");
        Ok(())
    }

    /// Check a reset code and return the account it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetCode` for unknown or expired codes.
    #[instrument(skip_all)]
    pub async fn verify_reset_code(&self, code: &str) -> Result<Email, AuthError> {
        let pending = self
            .resets
            .find(&hash_reset_code(code.trim()))
            .await?
            .ok_or(AuthError::InvalidResetCode)?;

        if !pending.is_valid_at(Utc::now()) {
            return Err(AuthError::InvalidResetCode);
        }
        Ok(pending.email)
    }

    /// Set a new password using a reset code. The code is consumed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetCode` for unknown, used or expired
    /// codes and `AuthError::WeakPassword` for unacceptable passwords.
    #[instrument(skip_all)]
    pub async fn confirm_reset(&self, code: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let email = self.verify_reset_code(code).await?;

        if !self.resets.consume(&hash_reset_code(code.trim())).await? {
            return Err(AuthError::InvalidResetCode);
        }

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let password_hash = hash_password(new_password)?;
        self.users.set_password_hash(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

// =============================================================================
// Password Helpers
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Reset codes are stored as their SHA-256 hex digest.
fn hash_reset_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Display name for accounts that did not provide one.
fn random_display_name() -> String {
    let n: u32 = rand::rng().random_range(100_000..=999_999);
    format!("User{n}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::db::memory::MemoryDb;
    use crate::services::email::MailError;
    use crate::services::identity::{DisabledIdentityVerifier, IdentityError, VerifiedIdentity};

    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<(Email, String)>>,
    }

    impl CapturingMailer {
        fn last_code(&self) -> String {
            self.sent.lock().unwrap().last().unwrap().1.clone()
        }
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send_password_reset(&self, to: &Email, code: &str) -> Result<(), MailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.clone(), code.to_string()));
            Ok(())
        }
    }

    struct FixedIdentity(VerifiedIdentity);

    #[async_trait]
    impl IdentityVerifier for FixedIdentity {
        async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
            if id_token == "good" {
                Ok(self.0.clone())
            } else {
                Err(IdentityError::InvalidToken("bad token".to_string()))
            }
        }
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_random_display_name() {
        let name = random_display_name();
        assert!(name.starts_with("User"));
        let n: u32 = name.trim_start_matches("User").parse().unwrap();
        assert!((100_000..=999_999).contains(&n));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let db = MemoryDb::default();
        let mailer = CapturingMailer::default();
        let auth = AuthService::new(&db, &db, &DisabledIdentityVerifier, &mailer);

        let user = auth.register("Shopper@Example.com", "password123").await.unwrap();
        assert_eq!(user.email.as_str(), "shopper@example.com");
        assert!(user.name.starts_with("User"));

        let logged_in = auth.login("shopper@example.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.login("shopper@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.register("shopper@example.com", "password456").await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_google_sign_in_creates_once() {
        let db = MemoryDb::default();
        let identity = FixedIdentity(VerifiedIdentity {
            email: Email::parse("lan@gmail.com").unwrap(),
            name: None,
            photo_url: Some("https://lh3.googleusercontent.com/a/photo".to_string()),
        });
        let mailer = CapturingMailer::default();
        let auth = AuthService::new(&db, &db, &identity, &mailer);

        let first = auth.sign_in_with_google("good").await.unwrap();
        assert!(first.name.starts_with("User"));
        assert_eq!(first.photo_url, "https://lh3.googleusercontent.com/a/photo");

        let second = auth.sign_in_with_google("good").await.unwrap();
        assert_eq!(first.id, second.id);

        assert!(matches!(
            auth.sign_in_with_google("bad").await,
            Err(AuthError::Identity(_))
        ));
        // No password on a Google-only account.
        assert!(matches!(
            auth.login("lan@gmail.com", "anything-at-all").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let db = MemoryDb::default();
        let mailer = CapturingMailer::default();
        let auth = AuthService::new(&db, &db, &DisabledIdentityVerifier, &mailer);
        auth.register("reset@example.com", "old-password").await.unwrap();

        auth.send_reset_code("reset@example.com").await.unwrap();
        let code = mailer.last_code();
        assert_eq!(code.len(), 32);

        let email = auth.verify_reset_code(&code).await.unwrap();
        assert_eq!(email.as_str(), "reset@example.com");

        auth.confirm_reset(&code, "new-password").await.unwrap();
        assert!(auth.login("reset@example.com", "new-password").await.is_ok());
        assert!(auth.login("reset@example.com", "old-password").await.is_err());

        // Single use.
        assert!(matches!(
            auth.confirm_reset(&code, "another-password").await,
            Err(AuthError::InvalidResetCode)
        ));
    }

    #[tokio::test]
    async fn test_outstanding_codes_reset_their_own_accounts() {
        let db = MemoryDb::default();
        let mailer = CapturingMailer::default();
        let auth = AuthService::new(&db, &db, &DisabledIdentityVerifier, &mailer);
        auth.register("alice@example.com", "alice-password").await.unwrap();
        auth.register("bob@example.com", "bob-password").await.unwrap();

        auth.send_reset_code("alice@example.com").await.unwrap();
        let alice_code = mailer.last_code();
        auth.send_reset_code("bob@example.com").await.unwrap();
        let bob_code = mailer.last_code();
        assert_ne!(alice_code, bob_code);

        assert_eq!(
            auth.verify_reset_code(&alice_code).await.unwrap().as_str(),
            "alice@example.com"
        );
        assert_eq!(
            auth.verify_reset_code(&bob_code).await.unwrap().as_str(),
            "bob@example.com"
        );

        auth.confirm_reset(&alice_code, "alice-new-password").await.unwrap();
        assert!(auth.login("alice@example.com", "alice-new-password").await.is_ok());
        assert!(auth.login("bob@example.com", "bob-password").await.is_ok());
    }

    #[tokio::test]
    async fn test_colliding_code_does_not_move_to_another_account() {
        let db = MemoryDb::default();
        let mailer = CapturingMailer::default();
        let auth = AuthService::new(&db, &db, &DisabledIdentityVerifier, &mailer);
        let alice = Email::parse("alice@example.com").unwrap();
        let bob = Email::parse("bob@example.com").unwrap();
        let expires_at = Utc::now() + TimeDelta::minutes(RESET_CODE_TTL_MINUTES);

        let hash = hash_reset_code("123456");
        PasswordResetStore::insert(&db, &hash, &alice, expires_at).await.unwrap();
        assert!(PasswordResetStore::insert(&db, &hash, &bob, expires_at).await.is_err());

        assert_eq!(auth.verify_reset_code("123456").await.unwrap(), alice);
    }

    #[tokio::test]
    async fn test_reset_for_unknown_email_is_silent() {
        let db = MemoryDb::default();
        let mailer = CapturingMailer::default();
        let auth = AuthService::new(&db, &db, &DisabledIdentityVerifier, &mailer);

        auth.send_reset_code("ghost@example.com").await.unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(matches!(
            auth.verify_reset_code("123456").await,
            Err(AuthError::InvalidResetCode)
        ));
    }
}
