//! Federated sign-in.
//!
//! The mobile client signs in with Google and hands us the resulting ID
//! token. [`GoogleTokenVerifier`] checks it against Google's `tokeninfo`
//! endpoint and the configured client ID.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use solestore_core::{Email, EmailError};

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Errors from identity verification.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The token was rejected (expired, wrong audience, unverified email).
    #[error("invalid identity token: {0}")]
    InvalidToken(String),

    /// The token carried an unusable email.
    #[error("invalid email in identity token: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Federated sign-in is not configured.
    #[error("identity provider not configured")]
    NotConfigured,

    /// The provider could not be reached.
    #[error("identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Who an ID token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: Email,
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

/// Verifies third-party ID tokens.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Response of Google's `tokeninfo` endpoint. Booleans arrive as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google ID token verifier.
#[derive(Clone)]
pub struct GoogleTokenVerifier {
    client: reqwest::Client,
    client_id: String,
}

impl GoogleTokenVerifier {
    #[must_use]
    pub fn new(client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    #[tracing::instrument(skip_all)]
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let url = format!(
            "{GOOGLE_TOKENINFO_URL}?id_token={}",
            urlencoding::encode(id_token)
        );
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(IdentityError::InvalidToken(format!(
                "tokeninfo returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response.json().await?;
        identity_from_token_info(info, &self.client_id)
    }
}

fn identity_from_token_info(
    info: TokenInfo,
    client_id: &str,
) -> Result<VerifiedIdentity, IdentityError> {
    if info.aud != client_id {
        return Err(IdentityError::InvalidToken("audience mismatch".to_string()));
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(IdentityError::InvalidToken("email not verified".to_string()));
    }
    let email = info
        .email
        .ok_or_else(|| IdentityError::InvalidToken("token has no email".to_string()))?;

    Ok(VerifiedIdentity {
        email: Email::parse(&email)?,
        name: info.name.filter(|n| !n.trim().is_empty()),
        photo_url: info.picture.filter(|p| !p.trim().is_empty()),
    })
}

/// Verifier used when `GOOGLE_CLIENT_ID` is unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledIdentityVerifier;

#[async_trait]
impl IdentityVerifier for DisabledIdentityVerifier {
    async fn verify(&self, _id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        Err(IdentityError::NotConfigured)
    }
}
