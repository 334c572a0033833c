//! Email service for password reset codes.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Without SMTP
//! configuration, [`LogMailer`] records the send in the log instead.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use solestore_core::Email;

use crate::config::EmailConfig;

/// Minutes a reset code stays valid.
pub const RESET_CODE_TTL_MINUTES: i64 = 30;

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    code: &'a str,
    expires_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    code: &'a str,
    expires_minutes: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Delivers transactional mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a password reset code to `to`.
    async fn send_password_reset(&self, to: &Email, code: &str) -> Result<(), MailError>;
}

/// SMTP mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to: &Email, code: &str) -> Result<(), MailError> {
        let html = PasswordResetEmailHtml {
            code,
            expires_minutes: RESET_CODE_TTL_MINUTES,
        }
        .render()?;
        let text = PasswordResetEmailText {
            code,
            expires_minutes: RESET_CODE_TTL_MINUTES,
        }
        .render()?;

        self.send_multipart_email(to.as_str(), "Your SoleStore password reset code", &text, &html)
            .await
    }
}

/// Mailer used when SMTP is not configured. Logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &Email, _code: &str) -> Result<(), MailError> {
        tracing::warn!(to = %to, "SMTP not configured, password reset email not sent");
        Ok(())
    }
}

/// Random bytes in a reset code.
pub const RESET_CODE_BYTES: usize = 16;

/// Generate a reset code: 128 random bits as lowercase hex.
///
/// Codes are looked up on their own, without the email, so they must be
/// unguessable and practically never repeat across accounts.
#[must_use]
pub fn generate_reset_code() -> String {
    use rand::Rng;
    let mut bytes = [0u8; RESET_CODE_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}
