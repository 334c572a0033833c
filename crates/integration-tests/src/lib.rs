//! Integration tests for SoleStore.
//!
//! The full router runs in-process on the in-memory stores with a memory
//! session store. Requests go through `tower::ServiceExt::oneshot`, so no
//! port or database is needed:
//!
//! ```bash
//! cargo test -p solestore-integration-tests
//! ```
//!
//! External services are replaced by fakes: uploads return predictable
//! URLs, Google tokens of the form `google:<email>` verify, and reset codes
//! are captured instead of mailed. VNPay uses the real signer with a test
//! secret so redirects can be forged exactly as the gateway would sign them.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::must_use_candidate)]

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::FixedOffset;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use solestore_api::config::{ApiConfig, DEFAULT_VNPAY_URL, VnpayConfig};
use solestore_api::db::{Stores, UserStore};
use solestore_api::middleware::session::SESSION_COOKIE_NAME;
use solestore_api::services::email::{MailError, Mailer};
use solestore_api::services::identity::{IdentityError, IdentityVerifier, VerifiedIdentity};
use solestore_api::services::media::{MediaError, MediaFolder, MediaHost, validate_upload};
use solestore_api::services::payment::VnpayGateway;
use solestore_api::state::AppState;
use solestore_core::{Email, Role, UserId};

/// Password used by every test account.
pub const PASSWORD: &str = "correct horse battery";

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "solestore-test-boundary";

// =============================================================================
// Fakes
// =============================================================================

/// Captures reset codes instead of sending mail.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<(Email, String)>>,
}

impl CapturingMailer {
    /// Latest code mailed to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to.as_str() == email)
            .map(|(_, code)| code.clone())
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

/// Accepts any valid upload and returns a URL derived from its name.
#[derive(Default)]
pub struct FakeMediaHost {
    uploads: Mutex<Vec<String>>,
}

impl FakeMediaHost {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaHost for FakeMediaHost {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: MediaFolder,
    ) -> Result<String, MediaError> {
        validate_upload(&bytes)?;
        let url = format!("https://media.test/{}/{filename}", folder.as_str());
        self.uploads.lock().unwrap().push(url.clone());
        Ok(url)
    }
}

/// Verifies tokens of the form `google:<email>`.
pub struct FakeIdentity;

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let email = id_token
            .strip_prefix("google:")
            .ok_or_else(|| IdentityError::InvalidToken("unknown token".to_string()))?;
        let email = Email::parse(email)?;
        Ok(VerifiedIdentity {
            photo_url: Some(format!("https://photos.test/{}.png", email.local_part())),
            name: Some("Google Shopper".to_string()),
            email,
        })
    }
}

// =============================================================================
// Configuration
// =============================================================================

pub fn vnpay_config() -> VnpayConfig {
    VnpayConfig {
        tmn_code: "TESTTMN1".to_string(),
        hash_secret: SecretString::from("integration-test-hash-secret"),
        payment_url: DEFAULT_VNPAY_URL.to_string(),
        return_url: "http://localhost:3000/payments/vnpay/return".to_string(),
    }
}

/// The gateway the app under test signs with.
pub fn gateway() -> VnpayGateway {
    VnpayGateway::new(vnpay_config())
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("memory"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k7Qx2pLm9RvT4wZs8NbY3cHf6JdG1aEu"),
        report_offset: FixedOffset::east_opt(7 * 3600).unwrap(),
        rate_limit: false,
        google_client_id: None,
        cloudinary: None,
        vnpay: Some(vnpay_config()),
        email: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A signed-in client, as its `Cookie` header value.
#[derive(Debug, Clone)]
pub struct Session(pub String);

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The session cookie set by this response, if any.
    pub fn session(&self) -> Option<Session> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")))
            .map(|pair| Session(pair.to_string()))
    }
}

/// The API wired to in-memory stores and fakes.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: Arc<CapturingMailer>,
    pub media: Arc<FakeMediaHost>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let mailer = Arc::new(CapturingMailer::default());
        let media = Arc::new(FakeMediaHost::default());

        let state = AppState::builder(test_config(), Stores::in_memory())
            .mailer(mailer.clone())
            .media(media.clone())
            .identity(Arc::new(FakeIdentity))
            .vnpay(gateway())
            .build();

        let router = solestore_api::app(state.clone(), tower_sessions::MemoryStore::default());

        Self {
            router,
            state,
            mailer,
            media,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn builder(method: Method, uri: &str, session: Option<&Session>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(Session(cookie)) = session {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&self, uri: &str, session: Option<&Session>) -> TestResponse {
        self.send(Self::builder(Method::GET, uri, session).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, session: Option<&Session>) -> TestResponse {
        self.send(
            Self::builder(Method::DELETE, uri, session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: &Value,
        session: Option<&Session>,
    ) -> TestResponse {
        self.send(
            Self::builder(method, uri, session)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        session: Option<&Session>,
    ) -> TestResponse {
        self.send(
            Self::builder(method, uri, session)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// The first Server-Sent Event of a live stream, as raw text.
    pub async fn first_event(&self, uri: &str, session: Option<&Session>) -> (StatusCode, String) {
        let request = Self::builder(Method::GET, uri, session)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        if !status.is_success() {
            return (status, String::new());
        }
        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let data = frame.into_data().unwrap();
        (status, String::from_utf8_lossy(&data).into_owned())
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    /// Register `email` and return its session.
    pub async fn register(&self, email: &str) -> Session {
        let response = self
            .json(
                Method::POST,
                "/auth/register",
                &json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.session().unwrap()
    }

    /// Register `email` and give it the admin role.
    pub async fn admin(&self, email: &str) -> Session {
        let session = self.register(email).await;
        let user = self
            .state
            .stores()
            .users
            .get_by_email(&Email::parse(email).unwrap())
            .await
            .unwrap()
            .unwrap();
        self.state
            .stores()
            .users
            .set_role(user.id, Role::Admin)
            .await
            .unwrap();
        session
    }

    pub async fn user_id(&self, email: &str) -> UserId {
        self.state
            .stores()
            .users
            .get_by_email(&Email::parse(email).unwrap())
            .await
            .unwrap()
            .unwrap()
            .id
    }

    /// Create a product through the admin API and return its JSON.
    pub async fn create_product(
        &self,
        admin: &Session,
        name: &str,
        price: i64,
        quantity: u32,
    ) -> Value {
        self.create_product_with(
            admin,
            &json!({
                "name": name,
                "brand": "Nike",
                "price": price.to_string(),
                "sizes": ["40", "41", "42"],
                "image_url": "https://cdn.test/shoe.png",
                "quantity": quantity,
                "description": "Test shoe",
            }),
        )
        .await
    }

    pub async fn create_product_with(&self, admin: &Session, body: &Value) -> Value {
        let response = self
            .json(Method::POST, "/admin/products", body, Some(admin))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }

    /// Put `quantity` of `product_id` in size 42 into the cart.
    pub async fn add_to_cart(&self, session: &Session, product_id: &str, quantity: u32) -> TestResponse {
        self.json(
            Method::POST,
            "/cart",
            &json!({ "product_id": product_id, "quantity": quantity, "size": "42" }),
            Some(session),
        )
        .await
    }
}

/// Parse a JSON money value, which is serialized as a decimal string.
pub fn money(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// Build a multipart body from text fields and `(field, filename, bytes)`
/// files, delimited by [`BOUNDARY`].
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
