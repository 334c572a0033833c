//! Application state shared across handlers.

use std::sync::Arc;

use lettre::transport::smtp::Error as SmtpError;
use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::Stores;
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::catalog::{CatalogService, ProductCache};
use crate::services::dashboard::DashboardService;
use crate::services::email::{LogMailer, Mailer, SmtpMailer};
use crate::services::events::ChangeFeed;
use crate::services::identity::{DisabledIdentityVerifier, GoogleTokenVerifier, IdentityVerifier};
use crate::services::media::{CloudinaryClient, DisabledMediaHost, MediaHost};
use crate::services::orders::OrderService;
use crate::services::payment::VnpayGateway;
use crate::services::profile::ProfileService;

/// Error wiring external services from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("SMTP transport: {0}")]
    Smtp(#[from] SmtpError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the stores, the external service seams and the per-request services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: Option<PgPool>,
    stores: Stores,
    media: Arc<dyn MediaHost>,
    identity: Arc<dyn IdentityVerifier>,
    mailer: Arc<dyn Mailer>,
    vnpay: Option<VnpayGateway>,
    feed: ChangeFeed,
    cache: ProductCache,
}

impl AppState {
    /// Create application state, wiring Cloudinary, Google sign-in, SMTP and
    /// VNPay from whichever of them `config` enables.
    ///
    /// `pool` is `None` when running on the in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Smtp` if the SMTP relay cannot be configured.
    pub fn new(config: ApiConfig, pool: Option<PgPool>, stores: Stores) -> Result<Self, StateError> {
        let media: Arc<dyn MediaHost> = match config.cloudinary.clone() {
            Some(cloudinary) => Arc::new(CloudinaryClient::new(cloudinary)),
            None => {
                tracing::warn!("Cloudinary not configured, image uploads disabled");
                Arc::new(DisabledMediaHost)
            }
        };

        let identity: Arc<dyn IdentityVerifier> = match config.google_client_id.clone() {
            Some(client_id) => Arc::new(GoogleTokenVerifier::new(client_id)),
            None => {
                tracing::warn!("GOOGLE_CLIENT_ID not set, Google sign-in disabled");
                Arc::new(DisabledIdentityVerifier)
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(SmtpMailer::new(email)?),
            None => {
                tracing::warn!("SMTP not configured, reset codes will only be logged");
                Arc::new(LogMailer)
            }
        };

        let vnpay = config.vnpay.clone().map(VnpayGateway::new);
        if vnpay.is_none() {
            tracing::warn!("VNPay not configured, online payment disabled");
        }

        let mut builder = Self::builder(config, stores)
            .media(media)
            .identity(identity)
            .mailer(mailer);
        if let Some(pool) = pool {
            builder = builder.pool(pool);
        }
        if let Some(gateway) = vnpay {
            builder = builder.vnpay(gateway);
        }
        Ok(builder.build())
    }

    /// Start building state with every external service disabled.
    #[must_use]
    pub fn builder(config: ApiConfig, stores: Stores) -> AppStateBuilder {
        AppStateBuilder {
            config,
            pool: None,
            stores,
            media: Arc::new(DisabledMediaHost),
            identity: Arc::new(DisabledIdentityVerifier),
            mailer: Arc::new(LogMailer),
            vnpay: None,
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// The database pool, when running on `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    #[must_use]
    pub fn feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }

    #[must_use]
    pub fn media(&self) -> &dyn MediaHost {
        self.inner.media.as_ref()
    }

    // =========================================================================
    // Services
    // =========================================================================

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        let inner = &self.inner;
        AuthService::new(
            inner.stores.users.as_ref(),
            inner.stores.password_resets.as_ref(),
            inner.identity.as_ref(),
            inner.mailer.as_ref(),
        )
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        let inner = &self.inner;
        CatalogService::new(
            inner.stores.products.as_ref(),
            &inner.cache,
            inner.media.as_ref(),
            &inner.feed,
        )
    }

    #[must_use]
    pub fn cart(&self) -> CartService<'_> {
        let inner = &self.inner;
        CartService::new(
            inner.stores.carts.as_ref(),
            inner.stores.products.as_ref(),
            &inner.feed,
        )
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        let inner = &self.inner;
        OrderService::new(
            inner.stores.orders.as_ref(),
            inner.stores.carts.as_ref(),
            &inner.cache,
            &inner.feed,
            inner.vnpay.as_ref(),
        )
    }

    #[must_use]
    pub fn profiles(&self) -> ProfileService<'_> {
        let inner = &self.inner;
        ProfileService::new(inner.stores.users.as_ref(), inner.media.as_ref())
    }

    #[must_use]
    pub fn dashboard(&self) -> DashboardService<'_> {
        let inner = &self.inner;
        DashboardService::new(
            inner.stores.users.as_ref(),
            inner.stores.products.as_ref(),
            inner.stores.orders.as_ref(),
            inner.config.report_offset,
        )
    }
}

/// Builder for [`AppState`], used to swap in fakes for the external seams.
pub struct AppStateBuilder {
    config: ApiConfig,
    pool: Option<PgPool>,
    stores: Stores,
    media: Arc<dyn MediaHost>,
    identity: Arc<dyn IdentityVerifier>,
    mailer: Arc<dyn Mailer>,
    vnpay: Option<VnpayGateway>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn media(mut self, media: Arc<dyn MediaHost>) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityVerifier>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    #[must_use]
    pub fn vnpay(mut self, gateway: VnpayGateway) -> Self {
        self.vnpay = Some(gateway);
        self
    }

    #[must_use]
    pub fn build(self) -> AppState {
        AppState {
            inner: Arc::new(AppStateInner {
                config: self.config,
                pool: self.pool,
                stores: self.stores,
                media: self.media,
                identity: self.identity,
                mailer: self.mailer,
                vnpay: self.vnpay,
                feed: ChangeFeed::new(),
                cache: ProductCache::new(),
            }),
        }
    }
}
