//! Product catalog service.
//!
//! Reads go through a short-lived moka cache; every write invalidates it and
//! publishes [`ChangeEvent::ProductsChanged`].
//!
//! Cache keys carry a generation that every invalidation bumps. A read that
//! raced a write stores its result under the old generation, where no later
//! lookup can find it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use thiserror::Error;
use tracing::instrument;

use solestore_core::{Money, Product, ProductFilter, ProductId, Review, UserId};

use crate::db::{ProductDetails, ProductStore, RepositoryError, ReviewOutcome, ReviewWrite};
use crate::services::events::{ChangeEvent, ChangeFeed};
use crate::services::media::{ImageInput, MediaError, MediaFolder, MediaHost, is_remote_url};

/// How long cached product reads stay fresh.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum cached entries.
const CACHE_CAPACITY: u64 = 1000;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found")]
    NotFound,

    #[error("invalid product: {0}")]
    InvalidInput(String),

    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("you have already reviewed this product")]
    AlreadyReviewed,

    #[error("review not found")]
    ReviewNotFound,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Cache key for product reads, tagged with the cache generation.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(u64, ProductId),
    /// The unfiltered listing. Filtered listings are not cached.
    Catalog(u64),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Catalog(Vec<Product>),
}

/// Shared cache of product reads.
#[derive(Clone)]
pub struct ProductCache {
    cache: Cache<CacheKey, CacheValue>,
    generation: Arc<AtomicU64>,
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();
        Self {
            cache,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate all cached data. Call after the write has committed.
    pub async fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

/// Editable product fields.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub brand: String,
    pub price: Money,
    pub sizes: Vec<String>,
    pub image: ImageInput,
    pub quantity: u32,
    pub description: String,
}

impl ProductInput {
    fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidInput("name is required".to_string()));
        }
        if self.brand.trim().is_empty() {
            return Err(CatalogError::InvalidInput("brand is required".to_string()));
        }
        if self.price.is_sign_negative() {
            return Err(CatalogError::InvalidInput(
                "price cannot be negative".to_string(),
            ));
        }
        if self.sizes.iter().any(|s| s.trim().is_empty()) {
            return Err(CatalogError::InvalidInput(
                "sizes cannot be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Catalog façade over the product store.
pub struct CatalogService<'a> {
    products: &'a dyn ProductStore,
    cache: &'a ProductCache,
    media: &'a dyn MediaHost,
    feed: &'a ChangeFeed,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(
        products: &'a dyn ProductStore,
        cache: &'a ProductCache,
        media: &'a dyn MediaHost,
        feed: &'a ChangeFeed,
    ) -> Self {
        Self {
            products,
            cache,
            media,
            feed,
        }
    }

    /// Products matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        // Only the default listing is cached.
        let cacheable = *filter == ProductFilter::default();
        let key = CacheKey::Catalog(self.cache.generation());
        if cacheable
            && let Some(CacheValue::Catalog(products)) = self.cache.cache.get(&key).await
        {
            return Ok(products);
        }

        let products = self.products.list(filter).await?;

        if cacheable {
            self.cache
                .cache
                .insert(key, CacheValue::Catalog(products.clone()))
                .await;
        }
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown ids.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        let key = CacheKey::Product(self.cache.generation(), id);
        if let Some(CacheValue::Product(product)) = self.cache.cache.get(&key).await {
            return Ok(*product);
        }

        let product = self.products.get(id).await?.ok_or(CatalogError::NotFound)?;
        self.cache
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Create a product, uploading its image when new bytes are given.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInput` for bad fields and
    /// `CatalogError::Media` if the upload fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add(&self, input: ProductInput) -> Result<Product, CatalogError> {
        input.validate()?;
        let image = self.resolve_image(input.image).await?;

        let product = Product {
            id: ProductId::generate(),
            name: input.name.trim().to_string(),
            brand: input.brand.trim().to_string(),
            price: input.price,
            sizes: input.sizes,
            image,
            quantity: input.quantity,
            description: input.description,
            reviews: Vec::new(),
            rating: 0.0,
        };
        self.products.insert(&product).await?;
        self.changed().await;

        tracing::info!(product_id = %product.id, "product added");
        Ok(product)
    }

    /// Replace a product's editable fields. Reviews and rating are kept.
    ///
    /// An image that is already an `http(s)` URL is kept as is; anything
    /// else is uploaded.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown ids.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: ProductId, input: ProductInput) -> Result<Product, CatalogError> {
        input.validate()?;
        // Checked first so unknown ids never trigger an upload.
        if self.products.get(id).await?.is_none() {
            return Err(CatalogError::NotFound);
        }
        let image = self.resolve_image(input.image).await?;

        let details = ProductDetails {
            name: input.name.trim().to_string(),
            brand: input.brand.trim().to_string(),
            price: input.price,
            sizes: input.sizes,
            image,
            quantity: input.quantity,
            description: input.description,
        };
        let product = self.products.update(id, &details).await.map_err(not_found)?;
        self.changed().await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        if !self.products.delete(id).await? {
            return Err(CatalogError::NotFound);
        }
        self.changed().await;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Post the caller's first review of a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::AlreadyReviewed` if the user already reviewed
    /// it, `CatalogError::InvalidRating` outside 1..=5.
    #[instrument(skip(self, comment))]
    pub async fn add_review(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: f32,
        comment: &str,
    ) -> Result<Product, CatalogError> {
        self.write_review(product_id, user_id, rating, comment, ReviewWrite::Add)
            .await
    }

    /// Replace the caller's existing review of a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ReviewNotFound` if there is nothing to update.
    #[instrument(skip(self, comment))]
    pub async fn update_review(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: f32,
        comment: &str,
    ) -> Result<Product, CatalogError> {
        self.write_review(product_id, user_id, rating, comment, ReviewWrite::Replace)
            .await
    }

    async fn write_review(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: f32,
        comment: &str,
        mode: ReviewWrite,
    ) -> Result<Product, CatalogError> {
        if !Review::is_valid_rating(rating) {
            return Err(CatalogError::InvalidRating);
        }
        let review = Review {
            user_id,
            rating,
            comment: comment.trim().to_string(),
            timestamp: Utc::now(),
        };

        match self
            .products
            .save_review(product_id, &review, mode)
            .await
            .map_err(not_found)?
        {
            ReviewOutcome::Saved(product) => {
                self.changed().await;
                Ok(*product)
            }
            ReviewOutcome::AlreadyReviewed => Err(CatalogError::AlreadyReviewed),
            ReviewOutcome::NoExistingReview => Err(CatalogError::ReviewNotFound),
        }
    }

    async fn resolve_image(&self, image: ImageInput) -> Result<String, CatalogError> {
        match image {
            ImageInput::Url(url) if url.trim().is_empty() => Ok(String::new()),
            ImageInput::Url(url) if is_remote_url(&url) => Ok(url.trim().to_string()),
            ImageInput::Url(_) => Err(CatalogError::InvalidInput(
                "image must be an http(s) URL or an uploaded file".to_string(),
            )),
            ImageInput::Upload { bytes, filename } => Ok(self
                .media
                .upload(bytes, &filename, MediaFolder::Products)
                .await?),
        }
    }

    async fn changed(&self) {
        self.cache.invalidate_all().await;
        self.feed.publish(ChangeEvent::ProductsChanged);
    }
}

fn not_found(e: RepositoryError) -> CatalogError {
    match e {
        RepositoryError::NotFound => CatalogError::NotFound,
        other => CatalogError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;

    use solestore_core::{CartItem, CartItemId, Order, OrderDraft, PaymentMethod, vnd};

    use super::*;
    use crate::db::OrderStore;
    use crate::db::memory::MemoryDb;
    use crate::services::media::DisabledMediaHost;

    struct FakeMedia;

    #[async_trait]
    impl MediaHost for FakeMedia {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            filename: &str,
            folder: MediaFolder,
        ) -> Result<String, MediaError> {
            Ok(format!("https://media.test/{}/{filename}", folder.as_str()))
        }
    }

    fn input(image: ImageInput) -> ProductInput {
        ProductInput {
            name: "Air Zoom".to_string(),
            brand: "Nike".to_string(),
            price: vnd(2_500_000),
            sizes: vec!["40".to_string(), "41".to_string()],
            image,
            quantity: 10,
            description: "Road running shoe".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_uploads_new_image() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &FakeMedia, &feed);

        let product = catalog
            .add(input(ImageInput::Upload {
                bytes: vec![1, 2, 3],
                filename: "zoom.jpg".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(product.image, "https://media.test/solestore/products/zoom.jpg");
        assert_eq!(catalog.get(product.id).await.unwrap(), product);
    }

    #[tokio::test]
    async fn test_update_keeps_remote_url_and_reviews() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &DisabledMediaHost, &feed);

        let url = "https://res.cloudinary.com/demo/shoe.jpg".to_string();
        let product = catalog.add(input(ImageInput::Url(url.clone()))).await.unwrap();
        let reviewer = UserId::generate();
        catalog
            .add_review(product.id, reviewer, 4.0, "Comfortable")
            .await
            .unwrap();

        let mut edited = input(ImageInput::Url(url.clone()));
        edited.price = vnd(2_000_000);
        let updated = catalog.update(product.id, edited).await.unwrap();
        assert_eq!(updated.image, url);
        assert_eq!(updated.price, vnd(2_000_000));
        assert_eq!(updated.reviews.len(), 1);
        assert!((updated.rating - 4.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_rejects_local_image_path() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &DisabledMediaHost, &feed);

        let err = catalog
            .add(input(ImageInput::Url("file:///sdcard/shoe.jpg".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cached_listing_is_invalidated_on_write() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &DisabledMediaHost, &feed);

        assert!(catalog.list(&ProductFilter::default()).await.unwrap().is_empty());
        let mut rx = feed.subscribe();
        catalog.add(input(ImageInput::Url(String::new()))).await.unwrap();

        assert_eq!(catalog.list(&ProductFilter::default()).await.unwrap().len(), 1);
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::ProductsChanged);
    }

    #[tokio::test]
    async fn test_reviews_average_and_one_per_user() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &DisabledMediaHost, &feed);
        let product = catalog.add(input(ImageInput::Url(String::new()))).await.unwrap();
        let (a, b) = (UserId::generate(), UserId::generate());

        catalog.add_review(product.id, a, 5.0, "Great").await.unwrap();
        let p = catalog.add_review(product.id, b, 3.0, "Ok").await.unwrap();
        assert!((p.rating - 4.0).abs() < f32::EPSILON);

        assert!(matches!(
            catalog.add_review(product.id, a, 1.0, "Again").await,
            Err(CatalogError::AlreadyReviewed)
        ));
        let p = catalog.update_review(product.id, a, 1.0, "Changed my mind").await.unwrap();
        assert_eq!(p.reviews.len(), 2);
        assert!((p.rating - 2.0).abs() < f32::EPSILON);

        assert!(matches!(
            catalog.update_review(product.id, UserId::generate(), 3.0, "x").await,
            Err(CatalogError::ReviewNotFound)
        ));
        assert!(matches!(
            catalog.add_review(product.id, UserId::generate(), 6.0, "x").await,
            Err(CatalogError::InvalidRating)
        ));
    }

    /// What happens behind the catalog's back during its first store call.
    enum Midway {
        /// A 3-unit checkout commits.
        Checkout,
        /// Another shopper reviews the product.
        Review(UserId),
        /// An admin reprices the product and invalidates the cache.
        Reprice(ProductCache),
    }

    /// Product store that runs one [`Midway`] write between the catalog's
    /// read and its write.
    struct Interleaving {
        db: MemoryDb,
        product: ProductId,
        midway: Midway,
        fired: AtomicBool,
    }

    impl Interleaving {
        async fn new(midway: Midway) -> Self {
            let db = MemoryDb::default();
            let product = Product {
                id: ProductId::generate(),
                name: "Chuck 70".to_string(),
                brand: "Converse".to_string(),
                price: vnd(2_100_000),
                sizes: vec!["40".to_string()],
                image: String::new(),
                quantity: 10,
                description: String::new(),
                reviews: Vec::new(),
                rating: 0.0,
            };
            ProductStore::insert(&db, &product).await.unwrap();
            Self {
                db,
                product: product.id,
                midway,
                fired: AtomicBool::new(false),
            }
        }

        async fn stored(&self) -> Product {
            ProductStore::get(&self.db, self.product).await.unwrap().unwrap()
        }

        async fn interleave(&self) {
            if self.fired.swap(true, Ordering::SeqCst) {
                return;
            }
            let current = self.stored().await;
            match &self.midway {
                Midway::Checkout => {
                    let buyer = UserId::generate();
                    let line = CartItem {
                        id: CartItemId::generate(),
                        product_id: current.id,
                        product_name: current.name.clone(),
                        product_image: String::new(),
                        product_price: current.price,
                        product_brand: current.brand.clone(),
                        quantity: 3,
                        size: "40".to_string(),
                        user_id: buyer,
                    };
                    let order = Order::from_draft(
                        OrderDraft {
                            user_id: buyer,
                            items: vec![line],
                            shipping_address: "1 Nguyen Hue".to_string(),
                            payment_method: PaymentMethod::Cod,
                        },
                        "TRACK00001".to_string(),
                        Utc::now(),
                    );
                    self.db.place(&order).await.unwrap();
                }
                Midway::Review(user_id) => {
                    let review = Review {
                        user_id: *user_id,
                        rating: 4.0,
                        comment: "Runs small".to_string(),
                        timestamp: Utc::now(),
                    };
                    self.db
                        .save_review(self.product, &review, ReviewWrite::Add)
                        .await
                        .unwrap();
                }
                Midway::Reprice(cache) => {
                    let mut details = ProductDetails::from(&current);
                    details.price = vnd(1_990_000);
                    ProductStore::update(&self.db, self.product, &details)
                        .await
                        .unwrap();
                    cache.invalidate_all().await;
                }
            }
        }
    }

    #[async_trait]
    impl ProductStore for Interleaving {
        async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
            ProductStore::list(&self.db, filter).await
        }

        async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            let snapshot = ProductStore::get(&self.db, id).await;
            self.interleave().await;
            snapshot
        }

        async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
            ProductStore::insert(&self.db, product).await
        }

        async fn update(
            &self,
            id: ProductId,
            details: &ProductDetails,
        ) -> Result<Product, RepositoryError> {
            self.interleave().await;
            ProductStore::update(&self.db, id, details).await
        }

        async fn save_review(
            &self,
            id: ProductId,
            review: &Review,
            mode: ReviewWrite,
        ) -> Result<ReviewOutcome, RepositoryError> {
            self.interleave().await;
            self.db.save_review(id, review, mode).await
        }

        async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
            ProductStore::delete(&self.db, id).await
        }

        async fn count(&self) -> Result<u64, RepositoryError> {
            ProductStore::count(&self.db).await
        }
    }

    #[tokio::test]
    async fn test_review_during_checkout_keeps_stock_decrement() {
        let store = Interleaving::new(Midway::Checkout).await;
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&store, &cache, &DisabledMediaHost, &feed);

        let reviewed = catalog
            .add_review(store.product, UserId::generate(), 5.0, "Fits well")
            .await
            .unwrap();
        assert_eq!(reviewed.quantity, 7);

        let stored = store.stored().await;
        assert_eq!(stored.quantity, 7);
        assert_eq!(stored.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_edit_during_review_keeps_the_review() {
        let reviewer = UserId::generate();
        let store = Interleaving::new(Midway::Review(reviewer)).await;
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&store, &cache, &DisabledMediaHost, &feed);

        let updated = catalog
            .update(store.product, input(ImageInput::Url(String::new())))
            .await
            .unwrap();
        assert_eq!(updated.name, "Air Zoom");
        assert_eq!(updated.reviews.len(), 1);
        assert!(updated.review_by(reviewer).is_some());
        assert!((updated.rating - 4.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_concurrent_reviews_are_all_kept() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &DisabledMediaHost, &feed);
        let product = catalog.add(input(ImageInput::Url(String::new()))).await.unwrap();

        let (a, b) = tokio::join!(
            catalog.add_review(product.id, UserId::generate(), 5.0, "Great"),
            catalog.add_review(product.id, UserId::generate(), 3.0, "Ok"),
        );
        a.unwrap();
        b.unwrap();

        let stored = catalog.get(product.id).await.unwrap();
        assert_eq!(stored.reviews.len(), 2);
        assert!((stored.rating - 4.0).abs() < f32::EPSILON);
        assert_eq!(stored.quantity, 10);
    }

    #[tokio::test]
    async fn test_read_racing_a_write_is_not_cached() {
        let cache = ProductCache::new();
        let store = Interleaving::new(Midway::Reprice(cache.clone())).await;
        let feed = ChangeFeed::new();
        let catalog = CatalogService::new(&store, &cache, &DisabledMediaHost, &feed);

        // The first read saw the old price before the write landed.
        let raced = catalog.get(store.product).await.unwrap();
        assert_eq!(raced.price, vnd(2_100_000));

        let fresh = catalog.get(store.product).await.unwrap();
        assert_eq!(fresh.price, vnd(1_990_000));
    }

    #[tokio::test]
    async fn test_delete_unknown_product() {
        let db = MemoryDb::default();
        let (cache, feed) = (ProductCache::new(), ChangeFeed::new());
        let catalog = CatalogService::new(&db, &cache, &DisabledMediaHost, &feed);
        assert!(matches!(
            catalog.delete(ProductId::generate()).await,
            Err(CatalogError::NotFound)
        ));
    }
}
