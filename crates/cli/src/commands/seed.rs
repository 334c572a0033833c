//! Seed the catalog with products.
//!
//! Without a file a small demo catalog is inserted. A seed file is a JSON
//! array of objects with `name`, `brand`, `price`, `sizes`, `image`,
//! `quantity` and `description`.
//!
//! Products whose name already exists are skipped, so the command can be run
//! more than once.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use solestore_api::db::ProductStore;
use solestore_api::db::postgres::PgProductStore;
use solestore_core::{Money, Product, ProductFilter, ProductId, vnd};

use super::{CliError, connect};

/// One product in a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub brand: String,
    pub price: Money,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub description: String,
}

impl From<SeedProduct> for Product {
    fn from(seed: SeedProduct) -> Self {
        Self {
            id: ProductId::generate(),
            name: seed.name,
            brand: seed.brand,
            price: seed.price,
            sizes: seed.sizes,
            image: seed.image,
            quantity: seed.quantity,
            description: seed.description,
            reviews: Vec::new(),
            rating: 0.0,
        }
    }
}

fn sizes(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|s| s.to_string()).collect()
}

fn demo_catalog() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            name: "Air Force 1 '07".to_string(),
            brand: "Nike".to_string(),
            price: vnd(2_929_000),
            sizes: sizes(38..=45),
            image: String::new(),
            quantity: 40,
            description: "Classic leather low-top.".to_string(),
        },
        SeedProduct {
            name: "Ultraboost Light".to_string(),
            brand: "Adidas".to_string(),
            price: vnd(4_800_000),
            sizes: sizes(39..=44),
            image: String::new(),
            quantity: 25,
            description: "Lightweight running shoe.".to_string(),
        },
        SeedProduct {
            name: "Chuck 70 Hi".to_string(),
            brand: "Converse".to_string(),
            price: vnd(2_100_000),
            sizes: sizes(36..=44),
            image: String::new(),
            quantity: 30,
            description: "Canvas high-top.".to_string(),
        },
        SeedProduct {
            name: "Old Skool".to_string(),
            brand: "Vans".to_string(),
            price: vnd(1_850_000),
            sizes: sizes(36..=45),
            image: String::new(),
            quantity: 35,
            description: "Suede and canvas skate shoe.".to_string(),
        },
    ]
}

/// Insert products from `file`, or the demo catalog when `None`.
///
/// # Errors
///
/// Returns `CliError` if the file cannot be read or parsed, or the database
/// rejects an insert.
pub async fn run(file: Option<&Path>) -> Result<(), CliError> {
    let seeds = match file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading products from file");
            let content = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<Vec<SeedProduct>>(&content)?
        }
        None => demo_catalog(),
    };

    let pool = connect().await?;
    let products = PgProductStore::new(pool);

    let existing: HashSet<String> = products
        .list(&ProductFilter::default())
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for seed in seeds {
        if existing.contains(&seed.name) {
            skipped += 1;
            continue;
        }
        products.insert(&Product::from(seed)).await?;
        inserted += 1;
    }

    tracing::info!("Seeding complete!");
    tracing::info!("  Products inserted: {inserted}");
    tracing::info!("  Products skipped (already exist): {skipped}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_file_defaults() {
        let json = r#"[{"name": "Samba OG", "brand": "Adidas", "price": "2600000"}]"#;
        let seeds: Vec<SeedProduct> = serde_json::from_str(json).unwrap();
        let product = Product::from(seeds.into_iter().next().unwrap());
        assert_eq!(product.price, vnd(2_600_000));
        assert!(product.sizes.is_empty());
        assert_eq!(product.quantity, 0);
        assert!(product.reviews.is_empty());
    }

    #[test]
    fn test_demo_catalog_is_sellable() {
        let catalog = demo_catalog();
        assert!(!catalog.is_empty());
        assert!(catalog.iter().all(|p| p.quantity > 0 && !p.sizes.is_empty()));
    }
}
