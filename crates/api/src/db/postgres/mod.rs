//! `PostgreSQL` implementations of the stores.
//!
//! Queries are built at runtime with `query_as` into `FromRow` row types,
//! then converted into core types. Conversions that can fail (negative
//! stock, malformed email) surface as `RepositoryError::DataCorruption`.

mod carts;
mod orders;
mod products;
mod users;

pub use carts::PgCartStore;
pub use orders::PgOrderStore;
pub use products::PgProductStore;
pub use users::{PgPasswordResetStore, PgUserStore};

use super::RepositoryError;

/// Map a unique violation to `Conflict`, anything else to `Database`.
fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Quantities are `u32` in the domain and `INTEGER` in the database.
fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} is too large")))
}

fn quantity_from_db(quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity {quantity}")))
}

fn count_from_db(count: i64) -> Result<u64, RepositoryError> {
    u64::try_from(count)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative count {count}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_conversions() {
        assert_eq!(quantity_to_db(5).ok(), Some(5));
        assert!(quantity_to_db(u32::MAX).is_err());
        assert_eq!(quantity_from_db(0).ok(), Some(0));
        assert!(matches!(
            quantity_from_db(-1),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
