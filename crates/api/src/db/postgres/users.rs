//! Users and password reset codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use solestore_core::{Email, Role, User, UserId};

use super::{count_from_db, map_unique_violation};
use crate::db::{PasswordResetStore, RepositoryError, UserStore};
use crate::models::PasswordResetCode;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    phone: String,
    address: String,
    photo_url: String,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            phone: r.phone,
            email,
            address: r.address,
            photo_url: r.photo_url,
            role: r.role,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

/// `PostgreSQL` user store.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, phone, address, photo_url, role, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, phone, address, photo_url, role, created_at, updated_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn create(&self, user: &User, password_hash: Option<&str>) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO users
                (id, email, name, phone, address, photo_url, role, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.photo_url)
        .bind(user.role)
        .bind(password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;
        Ok(())
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, PasswordRow>(
            r"
            SELECT id, email, name, phone, address, photo_url, role, created_at, updated_at,
                   password_hash
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(PasswordRow {
                user,
                password_hash: Some(hash),
            }) => Ok(Some((User::try_from(user)?, hash))),
            _ => Ok(None),
        }
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_profile(&self, user: &User) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE users
            SET name = $2, phone = $3, address = $4, photo_url = $5, updated_at = $6
            WHERE id = $1
            RETURNING id, email, name, phone, address, photo_url, role, created_at, updated_at
            ",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.photo_url)
        .bind(user.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
        .and_then(User::try_from)
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, phone, address, photo_url, role, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
        .and_then(User::try_from)
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, phone, address, photo_url, role, created_at, updated_at
            FROM users
            ORDER BY created_at
            ",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        count_from_db(count)
    }
}

#[derive(sqlx::FromRow)]
struct ResetRow {
    email: String,
    expires_at: DateTime<Utc>,
}

/// `PostgreSQL` password reset code store.
pub struct PgPasswordResetStore {
    pool: PgPool,
}

impl PgPasswordResetStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetStore for PgPasswordResetStore {
    async fn insert(
        &self,
        code_hash: &str,
        email: &Email,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset_codes WHERE email = $1")
            .bind(email.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset_codes (code_hash, email, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(code_hash)
        .bind(email.as_str())
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "reset code"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, code_hash: &str) -> Result<Option<PasswordResetCode>, RepositoryError> {
        let row = sqlx::query_as::<_, ResetRow>(
            "SELECT email, expires_at FROM password_reset_codes WHERE code_hash = $1",
        )
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<PasswordResetCode, RepositoryError> {
            let email = Email::parse(&r.email).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;
            Ok(PasswordResetCode {
                email,
                expires_at: r.expires_at,
            })
        })
        .transpose()
    }

    async fn consume(&self, code_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM password_reset_codes WHERE code_hash = $1")
            .bind(code_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
