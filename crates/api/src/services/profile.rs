//! User profiles and account administration.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use solestore_core::{PublicUser, Role, User, UserId};

use crate::db::{RepositoryError, UserStore};
use crate::services::media::{ImageInput, MediaError, MediaFolder, MediaHost, is_remote_url};

/// Longest accepted value for a free-text profile field.
const MAX_FIELD_LEN: usize = 500;

/// Errors from profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("user not found")]
    NotFound,

    #[error("invalid profile: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ProfileError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub photo: Option<ImageInput>,
}

/// Profile façade over the user store.
pub struct ProfileService<'a> {
    users: &'a dyn UserStore,
    media: &'a dyn MediaHost,
}

impl<'a> ProfileService<'a> {
    #[must_use]
    pub const fn new(users: &'a dyn UserStore, media: &'a dyn MediaHost) -> Self {
        Self { users, media }
    }

    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` if the account no longer exists.
    pub async fn current_user(&self, id: UserId) -> Result<User, ProfileError> {
        self.users.get(id).await?.ok_or(ProfileError::NotFound)
    }

    /// Apply the given changes to the caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidInput` for overlong fields or a photo
    /// that is neither an upload nor an `http(s)` URL.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, ProfileError> {
        let mut user = self.current_user(id).await?;

        if let Some(name) = update.name {
            user.name = checked_field("name", name)?;
        }
        if let Some(phone) = update.phone {
            user.phone = checked_field("phone", phone)?;
        }
        if let Some(address) = update.address {
            user.address = checked_field("address", address)?;
        }
        if let Some(photo) = update.photo {
            user.photo_url = self.resolve_photo(photo).await?;
        }
        user.updated_at = Utc::now();

        Ok(self.users.update_profile(&user).await?)
    }

    /// Upload a new avatar and store its URL.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Media` if the upload fails.
    pub async fn update_photo(
        &self,
        id: UserId,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<User, ProfileError> {
        self.update_profile(
            id,
            ProfileUpdate {
                photo: Some(ImageInput::Upload {
                    bytes,
                    filename: filename.to_string(),
                }),
                ..ProfileUpdate::default()
            },
        )
        .await
    }

    /// What other shoppers may see about a user.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` for unknown ids.
    pub async fn public_user(&self, id: UserId) -> Result<PublicUser, ProfileError> {
        let user = self.current_user(id).await?;
        Ok(PublicUser::from(&user))
    }

    /// All accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Repository` if the store fails.
    pub async fn list_users(&self) -> Result<Vec<User>, ProfileError> {
        Ok(self.users.list().await?)
    }

    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<User, ProfileError> {
        let user = self.users.set_role(id, role).await?;
        tracing::info!(user_id = %id, role = %role, "role changed");
        Ok(user)
    }

    async fn resolve_photo(&self, photo: ImageInput) -> Result<String, ProfileError> {
        match photo {
            ImageInput::Url(url) if url.trim().is_empty() => Ok(String::new()),
            ImageInput::Url(url) if is_remote_url(&url) => Ok(url.trim().to_string()),
            ImageInput::Url(_) => Err(ProfileError::InvalidInput(
                "photo must be an http(s) URL or an uploaded file".to_string(),
            )),
            ImageInput::Upload { bytes, filename } => Ok(self
                .media
                .upload(bytes, &filename, MediaFolder::Avatars)
                .await?),
        }
    }
}

fn checked_field(field: &str, value: String) -> Result<String, ProfileError> {
    let value = value.trim();
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(ProfileError::InvalidInput(format!("{field} is too long")));
    }
    Ok(value.to_string())
}
