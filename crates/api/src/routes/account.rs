//! Account route handlers.
//!
//! `/account` routes act on the signed-in user; `/users/{id}` is the public
//! card other shoppers see next to reviews.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use solestore_core::{PublicUser, User, UserId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::upload::MultipartForm;
use crate::services::media::ImageInput;
use crate::services::profile::ProfileUpdate;
use crate::state::AppState;

/// Multipart field carrying a new avatar.
const PHOTO_FIELD: &str = "photo";

/// Profile edits. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// An `http(s)` URL, or empty to remove the photo.
    pub photo_url: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            name: req.name,
            phone: req.phone,
            address: req.address,
            photo: req.photo_url.map(ImageInput::Url),
        }
    }
}

/// GET /account
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(state.profiles().current_user(user.id).await?))
}

/// PUT /account
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let updated = state
        .profiles()
        .update_profile(user.id, req.into())
        .await?;
    Ok(Json(updated))
}

/// Upload a new avatar as the `photo` part of a multipart form.
///
/// POST /account/photo
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_photo(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<User>> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_file(PHOTO_FIELD)
        .ok_or_else(|| AppError::BadRequest("Missing photo file".to_string()))?;

    let updated = state
        .profiles()
        .update_photo(user.id, file.bytes, &file.filename)
        .await?;
    Ok(Json(updated))
}

/// GET /users/{id}
pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<PublicUser>> {
    Ok(Json(state.profiles().public_user(id).await?))
}
