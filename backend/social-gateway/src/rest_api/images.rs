/// Image handlers - profile image upload/delete and post image upload
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::{failure, GENERIC_FAILURE};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadProfileImagesRequest {
    /// Base64 data URIs
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadPostImageRequest {
    pub image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProfileImageQuery {
    pub image_key: String,
}

/// Upload profile images; they are returned, not attached to the user
pub async fn upload_profile_images(
    state: web::Data<AppState>,
    user: CurrentUser,
    req: web::Json<UploadProfileImagesRequest>,
) -> HttpResponse {
    match state
        .image_service
        .upload_profile_images(&user.0, &req.images)
        .await
    {
        Ok(images) => HttpResponse::Created().json(json!({ "data": { "images": images } })),
        Err(e) => {
            error!(user_id = %user.0.id, error = %e, "[uploadProfileImages] failed");
            failure(GENERIC_FAILURE)
        }
    }
}

pub async fn delete_profile_image(
    state: web::Data<AppState>,
    user: CurrentUser,
    query: web::Query<DeleteProfileImageQuery>,
) -> HttpResponse {
    match state
        .image_service
        .delete_profile_image(&user.0, &query.image_key)
        .await
    {
        Ok(_) => HttpResponse::Ok().json(json!({ "data": { "message": "Delete success." } })),
        Err(AppError::Unauthorized(message)) => failure(&message),
        Err(e) => {
            error!(user_id = %user.0.id, key = %query.image_key, error = %e, "[deleteProfileImage] failed");
            failure(GENERIC_FAILURE)
        }
    }
}

pub async fn upload_post_image(
    state: web::Data<AppState>,
    user: CurrentUser,
    req: web::Json<UploadPostImageRequest>,
) -> HttpResponse {
    match state
        .image_service
        .upload_post_image(&user.0, &req.image)
        .await
    {
        Ok(image) => HttpResponse::Created().json(json!({ "data": { "image": image } })),
        Err(e) => {
            error!(user_id = %user.0.id, error = %e, "[uploadPostImage] failed");
            failure(GENERIC_FAILURE)
        }
    }
}
