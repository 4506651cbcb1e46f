/// REST endpoints for image upload and removal
///
/// Failures are flattened: a missing or invalid token is 401, everything
/// else is a 500 with a generic message. Details go to the log only.
pub mod images;

use actix_web::error::InternalError;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::error;

use crate::error::AppError;
use crate::middleware::AuthMiddleware;
use crate::state::AppState;

pub const GENERIC_FAILURE: &str = "Something went wrong, try again later.";

pub(crate) fn failure(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({ "message": message }))
}

/// Response for an error raised outside a handler body
pub(crate) fn rest_error(err: &AppError) -> actix_web::Error {
    let response = match err {
        AppError::Unauthorized(message) => {
            HttpResponse::Unauthorized().json(json!({ "message": message }))
        }
        other => {
            error!(error = %other, "REST request failed");
            failure(GENERIC_FAILURE)
        }
    };

    InternalError::from_response(err.to_string(), response).into()
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(
        web::scope("/api")
            .wrap(AuthMiddleware::new(
                state.verifier.clone(),
                state.users.clone(),
            ))
            .route(
                "/upload-profile-images",
                web::post().to(images::upload_profile_images),
            )
            .route("/profile-image", web::delete().to(images::delete_profile_image))
            .route("/upload-post-image", web::post().to(images::upload_post_image)),
    );
}
