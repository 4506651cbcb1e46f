/// HTTP middleware for the REST image endpoints
pub mod auth;

pub use auth::{AuthMiddleware, CurrentUser};
