//! Social gateway
//!
//! GraphQL API for users and posts with live post subscriptions, plus REST
//! endpoints for profile and post images kept in S3-compatible storage.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pubsub;
pub mod rest_api;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;

pub use error::{AppError, Result};
pub use state::AppState;
