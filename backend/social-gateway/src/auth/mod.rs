//! Authentication bridge to the external identity provider
//!
//! A request carries `Authorization: Bearer <id token>`. Verifiers check the
//! token and yield the caller's `Identity`; resolvers and the REST auth
//! middleware call them before touching the store.

pub mod jwks;
pub mod shared_secret;

use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use async_graphql::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};

pub use jwks::JwksVerifier;
pub use shared_secret::SharedSecretVerifier;

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider user id (`sub`)
    pub uid: String,
    pub email: String,
    pub picture: Option<String>,
    pub name: Option<String>,
}

/// Claims shared by the supported token formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub name: Option<String>,
}

impl TryFrom<IdTokenClaims> for Identity {
    type Error = AppError;

    fn try_from(claims: IdTokenClaims) -> Result<Self> {
        let email = claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Token carries no email".to_string()))?;

        Ok(Identity {
            uid: claims.sub,
            email,
            picture: claims.picture.filter(|p| !p.is_empty()),
            name: claims.name,
        })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a raw token; failures are `AppError::Unauthorized`
    async fn verify(&self, token: &str) -> Result<Identity>;
}

/// Raw bearer token attached to a GraphQL request
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Extract the token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Verify the caller of a GraphQL operation
pub async fn authenticate(ctx: &Context<'_>) -> Result<Identity> {
    let verifier = ctx
        .data::<Arc<dyn IdentityVerifier>>()
        .map_err(|_| AppError::Internal("identity verifier not configured".to_string()))?;

    let token = ctx
        .data_opt::<BearerToken>()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    verifier.verify(&token.0).await
}
