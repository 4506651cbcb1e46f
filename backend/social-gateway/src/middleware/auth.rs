/// Bearer-token authentication for REST routes
///
/// Verifies the token with the identity provider, loads the caller's user
/// record and stores it in request extensions as `CurrentUser`. Requests
/// without a valid token, or from callers that never registered, get 401.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

use crate::auth::{bearer_token, IdentityVerifier};
use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::User;
use crate::rest_api::rest_error;

/// Authenticated caller, available to handlers behind `AuthMiddleware`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Clone)]
pub struct AuthMiddleware {
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<dyn UserRepository>,
}

impl AuthMiddleware {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, users: Arc<dyn UserRepository>) -> Self {
        Self { verifier, users }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
            users: self.users.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<dyn UserRepository>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let verifier = self.verifier.clone();
        let users = self.users.clone();

        Box::pin(async move {
            let token = bearer_token(req.headers()).ok_or_else(|| {
                rest_error(&AppError::Unauthorized(
                    "Missing authorization token".to_string(),
                ))
            })?;

            let identity = verifier.verify(&token).await.map_err(|e| rest_error(&e))?;

            let user = users
                .find_by_email(&identity.email)
                .await
                .map_err(|e| rest_error(&e))?
                .ok_or_else(|| {
                    debug!(uid = %identity.uid, "Token valid but user not registered");
                    rest_error(&AppError::Unauthorized("User not found.".to_string()))
                })?;

            req.extensions_mut().insert(CurrentUser(user));

            service.call(req).await
        })
    }
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(req.extensions().get::<CurrentUser>().cloned().ok_or_else(|| {
            rest_error(&AppError::Unauthorized(
                "Missing authorization token".to_string(),
            ))
        }))
    }
}
