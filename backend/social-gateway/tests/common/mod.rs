//! Shared fixtures for integration tests
//!
//! Builds the gateway on in-memory stores with HS256 tokens, so tests run
//! without PostgreSQL, S3 or the identity provider.
#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test;
use async_trait::async_trait;
use s3_utils::{MemoryObjectStorage, ObjectStorage, ObjectUpload, S3Error, StoredObject};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use social_gateway::auth::{BearerToken, IdTokenClaims, SharedSecretVerifier};
use social_gateway::config::{GraphQLConfig, PaginationConfig};
use social_gateway::db::{MemoryPostRepository, MemoryUserRepository, UserChanges, UserRepository};
use social_gateway::models::{Image, NewUser, User};
use social_gateway::pubsub::PubSub;
use social_gateway::routes::RouteOptions;
use social_gateway::schema::{build_schema, AppSchema};
use social_gateway::{AppState, Result};

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PNG_URI: &str = "data:image/png;base64,aGVsbG8=";

pub struct TestApp {
    pub state: AppState,
    pub schema: AppSchema,
    pub users: Arc<CountingUserRepository>,
    pub signer: SharedSecretVerifier,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryObjectStorage::new("https://cdn.test")))
    }

    pub fn with_storage(storage: Arc<dyn ObjectStorage>) -> Self {
        let users = Arc::new(CountingUserRepository::default());
        let signer = SharedSecretVerifier::new(SECRET).expect("valid secret");
        let verifier = SharedSecretVerifier::new(SECRET).expect("valid secret");

        let state = AppState::new(
            users.clone(),
            Arc::new(MemoryPostRepository::new()),
            storage,
            Arc::new(verifier),
            Arc::new(PubSub::new(64)),
            PaginationConfig::default(),
            1024 * 1024,
        );
        let schema = build_schema(&state, &GraphQLConfig::default());

        Self {
            state,
            schema,
            users,
            signer,
        }
    }

    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            playground: true,
            json_limit_bytes: 10 * 1024 * 1024,
        }
    }

    /// HS256 token for `email`, valid for an hour
    pub fn token(&self, email: &str) -> String {
        self.token_with_picture(email, None)
    }

    pub fn token_with_picture(&self, email: &str, picture: Option<&str>) -> String {
        let now = chrono::Utc::now().timestamp() as usize;
        self.signer
            .sign(&IdTokenClaims {
                sub: format!("uid-{email}"),
                exp: now + 3600,
                iat: now,
                email: Some(email.to_string()),
                picture: picture.map(str::to_string),
                name: None,
            })
            .expect("token signs")
    }

    /// Run a GraphQL operation as the holder of `token`
    pub async fn execute(&self, query: &str, token: Option<&str>) -> async_graphql::Response {
        let mut request = async_graphql::Request::new(query);
        if let Some(token) = token {
            request = request.data(BearerToken(token.to_string()));
        }
        self.schema.execute(request).await
    }

    /// Run an operation that must succeed and return its data as JSON
    pub async fn data(&self, query: &str, token: Option<&str>) -> Value {
        let response = self.execute(query, token).await;
        assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
        response.data.into_json().expect("data is JSON")
    }

    /// Register `email` through createUser and return the stored user
    pub async fn register(&self, email: &str) -> (User, String) {
        let token = self.token(email);
        self.data("mutation { createUser { id } }", Some(&token)).await;
        let user = self
            .users
            .find_by_email(email)
            .await
            .expect("lookup")
            .expect("user registered");
        (user, token)
    }
}

/// First error message of a failed response
pub fn error_message(response: &async_graphql::Response) -> String {
    response
        .errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_default()
}

pub fn error_code(response: &async_graphql::Response) -> Option<String> {
    response
        .errors
        .first()
        .and_then(|e| e.extensions.as_ref())
        .and_then(|ext| ext.get("code"))
        .and_then(|code| code.clone().into_json().ok())
        .and_then(|code| code.as_str().map(str::to_string))
}

/// Call an actix test service and decode the JSON body, including error
/// responses raised by middleware
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            let body = test::read_body(resp).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let body = actix_web::body::to_bytes(resp.into_body())
                .await
                .expect("error body");
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
    }
}

/// User store that counts batched id lookups
#[derive(Default)]
pub struct CountingUserRepository {
    inner: MemoryUserRepository,
    batch_calls: AtomicUsize,
}

impl CountingUserRepository {
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for CountingUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_ids(ids).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.inner.find_by_username(username).await
    }

    async fn list(&self) -> Result<Vec<User>> {
        self.inner.list().await
    }

    async fn insert_if_absent(&self, user: NewUser) -> Result<User> {
        self.inner.insert_if_absent(user).await
    }

    async fn update_by_email(&self, email: &str, changes: &UserChanges) -> Result<Option<User>> {
        self.inner.update_by_email(email, changes).await
    }

    async fn set_images(&self, id: Uuid, images: &[Image]) -> Result<Option<User>> {
        self.inner.set_images(id, images).await
    }
}

/// Object storage whose `fail_on`-th upload (1-based) fails
pub struct FlakyStorage {
    pub inner: MemoryObjectStorage,
    fail_on: usize,
    puts: AtomicUsize,
}

impl FlakyStorage {
    pub fn new(fail_on: usize) -> Self {
        Self {
            inner: MemoryObjectStorage::new("https://cdn.test"),
            fail_on,
            puts: AtomicUsize::new(0),
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn put_object(&self, upload: ObjectUpload) -> std::result::Result<StoredObject, S3Error> {
        let call = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(S3Error::Upload {
                key: upload.key,
                message: "simulated outage".to_string(),
            });
        }
        self.inner.put_object(upload).await
    }

    async fn delete_object(&self, key: &str) -> std::result::Result<(), S3Error> {
        self.inner.delete_object(key).await
    }
}
