use s3_utils::ObjectStorage;
use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::config::PaginationConfig;
use crate::db::{PostRepository, UserRepository};
use crate::pubsub::PubSub;
use crate::services::{ImageService, PostService, UserService};

/// Shared handles for the GraphQL schema and REST handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub image_service: Arc<ImageService>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub pubsub: Arc<PubSub>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        storage: Arc<dyn ObjectStorage>,
        verifier: Arc<dyn IdentityVerifier>,
        pubsub: Arc<PubSub>,
        pagination: PaginationConfig,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            user_service: Arc::new(UserService::new(users.clone())),
            post_service: Arc::new(PostService::new(
                posts,
                users.clone(),
                pubsub.clone(),
                pagination,
            )),
            image_service: Arc::new(ImageService::new(users.clone(), storage, max_image_bytes)),
            users,
            verifier,
            pubsub,
        }
    }
}
