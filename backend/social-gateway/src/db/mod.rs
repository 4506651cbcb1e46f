/// Store access layer
///
/// Repositories are traits so services run unchanged against PostgreSQL
/// (`pg_*` modules) or the in-process store in `memory`.
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Image, NewPost, NewUser, Post, User};

pub mod memory;
pub mod pg_post_repo;
pub mod pg_user_repo;

pub use memory::{MemoryPostRepository, MemoryUserRepository};
pub use pg_post_repo::PgPostRepository;
pub use pg_user_repo::PgUserRepository;

/// Fields changed by a profile update; `None` leaves a field as is
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub about: Option<String>,
    pub images: Option<Vec<Image>>,
}

/// Lowercased alphanumeric words of a search term
pub(crate) fn search_terms(term: &str) -> Vec<String> {
    term.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct PostChanges {
    pub content: Option<String>,
    pub image: Option<Image>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn list(&self) -> Result<Vec<User>>;

    /// Insert unless a user with the same email exists; returns the stored row
    /// either way. A username collision is a `Conflict`.
    async fn insert_if_absent(&self, user: NewUser) -> Result<User>;

    /// Apply changes to the user with `email`; `None` when no such user
    async fn update_by_email(&self, email: &str, changes: &UserChanges) -> Result<Option<User>>;

    async fn set_images(&self, id: Uuid, images: &[Image]) -> Result<Option<User>>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<Post>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>>;

    /// Newest first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Post>>;

    /// Newest first
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>>;

    async fn update(&self, id: Uuid, changes: &PostChanges) -> Result<Option<Post>>;

    /// Returns the removed post
    async fn delete(&self, id: Uuid) -> Result<Option<Post>>;

    async fn count(&self) -> Result<i64>;

    /// Word search over post content; any term may match
    async fn search(&self, term: &str) -> Result<Vec<Post>>;
}
