/// Post service - creation, listing, search and owner-only mutation of posts
///
/// Every successful mutation is published on the matching pub/sub topic.
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::PaginationConfig;
use crate::db::{PostChanges, PostRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::models::{CreatePostInput, NewPost, Post, UpdatePostInput};
use crate::pubsub::{PubSub, Topic};

/// Validated page of a post listing (1-based page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Resolve optional client arguments against configured defaults.
    /// Page and limit come together or not at all.
    pub fn resolve(
        num_page: Option<i32>,
        num_limit: Option<i32>,
        config: &PaginationConfig,
    ) -> Result<Self> {
        let (page, limit) = match (num_page, num_limit) {
            (Some(page), Some(limit)) => (page, limit),
            (None, None) => {
                return Ok(Self {
                    page: config.default_page,
                    limit: config.default_limit,
                })
            }
            _ => {
                return Err(AppError::Validation(
                    "Must provide a page number and a limit number for pagination.".to_string(),
                ))
            }
        };

        if page < 1 || limit < 1 {
            return Err(AppError::Validation(
                "Page number and limit number must be at least 1.".to_string(),
            ));
        }
        if limit as u32 > config.max_limit {
            return Err(AppError::Validation(format!(
                "Limit number cannot exceed {}.",
                config.max_limit
            )));
        }

        Ok(Self {
            page: page as u32,
            limit: limit as u32,
        })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found.".to_string())
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    pubsub: Arc<PubSub>,
    pagination: PaginationConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        pubsub: Arc<PubSub>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            posts,
            users,
            pubsub,
            pagination,
        }
    }

    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }

    /// Newest first
    pub async fn list_posts(&self, page: PageRequest) -> Result<Vec<Post>> {
        self.posts
            .list(page.offset(), i64::from(page.limit))
            .await
    }

    /// Posts by `username`, newest first; unknown usernames have no posts
    pub async fn list_posts_by_user(&self, username: &str) -> Result<Vec<Post>> {
        match self.users.find_by_username(username).await? {
            Some(user) => self.posts.list_by_owner(user.id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.posts.find_by_id(id).await
    }

    pub async fn count_posts(&self) -> Result<i64> {
        self.posts.count().await
    }

    pub async fn search_posts(&self, term: &str) -> Result<Vec<Post>> {
        self.posts.search(term).await
    }

    pub async fn create_post(&self, email: &str, input: CreatePostInput) -> Result<Post> {
        input.validate()?;

        let owner = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let post = self
            .posts
            .insert(NewPost {
                content: input.content,
                image: input.image,
                posted_by_id: owner.id,
                owner_email: owner.email,
            })
            .await?;

        info!(post_id = %post.id, user_id = %owner.id, "Post created");
        self.pubsub.publish(Topic::PostCreated, post.clone());

        Ok(post)
    }

    /// Load a post and check that `email` owns it
    async fn owned_post(&self, id: Uuid, email: &str, action: &str) -> Result<Post> {
        let post = self.posts.find_by_id(id).await?.ok_or_else(post_not_found)?;

        if !post.is_owned_by(email) {
            warn!(post_id = %id, "Rejected {action} by non-owner");
            return Err(AppError::Unauthorized(format!(
                "User not authorized to {action} this post."
            )));
        }

        Ok(post)
    }

    pub async fn update_post(&self, email: &str, input: UpdatePostInput) -> Result<Post> {
        input.validate()?;
        self.owned_post(input.id, email, "update").await?;

        let changes = PostChanges {
            content: input.content,
            image: input.image,
        };
        let post = self
            .posts
            .update(input.id, &changes)
            .await?
            .ok_or_else(post_not_found)?;

        info!(post_id = %post.id, "Post updated");
        self.pubsub.publish(Topic::PostUpdated, post.clone());

        Ok(post)
    }

    /// Returns the deleted post
    pub async fn delete_post(&self, email: &str, id: Uuid) -> Result<Post> {
        self.owned_post(id, email, "delete").await?;

        let post = self.posts.delete(id).await?.ok_or_else(post_not_found)?;

        info!(post_id = %post.id, "Post deleted");
        self.pubsub.publish(Topic::PostDeleted, post.clone());

        Ok(post)
    }
}
