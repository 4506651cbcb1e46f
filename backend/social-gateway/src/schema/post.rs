//! Post queries, mutations and the `Post.postedBy` field

use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, ErrorExtensions, Object, Result};
use std::sync::Arc;
use uuid::Uuid;

use super::loaders::UserLoader;
use crate::auth::authenticate;
use crate::error::AppError;
use crate::models::{CreatePostInput, Post, UpdatePostInput, User};
use crate::services::{PageRequest, PostService};

#[ComplexObject]
impl Post {
    /// Owner of the post
    async fn posted_by(&self, ctx: &Context<'_>) -> Result<User> {
        let loader = ctx.data::<DataLoader<UserLoader>>()?;

        loader
            .load_one(self.posted_by_id)
            .await
            .map_err(|e| e.as_ref().extend())?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()).extend())
    }
}

#[derive(Default)]
pub struct PostQuery;

#[Object]
impl PostQuery {
    /// Newest posts first. `numPage` and `numLimit` go together.
    async fn list_posts(
        &self,
        ctx: &Context<'_>,
        num_page: Option<i32>,
        num_limit: Option<i32>,
    ) -> Result<Vec<Post>> {
        let service = ctx.data::<Arc<PostService>>()?;
        let page = PageRequest::resolve(num_page, num_limit, service.pagination())
            .map_err(|e| e.extend())?;

        service.list_posts(page).await.map_err(|e| e.extend())
    }

    async fn list_posts_by_user(&self, ctx: &Context<'_>, username: String) -> Result<Vec<Post>> {
        ctx.data::<Arc<PostService>>()?
            .list_posts_by_user(&username)
            .await
            .map_err(|e| e.extend())
    }

    async fn get_post(&self, ctx: &Context<'_>, id: Uuid) -> Result<Option<Post>> {
        ctx.data::<Arc<PostService>>()?
            .get_post(id)
            .await
            .map_err(|e| e.extend())
    }

    async fn count_posts(&self, ctx: &Context<'_>) -> Result<i64> {
        ctx.data::<Arc<PostService>>()?
            .count_posts()
            .await
            .map_err(|e| e.extend())
    }

    /// Posts containing any word of `term`, best match first
    async fn search_posts(&self, ctx: &Context<'_>, term: String) -> Result<Vec<Post>> {
        ctx.data::<Arc<PostService>>()?
            .search_posts(&term)
            .await
            .map_err(|e| e.extend())
    }
}

#[derive(Default)]
pub struct PostMutation;

#[Object]
impl PostMutation {
    async fn create_post(&self, ctx: &Context<'_>, input: CreatePostInput) -> Result<Post> {
        let identity = authenticate(ctx).await.map_err(|e| e.extend())?;

        ctx.data::<Arc<PostService>>()?
            .create_post(&identity.email, input)
            .await
            .map_err(|e| e.extend())
    }

    /// Owner only
    async fn update_post(&self, ctx: &Context<'_>, input: UpdatePostInput) -> Result<Post> {
        let identity = authenticate(ctx).await.map_err(|e| e.extend())?;

        ctx.data::<Arc<PostService>>()?
            .update_post(&identity.email, input)
            .await
            .map_err(|e| e.extend())
    }

    /// Owner only; returns the deleted post
    async fn delete_post(&self, ctx: &Context<'_>, id: Uuid) -> Result<Post> {
        let identity = authenticate(ctx).await.map_err(|e| e.extend())?;

        ctx.data::<Arc<PostService>>()?
            .delete_post(&identity.email, id)
            .await
            .map_err(|e| e.extend())
    }
}
