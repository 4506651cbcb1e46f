//! User queries and mutations

use async_graphql::{Context, ErrorExtensions, Object, Result};
use std::sync::Arc;

use crate::auth::authenticate;
use crate::models::{UpdateUserInput, User};
use crate::services::UserService;

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// The authenticated caller's own account
    async fn get_user(&self, ctx: &Context<'_>) -> Result<User> {
        let identity = authenticate(ctx).await.map_err(|e| e.extend())?;

        ctx.data::<Arc<UserService>>()?
            .get_user(&identity.email)
            .await
            .map_err(|e| e.extend())
    }

    async fn list_users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        ctx.data::<Arc<UserService>>()?
            .list_users()
            .await
            .map_err(|e| e.extend())
    }

    /// Look up a user by public username
    async fn get_public_profile(&self, ctx: &Context<'_>, username: String) -> Result<User> {
        ctx.data::<Arc<UserService>>()?
            .get_public_profile(&username)
            .await
            .map_err(|e| e.extend())
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    /// Register the caller on first login; returns the existing account afterwards
    async fn create_user(&self, ctx: &Context<'_>) -> Result<User> {
        let identity = authenticate(ctx).await.map_err(|e| e.extend())?;

        ctx.data::<Arc<UserService>>()?
            .create_user(&identity)
            .await
            .map_err(|e| e.extend())
    }

    async fn update_user(&self, ctx: &Context<'_>, input: UpdateUserInput) -> Result<User> {
        let identity = authenticate(ctx).await.map_err(|e| e.extend())?;

        ctx.data::<Arc<UserService>>()?
            .update_user(&identity.email, input)
            .await
            .map_err(|e| e.extend())
    }
}
