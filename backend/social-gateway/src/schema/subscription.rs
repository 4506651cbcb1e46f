//! GraphQL subscriptions (WebSocket)
//!
//! Each field streams one pub/sub topic. Events published before the client
//! subscribed are not replayed.

use async_graphql::{Context, Result, Subscription};
use futures_util::stream::Stream;
use std::sync::Arc;

use crate::models::Post;
use crate::pubsub::{PubSub, Topic};

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    async fn on_post_created(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Post>> {
        Ok(ctx.data::<Arc<PubSub>>()?.subscribe(Topic::PostCreated))
    }

    async fn on_post_updated(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Post>> {
        Ok(ctx.data::<Arc<PubSub>>()?.subscribe(Topic::PostUpdated))
    }

    /// Carries the post as it was before deletion
    async fn on_post_deleted(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Post>> {
        Ok(ctx.data::<Arc<PubSub>>()?.subscribe(Topic::PostDeleted))
    }
}
