//! GraphQL schema: user and post resolvers plus post subscriptions

pub mod loaders;
pub mod post;
pub mod subscription;
pub mod user;

use async_graphql::{dataloader::DataLoader, MergedObject, Schema};

use crate::config::GraphQLConfig;
use crate::state::AppState;

#[derive(MergedObject, Default)]
pub struct QueryRoot(user::UserQuery, post::PostQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(user::UserMutation, post::PostMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, subscription::SubscriptionRoot>;

pub fn build_schema(state: &AppState, config: &GraphQLConfig) -> AppSchema {
    let mut builder = Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        subscription::SubscriptionRoot::default(),
    )
    .data(state.user_service.clone())
    .data(state.post_service.clone())
    .data(state.verifier.clone())
    .data(state.pubsub.clone())
    .data(DataLoader::new(
        loaders::UserLoader::new(state.users.clone()),
        tokio::task::spawn,
    ))
    .limit_depth(config.max_depth)
    .limit_complexity(config.max_complexity);

    if !config.introspection {
        builder = builder.disable_introspection();
    }

    builder.finish()
}
