use actix_cors::Cors;
use actix_web::{App, HttpServer};
use anyhow::Context;
use s3_utils::{MemoryObjectStorage, ObjectStorage, S3Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use social_gateway::auth::{IdentityVerifier, JwksVerifier, SharedSecretVerifier};
use social_gateway::config::{
    Config, CorsConfig, IdentityConfig, ObjectStoreBackend, StoreBackend,
};
use social_gateway::db::{
    MemoryPostRepository, MemoryUserRepository, PgPostRepository, PgUserRepository,
    PostRepository, UserRepository,
};
use social_gateway::pubsub::PubSub;
use social_gateway::routes::{self, RouteOptions};
use social_gateway::schema::build_schema;
use social_gateway::AppState;

type Stores = (Arc<dyn UserRepository>, Arc<dyn PostRepository>);

async fn connect_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            Ok((
                Arc::new(MemoryUserRepository::new()),
                Arc::new(MemoryPostRepository::new()),
            ))
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&config.database.url)
                .await
                .context("Failed to connect to PostgreSQL")?;

            if config.database.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run database migrations")?;
                info!("Database migrations applied");
            }

            Ok((
                Arc::new(PgUserRepository::new(pool.clone())),
                Arc::new(PgPostRepository::new(pool)),
            ))
        }
    }
}

async fn object_storage(config: &Config) -> Arc<dyn ObjectStorage> {
    match config.storage.backend {
        ObjectStoreBackend::Memory => {
            warn!("Using in-memory object storage");
            Arc::new(MemoryObjectStorage::new(config.storage.s3.object_url("")))
        }
        ObjectStoreBackend::S3 => {
            let client = S3Client::with_config(config.storage.s3.clone()).await;
            if let Err(e) = client.health_check().await {
                warn!(error = %e, "S3 bucket not reachable at startup");
            }
            Arc::new(client.operations())
        }
    }
}

fn identity_verifier(config: &Config) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    match &config.identity {
        IdentityConfig::Firebase {
            project_id,
            jwks_url,
            jwks_cache_ttl_secs,
        } => Ok(Arc::new(JwksVerifier::new(
            project_id.clone(),
            jwks_url.clone(),
            Duration::from_secs(*jwks_cache_ttl_secs),
        ))),
        IdentityConfig::SharedSecret { secret } => {
            warn!("Verifying tokens with a shared secret; not for production");
            Ok(Arc::new(
                SharedSecretVerifier::new(secret).context("Invalid AUTH_SHARED_SECRET")?,
            ))
        }
    }
}

fn cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default();
    for origin in config.allowed_origins.split(',') {
        let origin = origin.trim();
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else if !origin.is_empty() {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allow_any_method().allow_any_header().max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,social_gateway=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    info!("Starting social gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let (users, posts) = connect_stores(&config).await?;
    let storage = object_storage(&config).await;
    let verifier = identity_verifier(&config)?;
    let pubsub = Arc::new(PubSub::new(config.pubsub_capacity));

    let state = AppState::new(
        users,
        posts,
        storage,
        verifier,
        pubsub,
        config.pagination,
        config.storage.max_image_bytes,
    );
    let schema = build_schema(&state, &config.graphql);
    let options = RouteOptions {
        playground: config.graphql.playground,
        json_limit_bytes: config.server.json_limit_bytes,
    };

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("GraphQL endpoint: http://{}/graphql", bind_addr);
    if options.playground {
        info!("GraphQL playground: http://{}/playground", bind_addr);
    }

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        let state = state.clone();
        let schema = schema.clone();

        App::new()
            .wrap(cors(&cors_config))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(|cfg| routes::configure(cfg, state, schema, options))
    })
    .workers(config.server.workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {bind_addr}"))?
    .run()
    .await
    .context("HTTP server failed")?;

    Ok(())
}
