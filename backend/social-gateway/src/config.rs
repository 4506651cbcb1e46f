//! Configuration for the social gateway
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)

use anyhow::{bail, Context, Result};
use s3_utils::S3Config;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub storage: StorageConfig,
    pub pagination: PaginationConfig,
    pub graphql: GraphQLConfig,
    /// Buffered events per subscription topic
    pub pubsub_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// Upper bound for JSON request bodies (base64 images travel inline)
    pub json_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins, "*" for any
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "kebab-case")]
pub enum IdentityConfig {
    /// Firebase ID tokens verified against the provider's JWKS
    Firebase {
        project_id: String,
        jwks_url: String,
        jwks_cache_ttl_secs: u64,
    },
    /// HS256 tokens signed with a shared secret (local development)
    SharedSecret { secret: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: ObjectStoreBackend,
    pub s3: S3Config,
    /// Largest decoded image accepted by the upload endpoints
    pub max_image_bytes: usize,
}

/// Page defaults for post listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_page: u32,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: 6,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLConfig {
    /// Serve the GraphQL sandbox page
    pub playground: bool,
    pub introspection: bool,
    pub max_depth: usize,
    pub max_complexity: usize,
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            playground: true,
            introspection: true,
            max_depth: 10,
            max_complexity: 1000,
        }
    }
}

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = Self::database_from_env()?;
        let identity = Self::identity_from_env()?;

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("SERVER_PORT", 8000),
                workers: env_parse("SERVER_WORKERS", num_cpus::get()),
                json_limit_bytes: env_parse("JSON_LIMIT_BYTES", 10 * 1024 * 1024),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database,
            identity,
            storage: StorageConfig {
                backend: match env::var("OBJECT_STORE_BACKEND").as_deref() {
                    Ok("memory") => ObjectStoreBackend::Memory,
                    _ => ObjectStoreBackend::S3,
                },
                s3: S3Config::from_env(),
                max_image_bytes: env_parse("MAX_IMAGE_BYTES", 5 * 1024 * 1024),
            },
            pagination: Self::pagination_from_env()?,
            graphql: GraphQLConfig {
                playground: env_parse("GRAPHQL_PLAYGROUND", true),
                introspection: env_parse("GRAPHQL_INTROSPECTION", true),
                max_depth: env_parse("GRAPHQL_MAX_DEPTH", 10),
                max_complexity: env_parse("GRAPHQL_MAX_COMPLEXITY", 1000),
            },
            pubsub_capacity: env_parse("PUBSUB_CAPACITY", 256),
        })
    }

    fn database_from_env() -> Result<DatabaseConfig> {
        let backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => bail!("Unknown STORE_BACKEND {other:?} (expected postgres or memory)"),
        };

        let url = match backend {
            StoreBackend::Postgres => env::var("DATABASE_URL")
                .context("DATABASE_URL must be set when STORE_BACKEND is postgres")?,
            StoreBackend::Memory => String::new(),
        };

        Ok(DatabaseConfig {
            backend,
            url,
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            min_connections: env_parse("DB_MIN_CONNECTIONS", 2),
            run_migrations: env_parse("DB_RUN_MIGRATIONS", true),
        })
    }

    fn identity_from_env() -> Result<IdentityConfig> {
        match env::var("IDENTITY_PROVIDER").as_deref() {
            Ok("firebase") | Err(_) => Ok(IdentityConfig::Firebase {
                project_id: env::var("FIREBASE_PROJECT_ID")
                    .context("FIREBASE_PROJECT_ID must be set for the firebase identity provider")?,
                jwks_url: env::var("FIREBASE_JWKS_URL")
                    .unwrap_or_else(|_| FIREBASE_JWKS_URL.to_string()),
                jwks_cache_ttl_secs: env_parse("JWKS_CACHE_TTL_SECS", 3600),
            }),
            Ok("shared-secret") => Ok(IdentityConfig::SharedSecret {
                secret: env::var("AUTH_SHARED_SECRET")
                    .context("AUTH_SHARED_SECRET must be set for the shared-secret identity provider")?,
            }),
            Ok(other) => bail!("Unknown IDENTITY_PROVIDER {other:?}"),
        }
    }

    fn pagination_from_env() -> Result<PaginationConfig> {
        let defaults = PaginationConfig::default();
        let pagination = PaginationConfig {
            default_page: env_parse("POSTS_DEFAULT_PAGE", defaults.default_page),
            default_limit: env_parse("POSTS_DEFAULT_LIMIT", defaults.default_limit),
            max_limit: env_parse("POSTS_MAX_LIMIT", defaults.max_limit),
        };

        if pagination.default_page == 0 || pagination.default_limit == 0 {
            bail!("POSTS_DEFAULT_PAGE and POSTS_DEFAULT_LIMIT must be at least 1");
        }
        if pagination.default_limit > pagination.max_limit {
            bail!("POSTS_DEFAULT_LIMIT cannot exceed POSTS_MAX_LIMIT");
        }

        Ok(pagination)
    }
}
