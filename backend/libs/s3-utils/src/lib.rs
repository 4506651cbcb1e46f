/// Object storage for user-uploaded images
///
/// Provides the AWS S3 client, its configuration, and the `ObjectStorage`
/// seam the gateway uploads through. `MemoryObjectStorage` backs local
/// development and tests.
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client;
use std::sync::Arc;

pub mod config;
pub mod memory;
pub mod operations;

pub use config::S3Config;
pub use memory::MemoryObjectStorage;
pub use operations::S3Operations;

/// Errors raised by object storage backends
#[derive(Debug, thiserror::Error)]
pub enum S3Error {
    #[error("failed to upload object {key}: {message}")]
    Upload { key: String, message: String },

    #[error("failed to delete object {key}: {message}")]
    Delete { key: String, message: String },

    #[error("bucket {bucket} unreachable: {message}")]
    Unavailable { bucket: String, message: String },
}

/// A single object to store
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Location of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the object and return its public location
    async fn put_object(&self, upload: ObjectUpload) -> Result<StoredObject, S3Error>;

    /// Remove an object; deleting a missing key is not an error
    async fn delete_object(&self, key: &str) -> Result<(), S3Error>;
}

/// Shared S3 client wrapper
#[derive(Clone)]
pub struct S3Client {
    client: Arc<Client>,
    config: S3Config,
}

impl S3Client {
    /// Create new S3 client with custom configuration
    pub async fn with_config(config: S3Config) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Arc::new(Client::from_conf(builder.build())),
            config,
        }
    }

    /// Object operations bound to the configured bucket
    pub fn operations(&self) -> S3Operations {
        S3Operations::new(self.client.clone(), self.config.clone())
    }

    /// Health check for S3 connectivity
    pub async fn health_check(&self) -> Result<(), S3Error> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|e| S3Error::Unavailable {
                bucket: self.config.bucket.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}
