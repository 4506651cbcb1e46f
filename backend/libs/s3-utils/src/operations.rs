/// S3 object operations for image upload and removal
use crate::config::S3Config;
use crate::{ObjectStorage, ObjectUpload, S3Error, StoredObject};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct S3Operations {
    client: Arc<Client>,
    config: S3Config,
}

impl S3Operations {
    pub fn new(client: Arc<Client>, config: S3Config) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ObjectStorage for S3Operations {
    async fn put_object(&self, upload: ObjectUpload) -> Result<StoredObject, S3Error> {
        let size = upload.body.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&upload.key)
            .content_type(&upload.content_type)
            .body(ByteStream::from(upload.body));

        if let Some(acl) = &self.config.acl {
            request = request.acl(ObjectCannedAcl::from(acl.as_str()));
        }

        request.send().await.map_err(|e| S3Error::Upload {
            key: upload.key.clone(),
            message: e.to_string(),
        })?;

        debug!(key = %upload.key, size, "object uploaded");

        Ok(StoredObject {
            url: self.config.object_url(&upload.key),
            key: upload.key,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), S3Error> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3Error::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!(key = %key, "object deleted");
        Ok(())
    }
}
