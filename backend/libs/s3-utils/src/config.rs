/// S3 configuration for the image bucket
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    pub endpoint: Option<String>,
    /// Base URL for public access; when empty the bucket URL is derived
    pub base_url: String,
    /// Canned ACL applied to every uploaded object (e.g. "public-read")
    pub acl: Option<String>,
    /// Whether to use path-style URLs (false = virtual-hosted-style)
    pub path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "social-images".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            base_url: String::new(),
            acl: Some("public-read".to_string()),
            path_style: false,
        }
    }
}

impl S3Config {
    /// Load S3 configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            region: std::env::var("AWS_REGION").unwrap_or(defaults.region),
            endpoint: std::env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
            base_url: std::env::var("S3_BASE_URL").unwrap_or(defaults.base_url),
            acl: match std::env::var("S3_ACL") {
                Ok(acl) if acl.is_empty() || acl == "none" => None,
                Ok(acl) => Some(acl),
                Err(_) => defaults.acl,
            },
            path_style: std::env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.path_style),
        }
    }

    /// Public URL of an object
    pub fn object_url(&self, key: &str) -> String {
        if !self.base_url.is_empty() {
            return format!("{}/{}", self.base_url.trim_end_matches('/'), key);
        }

        match (&self.endpoint, self.path_style) {
            (Some(endpoint), true) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
            }
            (Some(endpoint), false) => format!("{}/{}", endpoint.trim_end_matches('/'), key),
            (None, true) => format!(
                "https://s3.{}.amazonaws.com/{}/{}",
                self.region, self.bucket, key
            ),
            (None, false) => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}
