/// HS256 token verification for local development and tests
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{IdTokenClaims, Identity, IdentityVerifier};
use crate::error::{AppError, Result};

const MIN_SECRET_LEN: usize = 32;

pub struct SharedSecretVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
}

impl SharedSecretVerifier {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Validation(format!(
                "Shared secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Mint a token for `claims`; used by local tooling and integration tests
    pub fn sign(&self, claims: &IdTokenClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {e}")))
    }
}

#[async_trait]
impl IdentityVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let validation = Validation::new(Algorithm::HS256);

        let data = decode::<IdTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;

        Identity::try_from(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn claims(exp_offset: i64, email: Option<&str>) -> IdTokenClaims {
        let now = chrono::Utc::now().timestamp();
        IdTokenClaims {
            sub: "uid-123".to_string(),
            exp: (now + exp_offset) as usize,
            iat: now as usize,
            email: email.map(str::to_string),
            picture: Some("https://cdn.test/p.png".to_string()),
            name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(SharedSecretVerifier::new("too-short").is_err());
    }

    #[tokio::test]
    async fn test_valid_token_yields_identity() {
        let verifier = SharedSecretVerifier::new(SECRET).unwrap();
        let token = verifier.sign(&claims(3600, Some("ada@x.io"))).unwrap();

        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.uid, "uid-123");
        assert_eq!(identity.email, "ada@x.io");
        assert_eq!(identity.picture.as_deref(), Some("https://cdn.test/p.png"));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let verifier = SharedSecretVerifier::new(SECRET).unwrap();
        let token = verifier.sign(&claims(-3600, Some("ada@x.io"))).unwrap();

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let other = SharedSecretVerifier::new("another-secret-that-is-32-bytes-long!!").unwrap();
        let token = other.sign(&claims(3600, Some("ada@x.io"))).unwrap();

        let verifier = SharedSecretVerifier::new(SECRET).unwrap();
        assert!(verifier.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_token_without_email_rejected() {
        let verifier = SharedSecretVerifier::new(SECRET).unwrap();
        let token = verifier.sign(&claims(3600, None)).unwrap();

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
