/// Image service - profile and post images kept in object storage
///
/// Clients send images as base64 data URIs (`data:image/<type>;base64,...`).
/// Keys are `profile/<user id>/<uuid>.<type>` and `posts/<user id>/<uuid>.<type>`.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::join_all;
use s3_utils::{ObjectStorage, ObjectUpload};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::models::{Image, User};

pub(crate) const PROFILE_PREFIX: &str = "profile";
const POST_PREFIX: &str = "posts";

/// Storage key prefix of `user_id`'s profile images
pub(crate) fn profile_key_prefix(user_id: Uuid) -> String {
    format!("{PROFILE_PREFIX}/{user_id}/")
}

/// Image payload decoded from a data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Subtype of `image/<type>`, used as the key extension
    pub image_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn parse(data_uri: &str, max_bytes: usize) -> Result<Self> {
        let malformed = || AppError::Validation("Image must be a base64 data URI.".to_string());

        let rest = data_uri.strip_prefix("data:image/").ok_or_else(malformed)?;
        let (image_type, payload) = rest.split_once(";base64,").ok_or_else(malformed)?;

        if image_type.is_empty()
            || !image_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(malformed());
        }

        // Upper bound before decoding: 4 base64 chars carry 3 bytes.
        if payload.len() / 4 * 3 > max_bytes + 3 {
            return Err(Self::too_large(max_bytes));
        }
        let bytes = STANDARD.decode(payload.trim()).map_err(|_| malformed())?;
        if bytes.len() > max_bytes {
            return Err(Self::too_large(max_bytes));
        }

        Ok(Self {
            image_type: image_type.to_ascii_lowercase(),
            bytes,
        })
    }

    fn too_large(max_bytes: usize) -> AppError {
        AppError::Validation(format!("Image exceeds the {max_bytes} byte limit."))
    }

    pub fn content_type(&self) -> String {
        format!("image/{}", self.image_type)
    }

    fn into_upload(self, prefix: &str, user_id: Uuid) -> ObjectUpload {
        ObjectUpload {
            key: format!("{prefix}/{user_id}/{}.{}", Uuid::new_v4(), self.image_type),
            content_type: self.content_type(),
            body: self.bytes,
        }
    }
}

pub struct ImageService {
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ObjectStorage>,
    max_image_bytes: usize,
}

impl ImageService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            users,
            storage,
            max_image_bytes,
        }
    }

    /// Upload every image concurrently. Any failure fails the whole batch and
    /// the objects that did land are removed again. Nothing is written to the
    /// user record.
    pub async fn upload_profile_images(&self, user: &User, images: &[String]) -> Result<Vec<Image>> {
        let uploads = images
            .iter()
            .map(|uri| {
                DecodedImage::parse(uri, self.max_image_bytes)
                    .map(|image| image.into_upload(PROFILE_PREFIX, user.id))
            })
            .collect::<Result<Vec<_>>>()?;

        let results = join_all(uploads.into_iter().map(|upload| self.storage.put_object(upload))).await;

        let mut stored = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(object) => stored.push(object),
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "Profile image upload failed");
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            self.discard(&stored).await;
            return Err(e.into());
        }

        info!(user_id = %user.id, count = stored.len(), "Profile images uploaded");
        Ok(stored
            .into_iter()
            .map(|object| Image {
                url: object.url,
                key: object.key,
            })
            .collect())
    }

    async fn discard(&self, objects: &[s3_utils::StoredObject]) {
        let deletes = objects.iter().map(|object| async move {
            if let Err(e) = self.storage.delete_object(&object.key).await {
                warn!(key = %object.key, error = %e, "Failed to remove orphaned upload");
            }
        });
        join_all(deletes).await;
    }

    pub async fn upload_post_image(&self, user: &User, image: &str) -> Result<Image> {
        let upload = DecodedImage::parse(image, self.max_image_bytes)?.into_upload(POST_PREFIX, user.id);
        let object = self.storage.put_object(upload).await?;

        info!(user_id = %user.id, key = %object.key, "Post image uploaded");
        Ok(Image {
            url: object.url,
            key: object.key,
        })
    }

    /// Remove `key` from storage and from the caller's image list.
    /// The key must sit under the caller's profile prefix and be listed on the
    /// caller's own record; anything else is rejected before storage is touched.
    pub async fn delete_profile_image(&self, user: &User, key: &str) -> Result<User> {
        let owner = self
            .users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let owned = key.starts_with(&profile_key_prefix(owner.id))
            && owner.images.iter().any(|image| image.key == key);
        if !owned {
            warn!(user_id = %user.id, key = %key, "Rejected profile image delete");
            return Err(AppError::Unauthorized("Unauthorized action.".to_string()));
        }

        self.storage.delete_object(key).await?;

        let remaining: Vec<Image> = owner
            .images
            .into_iter()
            .filter(|image| image.key != key)
            .collect();
        let updated = self
            .users
            .set_images(owner.id, &remaining)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        info!(user_id = %user.id, key = %key, "Profile image deleted");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserRepository;
    use crate::models::NewUser;
    use s3_utils::MemoryObjectStorage;

    const PNG_URI: &str = "data:image/png;base64,aGVsbG8=";

    struct Fixture {
        service: ImageService,
        users: Arc<MemoryUserRepository>,
        storage: Arc<MemoryObjectStorage>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserRepository::new());
        let storage = Arc::new(MemoryObjectStorage::new("https://cdn.test"));
        let service = ImageService::new(users.clone(), storage.clone(), 1024);
        Fixture {
            service,
            users,
            storage,
        }
    }

    async fn user(fx: &Fixture, username: &str) -> User {
        fx.users
            .insert_if_absent(NewUser {
                username: username.to_string(),
                email: format!("{username}@x.io"),
                images: Vec::new(),
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_data_uri() {
        let image = DecodedImage::parse(PNG_URI, 1024).unwrap();
        assert_eq!(image.image_type, "png");
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn test_parse_rejects_malformed_uris() {
        for uri in [
            "hello",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png,aGVsbG8=",
            "data:image/;base64,aGVsbG8=",
            "data:image/png;base64,***",
        ] {
            assert!(
                matches!(DecodedImage::parse(uri, 1024), Err(AppError::Validation(_))),
                "accepted {uri}"
            );
        }
    }

    #[test]
    fn test_parse_enforces_size_limit() {
        let payload = STANDARD.encode(vec![0u8; 64]);
        let uri = format!("data:image/jpeg;base64,{payload}");
        assert!(DecodedImage::parse(&uri, 64).is_ok());
        assert!(DecodedImage::parse(&uri, 63).is_err());
    }

    #[tokio::test]
    async fn test_upload_profile_images_keys() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;

        let images = fx
            .service
            .upload_profile_images(&alice, &[PNG_URI.to_string(), PNG_URI.to_string()])
            .await
            .unwrap();

        assert_eq!(images.len(), 2);
        for image in &images {
            assert!(image.key.starts_with(&format!("profile/{}/", alice.id)));
            assert!(image.key.ends_with(".png"));
            assert_eq!(image.url, format!("https://cdn.test/{}", image.key));
        }
        assert_eq!(fx.storage.len(), 2);
        // Uploads are returned, not recorded on the user.
        assert!(fx.users.find_by_id(alice.id).await.unwrap().unwrap().images.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_image_fails_before_upload() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;

        let result = fx
            .service
            .upload_profile_images(&alice, &[PNG_URI.to_string(), "garbage".to_string()])
            .await;

        assert!(result.is_err());
        assert!(fx.storage.is_empty());
    }

    #[tokio::test]
    async fn test_upload_post_image_key() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;

        let image = fx.service.upload_post_image(&alice, PNG_URI).await.unwrap();
        assert!(image.key.starts_with(&format!("posts/{}/", alice.id)));
        assert!(fx.storage.contains(&image.key));
    }

    #[tokio::test]
    async fn test_delete_profile_image_by_owner() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;
        let images = fx
            .service
            .upload_profile_images(&alice, &[PNG_URI.to_string()])
            .await
            .unwrap();
        fx.users.set_images(alice.id, &images).await.unwrap();

        let updated = fx
            .service
            .delete_profile_image(&alice, &images[0].key)
            .await
            .unwrap();

        assert!(updated.images.is_empty());
        assert!(!fx.storage.contains(&images[0].key));
    }

    #[tokio::test]
    async fn test_delete_foreign_image_rejected() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;
        let bob = user(&fx, "bob").await;
        let images = fx
            .service
            .upload_profile_images(&alice, &[PNG_URI.to_string()])
            .await
            .unwrap();
        fx.users.set_images(alice.id, &images).await.unwrap();

        let err = fx
            .service
            .delete_profile_image(&bob, &images[0].key)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unauthorized action.");
        assert!(fx.storage.contains(&images[0].key));
        assert_eq!(
            fx.users.find_by_id(alice.id).await.unwrap().unwrap().images,
            images
        );
    }

    #[tokio::test]
    async fn test_delete_listed_key_outside_own_prefix_rejected() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;
        let bob = user(&fx, "bob").await;
        let images = fx
            .service
            .upload_profile_images(&alice, &[PNG_URI.to_string()])
            .await
            .unwrap();
        fx.users.set_images(alice.id, &images).await.unwrap();
        // Bob's record lists alice's key, e.g. written before keys were checked.
        fx.users.set_images(bob.id, &images).await.unwrap();

        let err = fx
            .service
            .delete_profile_image(&bob, &images[0].key)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unauthorized action.");
        assert!(fx.storage.contains(&images[0].key));
    }

    #[tokio::test]
    async fn test_delete_unknown_key_rejected() {
        let fx = fixture();
        let alice = user(&fx, "alice").await;

        let err = fx
            .service
            .delete_profile_image(&alice, "profile/none.png")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized action.");
    }
}
