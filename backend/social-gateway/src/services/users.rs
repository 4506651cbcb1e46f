/// User service - account bootstrap on first login and profile management
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::auth::Identity;
use crate::db::{UserChanges, UserRepository};
use crate::error::{AppError, Result};
use crate::models::{Image, NewUser, UpdateUserInput, User};
use crate::services::images::profile_key_prefix;

const GENERATED_USERNAME_LEN: usize = 10;
const MAX_USERNAME_ATTEMPTS: usize = 5;

fn user_not_found() -> AppError {
    AppError::NotFound("User not found.".to_string())
}

fn generate_username() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_USERNAME_LEN)
        .map(char::from)
        .collect()
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Return the caller's account, creating it on first login
    pub async fn create_user(&self, identity: &Identity) -> Result<User> {
        if let Some(existing) = self.users.find_by_email(&identity.email).await? {
            return Ok(existing);
        }

        let images: Vec<Image> = identity
            .picture
            .iter()
            .map(|url| Image {
                url: url.clone(),
                key: String::new(),
            })
            .collect();

        for attempt in 1..=MAX_USERNAME_ATTEMPTS {
            let new_user = NewUser {
                username: generate_username(),
                email: identity.email.clone(),
                images: images.clone(),
            };

            match self.users.insert_if_absent(new_user).await {
                Ok(user) => {
                    info!(user_id = %user.id, username = %user.username, "User ready");
                    return Ok(user);
                }
                Err(AppError::Conflict(message)) => {
                    warn!(attempt, %message, "Generated username collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(format!(
            "could not generate a free username after {MAX_USERNAME_ATTEMPTS} attempts"
        )))
    }

    /// Stored images must be the caller's own uploads; externally hosted
    /// pictures carry an empty key.
    pub async fn update_user(&self, email: &str, input: UpdateUserInput) -> Result<User> {
        input.validate()?;

        if let Some(images) = &input.images {
            let current = self.get_user(email).await?;
            let prefix = profile_key_prefix(current.id);
            if let Some(foreign) = images
                .iter()
                .find(|image| !image.key.is_empty() && !image.key.starts_with(&prefix))
            {
                warn!(user_id = %current.id, key = %foreign.key, "Rejected image key outside own prefix");
                return Err(AppError::Unauthorized("Unauthorized action.".to_string()));
            }
        }

        let changes = UserChanges {
            username: input.username,
            name: input.name,
            email: input.email,
            about: input.about,
            images: input.images,
        };

        let user = self
            .users
            .update_by_email(email, &changes)
            .await?
            .ok_or_else(user_not_found)?;

        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// The caller's own record
    pub async fn get_user(&self, email: &str) -> Result<User> {
        self.users
            .find_by_email(email)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn get_public_profile(&self, username: &str) -> Result<User> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list().await
    }
}
