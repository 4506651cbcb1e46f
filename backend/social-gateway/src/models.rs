/// Domain models shared by the store, services and GraphQL schema
///
/// - `User`: account created on first verified login, with an embedded image list
/// - `Post`: text post with an optional image, owned by a user
/// - inputs: partial updates validated before they reach the store
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Image stored in the bucket (`key` is empty for externally hosted pictures)
#[derive(SimpleObject, InputObject, Validate, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[graphql(input_name = "ImageInput")]
pub struct Image {
    #[validate(url)]
    pub url: String,
    #[validate(length(max = 1024))]
    pub key: String,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub email: String,
    pub about: Option<String>,
    pub images: Vec<Image>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert on first login
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub images: Vec<Image>,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[graphql(complex)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
    pub image: Option<Image>,
    #[graphql(skip)]
    pub posted_by_id: Uuid,
    /// Owner email copied at creation; authoritative for ownership checks
    #[graphql(skip)]
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.owner_email == email
    }
}

#[derive(Clone, Debug)]
pub struct NewPost {
    pub content: String,
    pub image: Option<Image>,
    pub posted_by_id: Uuid,
    pub owner_email: String,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset")
            .with_message("may only contain letters, digits, '_' and '-'".into()))
    }
}

#[derive(InputObject, Validate, Clone, Debug, Default, Deserialize)]
pub struct UpdateUserInput {
    #[validate(
        length(min = 3, max = 32, message = "must be between 3 and 32 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub about: Option<String>,
    #[validate(length(max = 20, message = "must hold at most 20 images"), nested)]
    pub images: Option<Vec<Image>>,
}

#[derive(InputObject, Validate, Clone, Debug, Deserialize)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 5000, message = "must be between 1 and 5000 characters"))]
    pub content: String,
    #[validate(nested)]
    pub image: Option<Image>,
}

#[derive(InputObject, Validate, Clone, Debug, Deserialize)]
pub struct UpdatePostInput {
    pub id: Uuid,
    #[validate(length(min = 1, max = 5000, message = "must be between 1 and 5000 characters"))]
    pub content: Option<String>,
    #[validate(nested)]
    pub image: Option<Image>,
}
