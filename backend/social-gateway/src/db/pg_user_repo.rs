use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgDatabaseError;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{UserChanges, UserRepository};
use crate::error::{AppError, Result};
use crate::models::{Image, NewUser, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    name: Option<String>,
    email: String,
    about: Option<String>,
    images: Json<Vec<Image>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            name: row.name,
            email: row.email,
            about: row.about,
            images: row.images.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Split a unique-violation detail such as
/// `Key (username)=(alice) already exists.` into field and value.
pub(crate) fn parse_unique_detail(detail: &str) -> Option<(&str, &str)> {
    let rest = detail.strip_prefix("Key (")?;
    let (field, rest) = rest.split_once(")=(")?;
    let value = rest.strip_suffix(") already exists.")?;
    Some((field, value))
}

/// Turn a unique-index violation into a `Conflict` naming the field and value
pub(crate) fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let detail = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .and_then(parse_unique_detail);

            return match detail {
                Some((field, value)) => AppError::taken(field, value),
                None => AppError::Conflict("Value is already taken.".to_string()),
            };
        }
    }

    err.into()
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, name, email, about, images, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, name, email, about, images, created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, name, email, about, images, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, name, email, about, images, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, name, email, about, images, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn insert_if_absent(&self, user: NewUser) -> Result<User> {
        let inserted = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, email, images)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, username, name, email, about, images, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(Json(&user.images))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        // Another request registered this email first.
        self.find_by_email(&user.email).await?.ok_or_else(|| {
            AppError::Internal(format!("user {} vanished after conflicting insert", user.email))
        })
    }

    async fn update_by_email(&self, email: &str, changes: &UserChanges) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                about = COALESCE($5, about),
                images = COALESCE($6, images),
                updated_at = NOW()
            WHERE email = $1
            RETURNING id, username, name, email, about, images, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(changes.username.as_deref())
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.about.as_deref())
        .bind(changes.images.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(row.map(User::from))
    }

    async fn set_images(&self, id: Uuid, images: &[Image]) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET images = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, name, email, about, images, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(Json(images))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unique_detail() {
        assert_eq!(
            parse_unique_detail("Key (username)=(alice) already exists."),
            Some(("username", "alice"))
        );
        assert_eq!(
            parse_unique_detail("Key (email)=(a@b.co) already exists."),
            Some(("email", "a@b.co"))
        );
    }

    #[test]
    fn test_parse_unique_detail_rejects_other_messages() {
        assert_eq!(parse_unique_detail("Failing row contains (...)"), None);
        assert_eq!(parse_unique_detail("Key (username)=(alice)"), None);
    }

    #[test]
    fn test_non_database_error_maps_to_database_variant() {
        let err = map_unique_violation(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
