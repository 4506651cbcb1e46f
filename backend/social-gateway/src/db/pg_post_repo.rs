use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{search_terms, PostChanges, PostRepository};
use crate::error::Result;
use crate::models::{Image, NewPost, Post};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    content: String,
    image: Option<Json<Image>>,
    posted_by: Uuid,
    owner_email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            content: row.content,
            image: row.image.map(|json| json.0),
            posted_by_id: row.posted_by,
            owner_email: row.owner_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, content, image, posted_by, owner_email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, content, image, posted_by, owner_email, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&post.content)
        .bind(post.image.as_ref().map(Json))
        .bind(post.posted_by_id)
        .bind(&post.owner_email)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, content, image, posted_by, owner_email, created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, content, image, posted_by, owner_email, created_at, updated_at
            FROM posts
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, content, image, posted_by, owner_email, created_at, updated_at
            FROM posts
            WHERE posted_by = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn update(&self, id: Uuid, changes: &PostChanges) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET content = COALESCE($2, content),
                image = COALESCE($3, image),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, content, image, posted_by, owner_email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.content.as_deref())
        .bind(changes.image.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            DELETE FROM posts
            WHERE id = $1
            RETURNING id, content, image, posted_by, owner_email, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn search(&self, term: &str) -> Result<Vec<Post>> {
        let terms = search_terms(term);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        // Any word may match, like a document-store $text search.
        let tsquery = terms.join(" | ");

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, content, image, posted_by, owner_email, created_at, updated_at
            FROM posts
            WHERE search_vector @@ to_tsquery('english', $1)
            ORDER BY ts_rank(search_vector, to_tsquery('english', $1)) DESC, created_at DESC
            "#,
        )
        .bind(tsquery)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }
}
