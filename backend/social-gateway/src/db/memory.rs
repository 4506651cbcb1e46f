//! In-process store used for local development (`STORE_BACKEND=memory`) and tests.
//!
//! Mirrors the unique indexes of the SQL schema: usernames and emails are
//! unique, and violations surface as the same `Conflict` the Postgres
//! repositories produce.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{search_terms, PostChanges, PostRepository, UserChanges, UserRepository};
use crate::error::{AppError, Result};
use crate::models::{Image, NewPost, NewUser, Post, User};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.users).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.users).is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(lock(&self.users).iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        Ok(lock(&self.users)
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(lock(&self.users).iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(lock(&self.users)
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>> {
        Ok(lock(&self.users).clone())
    }

    async fn insert_if_absent(&self, user: NewUser) -> Result<User> {
        let mut users = lock(&self.users);

        if let Some(existing) = users.iter().find(|u| u.email == user.email) {
            return Ok(existing.clone());
        }
        if users.iter().any(|u| u.username == user.username) {
            return Err(AppError::taken("username", &user.username));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            name: None,
            email: user.email,
            about: None,
            images: user.images,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());

        Ok(created)
    }

    async fn update_by_email(&self, email: &str, changes: &UserChanges) -> Result<Option<User>> {
        let mut users = lock(&self.users);

        let Some(index) = users.iter().position(|u| u.email == email) else {
            return Ok(None);
        };
        let id = users[index].id;

        if let Some(username) = &changes.username {
            if users.iter().any(|u| u.id != id && &u.username == username) {
                return Err(AppError::taken("username", username));
            }
        }
        if let Some(new_email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == new_email) {
                return Err(AppError::taken("email", new_email));
            }
        }

        let user = &mut users[index];
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(name) = &changes.name {
            user.name = Some(name.clone());
        }
        if let Some(new_email) = &changes.email {
            user.email = new_email.clone();
        }
        if let Some(about) = &changes.about {
            user.about = Some(about.clone());
        }
        if let Some(images) = &changes.images {
            user.images = images.clone();
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn set_images(&self, id: Uuid, images: &[Image]) -> Result<Option<User>> {
        let mut users = lock(&self.users);

        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.images = images.to_vec();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

/// Posts kept with an insertion sequence so equal timestamps still sort newest first
#[derive(Clone, Default)]
pub struct MemoryPostRepository {
    posts: Arc<Mutex<Vec<(u64, Post)>>>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut posts: Vec<(u64, Post)>) -> Vec<Post> {
        posts.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        posts.into_iter().map(|(_, post)| post).collect()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let mut posts = lock(&self.posts);
        let seq = posts.iter().map(|(seq, _)| *seq + 1).max().unwrap_or(0);

        let now = Utc::now();
        let created = Post {
            id: Uuid::new_v4(),
            content: post.content,
            image: post.image,
            posted_by_id: post.posted_by_id,
            owner_email: post.owner_email,
            created_at: now,
            updated_at: now,
        };
        posts.push((seq, created.clone()));

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(lock(&self.posts)
            .iter()
            .find(|(_, p)| p.id == id)
            .map(|(_, p)| p.clone()))
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let posts = Self::newest_first(lock(&self.posts).clone());

        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>> {
        let owned = lock(&self.posts)
            .iter()
            .filter(|(_, p)| p.posted_by_id == owner_id)
            .cloned()
            .collect();

        Ok(Self::newest_first(owned))
    }

    async fn update(&self, id: Uuid, changes: &PostChanges) -> Result<Option<Post>> {
        let mut posts = lock(&self.posts);

        Ok(posts.iter_mut().find(|(_, p)| p.id == id).map(|(_, post)| {
            if let Some(content) = &changes.content {
                post.content = content.clone();
            }
            if let Some(image) = &changes.image {
                post.image = Some(image.clone());
            }
            post.updated_at = Utc::now();
            post.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Post>> {
        let mut posts = lock(&self.posts);

        Ok(posts
            .iter()
            .position(|(_, p)| p.id == id)
            .map(|index| posts.remove(index).1))
    }

    async fn count(&self) -> Result<i64> {
        Ok(lock(&self.posts).len() as i64)
    }

    async fn search(&self, term: &str) -> Result<Vec<Post>> {
        let terms: HashSet<String> = search_terms(term).into_iter().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(usize, u64, Post)> = lock(&self.posts)
            .iter()
            .filter_map(|(seq, post)| {
                let words: HashSet<String> = search_terms(&post.content).into_iter().collect();
                let hits = terms.intersection(&words).count();
                (hits > 0).then(|| (hits, *seq, post.clone()))
            })
            .collect();

        ranked.sort_by(|(hits_a, seq_a, a), (hits_b, seq_b, b)| {
            hits_b
                .cmp(hits_a)
                .then(b.created_at.cmp(&a.created_at))
                .then(seq_b.cmp(seq_a))
        });

        Ok(ranked.into_iter().map(|(_, _, post)| post).collect())
    }
}
