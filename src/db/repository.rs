// Repository trait abstractions for database operations
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::db::query::{matches_all, Entity, PageQuery, Predicate, Value};
use crate::models::{Post, User, UserSettings};
use crate::{AppError, Result};

/// Lookups shared by every entity table. All of them ignore soft-deleted rows.
#[async_trait]
pub trait EntityRepository<E: Entity>: Send + Sync {
    async fn find_one(&self, criteria: &[Predicate]) -> Result<Option<E>>;
    /// One page of rows plus the size of the whole filtered set
    async fn paginate(&self, query: &PageQuery) -> Result<(Vec<E>, u64)>;
    /// Marks every matching row deleted and returns how many were hit
    async fn soft_delete(&self, criteria: &[Predicate]) -> Result<u64>;
}

#[async_trait]
pub trait UserRepository: EntityRepository<User> {
    /// Inserts the user together with its settings row, atomically.
    async fn create_user(&self, user: &User, settings: &UserSettings) -> Result<User>;
    async fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>>;
}

#[async_trait]
pub trait PostRepository: EntityRepository<Post> {
    async fn create_post(&self, post: &Post) -> Result<Post>;
    async fn update_post(&self, post: &Post) -> Result<Post>;
}

// In-memory implementations, used when no DATABASE_URL is configured
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    settings: Mutex<HashMap<Uuid, UserSettings>>, // user_id -> settings
    posts: Mutex<HashMap<Uuid, Post>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::InternalError("In-memory store lock poisoned".to_string()))
}

fn no_relations<E>(_: &E, _: &str, _: &str) -> Value {
    Value::Null
}

fn soft_delete_matching<E, R>(rows: &mut HashMap<Uuid, E>, criteria: &[Predicate], resolve: R) -> u64
where
    E: Entity,
    R: Fn(&E, &str, &str) -> Value,
{
    let now = Utc::now();
    let ids: Vec<Uuid> = rows
        .values()
        .filter(|row| matches_all(*row, criteria, &resolve))
        .map(|row| row.id())
        .collect();

    for id in &ids {
        if let Some(row) = rows.get_mut(id) {
            row.mark_deleted(now);
        }
    }
    ids.len() as u64
}

pub struct MockUserRepository {
    store: Arc<MemoryStore>,
}

impl MockUserRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EntityRepository<User> for MockUserRepository {
    async fn find_one(&self, criteria: &[Predicate]) -> Result<Option<User>> {
        let users = lock(&self.store.users)?;
        Ok(users
            .values()
            .find(|user| matches_all(*user, criteria, &no_relations::<User>))
            .cloned())
    }

    async fn paginate(&self, query: &PageQuery) -> Result<(Vec<User>, u64)> {
        let users = lock(&self.store.users)?;
        Ok(query.apply(users.values().cloned().collect(), no_relations::<User>))
    }

    async fn soft_delete(&self, criteria: &[Predicate]) -> Result<u64> {
        let mut users = lock(&self.store.users)?;
        Ok(soft_delete_matching(&mut users, criteria, no_relations::<User>))
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create_user(&self, user: &User, settings: &UserSettings) -> Result<User> {
        let mut users = lock(&self.store.users)?;
        let mut all_settings = lock(&self.store.settings)?;

        let email_taken = user.email.is_some()
            && users
                .values()
                .any(|existing| existing.deleted_at.is_none() && existing.email == user.email);
        if email_taken {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        users.insert(user.id, user.clone());
        all_settings.insert(settings.user_id, settings.clone());

        Ok(user.clone())
    }

    async fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>> {
        let all_settings = lock(&self.store.settings)?;
        Ok(all_settings.get(&user_id).cloned())
    }
}

pub struct MockPostRepository {
    store: Arc<MemoryStore>,
}

impl MockPostRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

/// Resolves `user.<column>` for a post the way a left join would.
fn author_value<'a>(users: &'a HashMap<Uuid, User>) -> impl Fn(&Post, &str, &str) -> Value + 'a {
    move |post, alias, column| {
        if alias != Post::AUTHOR.alias {
            return Value::Null;
        }
        users
            .get(&post.user_id)
            .filter(|user| user.deleted_at.is_none())
            .map(|user| user.value(column))
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl EntityRepository<Post> for MockPostRepository {
    async fn find_one(&self, criteria: &[Predicate]) -> Result<Option<Post>> {
        let users = lock(&self.store.users)?;
        let posts = lock(&self.store.posts)?;
        let resolve = author_value(&users);
        Ok(posts
            .values()
            .find(|post| matches_all(*post, criteria, &resolve))
            .cloned())
    }

    async fn paginate(&self, query: &PageQuery) -> Result<(Vec<Post>, u64)> {
        let users = lock(&self.store.users)?;
        let posts = lock(&self.store.posts)?;
        Ok(query.apply(posts.values().cloned().collect(), author_value(&users)))
    }

    async fn soft_delete(&self, criteria: &[Predicate]) -> Result<u64> {
        let users = lock(&self.store.users)?;
        let mut posts = lock(&self.store.posts)?;
        Ok(soft_delete_matching(&mut posts, criteria, author_value(&users)))
    }
}

#[async_trait]
impl PostRepository for MockPostRepository {
    async fn create_post(&self, post: &Post) -> Result<Post> {
        let users = lock(&self.store.users)?;
        if !users.contains_key(&post.user_id) {
            return Err(AppError::ValidationError("Post author does not exist".to_string()));
        }

        let mut posts = lock(&self.store.posts)?;
        posts.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn update_post(&self, post: &Post) -> Result<Post> {
        let mut posts = lock(&self.store.posts)?;
        match posts.get_mut(&post.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                *existing = Post { updated_at: Utc::now(), ..post.clone() };
                Ok(existing.clone())
            }
            _ => Err(AppError::NotFound("post not found".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::CreatePostRequest;
    use crate::models::{PageOptions, RoleType};

    fn user(email: &str, role: RoleType) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            first_name: Some("Test".to_string()),
            last_name: Some("User".to_string()),
            role,
            email: Some(email.to_string()),
            password: None,
            phone: None,
            avatar: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn post(author: &User, title: &str) -> Post {
        Post::new(author.id, CreatePostRequest { title: title.to_string(), description: "body".to_string() })
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let repo = MockUserRepository::new(Arc::new(MemoryStore::default()));
        let first = user("dup@example.com", RoleType::User);
        repo.create_user(&first, &UserSettings::unverified(first.id)).await.unwrap();

        let second = user("dup@example.com", RoleType::User);
        let err = repo.create_user(&second, &UserSettings::unverified(second.id)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let settings = repo.get_settings(first.id).await.unwrap().unwrap();
        assert!(!settings.is_email_verified);
        assert!(!settings.is_phone_verified);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_rows() {
        let store = Arc::new(MemoryStore::default());
        let users = MockUserRepository::new(store.clone());
        let posts = MockPostRepository::new(store);

        let author = user("author@example.com", RoleType::User);
        users.create_user(&author, &UserSettings::unverified(author.id)).await.unwrap();
        let created = posts.create_post(&post(&author, "first")).await.unwrap();

        let criteria = [Predicate::eq("id", created.id)];
        assert!(posts.find_one(&criteria).await.unwrap().is_some());
        assert_eq!(posts.soft_delete(&criteria).await.unwrap(), 1);
        assert!(posts.find_one(&criteria).await.unwrap().is_none());
        assert_eq!(posts.soft_delete(&criteria).await.unwrap(), 0);

        let err = posts.update_post(&created).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_post_paginate_by_author_role() {
        let store = Arc::new(MemoryStore::default());
        let users = MockUserRepository::new(store.clone());
        let posts = MockPostRepository::new(store);

        let admin = user("admin@example.com", RoleType::Admin);
        let member = user("member@example.com", RoleType::User);
        for author in [&admin, &member] {
            users.create_user(author, &UserSettings::unverified(author.id)).await.unwrap();
        }
        posts.create_post(&post(&admin, "from admin")).await.unwrap();
        posts.create_post(&post(&member, "from member")).await.unwrap();

        let query = PageQuery::compose::<Post, _>(
            &PageOptions::default(),
            &(),
            &[Post::AUTHOR],
            &[Predicate::related("user", "role", RoleType::Admin)],
            &[],
        )
        .unwrap();

        let (rows, total) = posts.paginate(&query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].title, "from admin");
    }

    #[tokio::test]
    async fn test_create_post_requires_existing_author() {
        let store = Arc::new(MemoryStore::default());
        let posts = MockPostRepository::new(store);
        let ghost = user("ghost@example.com", RoleType::User);

        let err = posts.create_post(&post(&ghost, "orphan")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
