use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::query::{Column, ColumnKind, Entity, Join, Value};
use crate::models::page::blank_as_none;
use crate::models::role::RoleType;
use crate::models::user::User;
use crate::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Post {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnKind::Uuid),
        Column::new("user_id", ColumnKind::Uuid),
        Column::new("title", ColumnKind::Text),
        Column::new("description", ColumnKind::Text),
        Column::new("created_at", ColumnKind::Timestamp),
        Column::new("updated_at", ColumnKind::Timestamp),
    ];
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "description"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "id" => self.id.into(),
            "user_id" => self.user_id.into(),
            "title" => self.title.clone().into(),
            "description" => self.description.clone().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }
}

impl Post {
    /// The owning user, joined as `user`.
    pub const AUTHOR: Join = User::join_as("user", "user_id");

    pub fn new(user_id: Uuid, request: CreatePostRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: request.title,
            description: request.description,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Copy over the fields present in `request`, leaving the rest untouched.
    pub fn merge(&mut self, request: UpdatePostRequest) {
        if let Some(title) = request.title {
            self.title = title;
        }
        if let Some(description) = request.description {
            self.description = description;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: String,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::ValidationError("title should not be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::ValidationError("description should not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<()> {
        let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&self.title) || blank(&self.description) {
            return Err(AppError::ValidationError("title and description must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Entity specific filters accepted by `GET /posts`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct PostFilters {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Listing parameters that are not column filters of `posts` itself.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListParams {
    /// Only posts whose author has this role
    #[serde(default, deserialize_with = "blank_as_none")]
    pub author_role: Option<RoleType>,
    /// `column:order` pairs, comma separated
    #[serde(default)]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            title: post.title,
            description: post.description,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_only_touches_present_fields() {
        let mut post = Post::new(
            Uuid::new_v4(),
            CreatePostRequest { title: "Hello".to_string(), description: "World".to_string() },
        );

        post.merge(UpdatePostRequest { title: Some("Hi".to_string()), description: None });
        assert_eq!(post.title, "Hi");
        assert_eq!(post.description, "World");
    }

    #[test]
    fn test_request_validation() {
        let empty = CreatePostRequest { title: " ".to_string(), description: "x".to_string() };
        assert!(empty.validate().is_err());

        let blank_update = UpdatePostRequest { title: Some(String::new()), description: None };
        assert!(blank_update.validate().is_err());
        assert!(UpdatePostRequest::default().validate().is_ok());
    }

    #[test]
    fn test_blank_typed_filters_are_absent() {
        let filters: PostFilters = serde_json::from_value(serde_json::json!({ "userId": " " })).unwrap();
        assert_eq!(filters.user_id, None);

        let params: PostListParams = serde_json::from_value(serde_json::json!({ "authorRole": "" })).unwrap();
        assert_eq!(params.author_role, None);

        let params: PostListParams = serde_json::from_value(serde_json::json!({ "authorRole": "ADMIN" })).unwrap();
        assert_eq!(params.author_role, Some(RoleType::Admin));

        assert!(serde_json::from_value::<PostFilters>(serde_json::json!({ "userId": "nope" })).is_err());
        assert!(serde_json::from_value::<PostListParams>(serde_json::json!({ "authorRole": "ROOT" })).is_err());
    }

    #[test]
    fn test_author_join_targets_users() {
        assert_eq!(Post::AUTHOR.alias, "user");
        assert_eq!(Post::AUTHOR.table, "users");
        assert!(Post::AUTHOR.columns.iter().any(|c| c.name == "role"));
    }
}
