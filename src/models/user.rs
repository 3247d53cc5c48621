use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::query::{Column, ColumnKind, Entity, Join, Value};
use crate::models::page::blank_as_none;
use crate::models::role::RoleType;
use crate::models::settings::{UserSettings, UserSettingsResponse};
use crate::{AppError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: RoleType,
    pub email: Option<String>,
    /// Password hash, never sent to clients
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnKind::Uuid),
        Column::new("first_name", ColumnKind::Text),
        Column::new("last_name", ColumnKind::Text),
        Column::new("role", RoleType::COLUMN_KIND),
        Column::new("email", ColumnKind::Text),
        Column::new("phone", ColumnKind::Text),
        Column::new("created_at", ColumnKind::Timestamp),
        Column::new("updated_at", ColumnKind::Timestamp),
    ];
    const SEARCH_COLUMNS: &'static [&'static str] = &["first_name", "last_name", "email"];

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
            "first_name" => self.first_name.clone().into(),
            "last_name" => self.last_name.clone().into(),
            "role" => self.role.into(),
            "email" => self.email.clone().into(),
            "phone" => self.phone.clone().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }
}

impl User {
    /// Join used to filter other entities by their owning user.
    pub const fn join_as(alias: &'static str, local_key: &'static str) -> Join {
        Join {
            alias,
            table: <User as Entity>::TABLE,
            columns: <User as Entity>::COLUMNS,
            local_key,
            foreign_key: "id",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::ValidationError("firstName and lastName are required".to_string()));
        }
        if !is_plausible_email(&self.email) {
            return Err(AppError::ValidationError("email must be a valid email address".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::ValidationError(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Entity specific filters accepted by `GET /users`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct UserFilters {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub role: Option<RoleType>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: RoleType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettingsResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn with_settings(mut self, settings: Option<UserSettings>) -> Self {
        self.settings = settings.map(UserSettingsResponse::from);
        self
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            email: user.email,
            phone: user.phone,
            avatar: user.avatar,
            settings: None,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterUserRequest {
        RegisterUserRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register("ada@example.com", "secret1").validate().is_ok());
        assert!(register("ada.example.com", "secret1").validate().is_err());
        assert!(register("ada@example", "secret1").validate().is_err());
        assert!(register("ada@example.com", "short").validate().is_err());
    }

    #[test]
    fn test_password_is_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: None,
            last_name: None,
            role: RoleType::User,
            email: Some("ada@example.com".to_string()),
            password: Some("hash".to_string()),
            phone: None,
            avatar: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());

        let response = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(response["role"], "USER");
        assert!(response.get("settings").is_none());
    }

    #[test]
    fn test_user_filters_treat_blank_role_as_absent() {
        let filters: UserFilters = serde_json::from_value(serde_json::json!({ "role": "", "email": "" })).unwrap();
        assert_eq!(filters.role, None);

        let filters: UserFilters = serde_json::from_value(serde_json::json!({ "role": "USER" })).unwrap();
        assert_eq!(filters.role, Some(RoleType::User));
    }
}
