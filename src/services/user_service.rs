use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{AuthService, TokenPayload};
use crate::db::query::Predicate;
use crate::db::repository::UserRepository;
use crate::models::user::{LoginRequest, RegisterUserRequest, UserFilters, UserResponse};
use crate::models::{Page, PageOptions, RoleType, User, UserSettings};
use crate::services::AbstractService;
use crate::{AppError, Result};

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl AbstractService<User> for UserService {
    type Repository = dyn UserRepository;

    fn repository(&self) -> &Self::Repository {
        self.user_repo.as_ref()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_not_found() -> AppError {
    AppError::NotFound("user not found".to_string())
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Registers a `USER` with freshly created, unverified settings.
    pub async fn create_user(&self, request: RegisterUserRequest, auth_service: &AuthService) -> Result<UserResponse> {
        request.validate()?;
        let email = normalize_email(&request.email);

        if self.find_one(&[Predicate::eq("email", email.clone())]).await?.is_some() {
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }

        // Hash the password before storing
        let password_hash = auth_service.hash_password(&request.password)?;
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4(),
            first_name: Some(request.first_name.trim().to_string()),
            last_name: Some(request.last_name.trim().to_string()),
            role: RoleType::User,
            email: Some(email),
            password: Some(password_hash),
            phone: request.phone.filter(|phone| !phone.trim().is_empty()),
            avatar: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let settings = UserSettings::unverified(user.id);

        let created_user = self.user_repo.create_user(&user, &settings).await?;
        tracing::info!(user_id = %created_user.id, "User registered");

        Ok(UserResponse::from(created_user).with_settings(Some(settings)))
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse> {
        let user = self.find_one_or(&[Predicate::eq("id", user_id)], user_not_found()).await?;
        self.with_settings(user).await
    }

    pub async fn with_settings(&self, user: User) -> Result<UserResponse> {
        let settings = self.user_repo.get_settings(user.id).await?;
        Ok(UserResponse::from(user).with_settings(settings))
    }

    pub async fn get_users(&self, options: &PageOptions, filters: &UserFilters) -> Result<Page<UserResponse>> {
        // Stored emails are normalized on registration
        let filters = UserFilters {
            role: filters.role,
            email: filters.email.as_deref().map(normalize_email),
        };
        self.paginate(options, &filters, &[], &[], &[]).await
    }

    /// Checks the credentials and issues an access token. Unknown emails and
    /// wrong passwords are indistinguishable to the caller.
    pub async fn authenticate_user(
        &self,
        request: &LoginRequest,
        auth_service: &AuthService,
    ) -> Result<(UserResponse, TokenPayload)> {
        let email = normalize_email(&request.email);
        let user = self.find_one_or(&[Predicate::eq("email", email)], user_not_found()).await?;

        if !auth_service.verify_password(&request.password, user.password.as_deref()) {
            tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
            return Err(user_not_found());
        }

        let token = auth_service.generate_access_token(user.id, user.role)?;
        Ok((self.with_settings(user).await?, token))
    }
}
