// Authentication and role guards for protected routes
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::db::query::Predicate;
use crate::models::{RoleType, User};
use crate::services::AbstractService;
use crate::{AppError, AppState, Result};

/// The user behind a verified access token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // Set by auth_middleware
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::AuthError("Missing authorization header".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::AuthError("Invalid authorization header format".to_string()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::AuthError("Authorization header must start with 'Bearer '".to_string()))
}

/// Verifies the bearer token and loads its user.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    // Only ACCESS_TOKEN claims decode
    let claims = app_state.auth_service.verify_token(token)?;

    let user = app_state
        .user_service
        .find_one(&[Predicate::eq("id", claims.user_id), Predicate::eq("role", claims.role)])
        .await?
        .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;

    tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");
    request.extensions_mut().insert(AuthUser(user));

    Ok(next.run(request).await)
}

/// An empty role list admits any authenticated user.
pub fn check_roles(user: &User, roles: &[RoleType]) -> Result<()> {
    if roles.is_empty() || roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Insufficient role".to_string()))
    }
}

async fn require_roles(roles: &[RoleType], request: Request, next: Next) -> std::result::Result<Response, AppError> {
    let AuthUser(user) = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;
    check_roles(user, roles)?;

    Ok(next.run(request).await)
}

/// Role guard for routes restricted to `USER`; layer it inside `auth_middleware`.
pub async fn require_user_role(request: Request, next: Next) -> std::result::Result<Response, AppError> {
    require_roles(&[RoleType::User], request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: RoleType) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            first_name: None,
            last_name: None,
            role,
            email: None,
            password: None,
            phone: None,
            avatar: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_check_roles() {
        assert!(check_roles(&user(RoleType::Admin), &[]).is_ok());
        assert!(check_roles(&user(RoleType::User), &[RoleType::User]).is_ok());
        let err = check_roles(&user(RoleType::Admin), &[RoleType::User]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }
}
