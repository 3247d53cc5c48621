use axum::{extract::State, response::Json as ResponseJson};
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::auth::TokenPayload;
use crate::models::user::{LoginRequest, RegisterUserRequest, UserResponse};
use crate::routes::extract::ValidJson;
use crate::{AppState, Result};

#[derive(Serialize)]
pub struct LoginPayload {
    pub user: UserResponse,
    pub token: TokenPayload,
}

pub async fn register(
    State(app_state): State<AppState>,
    ValidJson(request): ValidJson<RegisterUserRequest>,
) -> Result<ResponseJson<UserResponse>> {
    let user = app_state.user_service.create_user(request, &app_state.auth_service).await?;
    Ok(ResponseJson(user))
}

pub async fn login(
    State(app_state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<ResponseJson<LoginPayload>> {
    let (user, token) = app_state
        .user_service
        .authenticate_user(&request, &app_state.auth_service)
        .await?;

    Ok(ResponseJson(LoginPayload { user, token }))
}

pub async fn me(
    State(app_state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ResponseJson<UserResponse>> {
    Ok(ResponseJson(app_state.user_service.with_settings(user).await?))
}
