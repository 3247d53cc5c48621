use axum::{extract::State, response::Json as ResponseJson};
use uuid::Uuid;

use crate::models::user::{UserFilters, UserResponse};
use crate::models::{Page, PageOptions};
use crate::routes::extract::{ValidPath, ValidQuery};
use crate::{AppState, Result};

pub async fn get_users(
    State(app_state): State<AppState>,
    ValidQuery(options): ValidQuery<PageOptions>,
    ValidQuery(filters): ValidQuery<UserFilters>,
) -> Result<ResponseJson<Page<UserResponse>>> {
    let page = app_state.user_service.get_users(&options, &filters).await?;
    Ok(ResponseJson(page))
}

pub async fn get_user(
    State(app_state): State<AppState>,
    ValidPath(user_id): ValidPath<Uuid>,
) -> Result<ResponseJson<UserResponse>> {
    Ok(ResponseJson(app_state.user_service.get_user(user_id).await?))
}
