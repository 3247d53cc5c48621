use axum::{
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::models::post::{CreatePostRequest, PostFilters, PostListParams, PostResponse, UpdatePostRequest};
use crate::models::{Page, PageOptions};
use crate::routes::extract::{ValidJson, ValidPath, ValidQuery};
use crate::{AppState, Result};

pub async fn create_post(
    State(app_state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(request): ValidJson<CreatePostRequest>,
) -> Result<(StatusCode, ResponseJson<PostResponse>)> {
    let post = app_state.post_service.create_post(user.id, request).await?;
    Ok((StatusCode::CREATED, ResponseJson(post)))
}

pub async fn get_posts(
    State(app_state): State<AppState>,
    ValidQuery(options): ValidQuery<PageOptions>,
    ValidQuery(filters): ValidQuery<PostFilters>,
    ValidQuery(params): ValidQuery<PostListParams>,
) -> Result<ResponseJson<Page<PostResponse>>> {
    let page = app_state.post_service.get_posts(&options, &filters, &params).await?;
    Ok(ResponseJson(page))
}

pub async fn get_post(
    State(app_state): State<AppState>,
    ValidPath(post_id): ValidPath<Uuid>,
) -> Result<ResponseJson<PostResponse>> {
    Ok(ResponseJson(app_state.post_service.get_post(post_id).await?))
}

pub async fn update_post(
    State(app_state): State<AppState>,
    ValidPath(post_id): ValidPath<Uuid>,
    AuthUser(user): AuthUser,
    ValidJson(request): ValidJson<UpdatePostRequest>,
) -> Result<(StatusCode, ResponseJson<PostResponse>)> {
    let post = app_state.post_service.update_post(post_id, request, &user).await?;
    Ok((StatusCode::ACCEPTED, ResponseJson(post)))
}

pub async fn delete_post(
    State(app_state): State<AppState>,
    ValidPath(post_id): ValidPath<Uuid>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode> {
    app_state.post_service.delete_post(post_id, &user).await?;
    Ok(StatusCode::ACCEPTED)
}
