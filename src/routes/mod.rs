pub mod api;
pub mod auth;
pub mod extract;
pub mod posts;
pub mod users;

use axum::Router;
use crate::AppState;

pub fn create_routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api::routes(app_state.clone()))
        .with_state(app_state)
}
