use axum::{middleware, routing::{get, post}, Json, Router};
use serde_json::{json, Value};

use crate::auth::middleware::{auth_middleware, require_user_role};
use crate::routes::{auth, posts, users};
use crate::AppState;

pub fn routes(app_state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/health", get(api_health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    // Any authenticated role
    let authenticated_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/posts/:post_id",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route_layer(middleware::from_fn_with_state(app_state.clone(), auth_middleware));

    // Layers run outside in, so the role check sees the authenticated user
    let user_routes = Router::new()
        .route("/users", get(users::get_users))
        .route("/users/:user_id", get(users::get_user))
        .route("/posts", get(posts::get_posts).post(posts::create_post))
        .route_layer(middleware::from_fn(require_user_role))
        .route_layer(middleware::from_fn_with_state(app_state, auth_middleware));

    public_routes.merge(authenticated_routes).merge(user_routes)
}

async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "post_board_api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
