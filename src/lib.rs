// Library modules for the post board API
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, Result};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: db::DatabaseClient,
    pub auth_service: Arc<auth::AuthService>,
    pub user_service: Arc<services::UserService>,
    pub post_service: Arc<services::PostService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = db::DatabaseClient::new(&config).await?;
        Ok(Self::with_database(config, db))
    }

    /// Wires the services on top of an already opened database.
    pub fn with_database(config: AppConfig, db: db::DatabaseClient) -> Self {
        let auth_service = Arc::new(auth::AuthService::new(&config.jwt_secret, config.jwt_expiration_secs));
        let user_service = Arc::new(services::UserService::new(db.user_repo.clone()));
        let post_service = Arc::new(services::PostService::new(db.post_repo.clone()));

        Self {
            config,
            db,
            auth_service,
            user_service,
            post_service,
        }
    }
}
