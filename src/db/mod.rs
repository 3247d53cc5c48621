pub mod postgres;
pub mod query;
pub mod repository;

// Database connection and state management
use std::sync::Arc;

use crate::config::AppConfig;
use crate::utils::database_retry::{with_database_retry, RetryPolicy};
use crate::Result;
use postgres::PostgresDatabase;
use repository::{MemoryStore, MockPostRepository, MockUserRepository, PostRepository, UserRepository};

#[derive(Clone)]
pub struct DatabaseClient {
    pub user_repo: Arc<dyn UserRepository>,
    pub post_repo: Arc<dyn PostRepository>,
    pub backend: Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    InMemory,
}

impl DatabaseClient {
    /// Connects to PostgreSQL when `DATABASE_URL` is set, otherwise falls
    /// back to the in-memory store.
    pub async fn new(config: &AppConfig) -> Result<Self> {
        match &config.database_url {
            Some(url) => {
                let database = with_database_retry(RetryPolicy::default(), || PostgresDatabase::connect(url)).await?;
                database.run_migrations().await?;
                tracing::info!("Using PostgreSQL storage");

                Ok(Self {
                    user_repo: Arc::new(database.user_repo()),
                    post_repo: Arc::new(database.post_repo()),
                    backend: Backend::Postgres,
                })
            }
            None => {
                tracing::warn!("DATABASE_URL not set, data is kept in memory and lost on restart");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            user_repo: Arc::new(MockUserRepository::new(store.clone())),
            post_repo: Arc::new(MockPostRepository::new(store)),
            backend: Backend::InMemory,
        }
    }
}
