pub mod abstract_service;
pub mod post_service;
pub mod user_service;

// Re-export services for convenience
pub use abstract_service::AbstractService;
pub use post_service::PostService;
pub use user_service::UserService;
