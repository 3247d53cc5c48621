pub mod page;
pub mod post;
pub mod role;
pub mod settings;
pub mod user;

// Re-export models for convenience
pub use page::{Order, Page, PageMeta, PageOptions};
pub use post::Post;
pub use role::RoleType;
pub use settings::UserSettings;
pub use user::User;
