use std::sync::Arc;

use uuid::Uuid;

use crate::db::query::{parse_sort, Predicate};
use crate::db::repository::PostRepository;
use crate::models::post::{CreatePostRequest, PostFilters, PostListParams, PostResponse, UpdatePostRequest};
use crate::models::{Page, PageOptions, Post, RoleType, User};
use crate::services::AbstractService;
use crate::{AppError, Result};

pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
}

impl AbstractService<Post> for PostService {
    type Repository = dyn PostRepository;

    fn repository(&self) -> &Self::Repository {
        self.post_repo.as_ref()
    }
}

fn post_not_found() -> AppError {
    AppError::NotFound("post not found".to_string())
}

/// Only the author or an admin may change a post.
fn ensure_can_modify(post: &Post, actor: &User) -> Result<()> {
    if post.user_id == actor.id || actor.role == RoleType::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the author can modify this post".to_string()))
    }
}

impl PostService {
    pub fn new(post_repo: Arc<dyn PostRepository>) -> Self {
        Self { post_repo }
    }

    pub async fn create_post(&self, author_id: Uuid, request: CreatePostRequest) -> Result<PostResponse> {
        request.validate()?;

        let post = self.post_repo.create_post(&Post::new(author_id, request)).await?;
        tracing::info!(post_id = %post.id, user_id = %author_id, "Post created");

        Ok(PostResponse::from(post))
    }

    async fn find_post(&self, post_id: Uuid) -> Result<Post> {
        self.find_one_or(&[Predicate::eq("id", post_id)], post_not_found()).await
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<PostResponse> {
        self.find_post(post_id).await.map(PostResponse::from)
    }

    pub async fn get_posts(
        &self,
        options: &PageOptions,
        filters: &PostFilters,
        params: &PostListParams,
    ) -> Result<Page<PostResponse>> {
        let sorting = match params.sort.as_deref() {
            Some(raw) => parse_sort(raw)?,
            None => Vec::new(),
        };

        // The author is only joined when something filters on it
        let (joins, relation_filters) = match params.author_role {
            Some(role) => (
                vec![Post::AUTHOR],
                vec![Predicate::related(Post::AUTHOR.alias, "role", role)],
            ),
            None => (Vec::new(), Vec::new()),
        };

        self.paginate(options, filters, &joins, &relation_filters, &sorting).await
    }

    pub async fn update_post(&self, post_id: Uuid, request: UpdatePostRequest, actor: &User) -> Result<PostResponse> {
        request.validate()?;

        let mut post = self.find_post(post_id).await?;
        ensure_can_modify(&post, actor)?;
        post.merge(request);

        let updated = self.post_repo.update_post(&post).await?;
        tracing::info!(post_id = %updated.id, "Post updated");

        Ok(PostResponse::from(updated))
    }

    pub async fn delete_post(&self, post_id: Uuid, actor: &User) -> Result<()> {
        let post = self.find_post(post_id).await?;
        ensure_can_modify(&post, actor)?;

        if !self.delete(&[Predicate::eq("id", post.id)]).await? {
            return Err(post_not_found());
        }
        tracing::info!(post_id = %post.id, "Post deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::db::repository::{MemoryStore, MockPostRepository, MockUserRepository};
    use crate::models::user::RegisterUserRequest;
    use crate::models::Order;
    use crate::services::UserService;

    struct Fixture {
        posts: PostService,
        users: UserService,
        auth: AuthService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        Fixture {
            posts: PostService::new(Arc::new(MockPostRepository::new(store.clone()))),
            users: UserService::new(Arc::new(MockUserRepository::new(store))),
            auth: AuthService::new("test-secret", 3600),
        }
    }

    async fn author(fx: &Fixture, email: &str) -> User {
        let request = RegisterUserRequest {
            first_name: "Post".to_string(),
            last_name: "Author".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            phone: None,
        };
        let created = fx.users.create_user(request, &fx.auth).await.unwrap();
        fx.users.find_one(&[Predicate::eq("id", created.id)]).await.unwrap().unwrap()
    }

    fn new_post(title: &str) -> CreatePostRequest {
        CreatePostRequest { title: title.to_string(), description: format!("About {}", title) }
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let fx = fixture();
        let ada = author(&fx, "ada@example.com").await;

        let created = fx.posts.create_post(ada.id, new_post("First")).await.unwrap();
        assert_eq!(created.user_id, ada.id);

        let fetched = fx.posts.get_post(created.id).await.unwrap();
        assert_eq!(fetched.title, "First");
        assert!(matches!(fx.posts.get_post(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_posts_pages_and_filters() {
        let fx = fixture();
        let ada = author(&fx, "ada@example.com").await;
        let bob = author(&fx, "bob@example.com").await;
        for title in ["a", "b", "c"] {
            fx.posts.create_post(ada.id, new_post(title)).await.unwrap();
        }
        fx.posts.create_post(bob.id, new_post("d")).await.unwrap();

        let options = PageOptions { take: 2, ..PageOptions::default() };
        let page = fx.posts.get_posts(&options, &PostFilters::default(), &PostListParams::default()).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.meta.item_count, 4);
        assert_eq!(page.meta.page_count, 2);
        assert!(page.meta.has_next_page);

        let filters = PostFilters { user_id: Some(bob.id), title: None };
        let page = fx.posts.get_posts(&PageOptions::default(), &filters, &PostListParams::default()).await.unwrap();
        assert_eq!(page.meta.item_count, 1);
        assert_eq!(page.data[0].title, "d");

        let params = PostListParams { author_role: None, sort: Some("title:desc".to_string()) };
        let options = PageOptions { order: Order::Asc, ..PageOptions::default() };
        let page = fx.posts.get_posts(&options, &PostFilters::default(), &params).await.unwrap();
        let titles: Vec<_> = page.data.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_get_posts_by_author_role() {
        let fx = fixture();
        let ada = author(&fx, "ada@example.com").await;
        fx.posts.create_post(ada.id, new_post("a")).await.unwrap();

        let users = PostListParams { author_role: Some(RoleType::User), sort: None };
        let page = fx.posts.get_posts(&PageOptions::default(), &PostFilters::default(), &users).await.unwrap();
        assert_eq!(page.meta.item_count, 1);

        let admins = PostListParams { author_role: Some(RoleType::Admin), sort: None };
        let page = fx.posts.get_posts(&PageOptions::default(), &PostFilters::default(), &admins).await.unwrap();
        assert_eq!(page.meta.item_count, 0);
    }

    #[tokio::test]
    async fn test_only_author_or_admin_can_modify() {
        let fx = fixture();
        let ada = author(&fx, "ada@example.com").await;
        let bob = author(&fx, "bob@example.com").await;
        let post = fx.posts.create_post(ada.id, new_post("mine")).await.unwrap();

        let update = || UpdatePostRequest { title: Some("edited".to_string()), description: None };
        assert!(matches!(
            fx.posts.update_post(post.id, update(), &bob).await,
            Err(AppError::Forbidden(_))
        ));

        let admin = User { role: RoleType::Admin, ..bob.clone() };
        let updated = fx.posts.update_post(post.id, update(), &admin).await.unwrap();
        assert_eq!(updated.title, "edited");
        assert_eq!(updated.description, "About mine");

        assert!(matches!(fx.posts.delete_post(post.id, &bob).await, Err(AppError::Forbidden(_))));
        fx.posts.delete_post(post.id, &ada).await.unwrap();
        assert!(matches!(fx.posts.get_post(post.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(fx.posts.delete_post(post.id, &ada).await, Err(AppError::NotFound(_))));
    }
}
