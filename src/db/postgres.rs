// PostgreSQL repository implementations using sqlx
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::query::{Comparison, Entity, Join, PageQuery, Predicate, Sort, Value};
use crate::db::repository::{EntityRepository, PostRepository, UserRepository};
use crate::models::{Post, User, UserSettings};
use crate::{AppError, Result};

// PostgreSQL connection pool wrapper
pub struct PostgresDatabase {
    pub pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub async fn connect(database_url: &str) -> Result<Self> {
        tracing::info!(max_connections = 20, "Configuring PostgreSQL connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(3600))
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to run migrations: {}", e)))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub fn user_repo(&self) -> PostgresUserRepository {
        PostgresRepository::new(self.pool.clone())
    }

    pub fn post_repo(&self) -> PostgresPostRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

/// Table access for one entity type; the entity's catalog drives the SQL.
pub struct PostgresRepository<E> {
    pool: Arc<PgPool>,
    _entity: PhantomData<fn() -> E>,
}

pub type PostgresUserRepository = PostgresRepository<User>;
pub type PostgresPostRepository = PostgresRepository<Post>;

impl<E> PostgresRepository<E> {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool, _entity: PhantomData }
    }
}

fn quoted(alias: &str, column: &str) -> String {
    format!("\"{}\".\"{}\"", alias, column)
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Uuid(v) => {
            qb.push_bind(*v);
        }
        Value::Text(v) => {
            qb.push_bind(v.clone());
        }
        Value::Bool(v) => {
            qb.push_bind(*v);
        }
        Value::Timestamp(v) => {
            qb.push_bind(*v);
        }
        Value::Enum { type_name, label } => {
            qb.push("CAST(").push_bind(label.clone()).push(" AS ").push(*type_name).push(")");
        }
    }
}

fn push_predicate(qb: &mut QueryBuilder<'static, Postgres>, table: &str, predicate: &Predicate) {
    let target = quoted(predicate.relation.unwrap_or(table), predicate.column);
    if predicate.value == Value::Null && predicate.comparison == Comparison::Eq {
        qb.push(target).push(" IS NULL");
        return;
    }
    qb.push(target).push(" ").push(predicate.comparison.as_sql()).push(" ");
    push_value(qb, &predicate.value);
}

fn push_from(qb: &mut QueryBuilder<'static, Postgres>, table: &str, joins: &[Join]) {
    qb.push(" FROM \"").push(table).push("\"");
    for join in joins {
        qb.push(format!(
            " LEFT JOIN \"{}\" AS \"{}\" ON {} = {} AND {} IS NULL",
            join.table,
            join.alias,
            quoted(join.alias, join.foreign_key),
            quoted(table, join.local_key),
            quoted(join.alias, "deleted_at"),
        ));
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn push_where<E: Entity>(qb: &mut QueryBuilder<'static, Postgres>, predicates: &[Predicate], search: Option<&str>) {
    qb.push(" WHERE ").push(quoted(E::TABLE, "deleted_at")).push(" IS NULL");

    for predicate in predicates {
        qb.push(" AND ");
        push_predicate(qb, E::TABLE, predicate);
    }

    if let Some(q) = search {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (");
        for (i, column) in E::SEARCH_COLUMNS.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(quoted(E::TABLE, column)).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }
}

fn push_order_by(qb: &mut QueryBuilder<'static, Postgres>, table: &str, sorting: &[Sort]) {
    for (i, sort) in sorting.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(quoted(table, sort.column)).push(" ").push(sort.order.as_sql());
    }
}

/// `SELECT <table>.* ...` for one page of `query`.
pub fn select_page<E: Entity>(query: &PageQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT \"{}\".*", E::TABLE));
    push_from(&mut qb, E::TABLE, &query.joins);
    push_where::<E>(&mut qb, &query.predicates, query.search.as_deref());
    push_order_by(&mut qb, E::TABLE, &query.sorting);
    qb.push(" LIMIT ").push_bind(i64::from(query.take));
    qb.push(" OFFSET ").push_bind(query.skip() as i64);
    qb
}

/// `SELECT COUNT(*) ...` over the whole filtered set of `query`.
pub fn count_matching<E: Entity>(query: &PageQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*)");
    push_from(&mut qb, E::TABLE, &query.joins);
    push_where::<E>(&mut qb, &query.predicates, query.search.as_deref());
    qb
}

fn own_columns(criteria: &[Predicate]) -> Result<()> {
    match criteria.iter().find(|p| p.relation.is_some()) {
        Some(p) => Err(AppError::InternalError(format!(
            "Lookup criteria cannot reference relation '{}'",
            p.relation.unwrap_or_default()
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl<E> EntityRepository<E> for PostgresRepository<E>
where
    E: Entity + for<'r> FromRow<'r, PgRow> + Unpin,
{
    async fn find_one(&self, criteria: &[Predicate]) -> Result<Option<E>> {
        own_columns(criteria)?;
        let mut qb = QueryBuilder::new(format!("SELECT \"{}\".*", E::TABLE));
        push_from(&mut qb, E::TABLE, &[]);
        push_where::<E>(&mut qb, criteria, None);
        qb.push(" LIMIT 1");

        let row = qb.build_query_as::<E>().fetch_optional(&*self.pool).await?;
        Ok(row)
    }

    async fn paginate(&self, query: &PageQuery) -> Result<(Vec<E>, u64)> {
        let rows = select_page::<E>(query)
            .build_query_as::<E>()
            .fetch_all(&*self.pool)
            .await?;
        let total: i64 = count_matching::<E>(query)
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await?;

        tracing::debug!(table = E::TABLE, total, returned = rows.len(), "Paginated query");
        Ok((rows, total.max(0) as u64))
    }

    async fn soft_delete(&self, criteria: &[Predicate]) -> Result<u64> {
        own_columns(criteria)?;
        let mut qb = QueryBuilder::new(format!("UPDATE \"{}\" SET \"deleted_at\" = NOW()", E::TABLE));
        push_where::<E>(&mut qb, criteria, None);

        let result = qb.build().execute(&*self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserRepository for PostgresRepository<User> {
    async fn create_user(&self, user: &User, settings: &UserSettings) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, first_name, last_name, role, email, password, phone, avatar, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.phone)
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO user_settings (id, user_id, is_email_verified, is_phone_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(settings.id)
        .bind(settings.user_id)
        .bind(settings.is_email_verified)
        .bind(settings.is_phone_verified)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>> {
        let settings = sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(settings)
    }
}

#[async_trait]
impl PostRepository for PostgresRepository<Post> {
    async fn create_post(&self, post: &Post) -> Result<Post> {
        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, user_id, title, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&*self.pool)
        .await?;
        Ok(created)
    }

    async fn update_post(&self, post: &Post) -> Result<Post> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = $2, description = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.description)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("post not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::SortKey;
    use crate::models::post::PostFilters;
    use crate::models::{Order, PageOptions, RoleType};

    #[test]
    fn test_select_page_sql() {
        let options = PageOptions {
            take: 5,
            page: 3,
            created_at_start: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        let filters = PostFilters { user_id: Some(Uuid::nil()), title: None };
        let sorting: Vec<SortKey> = vec![("title".to_string(), Order::Desc), ("created_at".to_string(), Order::Asc)];
        let query = PageQuery::compose::<Post, _>(
            &options,
            &filters,
            &[Post::AUTHOR],
            &[Predicate::related("user", "role", RoleType::Admin)],
            &sorting,
        )
        .unwrap();

        let qb = select_page::<Post>(&query);
        assert_eq!(
            qb.sql(),
            "SELECT \"posts\".* FROM \"posts\" \
             LEFT JOIN \"users\" AS \"user\" ON \"user\".\"id\" = \"posts\".\"user_id\" AND \"user\".\"deleted_at\" IS NULL \
             WHERE \"posts\".\"deleted_at\" IS NULL \
             AND \"posts\".\"created_at\" >= $1 \
             AND \"posts\".\"user_id\" = $2 \
             AND \"user\".\"role\" = CAST($3 AS role_type) \
             ORDER BY \"posts\".\"title\" DESC, \"posts\".\"created_at\" ASC \
             LIMIT $4 OFFSET $5"
        );
    }

    #[test]
    fn test_count_sql_with_search() {
        let options = PageOptions { q: Some("50%_off".to_string()), ..Default::default() };
        let query = PageQuery::compose::<Post, _>(&options, &(), &[], &[], &[]).unwrap();

        let qb = count_matching::<Post>(&query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM \"posts\" WHERE \"posts\".\"deleted_at\" IS NULL \
             AND (\"posts\".\"title\" ILIKE $1 OR \"posts\".\"description\" ILIKE $2)"
        );
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }

    #[test]
    fn test_null_equality_renders_is_null() {
        let mut qb = QueryBuilder::new("");
        push_predicate(&mut qb, "users", &Predicate::eq("phone", Value::Null));
        assert_eq!(qb.sql(), "\"users\".\"phone\" IS NULL");
    }

    #[test]
    fn test_lookup_criteria_reject_relations() {
        assert!(own_columns(&[Predicate::eq("id", Uuid::nil())]).is_ok());
        assert!(own_columns(&[Predicate::related("user", "role", RoleType::User)]).is_err());
    }
}
