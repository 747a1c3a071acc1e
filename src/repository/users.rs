//! Users repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, User},
};

use super::{sql_state, UNIQUE_VIOLATION};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Create a user
    pub async fn create(&self, user: &CreateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match sql_state(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => {
                AppError::Conflict(format!("Email {} is already registered", user.email))
            }
            _ => AppError::Database(e),
        })
    }
}
