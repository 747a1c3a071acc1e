//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod users;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{config::DatabaseConfig, error::AppResult};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }

    /// Open a pool and check connectivity
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Round trip to the database, used by readiness checks
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQLSTATE for foreign key violations
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE for unique constraint violations
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE carried by a database error, if any
pub(crate) fn sql_state(error: &sqlx::Error) -> Option<String> {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .map(|code| code.into_owned())
}
