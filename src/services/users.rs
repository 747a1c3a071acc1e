//! User management service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{CreateUser, User},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Register a borrower, rejecting duplicate emails
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;
        let created = self.repository.users.create(&user).await?;
        tracing::info!(user_id = %created.id, "Created user");
        Ok(created)
    }
}
