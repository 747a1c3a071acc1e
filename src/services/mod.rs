//! Business logic services

pub mod catalog;
pub mod channel;
pub mod email;
pub mod loans;
pub mod notifier;
pub mod scanner;
pub mod users;

use crate::repository::Repository;

/// Container for the services behind the REST API
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        Self {
            users: users::UsersService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            repository,
        }
    }

    /// Check the database is reachable
    pub async fn ready(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
