//! Loan management service

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, Loan, LoanQuery},
    ports::LoanWriter,
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    writer: Arc<dyn LoanWriter>,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        let writer = Arc::new(repository.loans.clone());
        Self::with_writer(repository, writer)
    }

    /// Use a different loan writer, e.g. a mock in tests
    pub fn with_writer(repository: Repository, writer: Arc<dyn LoanWriter>) -> Self {
        Self { repository, writer }
    }

    pub async fn get_loan(&self, id: Uuid) -> AppResult<Loan> {
        self.repository.loans.get_by_id(id).await
    }

    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        self.repository.loans.list(query).await
    }

    /// Lend a copy to a user. The copy is marked lent and the loan recorded
    /// atomically; a copy that is already lent yields a conflict.
    pub async fn create_loan(&self, loan: CreateLoan) -> AppResult<Loan> {
        loan.validate()?;
        self.writer.create_loan(&loan).await
    }
}
