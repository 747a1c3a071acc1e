//! Loan (borrow) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Stored loan status. Whether a loan is expiring or expired is derived
/// from `expiring_date` and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_copy_id: Uuid,
    pub status: LoanStatus,
    pub loan_date: DateTime<Utc>,
    pub expiring_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Calendar day (UTC) the loan is due
    pub fn expiring_day(&self) -> NaiveDate {
        self.expiring_date.date_naive()
    }

    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_loan_dates"))]
pub struct CreateLoan {
    pub user_id: Uuid,
    pub book_copy_id: Uuid,
    /// Defaults to the time of the request
    pub loan_date: Option<DateTime<Utc>>,
    pub expiring_date: DateTime<Utc>,
}

fn validate_loan_dates(loan: &CreateLoan) -> Result<(), ValidationError> {
    let start = loan.loan_date.unwrap_or_else(Utc::now);
    if loan.expiring_date <= start {
        let mut error = ValidationError::new("expiring_date");
        error.message = Some("Expiring date must be after the loan date".into());
        return Err(error);
    }
    Ok(())
}

/// Query parameters for loans
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub book_copy_id: Option<Uuid>,
}
