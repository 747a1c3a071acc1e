//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::CopyStatus,
        loan::{CreateLoan, Loan, LoanQuery, LoanStatus},
        notification::NotificationContext,
    },
    ports::{LoanReader, LoanWriter},
};

use super::{sql_state, FOREIGN_KEY_VIOLATION};

const LOAN_COLUMNS: &str =
    "id, user_id, book_copy_id, status, loan_date, expiring_date, return_date, created_at";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        let query = format!("SELECT {} FROM loans WHERE id = $1", LOAN_COLUMNS);
        sqlx::query_as::<_, Loan>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// List loans with optional filters
    pub async fn list(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.user_id.is_some() {
            conditions.push(format!("user_id = ${}", idx));
            idx += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if query.book_copy_id.is_some() {
            conditions.push(format!("book_copy_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let select_q = format!(
            "SELECT {} FROM loans {} ORDER BY loan_date DESC",
            LOAN_COLUMNS, where_clause
        );
        let mut builder = sqlx::query_as::<_, Loan>(&select_q);
        if let Some(user_id) = query.user_id {
            builder = builder.bind(user_id);
        }
        if let Some(status) = query.status {
            builder = builder.bind(status);
        }
        if let Some(copy_id) = query.book_copy_id {
            builder = builder.bind(copy_id);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Create a loan, lending the copy in the same transaction.
    ///
    /// The copy row is locked with `FOR UPDATE`, so concurrent calls for the
    /// same copy are serialized and only the first one sees it available.
    pub async fn create(&self, loan: &CreateLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        match Self::lend_copy(&mut tx, loan).await {
            Ok(created) => {
                tx.commit().await?;
                tracing::info!(
                    loan_id = %created.id,
                    copy_id = %created.book_copy_id,
                    "Loan created"
                );
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(copy_id = %loan.book_copy_id, "Loan transaction failed: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        copy_id = %loan.book_copy_id,
                        "Rollback failed: {}",
                        rollback_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn lend_copy(tx: &mut Transaction<'_, Postgres>, loan: &CreateLoan) -> AppResult<Loan> {
        let status = sqlx::query_scalar::<_, CopyStatus>(
            "SELECT status FROM book_copies WHERE id = $1 FOR UPDATE",
        )
        .bind(loan.book_copy_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", loan.book_copy_id)))?;

        if status != CopyStatus::Available {
            return Err(AppError::Conflict(format!(
                "Copy {} is not available ({})",
                loan.book_copy_id, status
            )));
        }

        sqlx::query("UPDATE book_copies SET status = $1 WHERE id = $2")
            .bind(CopyStatus::Lent)
            .bind(loan.book_copy_id)
            .execute(&mut **tx)
            .await?;

        let query = format!(
            r#"
            INSERT INTO loans (id, user_id, book_copy_id, status, loan_date, expiring_date, return_date)
            VALUES ($1, $2, $3, $4, $5, $6, NULL)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        );

        sqlx::query_as::<_, Loan>(&query)
            .bind(Uuid::new_v4())
            .bind(loan.user_id)
            .bind(loan.book_copy_id)
            .bind(LoanStatus::Active)
            .bind(loan.loan_date.unwrap_or_else(Utc::now))
            .bind(loan.expiring_date)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| match sql_state(&e).as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => {
                    AppError::NotFound(format!("User with id {} not found", loan.user_id))
                }
                _ => AppError::Database(e),
            })
    }

    /// Open loans whose expiring day (UTC) is within `[from, to]`
    pub async fn find_expiring(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Loan>> {
        let query = format!(
            r#"
            SELECT {}
            FROM loans
            WHERE return_date IS NULL
              AND (expiring_date AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2
            ORDER BY expiring_date
            "#,
            LOAN_COLUMNS
        );

        Ok(sqlx::query_as::<_, Loan>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Join loan, borrower and book for a notification
    pub async fn notification_context(&self, loan_id: Uuid) -> AppResult<Option<NotificationContext>> {
        let context = sqlx::query_as::<_, NotificationContext>(
            r#"
            SELECT l.id AS loan_id, u.email, b.title AS book_title,
                   l.expiring_date, l.return_date
            FROM loans l
            INNER JOIN users u ON l.user_id = u.id
            INNER JOIN book_copies c ON c.id = l.book_copy_id
            INNER JOIN books b ON b.id = c.book_id
            WHERE l.id = $1
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(context)
    }
}

#[async_trait]
impl LoanReader for LoansRepository {
    async fn find_expiring(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Loan>> {
        LoansRepository::find_expiring(self, from, to).await
    }

    async fn notification_context(&self, loan_id: Uuid) -> AppResult<Option<NotificationContext>> {
        LoansRepository::notification_context(self, loan_id).await
    }
}

#[async_trait]
impl LoanWriter for LoansRepository {
    async fn create_loan(&self, loan: &CreateLoan) -> AppResult<Loan> {
        self.create(loan).await
    }
}
