//! Capabilities the expiry pipeline depends on
//!
//! The scanner and notifier only see these traits. Production wiring uses
//! the PostgreSQL repository, the Redis Streams channel and the SMTP mailer;
//! tests substitute in-memory fakes or mocks.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::{
    error::AppResult,
    models::{
        event::LoanEvent,
        loan::{CreateLoan, Loan},
        notification::{EmailMessage, NotificationContext},
    },
};

/// Read access to loans for the pipeline
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LoanReader: Send + Sync {
    /// Open loans whose expiring day falls within `[from, to]`, both inclusive
    async fn find_expiring(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Loan>>;

    /// Current loan, borrower email and book title, `None` if the loan is gone
    async fn notification_context(&self, loan_id: Uuid) -> AppResult<Option<NotificationContext>>;
}

/// Transactional loan creation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LoanWriter: Send + Sync {
    /// Lend a copy: fails with `NotFound` for an unknown copy or user,
    /// `Conflict` when the copy is already lent, `Database` otherwise.
    async fn create_loan(&self, loan: &CreateLoan) -> AppResult<Loan>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &LoanEvent) -> AppResult<()>;
}

/// A message handed out by the channel, unacknowledged until `ack`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-assigned id, used to acknowledge
    pub id: String,
    /// Raw payload, `None` when the channel no longer holds the message body
    pub body: Option<Vec<u8>>,
}

/// At-least-once consumer side of the event channel
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Wait for the next batch; may return an empty batch when the wait
    /// times out. Unacknowledged deliveries are handed out again later.
    ///
    /// Not cancel safe: a receive dropped before it completes may already
    /// have claimed entries, which then only come back through redelivery.
    /// Callers keep polling the same future until it resolves.
    async fn receive(&self) -> AppResult<Vec<Delivery>>;

    async fn ack(&self, delivery_id: &str) -> AppResult<()>;
}

/// Outbound email transport
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}
