//! Data joined at consumption time to build a loan notification email

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::event::EventType;

/// Point-in-time view of a loan, its borrower and the book title.
/// Re-read for every delivery, never carried inside an event.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationContext {
    pub loan_id: Uuid,
    pub email: String,
    pub book_title: String,
    pub expiring_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl NotificationContext {
    /// Render the plain-text email for an event kind
    pub fn render(&self, event_type: EventType) -> EmailMessage {
        let date = self.expiring_date.format("%Y-%m-%d");
        let (subject, body) = match event_type {
            EventType::LoanExpired => (
                "Loan Expired",
                format!(
                    "Your loan of the book {} expired on {}, please return the book to the library.",
                    self.book_title, date
                ),
            ),
            EventType::LoanExpiring => (
                "Loan Expiring",
                format!(
                    "Your loan of the book {} will expire on {}, please remember to return the book to the library until the expiration date.",
                    self.book_title, date
                ),
            ),
        };

        EmailMessage {
            to: vec![self.email.clone()],
            subject: subject.to_string(),
            body,
        }
    }
}
