//! Data models for the library loans server

pub mod book;
pub mod event;
pub mod loan;
pub mod notification;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookCopy, CopyStatus};
pub use event::{EventPayload, EventType, LoanEvent};
pub use loan::{Loan, LoanStatus};
pub use notification::{EmailMessage, NotificationContext};
pub use user::User;
