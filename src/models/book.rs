//! Book and physical copy models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Availability of a physical copy
///
/// `Lent` implies exactly one active loan references the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "copy_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Available,
    Lent,
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CopyStatus::Available => "available",
            CopyStatus::Lent => "lent",
        };
        write!(f, "{}", label)
    }
}

/// Book (catalog entry)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub isbn: String,
    pub author: String,
    pub number_of_pages: i32,
    pub created_at: DateTime<Utc>,
}

/// Physical, individually trackable copy of a book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookCopy {
    pub id: Uuid,
    pub book_id: Uuid,
    pub status: CopyStatus,
    /// Shelf or branch where the copy is kept
    pub location: String,
    pub condition: String,
    pub created_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 10, max = 17, message = "ISBN must have 10 to 17 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Author must not be empty"))]
    pub author: String,
    #[validate(range(min = 1, message = "Number of pages must be positive"))]
    pub number_of_pages: i32,
}

/// Create copy request, new copies always start `available`
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookCopy {
    #[validate(length(min = 1, message = "Location must not be empty"))]
    pub location: String,
    #[validate(length(min = 1, message = "Condition must not be empty"))]
    pub condition: String,
}

/// Query parameters for books
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Exact ISBN
    pub isbn: Option<String>,
}
