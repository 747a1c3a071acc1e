//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Loans API",
        version = "1.0.0",
        description = "Users, books, copies and loans",
        license(name = "MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::get_user,
        users::create_user,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::list_copies,
        books::create_copy,
        books::get_copy,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::create_loan,
    ),
    components(
        schemas(
            crate::models::user::User,
            crate::models::user::CreateUser,
            crate::models::book::Book,
            crate::models::book::BookCopy,
            crate::models::book::CopyStatus,
            crate::models::book::CreateBook,
            crate::models::book::CreateBookCopy,
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::CreateLoan,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User management"),
        (name = "books", description = "Books and their copies"),
        (name = "loans", description = "Loan management")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
