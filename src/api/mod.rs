//! API handlers for the library loans REST endpoints

pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Users
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        // Books and copies
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book))
        .route(
            "/books/:id/copies",
            get(books::list_copies).post(books::create_copy),
        )
        .route("/copies/:id", get(books::get_copy))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/:id", get(loans::get_loan))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
