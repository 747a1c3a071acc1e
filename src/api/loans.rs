//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, Loan, LoanQuery},
};

/// List loans, optionally filtered by user, status or copy
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "List of loans", body = Vec<Loan>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_loans(&query).await?;
    Ok(Json(loans))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Lend a book copy to a user
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book copy not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book copy already lent", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    Json(loan): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let created = state.services.loans.create_loan(loan).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
