//! Book and copy endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book::{Book, BookCopy, BookQuery, CreateBook, CreateBookCopy},
};

/// List books, optionally filtered
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "List of books", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.search_books(&query).await?;
    Ok(Json(books))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List copies of a book
#[utoipa::path(
    get,
    path = "/books/{id}/copies",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Copies of the book", body = Vec<BookCopy>),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_copies(
    State(state): State<crate::AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Vec<BookCopy>>> {
    let copies = state.services.catalog.list_copies(book_id).await?;
    Ok(Json(copies))
}

/// Add a copy to a book
#[utoipa::path(
    post,
    path = "/books/{id}/copies",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = CreateBookCopy,
    responses(
        (status = 201, description = "Copy created", body = BookCopy),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_copy(
    State(state): State<crate::AppState>,
    Path(book_id): Path<Uuid>,
    Json(copy): Json<CreateBookCopy>,
) -> AppResult<(StatusCode, Json<BookCopy>)> {
    let created = state.services.catalog.create_copy(book_id, copy).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a copy by ID
#[utoipa::path(
    get,
    path = "/copies/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy details", body = BookCopy),
        (status = 404, description = "Copy not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_copy(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookCopy>> {
    let copy = state.services.catalog.get_copy(id).await?;
    Ok(Json(copy))
}
