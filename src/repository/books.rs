//! Books and copies repository

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookCopy, BookQuery, CopyStatus, CreateBook, CreateBookCopy},
};

use super::{sql_state, FOREIGN_KEY_VIOLATION};

const BOOK_COLUMNS: &str = "id, title, description, isbn, author, number_of_pages, created_at";
const COPY_COLUMNS: &str = "id, book_id, status, location, condition, created_at";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        let query = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List books with optional filters
    pub async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.title.is_some() {
            conditions.push(format!("title ILIKE ${}", idx));
            idx += 1;
        }
        if query.author.is_some() {
            conditions.push(format!("author ILIKE ${}", idx));
            idx += 1;
        }
        if query.isbn.is_some() {
            conditions.push(format!("isbn = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let select_q = format!(
            "SELECT {} FROM books {} ORDER BY title",
            BOOK_COLUMNS, where_clause
        );
        let mut builder = sqlx::query_as::<_, Book>(&select_q);
        if let Some(ref title) = query.title {
            builder = builder.bind(format!("%{}%", title));
        }
        if let Some(ref author) = query.author {
            builder = builder.bind(format!("%{}%", author));
        }
        if let Some(ref isbn) = query.isbn {
            builder = builder.bind(isbn);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Create a book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let query = format!(
            r#"
            INSERT INTO books (id, title, description, isbn, author, number_of_pages)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        );

        let row = sqlx::query_as::<_, Book>(&query)
            .bind(Uuid::new_v4())
            .bind(&book.title)
            .bind(&book.description)
            .bind(&book.isbn)
            .bind(&book.author)
            .bind(book.number_of_pages)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Get a copy by ID
    pub async fn get_copy(&self, id: Uuid) -> AppResult<BookCopy> {
        let query = format!("SELECT {} FROM book_copies WHERE id = $1", COPY_COLUMNS);
        sqlx::query_as::<_, BookCopy>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", id)))
    }

    /// List the copies of a book
    pub async fn list_copies(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        let query = format!(
            "SELECT {} FROM book_copies WHERE book_id = $1 ORDER BY created_at",
            COPY_COLUMNS
        );
        Ok(sqlx::query_as::<_, BookCopy>(&query)
            .bind(book_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Register a new copy, initially available
    pub async fn create_copy(&self, book_id: Uuid, copy: &CreateBookCopy) -> AppResult<BookCopy> {
        let query = format!(
            r#"
            INSERT INTO book_copies (id, book_id, status, location, condition)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            COPY_COLUMNS
        );

        sqlx::query_as::<_, BookCopy>(&query)
            .bind(Uuid::new_v4())
            .bind(book_id)
            .bind(CopyStatus::Available)
            .bind(&copy.location)
            .bind(&copy.condition)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match sql_state(&e).as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => {
                    AppError::NotFound(format!("Book with id {} not found", book_id))
                }
                _ => AppError::Database(e),
            })
    }
}
