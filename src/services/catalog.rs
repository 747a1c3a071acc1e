//! Catalog service: books and their physical copies

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{Book, BookCopy, BookQuery, CreateBook, CreateBookCopy},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books by title, author or ISBN
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.list(query).await
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = %created.id, "Created book");
        Ok(created)
    }

    pub async fn get_copy(&self, id: Uuid) -> AppResult<BookCopy> {
        self.repository.books.get_copy(id).await
    }

    /// Copies of a book, 404 if the book does not exist
    pub async fn list_copies(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        self.repository.books.get_by_id(book_id).await?;
        self.repository.books.list_copies(book_id).await
    }

    /// Add a copy to a book; new copies start out available
    pub async fn create_copy(&self, book_id: Uuid, copy: CreateBookCopy) -> AppResult<BookCopy> {
        copy.validate()?;
        let created = self.repository.books.create_copy(book_id, &copy).await?;
        tracing::info!(book_id = %book_id, copy_id = %created.id, "Created book copy");
        Ok(created)
    }
}
