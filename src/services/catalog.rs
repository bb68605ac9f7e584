//! Catalog service

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook},
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

    pub async fn get_book(&self, school_id: i64, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(school_id, id).await
    }

    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        self.repository.books.create(&book).await
    }

    /// Inventory correction after a write-off or an acquisition
    pub async fn adjust_copies(
        &self,
        school_id: i64,
        book_id: i64,
        total_copies: i32,
    ) -> AppResult<Book> {
        self.repository
            .books
            .adjust_total_copies(school_id, book_id, total_copies)
            .await
    }
}
