//! Books repository: catalog records and the availability counters.
//!
//! `available_copies` is only ever changed through `reserve`/`release`
//! (called inside the loan ledger's transactions) and through the inventory
//! correction. The database enforces `0 <= available_copies <= total_copies`.

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, school_id: i64, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND school_id = $2")
            .bind(id)
            .bind(school_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut conditions = vec!["school_id = $1".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(ref title) = query.title {
            params.push(format!("%{}%", title.to_lowercase()));
            conditions.push(format!("LOWER(title) LIKE ${}", params.len() + 1));
        }
        if let Some(ref author) = query.author {
            params.push(format!("%{}%", author.to_lowercase()));
            conditions.push(format!("LOWER(author) LIKE ${}", params.len() + 1));
        }
        if query.available_only.unwrap_or(false) {
            conditions.push("available_copies > 0".to_string());
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM books WHERE {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(query.school_id);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM books WHERE {} ORDER BY title, id LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query).bind(query.school_id);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Create a new book; all copies start available
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO books (school_id, title, author, isbn, category, total_copies, available_copies, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
            RETURNING id
            "#,
        )
        .bind(book.school_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(book.total_copies)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.get_by_id(book.school_id, id).await
    }

    /// Reserve one copy inside an ongoing transaction.
    ///
    /// The conditional update is the atomicity guarantee: of two concurrent
    /// reservations for the last copy, exactly one matches the
    /// `available_copies > 0` predicate.
    pub async fn reserve(
        tx: &mut Transaction<'_, Postgres>,
        school_id: i64,
        book_id: i64,
    ) -> AppResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND school_id = $2 AND available_copies > 0
            "#,
        )
        .bind(book_id)
        .bind(school_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows == 0 {
            // Distinguish a missing book from an exhausted one
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1 AND school_id = $2)")
                    .bind(book_id)
                    .bind(school_id)
                    .fetch_one(&mut **tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
            }
            return Err(AppError::NotAvailable(format!(
                "No copy of book {} is available",
                book_id
            )));
        }
        Ok(())
    }

    /// Release one copy inside an ongoing transaction, clamped to
    /// `total_copies` so a double release can never overshoot.
    pub async fn release(
        tx: &mut Transaction<'_, Postgres>,
        school_id: i64,
        book_id: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET available_copies = LEAST(available_copies + 1, total_copies), updated_at = NOW()
            WHERE id = $1 AND school_id = $2
            "#,
        )
        .bind(book_id)
        .bind(school_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Inventory correction: set the physical copy count (e.g. after a lost
    /// copy is written off). `available_copies` is clamped down when the
    /// total shrinks below it.
    pub async fn adjust_total_copies(
        &self,
        school_id: i64,
        book_id: i64,
        total_copies: i32,
    ) -> AppResult<Book> {
        let rows = sqlx::query(
            r#"
            UPDATE books
            SET total_copies = $3,
                available_copies = LEAST(available_copies, $3),
                updated_at = NOW()
            WHERE id = $1 AND school_id = $2
            "#,
        )
        .bind(book_id)
        .bind(school_id)
        .bind(total_copies)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }
        self.get_by_id(school_id, book_id).await
    }
}
