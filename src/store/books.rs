use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::extract::Page;

time::serde::format_description!(date_fmt, Date, "[year]-[month]-[day]");

/// A book on the shelf. Every row belongs to exactly one user and all reads
/// and writes are scoped to that owner.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
    pub status: String,
    pub rating: i16,
    pub notes: Option<String>,
    #[serde(with = "date_fmt")]
    pub date_added: Date,
    #[serde(with = "date_fmt::option")]
    pub date_started: Option<Date>,
    #[serde(with = "date_fmt::option")]
    pub date_finished: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for a new shelf entry.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
    pub status: String,
    pub rating: i16,
    pub notes: Option<String>,
    pub date_added: Date,
    pub date_started: Option<Date>,
    pub date_finished: Option<Date>,
}

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn create(&self, user_id: Uuid, new: NewBook) -> anyhow::Result<Book>;

    /// Newest first, paginated.
    async fn list(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Book>>;

    async fn count(&self, user_id: Uuid) -> anyhow::Result<i64>;

    /// Owner-scoped lookup; another user's book is indistinguishable from a
    /// missing one.
    async fn find(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Book>>;

    /// Writes the full row back. `None` means the book vanished between the
    /// caller's read and this write.
    async fn update(&self, book: &Book) -> anyhow::Result<Option<Book>>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PostgresBookStore {
    db: PgPool,
}

impl PostgresBookStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

pub(crate) const BOOK_COLUMNS: &str =
    "id, user_id, title, author, isbn, description, cover_url, genre, \
     status, rating, notes, date_added, date_started, date_finished, created_at, updated_at";

#[async_trait]
impl BookStore for PostgresBookStore {
    async fn create(&self, user_id: Uuid, new: NewBook) -> anyhow::Result<Book> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (user_id, title, author, isbn, description, cover_url, genre,
                               status, rating, notes, date_added, date_started, date_finished)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.title)
        .bind(&new.author)
        .bind(&new.isbn)
        .bind(&new.description)
        .bind(&new.cover_url)
        .bind(&new.genre)
        .bind(&new.status)
        .bind(new.rating)
        .bind(&new.notes)
        .bind(new.date_added)
        .bind(new.date_started)
        .bind(new.date_finished)
        .fetch_one(&self.db)
        .await
        .context("insert book")?;

        Ok(book)
    }

    async fn list(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.take)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(books)
    }

    async fn count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE id = $1 AND user_id = $2
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(book)
    }

    async fn update(&self, book: &Book) -> anyhow::Result<Option<Book>> {
        let updated = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $3, author = $4, isbn = $5, description = $6, cover_url = $7,
                genre = $8, status = $9, rating = $10, notes = $11, date_added = $12,
                date_started = $13, date_finished = $14, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(book.id)
        .bind(book.user_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.cover_url)
        .bind(&book.genre)
        .bind(&book.status)
        .bind(book.rating)
        .bind(&book.notes)
        .bind(book.date_added)
        .bind(book.date_started)
        .bind(book.date_finished)
        .fetch_optional(&self.db)
        .await
        .context("update book")?;

        Ok(updated)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM books WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
