use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::extract::Page;
use crate::store::books::{Book, BOOK_COLUMNS};

/// A wanted-but-not-owned title. Acquiring it copies the entry onto the
/// shelf and flips `acquired`, keeping the wish around as history.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Wish {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub catalog_id: Option<i64>,
    pub priority: String,
    pub acquired: bool,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for a new wish.
#[derive(Debug, Clone)]
pub struct NewWish {
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub catalog_id: Option<i64>,
    pub priority: String,
    pub notes: Option<String>,
}

/// Outcome of an acquire attempt. `AlreadyAcquired` is the idempotent
/// success case: the shelf copy exists from an earlier call.
#[derive(Debug)]
pub enum Acquisition {
    Created(Book),
    AlreadyAcquired,
    NotFound,
}

#[async_trait]
pub trait WishStore: Send + Sync {
    async fn create(&self, user_id: Uuid, new: NewWish) -> anyhow::Result<Wish>;

    /// Unscoped lookup; callers decide whether the requester may touch the
    /// wish they found.
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Wish>>;

    async fn list(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Wish>>;

    async fn count(&self, user_id: Uuid) -> anyhow::Result<i64>;

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Atomically copies the wish onto the owner's shelf and marks it
    /// acquired. Safe to retry.
    async fn acquire(&self, id: Uuid) -> anyhow::Result<Acquisition>;
}

#[derive(Clone)]
pub struct PostgresWishStore {
    db: PgPool,
}

impl PostgresWishStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const WISH_COLUMNS: &str =
    "id, user_id, title, author, isbn, catalog_id, priority, acquired, notes, \
     created_at, updated_at";

#[async_trait]
impl WishStore for PostgresWishStore {
    async fn create(&self, user_id: Uuid, new: NewWish) -> anyhow::Result<Wish> {
        let wish = sqlx::query_as::<_, Wish>(&format!(
            r#"
            INSERT INTO wishlists (user_id, title, author, isbn, catalog_id, priority, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {WISH_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.title)
        .bind(&new.author)
        .bind(&new.isbn)
        .bind(new.catalog_id)
        .bind(&new.priority)
        .bind(&new.notes)
        .fetch_one(&self.db)
        .await
        .context("insert wish")?;

        Ok(wish)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Wish>> {
        let wish = sqlx::query_as::<_, Wish>(&format!(
            r#"
            SELECT {WISH_COLUMNS}
            FROM wishlists
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(wish)
    }

    async fn list(&self, user_id: Uuid, page: Page) -> anyhow::Result<Vec<Wish>> {
        let wishes = sqlx::query_as::<_, Wish>(&format!(
            r#"
            SELECT {WISH_COLUMNS}
            FROM wishlists
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

        Ok(wishes)
    }

    async fn count(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM wishlists WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM wishlists WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn acquire(&self, id: Uuid) -> anyhow::Result<Acquisition> {
        let mut tx = self.db.begin().await.context("begin acquire tx")?;

        // Row lock so a concurrent acquire of the same wish serializes here
        // instead of inserting two shelf copies.
        let wish = sqlx::query_as::<_, Wish>(&format!(
            r#"
            SELECT {WISH_COLUMNS}
            FROM wishlists
            WHERE id = $1
            FOR UPDATE
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(wish) = wish else {
            tx.commit().await.context("commit acquire tx")?;
            return Ok(Acquisition::NotFound);
        };

        if wish.acquired {
            tx.commit().await.context("commit acquire tx")?;
            return Ok(Acquisition::AlreadyAcquired);
        }

        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (user_id, title, author, isbn, status, rating, notes, date_added)
            VALUES ($1, $2, $3, $4, 'to_read', 1, $5, CURRENT_DATE)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(wish.user_id)
        .bind(&wish.title)
        .bind(wish.author.clone().unwrap_or_default())
        .bind(&wish.isbn)
        .bind(&wish.notes)
        .fetch_one(&mut *tx)
        .await
        .context("insert acquired book")?;

        sqlx::query(
            r#"
            UPDATE wishlists SET acquired = TRUE, updated_at = now() WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("mark wish acquired")?;

        tx.commit().await.context("commit acquire tx")?;

        Ok(Acquisition::Created(book))
    }
}
