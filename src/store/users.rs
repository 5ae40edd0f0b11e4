use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Registered account. The password hash lives in a separate table and is
/// only ever loaded through [`Credential`].
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A user joined with their password hash, for login and password changes.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user: User,
    pub password_hash: String,
}

/// Raised when the unique email index fires under a concurrent register
/// race that slipped past the existence pre-check.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the account and its credential row in one transaction.
    async fn create(&self, email: &str, name: &str, password_hash: &str) -> anyhow::Result<User>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Credential>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PostgresUserStore {
    db: PgPool,
}

impl PostgresUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    password_hash: String,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create(&self, email: &str, name: &str, password_hash: &str) -> anyhow::Result<User> {
        let mut tx = self.db.begin().await.context("begin register tx")?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            RETURNING id, email, name, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                anyhow::Error::new(DuplicateEmail)
            } else {
                anyhow::Error::new(e).context("insert user")
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO passwords (user_id, password_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(user.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await
        .context("insert credential")?;

        tx.commit().await.context("commit register tx")?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT u.id, u.email, u.name, u.created_at, u.updated_at, p.password_hash
            FROM users u
            JOIN passwords p ON p.user_id = u.id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| Credential {
            user: User {
                id: r.id,
                email: r.email,
                name: r.name,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
            password_hash: r.password_hash,
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE passwords
            SET password_hash = $2
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .context("update credential")?;

        Ok(())
    }
}
