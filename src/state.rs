use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::catalog::{CatalogClient, HttpCatalogClient};
use crate::config::AppConfig;
use crate::store::books::{BookStore, PostgresBookStore};
use crate::store::tokens::{PostgresTokenStore, TokenStore};
use crate::store::users::{PostgresUserStore, UserStore};
use crate::store::wishes::{PostgresWishStore, WishStore};

/// Shared handler state. Stores are trait objects so tests can swap the
/// Postgres implementations for in-memory ones.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub books: Arc<dyn BookStore>,
    pub wishes: Arc<dyn WishStore>,
    pub catalog: Arc<dyn CatalogClient>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to postgres")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            tracing::warn!(error = %e, "running migrations failed");
        } else {
            tracing::info!("migrations are up to date");
        }

        let catalog = HttpCatalogClient::new(&config.catalog)?;

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(PostgresUserStore::new(pool.clone())),
            tokens: Arc::new(PostgresTokenStore::new(pool.clone())),
            books: Arc::new(PostgresBookStore::new(pool.clone())),
            wishes: Arc::new(PostgresWishStore::new(pool)),
            catalog: Arc::new(catalog),
        })
    }

    pub fn token_ttl(&self) -> time::Duration {
        time::Duration::hours(self.config.token.ttl_hours)
    }

    /// State wired to in-memory stores and a canned catalog, no database
    /// required.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::catalog::{
            CatalogAuthor, CatalogBook, CatalogIdentifiers, CatalogRating, StaticCatalog,
        };
        use crate::config::{CatalogConfig, TokenConfig};
        use crate::store::memory::{
            MemoryBookStore, MemoryTokenStore, MemoryUserStore, MemoryWishStore,
        };

        let books = Arc::new(MemoryBookStore::default());
        let wishes = Arc::new(MemoryWishStore::new(books.clone()));

        let catalog = StaticCatalog::with_book(
            "1127",
            CatalogBook {
                id: 1127,
                title: "The Left Hand of Darkness".to_owned(),
                image: Some("https://covers.example.com/1127.jpg".to_owned()),
                description: Some("An envoy alone on a planet of ice.".to_owned()),
                authors: vec![CatalogAuthor {
                    id: 7,
                    name: "Ursula K. Le Guin".to_owned(),
                }],
                rating: Some(CatalogRating { average: 0.87 }),
                identifiers: Some(CatalogIdentifiers {
                    isbn_10: Some("0441478123".to_owned()),
                    isbn_13: Some("9780441478125".to_owned()),
                }),
            },
        );

        Self {
            config: Arc::new(AppConfig {
                database_url: "postgres://localhost/unused".to_owned(),
                token: TokenConfig { ttl_hours: 24 },
                catalog: CatalogConfig {
                    base_url: "https://catalog.invalid".to_owned(),
                    api_key: "test-key".to_owned(),
                    timeout_secs: 1,
                    max_redirects: 1,
                },
            }),
            users: Arc::new(MemoryUserStore::default()),
            tokens: Arc::new(MemoryTokenStore::default()),
            books,
            wishes,
            catalog: Arc::new(catalog),
        }
    }
}
