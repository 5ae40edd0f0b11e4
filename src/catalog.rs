use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::CatalogConfig;

/// A record as returned by the external book catalog. Only the fields the
/// import flow reads are modeled; everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogBook {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<CatalogAuthor>,
    #[serde(default)]
    pub rating: Option<CatalogRating>,
    #[serde(default)]
    pub identifiers: Option<CatalogIdentifiers>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogAuthor {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRating {
    /// Normalized to 0.0..=1.0 by the catalog.
    pub average: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogIdentifiers {
    #[serde(default)]
    pub isbn_10: Option<String>,
    #[serde(default)]
    pub isbn_13: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("book {0} not found in catalog")]
    NotFound(String),
    #[error("catalog rejected the api key")]
    Unauthorized,
    #[error("catalog rate limit exceeded")]
    RateLimited,
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CatalogError {
    /// Whether a later retry of the same lookup could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::RateLimited => true,
            CatalogError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_book(&self, id: &str) -> Result<CatalogBook, CatalogError>;
}

pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("build catalog http client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_book(&self, id: &str) -> Result<CatalogBook, CatalogError> {
        let url = format!("{}/{}", self.base_url, id);

        let response = self
            .http
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<CatalogBook>().await?),
            StatusCode::NOT_FOUND => Err(CatalogError::NotFound(id.to_owned())),
            StatusCode::UNAUTHORIZED => Err(CatalogError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(CatalogError::RateLimited),
            status => Err(CatalogError::Status(status.as_u16())),
        }
    }
}

/// Canned catalog for tests: serves a fixed map of books, 404s everything
/// else.
#[cfg(test)]
pub struct StaticCatalog {
    books: std::collections::HashMap<String, CatalogBook>,
}

#[cfg(test)]
impl StaticCatalog {
    pub fn with_book(id: &str, book: CatalogBook) -> Self {
        let mut books = std::collections::HashMap::new();
        books.insert(id.to_owned(), book);
        Self { books }
    }
}

#[cfg(test)]
#[async_trait]
impl CatalogClient for StaticCatalog {
    async fn fetch_book(&self, id: &str) -> Result<CatalogBook, CatalogError> {
        self.books
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_owned()))
    }
}
