use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ApiError;

/// `Json` wrapper whose rejection renders inside the standard error envelope
/// instead of axum's plain-text body.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "rejecting request body");
                Err(ApiError::BadRequest("invalid request payload".into()))
            }
        }
    }
}

/// `Path` wrapper, same deal: a non-UUID id is a 400 in the envelope.
pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(AppPath(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "rejecting path parameter");
                Err(ApiError::BadRequest("invalid path parameter".into()))
            }
        }
    }
}

/// `Query` wrapper for the pagination parameters.
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "rejecting query string");
                Err(ApiError::BadRequest("invalid query parameters".into()))
            }
        }
    }
}

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_TAKE: i64 = 10;
const MAX_TAKE: i64 = 100;

/// Raw `page`/`take` query parameters. `normalize` applies the 1-indexed
/// defaults and bounds before they reach a store.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub take: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub take: i64,
}

impl Page {
    /// Saturating so an absurd `page` yields an empty slice, not an overflow.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.take)
    }
}

impl PageQuery {
    pub fn normalize(self) -> Page {
        let page = match self.page {
            Some(p) if p >= 1 => p,
            _ => DEFAULT_PAGE,
        };
        let take = match self.take {
            Some(t) if t >= 1 => t.min(MAX_TAKE),
            _ => DEFAULT_TAKE,
        };
        Page { page, take }
    }
}
