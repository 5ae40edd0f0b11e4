use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::principal::Principal;
use crate::books::dto::{CreateBookRequest, UpdateBookRequest};
use crate::catalog::{CatalogBook, CatalogError};
use crate::error::ApiError;
use crate::extract::{AppJson, AppPath, AppQuery, PageQuery};
use crate::state::AppState;
use crate::store::books::NewBook;
use crate::store::tokens::Scope;

const NOT_FOUND: &str = "book not found";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/books/import/:external_id", post(import_book))
}

#[instrument(skip(state, principal))]
async fn list_books(
    State(state): State<AppState>,
    principal: Principal,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = principal.require_scope(Scope::Books)?;
    let page = query.normalize();

    let books = state.books.list(user.id, page).await?;
    let count = state.books.count(user.id).await?;

    Ok(Json(json!({
        "books": books,
        "count": count,
        "page": page.page,
        "take": page.take,
    })))
}

#[instrument(skip(state, principal, payload))]
async fn create_book(
    State(state): State<AppState>,
    principal: Principal,
    AppJson(payload): AppJson<CreateBookRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = principal.require_scope(Scope::Books)?;

    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let new = payload.into_new_book(OffsetDateTime::now_utc().date());
    let book = state.books.create(user.id, new).await?;

    info!(user_id = %user.id, book_id = %book.id, "book created");

    Ok((StatusCode::CREATED, Json(json!({ "book": book }))))
}

#[instrument(skip(state, principal))]
async fn get_book(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = principal.require_scope(Scope::Books)?;

    let Some(book) = state.books.find(user.id, id).await? else {
        return Err(ApiError::NotFound(NOT_FOUND.to_owned()));
    };

    Ok(Json(json!({ "book": book })))
}

#[instrument(skip(state, principal, payload))]
async fn update_book(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateBookRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = principal.require_scope(Scope::Books)?;

    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let Some(mut book) = state.books.find(user.id, id).await? else {
        return Err(ApiError::NotFound(NOT_FOUND.to_owned()));
    };

    payload.apply_to(&mut book);

    let Some(book) = state.books.update(&book).await? else {
        return Err(ApiError::NotFound(NOT_FOUND.to_owned()));
    };

    Ok(Json(json!({ "book": book })))
}

#[instrument(skip(state, principal))]
async fn delete_book(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = principal.require_scope(Scope::Books)?;

    if !state.books.delete(user.id, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.to_owned()));
    }

    info!(user_id = %user.id, book_id = %id, "book deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, principal))]
async fn import_book(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(external_id): AppPath<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = principal.require_scope(Scope::Books)?;

    let record = state
        .catalog
        .fetch_book(&external_id)
        .await
        .map_err(|e| match e {
            CatalogError::NotFound(_) => {
                ApiError::NotFound("book not found in catalog".to_owned())
            }
            other => {
                warn!(
                    error = %other,
                    retryable = other.is_retryable(),
                    %external_id,
                    "catalog lookup failed"
                );
                ApiError::Internal(anyhow::Error::new(other))
            }
        })?;

    let book = state
        .books
        .create(user.id, catalog_to_new_book(record))
        .await?;

    info!(user_id = %user.id, book_id = %book.id, "book imported from catalog");

    Ok((StatusCode::CREATED, Json(json!({ "book": book }))))
}

/// Catalog averages are 0..=1; shelf ratings are 1..=5 whole stars.
fn scaled_rating(average: f64) -> i16 {
    ((average * 5.0).round() as i16).clamp(1, 5)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn catalog_to_new_book(record: CatalogBook) -> NewBook {
    let author = record
        .authors
        .into_iter()
        .next()
        .map(|a| a.name)
        .unwrap_or_else(|| "Unknown".to_owned());
    let rating = record
        .rating
        .map(|r| scaled_rating(r.average))
        .unwrap_or(1);
    let isbn = record.identifiers.and_then(|i| non_empty(i.isbn_13));

    NewBook {
        title: record.title,
        author,
        isbn,
        description: non_empty(record.description),
        cover_url: non_empty(record.image),
        genre: None,
        status: "to_read".to_owned(),
        rating,
        notes: None,
        date_added: OffsetDateTime::now_utc().date(),
        date_started: None,
        date_finished: None,
    }
}
