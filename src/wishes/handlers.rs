use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::principal::Principal;
use crate::error::ApiError;
use crate::extract::{AppJson, AppPath, AppQuery, PageQuery};
use crate::state::AppState;
use crate::store::tokens::Scope;
use crate::store::wishes::{Acquisition, Wish};
use crate::wishes::dto::CreateWishRequest;

const NOT_FOUND: &str = "wish not found";
const NOT_OWNER: &str = "you are not allowed to perform this action on this resource";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishes", get(list_wishes).post(create_wish))
        .route("/wishes/:id", delete(delete_wish))
        .route("/wishes/:id/acquire", put(acquire_wish))
}

#[instrument(skip(state, principal))]
async fn list_wishes(
    State(state): State<AppState>,
    principal: Principal,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = principal.require_scope(Scope::Wishlist)?;
    let page = query.normalize();

    let wishes = state.wishes.list(user.id, page).await?;
    let count = state.wishes.count(user.id).await?;

    Ok(Json(json!({
        "wishes": wishes,
        "count": count,
        "page": page.page,
        "take": page.take,
    })))
}

#[instrument(skip(state, principal, payload))]
async fn create_wish(
    State(state): State<AppState>,
    principal: Principal,
    AppJson(payload): AppJson<CreateWishRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = principal.require_scope(Scope::Wishlist)?;

    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let wish = state.wishes.create(user.id, payload.into_new_wish()).await?;

    info!(user_id = %user.id, wish_id = %wish.id, "wish created");

    Ok((StatusCode::CREATED, Json(json!({ "wish": wish }))))
}

/// Loads the wish and checks the caller owns it. Missing is 404, someone
/// else's is 403.
async fn find_owned(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Wish, ApiError> {
    let Some(wish) = state.wishes.find(id).await? else {
        return Err(ApiError::NotFound(NOT_FOUND.to_owned()));
    };

    if wish.user_id != user_id {
        return Err(ApiError::Forbidden(NOT_OWNER.to_owned()));
    }

    Ok(wish)
}

#[instrument(skip(state, principal))]
async fn delete_wish(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = principal.require_scope(Scope::Wishlist)?;

    let wish = find_owned(&state, user.id, id).await?;
    state.wishes.delete(wish.id).await?;

    info!(user_id = %user.id, wish_id = %wish.id, "wish deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, principal))]
async fn acquire_wish(
    State(state): State<AppState>,
    principal: Principal,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = principal.require_scope(Scope::Wishlist)?;

    let wish = find_owned(&state, user.id, id).await?;

    match state.wishes.acquire(wish.id).await? {
        Acquisition::Created(book) => {
            info!(user_id = %user.id, wish_id = %wish.id, book_id = %book.id, "wish acquired");
            Ok(StatusCode::NO_CONTENT)
        }
        // Acquired in an earlier call; nothing to do over.
        Acquisition::AlreadyAcquired => Ok(StatusCode::NO_CONTENT),
        Acquisition::NotFound => Err(ApiError::NotFound(NOT_FOUND.to_owned())),
    }
}
