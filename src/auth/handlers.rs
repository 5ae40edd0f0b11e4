use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::auth::dto::{ChangePasswordRequest, LoginRequest, RegisterRequest};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::principal::Principal;
use crate::error::ApiError;
use crate::extract::AppJson;
use crate::state::AppState;
use crate::store::tokens::{Scope, ScopeSet};
use crate::store::users::DuplicateEmail;

const DUPLICATE_EMAIL: &str = "user with this email already exists";
const BAD_CREDENTIALS: &str = "invalid email or password";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/password", put(change_password))
        .route("/auth/logout", delete(logout))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    if state.users.find_by_email(&payload.email).await?.is_some() {
        return Err(ApiError::Conflict(DUPLICATE_EMAIL.to_owned()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = state
        .users
        .create(&payload.email, &payload.name, &password_hash)
        .await
        .map_err(|e| {
            // The unique index catches registers racing past the pre-check.
            if e.downcast_ref::<DuplicateEmail>().is_some() {
                ApiError::Conflict(DUPLICATE_EMAIL.to_owned())
            } else {
                ApiError::Internal(e)
            }
        })?;

    info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // One message for unknown email and wrong password alike.
    let Some(credential) = state.users.find_by_email(&payload.email).await? else {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_owned()));
    };

    if !verify_password(&payload.password, &credential.password_hash)? {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_owned()));
    }

    let token = state
        .tokens
        .create(credential.user.id, ScopeSet::all(), state.token_ttl())
        .await?;

    info!(user_id = %credential.user.id, "login");

    Ok(Json(serde_json::to_value(&token).map_err(anyhow::Error::new)?))
}

#[instrument(skip(principal))]
async fn me(principal: Principal) -> Result<Json<serde_json::Value>, ApiError> {
    let user = principal.require_scope(Scope::Auth)?;
    Ok(Json(json!({ "user": user })))
}

#[instrument(skip(state, principal, payload))]
async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = principal.require_scope(Scope::Auth)?;

    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let Some(credential) = state.users.find_by_email(&user.email).await? else {
        return Err(ApiError::Unauthorized("you must be logged in".to_owned()));
    };

    if !verify_password(&payload.current_password, &credential.password_hash)? {
        return Err(ApiError::Unauthorized(
            "current password is incorrect".to_owned(),
        ));
    }

    let password_hash = hash_password(&payload.new_password)?;
    state.users.update_password(user.id, &password_hash).await?;

    info!(user_id = %user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, principal))]
async fn logout(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<StatusCode, ApiError> {
    let user = principal.require_scope(Scope::Auth)?;

    state.tokens.revoke_all(user.id, Scope::Auth).await?;

    info!(user_id = %user.id, "logout");

    Ok(StatusCode::NO_CONTENT)
}
