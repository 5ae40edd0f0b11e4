use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::tokens::{Scope, ScopeSet};
use crate::store::users::User;

const INVALID_HEADER: &str = "missing or invalid authorization header";

/// Caller identity attached to every request. No Authorization header means
/// `Anonymous`; a header that is present must resolve to a live token or the
/// request is rejected outright.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    Authenticated { user: User, scope: ScopeSet },
}

impl Principal {
    pub fn require_authenticated(&self) -> Result<&User, ApiError> {
        match self {
            Principal::Authenticated { user, .. } => Ok(user),
            Principal::Anonymous => {
                Err(ApiError::Unauthorized("you must be logged in".to_owned()))
            }
        }
    }

    /// Authenticated callers without the scope get 403; anonymous callers
    /// get 401 as with [`require_authenticated`](Self::require_authenticated).
    pub fn require_scope(&self, scope: Scope) -> Result<&User, ApiError> {
        match self {
            Principal::Anonymous => {
                Err(ApiError::Unauthorized("you must be logged in".to_owned()))
            }
            Principal::Authenticated {
                user,
                scope: granted,
            } => {
                if granted.contains(scope) {
                    Ok(user)
                } else {
                    Err(ApiError::Forbidden(
                        "you do not have the necessary permissions to access this resource"
                            .to_owned(),
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Principal::Anonymous);
        };

        let header = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized(INVALID_HEADER.to_owned()))?;

        let plaintext = match header.split_once(' ') {
            Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => token,
            _ => return Err(ApiError::Unauthorized(INVALID_HEADER.to_owned())),
        };

        let Some(record) = state.tokens.resolve(plaintext).await? else {
            return Err(ApiError::Unauthorized(INVALID_HEADER.to_owned()));
        };

        // A token whose user has since been deleted is as good as no token.
        let Some(user) = state.users.find_by_id(record.user_id).await? else {
            return Err(ApiError::Unauthorized(INVALID_HEADER.to_owned()));
        };

        Ok(Principal::Authenticated {
            user,
            scope: record.scope,
        })
    }
}
