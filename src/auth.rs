//! Caller identity, as asserted by the login proxy in front of the server.
//!
//! The proxy authenticates the user and forwards `x-user-id`,
//! `x-user-name` and optionally `x-user-picture`. Requests without an id
//! are anonymous.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::convert::Infallible;

use crate::protocol::ErrorResponse;
use crate::types::UserSession;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_PICTURE_HEADER: &str = "x-user-picture";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Build a session from the proxy headers
pub fn session_from_headers(headers: &HeaderMap) -> Option<UserSession> {
    let id = header_value(headers, USER_ID_HEADER)?;
    let name = header_value(headers, USER_NAME_HEADER).unwrap_or_else(|| id.clone());
    Some(UserSession {
        id,
        name,
        picture: header_value(headers, USER_PICTURE_HEADER),
    })
}

/// The caller, if logged in
#[derive(Debug, Clone)]
pub struct Identity(pub Option<UserSession>);

impl Identity {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.id.as_str())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity(session_from_headers(&parts.headers)))
    }
}

/// The caller; rejects anonymous requests with 401
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserSession);

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_from_headers(&parts.headers) {
            Some(user) => Ok(RequireUser(user)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Login required".to_string(),
                }),
            )
                .into_response()),
        }
    }
}
