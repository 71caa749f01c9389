//! Same-origin guard for mutating requests and socket upgrades

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::protocol::ErrorResponse;

/// Sec-WebSocket-Key header (browsers always send this for WS upgrades)
const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    /// Expected `Origin` value (None = guard disabled)
    pub expected: Option<String>,
}

impl OriginPolicy {
    pub fn new(expected: Option<String>) -> Self {
        Self { expected }
    }

    /// Whether the request may pass
    pub fn allows(&self, request: &Request<Body>) -> bool {
        let Some(expected) = &self.expected else {
            return true;
        };
        if !needs_check(request) {
            return true;
        }
        request
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|origin| origin.trim_end_matches('/') == expected)
    }
}

/// Reads are free; writes and socket upgrades are checked
fn needs_check(request: &Request<Body>) -> bool {
    let is_read = matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    !is_read || request.headers().contains_key(SEC_WEBSOCKET_KEY)
}

pub async fn require_same_origin(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if policy.allows(&request) {
        return next.run(request).await;
    }

    tracing::warn!(
        uri = %request.uri(),
        method = %request.method(),
        origin = ?request.headers().get(header::ORIGIN),
        "Blocked cross-origin request"
    );
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            error: "Cross-origin request rejected".to_string(),
        }),
    )
        .into_response()
}
