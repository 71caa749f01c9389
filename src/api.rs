//! HTTP API endpoints wrapping the game state machine.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Identity, RequireUser};
use crate::error::GameError;
use crate::fanout::FanOut;
use crate::origin::{self, OriginPolicy};
use crate::protocol::{
    CreatedResponse, ErrorResponse, GamePageData, JoinRequest, LeaveRequest, OkResponse,
    TurnRequest, UserGame,
};
use crate::state::AppState;
use crate::types::{GameId, ThreadId};
use crate::ws;

/// Everything a request handler can reach
#[derive(Clone)]
pub struct ServerState {
    pub app: AppState,
    pub fanout: Arc<FanOut>,
    /// Interval between keepalive pings
    pub keepalive: Duration,
}

/// `GameError` rendered as a JSON error response
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Forbidden(_) | GameError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GameError::Storage(e) => {
                tracing::error!("Storage failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let error = match &self.0 {
            GameError::Storage(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn ok() -> ApiResult<OkResponse> {
    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/games
pub async fn list_games(
    State(state): State<ServerState>,
    RequireUser(user): RequireUser,
) -> ApiResult<Vec<UserGame>> {
    Ok(Json(state.app.user_games(&user).await?))
}

/// POST /api/games
pub async fn create_game(
    State(state): State<ServerState>,
    RequireUser(user): RequireUser,
    Json(req): Json<JoinRequest>,
) -> ApiResult<CreatedResponse> {
    let id = state
        .app
        .create_game(&user, req.name.as_deref(), req.hide_avatar)
        .await?;
    Ok(Json(CreatedResponse { id }))
}

/// GET /api/games/{id}
pub async fn get_game(
    State(state): State<ServerState>,
    Path(game_id): Path<GameId>,
    identity: Identity,
) -> ApiResult<GamePageData> {
    Ok(Json(state.app.page_data(&game_id, identity.user_id()).await?))
}

/// POST /api/games/{id}/join
pub async fn join_game(
    State(state): State<ServerState>,
    Path(game_id): Path<GameId>,
    RequireUser(user): RequireUser,
    Json(req): Json<JoinRequest>,
) -> ApiResult<OkResponse> {
    state
        .app
        .join_game(&game_id, &user, req.name.as_deref(), req.hide_avatar)
        .await?;
    ok()
}

/// POST /api/games/{id}/leave
pub async fn leave_game(
    State(state): State<ServerState>,
    Path(game_id): Path<GameId>,
    RequireUser(user): RequireUser,
    Json(req): Json<LeaveRequest>,
) -> ApiResult<OkResponse> {
    let target = req.user_id.unwrap_or_else(|| user.id.clone());
    state.app.leave_game(&game_id, &target, &user.id).await?;
    ok()
}

/// POST /api/games/{id}/cancel
pub async fn cancel_game(
    State(state): State<ServerState>,
    Path(game_id): Path<GameId>,
    RequireUser(user): RequireUser,
) -> ApiResult<OkResponse> {
    state.app.cancel_game(&game_id, &user.id).await?;
    ok()
}

/// POST /api/games/{id}/start
pub async fn start_game(
    State(state): State<ServerState>,
    Path(game_id): Path<GameId>,
    RequireUser(user): RequireUser,
) -> ApiResult<OkResponse> {
    state.app.start_game(&game_id, &user.id).await?;
    ok()
}

/// POST /api/games/{id}/threads/{thread_id}/turns
pub async fn play_turn(
    State(state): State<ServerState>,
    Path((game_id, thread_id)): Path<(GameId, ThreadId)>,
    RequireUser(user): RequireUser,
    Json(req): Json<TurnRequest>,
) -> ApiResult<OkResponse> {
    state
        .app
        .play_turn(&game_id, thread_id, &user.id, &req.data)
        .await?;
    ok()
}

/// All routes, guarded by the same-origin check
pub fn router(state: ServerState, origin: Arc<OriginPolicy>) -> Router {
    Router::new()
        .route("/api/games", get(list_games).post(create_game))
        .route("/api/games/{id}", get(get_game))
        .route("/api/games/{id}/join", post(join_game))
        .route("/api/games/{id}/leave", post(leave_game))
        .route("/api/games/{id}/cancel", post(cancel_game))
        .route("/api/games/{id}/start", post(start_game))
        .route(
            "/api/games/{id}/threads/{thread_id}/turns",
            post(play_turn),
        )
        .route("/game/{id}/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            origin,
            origin::require_same_origin,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::USER_ID_HEADER;
    use crate::state::testing::*;
    use crate::store::StoreError;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn test_router(origin: Option<&str>) -> (Router, AppState) {
        let app = app();
        let state = ServerState {
            fanout: Arc::new(FanOut::new(app.store.clone())),
            app: app.clone(),
            keepalive: Duration::from_secs(30),
        };
        let router = router(
            state,
            Arc::new(OriginPolicy::new(origin.map(str::to_string))),
        );
        (router, app)
    }

    fn post_json(uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (GameError::not_found("x"), StatusCode::NOT_FOUND),
            (GameError::forbidden("x"), StatusCode::FORBIDDEN),
            (GameError::QuotaExceeded(10), StatusCode::FORBIDDEN),
            (GameError::invalid("x"), StatusCode::BAD_REQUEST),
            (
                GameError::Storage(StoreError::Conflict("x".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_create_requires_login() {
        let (router, _) = test_router(None);
        let response = router
            .oneshot(post_json("/api/games", None, serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Login required");
    }

    #[tokio::test]
    async fn test_create_and_fetch_game() {
        let (router, _) = test_router(None);
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/games",
                Some("alice"),
                serde_json::json!({"name": "Alice", "hideAvatar": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/games/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["game"]["state"], "open");
        assert_eq!(page["game"]["players"][0]["name"], "Alice");
        assert!(page["game"]["players"][0]["avatar"].is_null());
    }

    #[tokio::test]
    async fn test_missing_game_is_404() {
        let (router, _) = test_router(None);
        let response = router
            .oneshot(post_json("/api/games/nope/start", Some("u0"), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Game not found");
    }

    #[tokio::test]
    async fn test_leave_defaults_to_caller() {
        let (router, app) = test_router(None);
        let game_id = open_game(&app, 2).await;

        let response = router
            .oneshot(post_json(
                &format!("/api/games/{}/leave", game_id),
                Some("u1"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ok"], true);

        let record = app.store.fetch_game(&game_id).await.unwrap().unwrap();
        assert!(record.player_by_user("u1").is_none());
    }

    #[tokio::test]
    async fn test_turn_validation_is_400() {
        let (router, app) = test_router(None);
        let game_id = started_game(&app, 4).await;
        let record = app.store.fetch_game(&game_id).await.unwrap().unwrap();
        let thread = record.threads_awaiting(0).next().unwrap().id;

        let response = router
            .oneshot(post_json(
                &format!("/api/games/{}/threads/{}/turns", game_id, thread),
                Some("u0"),
                serde_json::json!({"data": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cross_origin_write_rejected() {
        let (router, _) = test_router(Some("https://draw.example"));
        let mut request = post_json("/api/games", Some("alice"), serde_json::json!({}));
        request
            .headers_mut()
            .insert(header::ORIGIN, "https://evil.example".parse().unwrap());

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
