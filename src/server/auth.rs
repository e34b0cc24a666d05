//! Shared-secret bearer check

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::server::response::ApiError;
use crate::server::state::AppState;

/// Reject requests without `Authorization: Bearer <token>` when a token is set
///
/// The WebSocket upgrade path is exempt since browsers cannot attach headers
/// to an upgrade request.
pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.bearer_token() else {
        return next.run(request).await;
    };

    if request.uri().path() == state.config.ws_path {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    if presented == Some(expected) {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "Rejected unauthorized request");
        ApiError::Unauthorized.into_response()
    }
}
