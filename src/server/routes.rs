//! HTTP routing
//!
//! REST reads over the retained history, the WebSocket upgrade path and an
//! optional static asset directory, wrapped in the auth, panic, trace and CORS
//! layers.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::handler::HandlerWithoutStateExt;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::panic_message;
use crate::record::{ApplicationInfo, NetworkEntry, RecordKind};
use crate::server::auth::require_bearer;
use crate::server::response::{ApiError, ApiMessage, PageQuery, PageResponse};
use crate::server::state::AppState;
use crate::server::websocket;

/// `GET /api/status` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub network_entry_count: usize,
    pub console_entry_count: usize,
    pub performance_entry_count: usize,
    pub application_info_count: usize,
    pub client_count: usize,
    pub connections_accepted: u64,
    pub envelopes_broadcast: u64,
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/api/status", get(status))
        .route("/api/network", get(network_page))
        .route("/api/network/clear", post(clear_network))
        .route("/api/network/:id", get(network_by_id))
        .route("/api/console", get(console_page))
        .route("/api/console/clear", post(clear_console))
        .route("/api/performance", get(performance_page))
        .route("/api/performance/clear", post(clear_performance))
        .route("/api/application", get(application))
        .route(&state.config.ws_path, get(websocket::upgrade));

    let routes = match &state.config.static_dir {
        Some(dir) => routes.fallback_service(
            ServeDir::new(dir).not_found_service(not_found.into_service()),
        ),
        None => routes.fallback(not_found),
    };

    with_layers(routes, state)
}

/// Apply the cross-cutting layers; CORS is outermost so every response,
/// including 401 and 500, carries its headers
pub(crate) fn with_layers(routes: Router<AppState>, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    routes
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::warn!(panic = panic_message(panic.as_ref()), "Request handler panicked");

    ApiError::Internal("internal server error".to_owned()).into_response()
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not found".to_owned())
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let collection = &state.collection;
    let stats = state.stats.snapshot();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        network_entry_count: collection.count(RecordKind::Network),
        console_entry_count: collection.count(RecordKind::Console),
        performance_entry_count: collection.count(RecordKind::Performance),
        application_info_count: collection.count(RecordKind::Application),
        client_count: state.registry.client_count(),
        connections_accepted: stats.connections_accepted,
        envelopes_broadcast: stats.envelopes_broadcast,
    })
}

fn page_query(state: &AppState, params: &HashMap<String, String>) -> PageQuery {
    PageQuery::from_params(params, state.config.default_page_limit)
}

async fn network_page(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = page_query(&state, &params);
    PageResponse::new(state.collection.network_page(query.offset, query.limit), query)
}

async fn network_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Arc<NetworkEntry>>, ApiError> {
    state
        .collection
        .network_by_id(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("network entry {id} not found")))
}

async fn console_page(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = page_query(&state, &params);
    PageResponse::new(state.collection.console_page(query.offset, query.limit), query)
}

async fn performance_page(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = page_query(&state, &params);
    PageResponse::new(
        state.collection.performance_page(query.offset, query.limit),
        query,
    )
}

async fn application(State(state): State<AppState>) -> Result<Json<Arc<ApplicationInfo>>, ApiError> {
    state
        .collection
        .application_info()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("application info not captured yet".to_owned()))
}

async fn clear_network(State(state): State<AppState>) -> ApiMessage {
    clear(&state, RecordKind::Network)
}

async fn clear_console(State(state): State<AppState>) -> ApiMessage {
    clear(&state, RecordKind::Console)
}

async fn clear_performance(State(state): State<AppState>) -> ApiMessage {
    clear(&state, RecordKind::Performance)
}

fn clear(state: &AppState, kind: RecordKind) -> ApiMessage {
    state.collection.clear(kind);
    tracing::info!(kind = %kind, "History cleared");
    ApiMessage::ok(format!("{kind} history cleared"))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::record::{ConsoleEntry, LogLevel, MemoryUsage, PerformanceEntry, ThreadCounts};
    use crate::registry::BroadcastRegistry;
    use crate::server::config::ServerConfig;
    use crate::store::{IndexedCollection, StoreConfig};

    use super::*;

    fn state_with(config: ServerConfig, store: StoreConfig) -> AppState {
        AppState::new(
            config,
            Arc::new(IndexedCollection::new(&store).unwrap()),
            Arc::new(BroadcastRegistry::new()),
        )
    }

    fn state() -> AppState {
        state_with(ServerConfig::default(), StoreConfig::default())
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, headers)
    }

    #[tokio::test]
    async fn test_status_counts() {
        let state = state();
        state.collection.add_console(Arc::new(ConsoleEntry::new(LogLevel::Information, "a", "1")));
        state.collection.add_console(Arc::new(ConsoleEntry::new(LogLevel::Error, "a", "2")));
        state
            .collection
            .add_network(Arc::new(NetworkEntry::builder("GET", "/").build()));

        let (status, json, _) = send(router(state), request(Method::GET, "/api/status")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["networkEntryCount"], 1);
        assert_eq!(json["consoleEntryCount"], 2);
        assert_eq!(json["performanceEntryCount"], 0);
        assert_eq!(json["applicationInfoCount"], 0);
        assert_eq!(json["clientCount"], 0);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_pagination_defaults_and_window() {
        let state = state_with(ServerConfig::default().default_page_limit(3), StoreConfig::default());
        for i in 0..5 {
            state
                .collection
                .add_console(Arc::new(ConsoleEntry::new(LogLevel::Debug, "p", i.to_string())));
        }
        let app = router(state);

        let (_, json, _) = send(app.clone(), request(Method::GET, "/api/console")).await;
        assert_eq!(json["total"], 5);
        assert_eq!(json["offset"], 0);
        assert_eq!(json["limit"], 3);
        assert_eq!(json["items"].as_array().unwrap().len(), 3);
        assert_eq!(json["items"][0]["message"], "0");

        let (_, json, _) = send(app.clone(), request(Method::GET, "/api/console?offset=3&limit=10")).await;
        let messages: Vec<&str> = json["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["3", "4"]);

        let (status, json, _) =
            send(app.clone(), request(Method::GET, "/api/console?offset=-2&limit=zero")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["offset"], 0);
        assert_eq!(json["items"].as_array().unwrap().len(), 3);

        let (_, json, _) = send(app, request(Method::GET, "/api/console?limit=0")).await;
        assert_eq!(json["items"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_performance_page_and_clear() {
        let state = state_with(
            ServerConfig::default(),
            StoreConfig::default().performance_capacity(3),
        );
        for i in 0..5 {
            state.collection.add_performance(Arc::new(PerformanceEntry::new(
                i as f64,
                MemoryUsage::default(),
                ThreadCounts::default(),
            )));
        }
        let app = router(state);

        let cpu = |json: &Value| -> Vec<f64> {
            json["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item["cpuPercent"].as_f64().unwrap())
                .collect()
        };

        let (status, json, _) = send(app.clone(), request(Method::GET, "/api/performance")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 3);
        assert_eq!(json["offset"], 0);
        assert_eq!(json["limit"], 100);
        assert_eq!(cpu(&json), vec![2.0, 3.0, 4.0]);

        let (_, json, _) = send(
            app.clone(),
            request(Method::GET, "/api/performance?offset=1&limit=1"),
        )
        .await;
        assert_eq!(json["total"], 3);
        assert_eq!(cpu(&json), vec![3.0]);

        let (status, json, _) =
            send(app.clone(), request(Method::POST, "/api/performance/clear")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (_, json, _) = send(app.clone(), request(Method::GET, "/api/status")).await;
        assert_eq!(json["performanceEntryCount"], 0);

        let (_, json, _) = send(app, request(Method::GET, "/api/performance")).await;
        assert_eq!(json["total"], 0);
        assert!(json["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_by_id_and_missing() {
        let state = state();
        state
            .collection
            .add_network(Arc::new(
                NetworkEntry::builder("PUT", "/items/1")
                    .id("req-1")
                    .status(204)
                    .build(),
            ));
        let app = router(state);

        let (status, json, _) = send(app.clone(), request(Method::GET, "/api/network/req-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], "req-1");
        assert_eq!(json["method"], "PUT");

        let (status, json, _) = send(app, request(Method::GET, "/api/network/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_application_404_until_set() {
        let state = state();
        let app = router(state.clone());

        let (status, _, _) = send(app.clone(), request(Method::GET, "/api/application")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        state
            .collection
            .set_application_info(Arc::new(ApplicationInfo::capture("orders", "2.0.0")));
        let (status, json, _) = send(app, request(Method::GET, "/api/application")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "orders");
    }

    #[tokio::test]
    async fn test_clear_endpoints() {
        let state = state();
        state.collection.add_console(Arc::new(ConsoleEntry::new(LogLevel::Information, "c", "m")));
        let app = router(state.clone());

        let (status, json, _) = send(app, request(Method::POST, "/api/console/clear")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(state.collection.console_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_matrix() {
        let state = state_with(ServerConfig::default().auth_token("s3cret"), StoreConfig::default());
        let app = router(state);

        let (status, json, _) = send(app.clone(), request(Method::GET, "/api/status")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);

        let wrong = Request::builder()
            .uri("/api/status")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(app.clone(), wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let right = Request::builder()
            .uri("/api/status")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(app.clone(), right).await;
        assert_eq!(status, StatusCode::OK);

        // The upgrade path skips the token check; a plain GET is still not an upgrade
        let (status, _, _) = send(app, request(Method::GET, "/ws")).await;
        assert_ne!(status, StatusCode::UNAUTHORIZED);
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_cors_on_every_response() {
        let state = state_with(ServerConfig::default().auth_token("t"), StoreConfig::default());
        let app = router(state);

        let req = Request::builder()
            .uri("/api/status")
            .header(header::ORIGIN, "http://dashboard.local")
            .body(Body::empty())
            .unwrap();
        let (status, _, headers) = send(app, req).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_404() {
        let (status, json, _) = send(router(state()), request(Method::GET, "/nothing/here.js")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>telemetry</h1>").unwrap();
        let state = state_with(ServerConfig::default().static_dir(dir.path()), StoreConfig::default());
        let app = router(state);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/index.html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>telemetry</h1>");

        let (status, json, _) = send(app, request(Method::GET, "/missing.css")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500() {
        let state = state();
        async fn boom() -> &'static str {
            panic!("boom")
        }
        let routes = Router::new().route("/api/boom", get(boom));
        let app = with_layers(routes, state);

        let (status, json, _) = send(app.clone(), request(Method::GET, "/api/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);

        // The service keeps answering afterwards
        let (status, _, _) = send(app, request(Method::GET, "/api/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
