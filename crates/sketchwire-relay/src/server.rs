//! Axum server: the `/ws/draw` relay plus the HTTP endpoints.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::cleanup::cleanup_handler;
use crate::connection::handle_ws_connection;
use crate::diagrams;
use crate::state::RelayState;

/// Build the full router. Exposed separately so tests can drive it directly.
pub fn router(state: Arc<RelayState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws/draw", get(ws_handler))
        .route("/ai/cleanup", post(cleanup_handler))
        .route("/diagrams", post(diagrams::create_diagram))
        .route("/diagrams/shared", get(diagrams::list_shared_diagrams))
        .route("/diagrams/user/{owner}", get(diagrams::list_user_diagrams))
        .route("/diagrams/{id}", get(diagrams::get_diagram));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(metrics_handler));

    app.with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind according to config and serve until Ctrl+C.
pub async fn start_relay(state: Arc<RelayState>) -> anyhow::Result<()> {
    let bind_addr = state
        .config
        .bind
        .clone()
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let addr = format!("{bind_addr}:{}", state.config.port);

    let listener = TcpListener::bind(&addr).await?;
    info!("Relay listening on {addr}");

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves. Participant
/// sockets are closed once it does.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<RelayState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let notify = state.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Closing participant connections");
            notify.begin_shutdown();
        })
        .await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn root_handler() -> impl IntoResponse {
    axum::Json(json!({ "message": "Sketchwire relay running" }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    let max = state.config.max_frame_bytes;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| handle_ws_connection(state, socket))
}

async fn health_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds();

    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.connection_count().await,
        "frames_relayed": state.frames_relayed(),
        "replay": state.config.replay_on_join,
        "uptime_secs": uptime_secs,
    }))
}

#[cfg(feature = "metrics")]
async fn metrics_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (axum::http::StatusCode::OK, handle.render()),
        None => (
            axum::http::StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_string(),
        ),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sketchwire_core::config::ServerConfig;
    use sketchwire_core::diagram_store::MemoryDiagramStore;
    use tower::ServiceExt;

    use super::*;

    fn test_router() -> Router {
        let state = RelayState::new(ServerConfig::default(), Arc::new(MemoryDiagramStore::new()));
        router(Arc::new(state))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_message() {
        let resp = test_router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_json(resp).await["message"].is_string());
    }

    #[tokio::test]
    async fn test_create_requires_owner_and_title() {
        let resp = test_router()
            .oneshot(post_json("/diagrams", json!({"owner": "alice", "title": ""})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["detail"], "Owner and title are required");
    }

    #[tokio::test]
    async fn test_unknown_diagram_is_404() {
        let resp = test_router()
            .oneshot(Request::get("/diagrams/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["detail"], "Diagram not found");
    }

    #[tokio::test]
    async fn test_cleanup_endpoint() {
        let body = json!({
            "strokes": [
                {"points": [{"x": 13, "y": 27}, {"x": 55, "y": 61}, {"x": 99, "y": 81}]},
                {"points": []}
            ]
        });
        let resp = test_router().oneshot(post_json("/ai/cleanup", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let out = body_json(resp).await;
        assert_eq!(
            out,
            json!({"strokes": [{"points": [
                {"x": 0.0, "y": 40.0},
                {"x": 80.0, "y": 80.0}
            ]}]})
        );
    }

    #[tokio::test]
    async fn test_cleanup_without_strokes_field() {
        let resp = test_router().oneshot(post_json("/ai/cleanup", json!({}))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"strokes": []}));
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/diagrams")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    }

    fn allowed_origin(resp: &axum::response::Response) -> Option<&str> {
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_cors_preflight_for_listed_origins() {
        let config = ServerConfig {
            // The invalid entry is skipped rather than failing startup.
            cors_origins: vec!["http://localhost:5173".into(), "bad\norigin".into()],
            ..Default::default()
        };
        let state = RelayState::new(config, Arc::new(MemoryDiagramStore::new()));
        let app = router(Arc::new(state));

        let resp = app
            .clone()
            .oneshot(preflight("http://localhost:5173"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(allowed_origin(&resp), Some("http://localhost:5173"));

        let resp = app.oneshot(preflight("http://evil.example")).await.unwrap();
        assert_eq!(allowed_origin(&resp), None);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin_by_default() {
        let resp = test_router()
            .oneshot(preflight("http://anywhere.example"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(allowed_origin(&resp), Some("*"));
    }
}
