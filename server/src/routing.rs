//! HTTP routing configuration

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::websocket::ServerState;

/// Create the application router
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);

    let mut router = Router::new()
        .route("/ws", get(crate::websocket::handle_websocket))
        .route("/health", get(health_check))
        .route("/info", get(server_info));

    // Only mount the admin endpoint if a token is configured
    if state.config.admin_token.is_some() {
        router = router.route("/admin/stats", get(admin_stats));
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build the CORS layer from config. Permissive when no origins are set.
fn build_cors_layer(origins: &Option<String>) -> CorsLayer {
    match origins {
        Some(list) if !list.is_empty() => {
            let parsed: Vec<_> = list
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(parsed))
        }
        _ => CorsLayer::permissive(),
    }
}

/// Health check — no sensitive data
async fn health_check() -> &'static str {
    "OK"
}

/// Server info — name and protocol version only
async fn server_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Parley Signaling Server",
        "protocol_version": parley_protocol::PROTOCOL_VERSION,
    }))
}

/// Counter snapshot — protected by a bearer token
async fn admin_stats(
    headers: HeaderMap,
    State(state): State<Arc<ServerState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(StatusCode::NOT_FOUND)?;

    let provided = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Constant-time comparison to prevent timing attacks
    use subtle::ConstantTimeEq;
    if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
        let stats = &state.stats;
        Ok(Json(serde_json::json!({
            "uptime_secs": stats.uptime_secs(),
            "active_clients": stats.active_clients.load(Ordering::Relaxed),
            "active_rooms": stats.active_rooms.load(Ordering::Relaxed),
            "total_connections": stats.total_connections.load(Ordering::Relaxed),
            "total_messages": stats.total_messages.load(Ordering::Relaxed),
            "total_errors": stats.total_errors.load(Ordering::Relaxed),
            "total_rooms_created": stats.total_rooms_created.load(Ordering::Relaxed),
            "max_clients": state.config.max_clients,
            "max_rooms": state.config.max_rooms,
        })))
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
