// JSON handlers: health, version, telemetry snapshot, application registry

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::SecondsFormat;

use super::AppState;

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health: unauthenticated liveness plus registry state.
pub(super) async fn health_handler(State(app): State<AppState>) -> impl IntoResponse {
    let registry = app.state.registry();
    axum::Json(serde_json::json!({
        "status": "ok",
        "connectionState": registry.connection,
        "applicationsCount": registry.applications.len(),
        "processUptimeSeconds": app.state.process_uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// GET /api/system: latest committed snapshot, `{}` before the first collection.
pub(super) async fn system_handler(State(app): State<AppState>) -> impl IntoResponse {
    match app.state.latest_snapshot() {
        Some(snapshot) => axum::Json(serde_json::to_value(snapshot.as_ref()).unwrap_or_default()),
        None => axum::Json(serde_json::json!({})),
    }
}

/// GET /api/applications: registry list; syncs inline first when read-through is enabled.
pub(super) async fn applications_handler(State(app): State<AppState>) -> impl IntoResponse {
    if app.config.registry.read_through {
        app.synchronizer.sync().await;
    }
    axum::Json(app.state.registry().applications.clone())
}

/// POST /api/applications/refresh: synchronous sync; success only when the remote was reached.
pub(super) async fn refresh_applications_handler(
    State(app): State<AppState>,
) -> impl IntoResponse {
    let outcome = app.synchronizer.sync().await;
    if outcome.is_connected() {
        (
            StatusCode::OK,
            axum::Json(serde_json::json!({
                "success": true,
                "count": outcome.count,
                "message": "Applications refreshed successfully",
            })),
        )
    } else {
        tracing::warn!(
            connection = ?outcome.connection,
            count = outcome.count,
            "manual application refresh could not reach directory service"
        );
        (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({
                "success": false,
                "error": format!(
                    "directory service unreachable; serving {} applications ({:?})",
                    outcome.count, outcome.connection
                ),
            })),
        )
    }
}
