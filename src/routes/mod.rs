// HTTP routes

mod auth;
mod http;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::registry::RegistrySynchronizer;
use crate::state::SharedState;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) state: Arc<SharedState>,
    pub(crate) synchronizer: Arc<RegistrySynchronizer>,
    pub(crate) config: Arc<AppConfig>,
}

pub fn app(
    state: Arc<SharedState>,
    synchronizer: Arc<RegistrySynchronizer>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        state,
        synchronizer,
        config: Arc::new(config),
    };
    let gated = Router::new()
        .route("/api/system", get(http::system_handler)) // GET /api/system
        .route("/api/applications", get(http::applications_handler)) // GET /api/applications
        .route(
            "/api/applications/refresh",
            post(http::refresh_applications_handler),
        ) // POST /api/applications/refresh
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));
    Router::new()
        .route("/api/health", get(http::health_handler)) // GET /api/health
        .route("/version", get(http::version_handler)) // GET /version
        .merge(gated)
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
