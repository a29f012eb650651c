// Session gate: requests must carry "Authorization: Bearer <session secret>".

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;

pub(super) async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authenticated = bearer_token(&request)
        .is_some_and(|token| token == state.config.session.secret);
    if !authenticated {
        tracing::debug!(path = %request.uri().path(), "rejected request without valid session");
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "authentication required" })),
        )
            .into_response();
    }
    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}
