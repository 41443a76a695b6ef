use axum::extract::State;
use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::server::AppState;

/// Attaches an `x-request-id` header to every request/response pair,
/// preserving an incoming one.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    res.headers_mut().insert(header_name, req_id_value);

    res
}

/// Bearer-token gate for the admin API.
///
/// Extracts and verifies the token, storing its claims in request
/// extensions. Passes everything through when authentication is disabled
/// in configuration (development mode).
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !state.auth.enabled() {
        return next.run(req).await;
    }

    let auth_header = match req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        Some(header) => header,
        None => {
            tracing::debug!(path = %req.uri().path(), "no Authorization header");
            return unauthorized_response("authentication required");
        }
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) if !t.is_empty() => t,
        _ => {
            return unauthorized_response("invalid Authorization header format");
        }
    };

    match state.auth.verify(token) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, "token verified");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "token verification failed");
            unauthorized_response("invalid or expired token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": message })),
    )
        .into_response()
}
