//! API Middleware
//!
//! Caller identity and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Header carrying the caller's user id, set by the upstream identity layer
pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";

/// Request user from X-Request-User-Id header
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub user_id: Uuid,
    pub correlation_id: Uuid,
}

// =========================================================================
// Request user
// =========================================================================

/// Extract the caller's user id into the request extensions.
///
/// Every `/api/v1` route acts on behalf of a user, so the header is required.
pub async fn request_user_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let raw = match headers.get(REQUEST_USER_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Missing X-Request-User-Id header",
                    "error_code": "missing_header"
                })),
            )
                .into_response());
        }
    };

    let user_id = match Uuid::parse_str(raw) {
        Ok(user_id) => user_id,
        Err(_) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid X-Request-User-Id header format",
                    "error_code": "invalid_user_id"
                })),
            )
                .into_response());
        }
    };

    request.extensions_mut().insert(RequestUser {
        user_id,
        correlation_id: correlation_id(&headers),
    });

    Ok(next.run(request).await)
}

/// X-Correlation-Id if it is a valid UUID, otherwise a fresh one
fn correlation_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

// =========================================================================
// Logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = request
        .headers()
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
