use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use groupvault_auth::CallerId;
use groupvault_core::UserId;

use crate::context::CallerContext;

/// Header carrying the caller id, set by the upstream identity provider
/// after it has verified the caller.
pub const CALLER_HEADER: &str = "x-caller-id";

pub async fn caller_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let caller = extract_caller(req.headers())?;
    req.extensions_mut().insert(CallerContext::new(caller));
    Ok(next.run(req).await)
}

fn extract_caller(headers: &HeaderMap) -> Result<CallerId, StatusCode> {
    let header = headers
        .get(CALLER_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let raw = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if raw.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    raw.parse::<UserId>()
        .map(CallerId::new)
        .map_err(|_| StatusCode::UNAUTHORIZED)
}
