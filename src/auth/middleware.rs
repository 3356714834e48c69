//! Axum middleware guarding the pipeline's one HTTP-reachable entry gate.
//!
//! The real service-to-service + patron-access token verification (scopes
//! like `w:pixie:images:notify:upload:*`) is an external collaborator this
//! crate doesn't own — this middleware is a thin stand-in
//! that checks a single bearer token against the configured secret and
//! nothing more.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Requires `Authorization: Bearer <Config::webhook_bearer_token>` on the
/// request. Used on both the webhook-ingress and placeholder-creation
/// routes.
pub async fn require_webhook_token(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request).ok_or(AppError::Unauthorized)?;
    if token != state.config.webhook_bearer_token {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}
