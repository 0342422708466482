//! Authentication and rate limiting middleware.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error, warn};

use super::error::ApiError;
use super::state::AppState;
use crate::config::StoreFailureMode;
use crate::ratelimit::{KeyStrategy, Policy};

/// The authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// Reject requests without a valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.tokens.verify(token).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
    });
    Ok(next.run(req).await)
}

/// Throttle by the caller's network address.
pub async fn rate_limit_by_address(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .ok_or_else(|| ApiError::Internal("client address unavailable".to_string()))?;

    let subject = KeyStrategy::address_subject(addr);
    enforce(&state, KeyStrategy::ByAddress, &state.policies.by_address, &subject, req, next).await
}

/// Throttle by the authenticated user. Must run after [`require_auth`].
pub async fn rate_limit_by_subject(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let subject = req
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.user_id.clone())
        .ok_or(ApiError::Unauthorized)?;

    enforce(&state, KeyStrategy::BySubject, &state.policies.by_subject, &subject, req, next).await
}

async fn enforce(
    state: &AppState,
    strategy: KeyStrategy,
    policy: &Policy,
    subject: &str,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.admission.admit(policy, subject).await {
        Ok(decision) if decision.allowed => Ok(next.run(req).await),
        Ok(decision) => {
            debug!(
                strategy = strategy.as_str(),
                subject = %subject,
                path = %req.uri().path(),
                "Request throttled"
            );
            Err(ApiError::TooManyRequests(
                decision.reason.unwrap_or(crate::ratelimit::LIMIT_EXCEEDED_REASON),
            ))
        }
        Err(e) => match state.on_store_error {
            StoreFailureMode::Deny => {
                error!(strategy = strategy.as_str(), error = %e, "Rate limit check failed, denying");
                Err(ApiError::Unavailable)
            }
            StoreFailureMode::Allow => {
                warn!(strategy = strategy.as_str(), error = %e, "Rate limit check failed, allowing");
                Ok(next.run(req).await)
            }
        },
    }
}
