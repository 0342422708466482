//! HTTP API: routing, middleware and handlers.

mod error;
mod handlers;
mod middleware;
mod server;
mod state;

pub use error::{ApiError, Message, SuccessResponse};
pub use middleware::{rate_limit_by_address, rate_limit_by_subject, require_auth, AuthUser};
pub use server::HttpServer;
pub use state::AppState;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use handlers::{health, users};

/// Build the application router.
///
/// Registration and login are throttled per client address. Profile routes
/// require a bearer token and are throttled per user.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_by_address));

    // Layers run outermost-last: auth, then the per-user limit.
    let private = Router::new()
        .route(
            "/self/info",
            get(users::get_profile).put(users::update_profile),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit_by_subject))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health-check", get(health::check))
        .nest("/v1", public.merge(private))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
