//! API layer -- axum routes, handlers, and middleware.

pub mod error;
mod routes;
pub mod state;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use self::state::AppState;

/// Build the application router with all API routes.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .fallback(fallback)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %Uuid::new_v4(),
            )
        }))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
