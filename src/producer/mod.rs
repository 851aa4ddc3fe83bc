//! Producer (C3): the HTTP gateway that negotiates terms, challenges unpaid
//! requests, verifies payments through the orchestrator, and sells trust scores.

pub mod handlers;
pub mod product;
pub mod rate_limit;
pub mod state;

pub use state::ProducerState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::analytics::AnalyticsProvider;
use crate::middleware::request_logging;

pub fn router<P: AnalyticsProvider + 'static>(state: ProducerState<P>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/products", get(handlers::list_products::<P>))
        .route("/ap2/negotiate", post(handlers::negotiate::<P>))
        .route("/trustscore/:account_id", get(handlers::get_trustscore::<P>))
        .with_state(state)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}
