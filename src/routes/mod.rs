mod docs;
pub(crate) mod health;
mod metrics;
pub(crate) mod object_detection;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(docs::redirect_to_docs))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route(
            "/object_detection",
            post(object_detection::object_detection),
        )
}
