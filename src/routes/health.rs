use axum::{response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    status: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses((status = 200, description = "Service is up", body = HealthStatus))
)]
pub async fn healthcheck() -> impl IntoResponse {
    Json(HealthStatus {
        status: "Available".into(),
    })
}
