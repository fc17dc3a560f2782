use crate::{
    bounding_box::Detection,
    inference_service::DetectionReport,
    routes::{
        health::{self, HealthStatus},
        object_detection::{self, ErrorResponse, ObjectDetectionUpload},
    },
};
use std::{fs, path::Path};
use thiserror::Error;
use utoipa::OpenApi;

pub const DOCS_PATH: &str = "/docs";
pub const OPENAPI_PATH: &str = "/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Object Detection API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Detect objects in an uploaded image and store an annotated copy."
    ),
    paths(object_detection::object_detection, health::healthcheck),
    components(schemas(
        DetectionReport,
        Detection,
        ErrorResponse,
        ObjectDetectionUpload,
        HealthStatus
    )),
    tags(
        (name = "detection", description = "Object detection"),
        (name = "service", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Error, Debug)]
pub enum OpenApiError {
    #[error("Failed to serialize OpenAPI document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write OpenAPI document: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the OpenAPI document to `path`, creating parent directories.
pub fn write_openapi(path: &Path) -> Result<(), OpenApiError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let document = ApiDoc::openapi().to_pretty_json()?;
    fs::write(path, document)?;

    tracing::info!("Wrote OpenAPI document to {:?}", path);
    Ok(())
}
