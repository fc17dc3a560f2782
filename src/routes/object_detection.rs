use crate::{
    image_decode::{decode_image, DecodeError},
    inference_service::{DetectionReport, InferenceError},
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;
use utoipa::ToSchema;

const ROUTE: &str = "/object_detection";
const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum ObjectDetectionError {
    #[error("Missing `file` field in multipart form")]
    MissingFile,
    #[error("Expected a multipart/form-data request: {0}")]
    Rejection(#[from] MultipartRejection),
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Inference(#[from] InferenceError),
}

impl ObjectDetectionError {
    fn status(&self) -> StatusCode {
        match self {
            ObjectDetectionError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ObjectDetectionError::Rejection(e) => e.status(),
            ObjectDetectionError::Multipart(e) => e.status(),
            ObjectDetectionError::Decode(_) => StatusCode::BAD_REQUEST,
            ObjectDetectionError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for ObjectDetectionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Object detection failed: {}", self);
        } else {
            tracing::warn!("Rejected object detection request: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Multipart form accepted by `POST /object_detection`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ObjectDetectionUpload {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/object_detection",
    tag = "detection",
    request_body(content = ObjectDetectionUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Annotated image written to disk", body = DetectionReport),
        (status = 400, description = "Not a multipart form, or not an image", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorResponse),
        (status = 422, description = "No `file` field in the form", body = ErrorResponse),
        (status = 500, description = "Inference or disk write failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn object_detection(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DetectionReport>), ObjectDetectionError> {
    state.metrics.record_request(ROUTE);

    let mut multipart = multipart?;
    let contents = read_file_field(&mut multipart).await?;
    tracing::debug!("Received upload of {} bytes", contents.len());
    let image = decode_image(&contents)?;
    drop(contents);

    let started = Instant::now();
    let report = state.inference_service.detect(image).await?;

    state
        .metrics
        .record_detection_duration(started.elapsed().as_millis() as u64, ROUTE);
    state
        .metrics
        .record_detections(report.detections.len() as u64, ROUTE);

    Ok((StatusCode::CREATED, Json(report)))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ObjectDetectionError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(ObjectDetectionError::MissingFile)
}
