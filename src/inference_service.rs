use crate::{
    annotate::Annotator,
    bounding_box::{BoundingBox, Detection},
    labels::ClassLabels,
    model_service::{ModelError, ModelService},
    run_dir::RunDirectories,
};
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Failed to prepare output directory: {0}")]
    Output(#[from] std::io::Error),
    #[error("Failed to save annotated image: {0}")]
    Save(#[from] image::ImageError),
    #[error("Inference worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result of one `detect` call: where the annotated image was written and
/// what was found in it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DetectionReport {
    pub output_path: String,
    pub detections: Vec<Detection>,
}

#[derive(Clone)]
pub struct InferenceService {
    model_service: Arc<dyn ModelService>,
    labels: Arc<ClassLabels>,
    annotator: Arc<Annotator>,
    run_dirs: Arc<RunDirectories>,
    file_name: String,
}

impl InferenceService {
    pub fn new(
        model_service: Arc<dyn ModelService>,
        labels: ClassLabels,
        annotator: Annotator,
        run_dirs: RunDirectories,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            model_service,
            labels: Arc::new(labels),
            annotator: Arc::new(annotator),
            run_dirs: Arc::new(run_dirs),
            file_name: file_name.into(),
        }
    }

    /// Runs detection on the blocking pool and writes the annotated image.
    pub async fn detect(&self, image: RgbImage) -> Result<DetectionReport, InferenceError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.detect_blocking(image)).await?
    }

    pub fn detect_blocking(&self, mut image: RgbImage) -> Result<DetectionReport, InferenceError> {
        let boxes = self.model_service.predict(&image)?;
        let detections: Vec<Detection> = boxes.into_iter().map(|b| self.label(b)).collect();

        tracing::debug!("Found {} detections", detections.len());
        for (i, detection) in detections.iter().enumerate() {
            tracing::debug!(
                "Detection {}: {} ({}), confidence={:.3}, bbox=({:.1}, {:.1}, {:.1}, {:.1})",
                i,
                detection.label,
                detection.class_id,
                detection.confidence,
                detection.x1,
                detection.y1,
                detection.x2,
                detection.y2
            );
        }

        self.annotator.annotate(&mut image, &detections, &self.labels);

        let run_dir = self.run_dirs.allocate()?;
        let output_path = run_dir.join(&self.file_name);
        if let Err(e) = image.save(&output_path) {
            let _ = std::fs::remove_dir_all(&run_dir);
            return Err(e.into());
        }

        tracing::info!("Saved annotated image to {:?}", output_path);

        Ok(DetectionReport {
            output_path: output_path.display().to_string(),
            detections,
        })
    }

    fn label(&self, bbox: BoundingBox) -> Detection {
        let (label, _) = self.labels.resolve(bbox.class_id);
        Detection {
            class_id: bbox.class_id,
            label,
            confidence: bbox.confidence,
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
        }
    }
}
