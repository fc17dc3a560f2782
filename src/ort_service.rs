use crate::{
    bounding_box::{non_max_suppression, BoundingBox},
    config::{ModelConfig, Validatable},
    model_service::{ModelError, ModelService},
};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayViewD, Axis, Ix3, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thresholds applied to the raw YOLO output.
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    pub input_size: u32,
    pub min_probability: f32,
    pub iou_threshold: f32,
}

impl From<&ModelConfig> for DetectionParams {
    fn from(model_config: &ModelConfig) -> Self {
        Self {
            input_size: model_config.input_size,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
        }
    }
}

fn image_to_tensor(image: &RgbImage, input_size: u32) -> Array<f32, Ix4> {
    let img = image::imageops::resize(image, input_size, input_size, FilterType::CatmullRom);

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Turns a `1 x (4 + classes) x candidates` YOLO output into boxes in the
/// coordinate space of an `img_width x img_height` image.
fn extract_boxes(
    output: ArrayViewD<f32>,
    img_width: u32,
    img_height: u32,
    params: &DetectionParams,
) -> Result<Vec<BoundingBox>, ModelError> {
    let shape = output.shape().to_vec();
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|_| ModelError::OutputShape(format!("expected 3 dimensions, got {:?}", shape)))?;

    if shape[0] != 1 || shape[1] <= 4 {
        return Err(ModelError::OutputShape(format!(
            "expected [1, 4 + classes, candidates], got {:?}",
            shape
        )));
    }

    let (img_width, img_height) = (img_width as f32, img_height as f32);
    let scale_x = img_width / params.input_size as f32;
    let scale_y = img_height / params.input_size as f32;

    let mut boxes = Vec::new();
    let candidates = output.index_axis(Axis(0), 0);

    for candidate in candidates.axis_iter(Axis(1)) {
        let best = candidate
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((class_id, prob)) = best else {
            continue;
        };

        if prob < params.min_probability {
            continue;
        }

        let xc = candidate[0] * scale_x;
        let yc = candidate[1] * scale_y;
        let w = candidate[2] * scale_x;
        let h = candidate[3] * scale_y;

        let bbox = BoundingBox {
            class_id: class_id as u32,
            confidence: prob,
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
        };
        boxes.push(bbox.clamp_to(img_width, img_height));
    }

    Ok(non_max_suppression(boxes, params.iou_threshold))
}

/// ONNX Runtime YOLO detector backed by a round-robin pool of sessions.
pub struct OrtModelService {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    output_name: String,
    params: DetectionParams,
}

impl OrtModelService {
    pub fn new(
        model_config: &ModelConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Mutex::new(session))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            output_name: model_config.output_name.clone(),
            params: DetectionParams::from(model_config),
        })
    }

    fn run_inference(
        &self,
        input: &Array<f32, Ix4>,
    ) -> Result<ndarray::ArrayD<f32>, ModelError> {
        if self.sessions.is_empty() {
            return Err(ModelError::SessionPool);
        }
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index].lock();

        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Tensor(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| ModelError::OutputShape(format!("failed to extract tensor: {}", e)))?
            .into_owned();

        Ok(output)
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, image: &RgbImage) -> Result<Vec<BoundingBox>, ModelError> {
        let input = image_to_tensor(image, self.params.input_size);
        let output = self.run_inference(&input)?;
        extract_boxes(output.view(), image.width(), image.height(), &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::Array3;

    const PARAMS: DetectionParams = DetectionParams {
        input_size: 640,
        min_probability: 0.25,
        iou_threshold: 0.7,
    };

    #[test]
    fn test_image_to_tensor() {
        let img = RgbImage::from_pixel(100, 50, Rgb([255, 0, 0]));

        let input = image_to_tensor(&img, 64);

        assert_eq!(input.shape(), &[1, 3, 64, 64]);
        assert!((input[[0, 0, 10, 10]] - 1.0).abs() < 1e-3);
        assert!(input[[0, 1, 10, 10]].abs() < 1e-3);
        assert!(input[[0, 2, 63, 63]].abs() < 1e-3);
    }

    fn candidate(output: &mut Array3<f32>, index: usize, values: [f32; 6]) {
        for (row, value) in values.into_iter().enumerate() {
            output[[0, row, index]] = value;
        }
    }

    #[test]
    fn test_extract_boxes_scales_thresholds_and_suppresses() {
        // 2 classes, 4 candidates
        let mut output = Array3::<f32>::zeros((1, 6, 4));
        candidate(&mut output, 0, [320., 320., 64., 64., 0.9, 0.1]);
        candidate(&mut output, 1, [322., 322., 64., 64., 0.8, 0.1]);
        candidate(&mut output, 2, [100., 100., 20., 20., 0.05, 0.6]);
        candidate(&mut output, 3, [500., 500., 20., 20., 0.1, 0.2]);

        let boxes = extract_boxes(output.view().into_dyn(), 1280, 320, &PARAMS).unwrap();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert_eq!(boxes[0].confidence, 0.9);
        assert!((boxes[0].x1 - 576.).abs() < 1e-3);
        assert!((boxes[0].x2 - 704.).abs() < 1e-3);
        assert!((boxes[0].y1 - 144.).abs() < 1e-3);
        assert!((boxes[0].y2 - 176.).abs() < 1e-3);
        assert_eq!(boxes[1].class_id, 1);
        assert_eq!(boxes[1].confidence, 0.6);
    }

    #[test]
    fn test_extract_boxes_clamps_to_image() {
        let mut output = Array3::<f32>::zeros((1, 5, 1));
        for (row, value) in [0., 0., 100., 100., 0.99].into_iter().enumerate() {
            output[[0, row, 0]] = value;
        }

        let boxes = extract_boxes(output.view().into_dyn(), 640, 640, &PARAMS).unwrap();

        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].x1, boxes[0].y1), (0., 0.));
        assert_eq!((boxes[0].x2, boxes[0].y2), (50., 50.));
    }

    #[test]
    fn test_extract_boxes_rejects_bad_shapes() {
        let flat = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[84, 8400]));
        assert!(matches!(
            extract_boxes(flat.view(), 640, 640, &PARAMS),
            Err(ModelError::OutputShape(_))
        ));

        let no_classes = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 4, 10]));
        assert!(matches!(
            extract_boxes(no_classes.view(), 640, 640, &PARAMS),
            Err(ModelError::OutputShape(_))
        ));
    }
}
