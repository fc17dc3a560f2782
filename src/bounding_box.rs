use serde::Serialize;
use utoipa::ToSchema;

/// A raw detector box in pixel coordinates of the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.) * (self.y2 - self.y1).max(0.)
    }

    pub fn clamp_to(self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0., width),
            y1: self.y1.clamp(0., height),
            x2: self.x2.clamp(0., width),
            y2: self.y2.clamp(0., height),
            ..self
        }
    }
}

fn intersection(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    let w = box1.x2.min(box2.x2) - box1.x1.max(box2.x1);
    let h = box1.y2.min(box2.y2) - box1.y1.max(box2.y1);
    w.max(0.) * h.max(0.)
}

fn union(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    box1.area() + box2.area() - intersection(box1, box2)
}

pub fn iou(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    let union = union(box1, box2);
    if union <= 0. {
        return 0.;
    }
    intersection(box1, box2) / union
}

/// Greedy per-class non-maximum suppression.
///
/// Returns the kept boxes sorted by descending confidence. Boxes of different
/// classes never suppress each other.
pub fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));

    let mut result: Vec<BoundingBox> = Vec::new();
    for candidate in boxes {
        let suppressed = result.iter().any(|kept| {
            kept.class_id == candidate.class_id && iou(kept, &candidate) > iou_threshold
        });
        if !suppressed {
            result.push(candidate);
        }
    }

    result
}

/// A detection with its class label resolved, as returned to HTTP clients.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(class_id: u32, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox {
            class_id,
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_iou() {
        let a = bbox(0, 0.9, 0., 0., 10., 10.);
        let b = bbox(0, 0.8, 5., 0., 15., 10.);
        let c = bbox(0, 0.8, 20., 20., 30., 30.);

        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert!((iou(&a, &b) - 50. / 150.).abs() < 1e-6);
        assert_eq!(iou(&a, &c), 0.);
    }

    #[test]
    fn test_iou_of_degenerate_boxes_is_zero() {
        let a = bbox(0, 0.9, 5., 5., 5., 5.);
        assert_eq!(iou(&a, &a), 0.);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping_cluster() {
        let boxes = vec![
            bbox(1, 0.6, 1., 1., 11., 11.),
            bbox(1, 0.9, 0., 0., 10., 10.),
            bbox(1, 0.7, 50., 50., 60., 60.),
        ];

        let kept = non_max_suppression(boxes, 0.5);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn test_nms_keeps_box_at_exact_threshold() {
        // iou of these two boxes is exactly 0.5
        let boxes = vec![
            bbox(0, 0.9, 0., 0., 30., 10.),
            bbox(0, 0.8, 10., 0., 40., 10.),
        ];

        assert_eq!(non_max_suppression(boxes.clone(), 0.5).len(), 2);
        assert_eq!(non_max_suppression(boxes, 0.49).len(), 1);
    }

    #[test]
    fn test_nms_is_class_aware() {
        let boxes = vec![
            bbox(0, 0.9, 0., 0., 10., 10.),
            bbox(2, 0.8, 0., 0., 10., 10.),
        ];

        let kept = non_max_suppression(boxes, 0.5);

        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_clamp_to_image() {
        let clamped = bbox(0, 0.5, -4., -2., 120., 50.).clamp_to(100., 80.);
        assert_eq!(clamped, bbox(0, 0.5, 0., 0., 100., 50.));
    }
}
