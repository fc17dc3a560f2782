use crate::{bounding_box::Detection, config::OutputConfig, labels::ClassLabels};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use std::path::Path;
use thiserror::Error;

const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to read font file: {0}")]
    FontIo(#[from] std::io::Error),
    #[error("Invalid font file: {0}")]
    InvalidFont(String),
}

/// Draws detections onto an image: a hollow box in the class colour and,
/// when a font is loaded, a filled label tab with `"<label> <confidence>"`.
pub struct Annotator {
    line_width: u32,
    font: Option<FontArc>,
    font_size: f32,
}

impl Annotator {
    pub fn new(line_width: u32, font: Option<FontArc>) -> Self {
        Self {
            line_width: line_width.max(1),
            font,
            font_size: LABEL_FONT_SIZE,
        }
    }

    pub fn from_config(output_cfg: &OutputConfig) -> Result<Self, AnnotateError> {
        let font = match &output_cfg.font_file {
            Some(path) => load_font(path)?,
            None => default_font()?,
        };
        Ok(Self::new(output_cfg.line_width, Some(font)))
    }

    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection], labels: &ClassLabels) {
        for detection in detections {
            let (_, color) = labels.resolve(detection.class_id);
            let color = Rgb(color);

            let x1 = detection.x1.floor() as i32;
            let y1 = detection.y1.floor() as i32;
            let x2 = detection.x2.ceil() as i32;
            let y2 = detection.y2.ceil() as i32;

            self.draw_box(image, (x1, y1, x2, y2), color);

            if let Some(font) = &self.font {
                let label = format!("{} {:.2}", detection.label, detection.confidence);
                self.draw_label(image, font, (x1, y1), &label, color);
            }
        }
    }

    fn draw_box(
        &self,
        image: &mut RgbImage,
        (x1, y1, x2, y2): (i32, i32, i32, i32),
        color: Rgb<u8>,
    ) {
        for t in 0..self.line_width as i32 {
            let width = x2 - x1 - 2 * t;
            let height = y2 - y1 - 2 * t;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, color);
        }
    }

    fn draw_label(
        &self,
        image: &mut RgbImage,
        font: &FontArc,
        (x1, y1): (i32, i32),
        label: &str,
        color: Rgb<u8>,
    ) {
        let scale = PxScale::from(self.font_size);
        let (text_width, text_height) = text_size(scale, font, label);
        let tab_width = text_width as i32 + 2 * LABEL_PADDING;
        let tab_height = text_height as i32 + 2 * LABEL_PADDING;
        if tab_width <= 0 || tab_height <= 0 {
            return;
        }

        // Above the box when it fits, inside the top edge otherwise.
        let tab_y = if y1 - tab_height >= 0 {
            y1 - tab_height
        } else {
            y1.max(0)
        };
        let tab_x = x1.max(0);

        let rect = Rect::at(tab_x, tab_y).of_size(tab_width as u32, tab_height as u32);
        draw_filled_rect_mut(image, rect, color);
        draw_text_mut(
            image,
            LABEL_TEXT_COLOR,
            tab_x + LABEL_PADDING,
            tab_y + LABEL_PADDING,
            scale,
            font,
            label,
        );
    }
}

fn default_font() -> Result<FontArc, AnnotateError> {
    FontArc::try_from_slice(DEFAULT_FONT).map_err(|e| AnnotateError::InvalidFont(e.to_string()))
}

fn load_font(path: &Path) -> Result<FontArc, AnnotateError> {
    let data = std::fs::read(path)?;
    let font =
        FontArc::try_from_vec(data).map_err(|e| AnnotateError::InvalidFont(e.to_string()))?;
    tracing::info!("Loaded label font from {:?}", path);
    Ok(font)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ColorLabel;

    const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

    fn labels() -> ClassLabels {
        ClassLabels::new(vec![ColorLabel {
            label: "person".into(),
            red: 255,
            green: 56,
            blue: 56,
        }])
    }

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            class_id: 0,
            label: "person".into(),
            confidence: 0.9,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_annotate_draws_box_in_class_color() {
        let mut image = RgbImage::from_pixel(100, 100, BACKGROUND);
        let annotator = Annotator::new(2, None);

        annotator.annotate(&mut image, &[detection(10., 10., 50., 60.)], &labels());

        assert_eq!(*image.get_pixel(10, 10), Rgb([255, 56, 56]));
        assert_eq!(*image.get_pixel(11, 30), Rgb([255, 56, 56]));
        assert_eq!(*image.get_pixel(49, 59), Rgb([255, 56, 56]));
        assert_eq!(*image.get_pixel(30, 30), BACKGROUND);
        assert_eq!(*image.get_pixel(12, 30), BACKGROUND);
        assert_eq!(*image.get_pixel(5, 5), BACKGROUND);
    }

    #[test]
    fn test_annotate_unknown_class_uses_fallback_color() {
        let mut image = RgbImage::from_pixel(20, 20, BACKGROUND);
        let annotator = Annotator::new(1, None);
        let mut unknown = detection(2., 2., 10., 10.);
        unknown.class_id = 42;

        annotator.annotate(&mut image, &[unknown], &labels());

        assert_eq!(*image.get_pixel(2, 2), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_annotate_handles_degenerate_and_edge_boxes() {
        let mut image = RgbImage::from_pixel(20, 20, BACKGROUND);
        let annotator = Annotator::new(3, None);

        annotator.annotate(
            &mut image,
            &[detection(5., 5., 5., 5.), detection(0., 0., 20., 20.)],
            &labels(),
        );

        assert_eq!(*image.get_pixel(0, 0), Rgb([255, 56, 56]));
        assert_eq!(*image.get_pixel(19, 19), Rgb([255, 56, 56]));
        assert_eq!(*image.get_pixel(10, 10), BACKGROUND);
    }

    #[test]
    fn test_default_annotator_draws_label_above_box() {
        let dir = tempfile::tempdir().unwrap();
        let output_cfg = OutputConfig {
            project: dir.path().to_path_buf(),
            name: "img".into(),
            file_name: "image0.jpg".into(),
            line_width: 2,
            font_file: None,
        };
        let annotator = Annotator::from_config(&output_cfg).unwrap();
        let mut image = RgbImage::from_pixel(200, 120, BACKGROUND);

        annotator.annotate(&mut image, &[detection(20., 60., 120., 110.)], &labels());

        let label_pixels = (0..60u32)
            .flat_map(|y| (0..200u32).map(move |x| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) != BACKGROUND)
            .count();
        assert!(label_pixels > 0);
        assert_eq!(*image.get_pixel(20, 59), Rgb([255, 56, 56]));
        assert_eq!(*image.get_pixel(190, 10), BACKGROUND);
    }

    #[test]
    fn test_from_config_rejects_invalid_font() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("font.ttf");
        std::fs::write(&font_path, b"not a font").unwrap();

        let output_cfg = OutputConfig {
            project: dir.path().to_path_buf(),
            name: "img".into(),
            file_name: "image0.jpg".into(),
            line_width: 2,
            font_file: Some(font_path),
        };

        assert!(matches!(
            Annotator::from_config(&output_cfg),
            Err(AnnotateError::InvalidFont(_))
        ));
    }
}
