use crate::config::{LabelsConfig, Validatable};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const UNKNOWN_COLOR: [u8; 3] = [128, 128, 128];

#[derive(Debug, Clone, PartialEq)]
pub struct ColorLabel {
    pub label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorLabel {
    pub fn rgb(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    class_labels: Vec<ColorLabel>,
}

impl ClassLabels {
    pub fn new(class_labels: Vec<ColorLabel>) -> Self {
        Self { class_labels }
    }

    pub fn from_config(labels_cfg: &LabelsConfig) -> Result<Self, String> {
        match load_yolo_labels(&labels_cfg.get_path()) {
            Ok(labels) => Ok(Self::new(labels)),
            Err(e) => Err(format!("Failed to load labels: {}", e)),
        }
    }

    pub fn len(&self) -> usize {
        self.class_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_labels.is_empty()
    }

    /// Label text and colour for `class_id`, with a neutral fallback for ids
    /// the labels file does not cover.
    pub fn resolve(&self, class_id: u32) -> (String, [u8; 3]) {
        match self.class_labels.get(class_id as usize) {
            Some(color_label) => (color_label.label.clone(), color_label.rgb()),
            None => (format!("class {}", class_id), UNKNOWN_COLOR),
        }
    }
}

/// Reads a labels file with one `label,red,green,blue` entry per line.
/// Blank lines are skipped; the line order defines the class ids.
pub fn load_yolo_labels(filepath: &Path) -> io::Result<Vec<ColorLabel>> {
    let file = File::open(filepath)?;
    parse_labels(io::BufReader::new(file))
}

fn parse_labels(reader: impl BufRead) -> io::Result<Vec<ColorLabel>> {
    let mut color_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        if parts.len() != 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }

        let channel = |value: &str, name: &str| -> io::Result<u8> {
            value.trim().parse().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid {} value in line: {}", name, line),
                )
            })
        };

        color_labels.push(ColorLabel {
            label: parts[0].trim().to_string(),
            red: channel(parts[1], "red")?,
            green: channel(parts[2], "green")?,
            blue: channel(parts[3], "blue")?,
        });
    }

    Ok(color_labels)
}
