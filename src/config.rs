use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
    pub output: OutputConfig,
    pub docs: DocsConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        let path = self.get_path();
        if !path.exists() {
            return Err(format!("File not found: {:?}", path));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_min_probability")]
    pub min_probability: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_min_probability() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_input_size() -> u32 {
    640
}

fn default_output_name() -> String {
    "output0".into()
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_dir: PathBuf,
    pub labels_file: String,
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }
}

/// Where and how annotated images are written.
///
/// Every request gets its own run directory under `project`: `name` for the
/// first run, then `name2`, `name3`, and so on.
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub project: PathBuf,
    pub name: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

fn default_file_name() -> String {
    "image0.jpg".into()
}

fn default_line_width() -> u32 {
    2
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("output.name must not be empty".into());
        }
        if image::ImageFormat::from_path(&self.file_name).is_err() {
            return Err(format!(
                "Unsupported output image format: {}",
                self.file_name
            ));
        }
        match &self.font_file {
            Some(font) if !font.exists() => Err(format!("Font file not found: {:?}", font)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_openapi_file")]
    pub openapi_file: PathBuf,
}

fn default_openapi_file() -> PathBuf {
    PathBuf::from("openapi.json")
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug`, `info` or `warn`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config = config.try_deserialize::<Config>()?;
    config.validate().map_err(config::ConfigError::Message)?;

    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.num_instances == 0 {
            return Err("model.num_instances must be at least 1".into());
        }
        if self.model.input_size == 0 {
            return Err("model.input_size must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.model.min_probability) {
            return Err("model.min_probability must be within [0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.model.iou_threshold) {
            return Err("model.iou_threshold must be within [0, 1]".into());
        }
        self.model.validate()?;
        self.labels.validate()?;
        self.output.validate()?;
        Ok(())
    }
}
