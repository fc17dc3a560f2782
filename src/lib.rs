mod annotate;
mod bounding_box;
mod image_decode;
mod inference_service;
mod labels;
mod model_service;
mod openapi;
mod ort_service;
mod routes;
mod run_dir;
mod server;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
