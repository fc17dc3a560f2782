use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    detection_duration: Histogram<u64>,
    detection_counter: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build prometheus exporter: {}", e))?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("object_detection");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let boundaries = generate_boundaries((10, 100, 500, 2000, 10000));

        let detection_duration = meter
            .u64_histogram("detection_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of detect operations in milliseconds")
            .build();

        let detection_counter = meter
            .u64_counter("detections_total")
            .with_description("Total number of objects detected")
            .build();

        Ok(Metrics {
            request_counter,
            detection_duration,
            detection_counter,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_detection_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.detection_duration.record(duration_ms, &attributes);
    }

    pub fn record_detections(&self, count: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.detection_counter.add(count, &attributes);
    }
}

/// Histogram bucket edges: fine steps for fast detections, coarser ones for
/// the slow tail.
fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 50;
    let end_step: usize = 250;
    let tail_step: usize = 2000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn test_generate_boundaries() {
        let parts = (10, 30, 130, 630, 4630);
        let get = generate_boundaries(parts);
        let expected = vec![
            10.0, 20.0, 30.0, 80.0, 130.0, 380.0, 630.0, 2630.0, 4630.0,
        ];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_are_exported_to_registry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/object_detection");
        metrics.record_detection_duration(42, "/object_detection");
        metrics.record_detections(3, "/object_detection");

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buffer)
            .unwrap();
        let exposition = String::from_utf8(buffer).unwrap();

        assert!(exposition.contains("requests_total"));
        assert!(exposition.contains("detection_duration_ms"));
        assert!(exposition.contains("detections_total"));
    }
}
