use crate::{
    annotate::Annotator,
    config::Config,
    inference_service::InferenceService,
    labels::ClassLabels,
    openapi::write_openapi,
    ort_service::OrtModelService,
    run_dir::RunDirectories,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
};
use std::sync::Arc;
use tokio::signal;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let ort_model_service = OrtModelService::new(&config.model)
        .map_err(|e| anyhow::anyhow!("failed to instantiate ort model service: {}", e))?;

    let labels = ClassLabels::from_config(&config.labels).map_err(anyhow::Error::msg)?;
    if labels.is_empty() {
        tracing::warn!("Labels file is empty, detections will be reported by class id");
    } else {
        tracing::info!("Loaded {} class labels", labels.len());
    }

    let annotator = Annotator::from_config(&config.output)?;
    let run_dirs = RunDirectories::new(&config.output.project, &config.output.name);
    tracing::info!("Annotated images will be written under {:?}", run_dirs.project());

    let inference_service = InferenceService::new(
        Arc::new(ort_model_service),
        labels,
        annotator,
        run_dirs,
        config.output.file_name.clone(),
    );

    let metrics = Arc::new(Metrics::new()?);

    // Must exist before the first request is served.
    write_openapi(&config.docs.openapi_file)?;

    let app_state = SharedState {
        inference_service,
        metrics,
    };
    let server = HttpServer::new(app_state, &config.server).await?;
    tracing::info!("Listening on {}", server.local_addr()?);

    let shutdown = async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown")
    };

    server.run(shutdown).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
