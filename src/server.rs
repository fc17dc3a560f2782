use crate::{
    config::ServerConfig,
    inference_service::InferenceService,
    openapi::{ApiDoc, DOCS_PATH, OPENAPI_PATH},
    routes::api_routes,
    telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct SharedState {
    pub inference_service: InferenceService,
    pub metrics: Arc<Metrics>,
}

/// Every origin, method and header is accepted with credentials. The request
/// values are mirrored back because `*` is not allowed with credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_router(app_state: SharedState, max_upload_bytes: usize) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    Router::new()
        .merge(api_routes())
        .merge(SwaggerUi::new(DOCS_PATH).url(OPENAPI_PATH, ApiDoc::openapi()))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(app_state: SharedState, config: &ServerConfig) -> anyhow::Result<Self> {
        let addr = config.get_address();
        let router = build_router(app_state, config.max_upload_bytes);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}
