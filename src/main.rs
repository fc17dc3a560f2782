use object_detection::{config, start_app};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::get_configuration()?;
    let log_level = &format!(
        "{},ort=warn,tower_http={}",
        config.log_level.as_str(),
        config.log_level.as_str()
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_level(true))
        .init();

    if let Err(e) = start_app(config).await {
        tracing::error!("Service failed: {:#}", e);
        return Err(e.into());
    }

    Ok(())
}
