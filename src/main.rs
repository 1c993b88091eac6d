use ragingest::config::{self, Config};
use ragingest::pipeline::IngestionPipeline;
use ragingest::service::IngestionService;
use ragingest::{api, logging};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let config = config::load()?;

    let pipeline = Arc::new(IngestionPipeline::from_config(&config)?);
    let service = Arc::new(IngestionService::start(
        config.app_name.clone(),
        pipeline,
        config.worker_count,
        config.queue_capacity,
    )
    .with_job_retention(Duration::from_secs(config.job_retention_secs)));
    let app = api::create_router(service, config.max_upload_bytes);

    let (listener, port) = bind_listener(&config).await?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(config: &Config) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
