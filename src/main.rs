use skillscope::{api, config, logging, service::AnalysisService};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

// Ports scanned when SERVER_PORT is not set.
const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 4300..=4399;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let service = AnalysisService::from_config().expect("Failed to initialize analysis service");
    let app = api::create_router(Arc::new(service));

    let listener = bind_listener().await.expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Listener has no local address");
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app).await.unwrap();
}

/// Bind the configured port, or scan the fallback range for a free one.
async fn bind_listener() -> Result<TcpListener, std::io::Error> {
    let ports = match config::get_config().server_port {
        Some(port) => port..=port,
        None => FALLBACK_PORTS,
    };

    let mut last_error = None;
    for port in ports {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "No port available")
    }))
}
