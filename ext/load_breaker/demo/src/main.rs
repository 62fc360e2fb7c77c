use anyhow::Result;
use load_breaker::{CircuitBreaker, TokioScheduler};
use load_breaker_demo::{app, config::DemoConfig};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_target(true)
        .compact()
        .init();

    let cfg = DemoConfig::load()?;
    info!(
        breaker = %cfg.breaker.name,
        upper_threshold = cfg.breaker.upper_threshold,
        trip_threshold = cfg.breaker.trip_threshold,
        "loaded config"
    );

    let breaker = CircuitBreaker::builder(cfg.breaker.name.clone())
        .config(cfg.breaker.to_config())
        .on_maximum_trips(|name| {
            warn!(breaker = name, "maximum trips reached, POST /cap-reset to recover");
        })
        .scheduler(Arc::new(TokioScheduler::new()))
        .build();

    let addr: SocketAddr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port).parse()?;
    info!("listening on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app::router(breaker))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {:?}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
