use anyhow::Context;
use clap::Parser;
use eiscp_client::{GatewayBuilder, MetricsSink, NoopMetrics, StatsdMetrics, DEFAULT_FLUSH_INTERVAL};
use eiscp_server::{router, AppState, Args};
use eiscp_transport::DeviceAddress;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    log::info!("Starting eISCP (ethernet Integra Serial Communication Protocol) gateway");
    log::debug!("Displaying debug output");

    let metrics: Arc<dyn MetricsSink> = if args.stats {
        let statsd = StatsdMetrics::connect(&args.statsd, &args.prefix, DEFAULT_FLUSH_INTERVAL)
            .await
            .context("failed to set up stats")?;
        Arc::new(statsd)
    } else {
        Arc::new(NoopMetrics)
    };

    let gateway = GatewayBuilder::new()
        .model(args.model.as_str())
        .metrics(metrics)
        .build()?;

    log::info!("Searching for device on port {} at {}", args.port, args.device);
    gateway
        .controller
        .set_device(DeviceAddress::new(args.device.as_str(), args.port))
        .await;

    let app = router(Arc::new(AppState::new(&gateway)));
    let listener = TcpListener::bind(("0.0.0.0", args.serve))
        .await
        .with_context(|| format!("failed to bind REST port {}", args.serve))?;
    log::info!("REST API listening on port {}", args.serve);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.controller.disconnect().await;
    log::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
