use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use murmur::api;
use murmur::cli;
use murmur::gossip;
use murmur::membership::{Member, MemberState};
use murmur::transport::UdpTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let settings = cli::Cli::parse().into_settings();
    let api_address = settings.api_addr();

    let listener = |member: &Member, state: MemberState| {
        info!("Membership change: {} is {}", member, state);
    };
    let controller = gossip::controller_for(
        settings,
        Arc::new(UdpTransport::new()),
        Some(Arc::new(listener)),
    )?;
    controller.start().await?;

    let api = api::api(controller.clone()).await?;

    info!("Starting murmur status API on {}", api_address);
    axum::Server::bind(&api_address)
        .serve(api.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
    }
    info!("Shutdown signal received");
}
