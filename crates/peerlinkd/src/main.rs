//! peerlinkd: peer-to-peer chat node.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;

use peerlink_core::config::PeerlinkConfig;
use peerlink_services::{ApprovalPolicy, Frontend};

use peerlinkd::console::{self, ConsoleFrontend};
use peerlinkd::Node;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    if let Err(e) = PeerlinkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = PeerlinkConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PeerlinkConfig::default()
    });

    if let Some(arg) = std::env::args().nth(1) {
        config.node.listen_port = arg
            .parse()
            .with_context(|| format!("invalid port {arg:?}"))?;
    }
    tracing::info!(
        label = %config.node.label,
        port = config.node.listen_port,
        "peerlinkd starting"
    );

    let policy = ApprovalPolicy::from_config(&config.approval);
    if config.approval.auto_accept {
        tracing::warn!("auto-accept enabled, connection requests will not be prompted");
    }
    let (console_frontend, approvals) =
        ConsoleFrontend::new(policy, config.session.handshake_timeout());
    let frontend: Arc<dyn Frontend> = Arc::new(console_frontend);

    let node = Node::start(&config, frontend)
        .await
        .context("failed to start node")?;
    println!("listening as {}", node.local_address());
    println!("{}", console::HELP);

    // ── Wait for exit ────────────────────────────────────────────────────────

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        r = console::run(&node, stdin, approvals) => match r {
            Ok(()) => tracing::info!("console closed"),
            Err(e) => tracing::error!(error = %e, "console failed"),
        },
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
    }

    node.shutdown().await;
    tracing::info!("peerlinkd stopped");
    Ok(())
}
