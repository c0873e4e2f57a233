use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use htserve::{Cli, Dispatcher, Server, ServerContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cfg = Cli::parse().into_config()?;
    let registry = cfg.load_registry()?;

    if !cfg.document_root.is_dir() {
        warn!(
            root = %cfg.document_root.display(),
            "document root is not a directory; every request will 404"
        );
    }

    let ctx = ServerContext::new(cfg.document_root.clone(), registry, cfg.timeout());
    let dispatcher = Dispatcher::new(Arc::new(ctx), cfg.max_connections);
    let server = Server::bind(&cfg.listen_addr).await?;

    tokio::select! {
        res = server.run(dispatcher) => res?,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    Ok(())
}
