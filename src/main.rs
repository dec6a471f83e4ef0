use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use stats_mesh::{cli::Cli, endpoint::Endpoint, merge, peer, server::StatsServer};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    // Collection and merge happen exactly once; every client for the rest
    // of the process lifetime sees this snapshot.
    let tables = peer::collect(&cli.peers)
        .await
        .context("failed to collect peer statistics")?;
    let merged = merge::merge(tables).context("failed to reconcile peer statistics")?;
    info!(
        peers = cli.peers.len(),
        rows = merged.rows.len(),
        "merged peer statistics"
    );
    let snapshot: Arc<str> = Arc::from(merged.serialize());

    let listener = cli
        .listen
        .bind()
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    let server = StatsServer::new(listener, snapshot);
    info!("stats endpoint listening on {}", server.local_endpoint()?);

    let result = server.run_until_ctrl_c().await;

    if let Endpoint::Unix(path) = &cli.listen {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(error = ?err, "failed to remove listen socket {}", path.display());
        }
    }

    result
}
