//! Application orchestrator: recovers the store, then serves it.

use std::path::Path;
use std::sync::Arc;

use segstore_engine::{SessionRegistry, StoreManager};
use segstore_server::{ServerConfig, StoreServer};

use crate::config::Config;
use crate::handler::StoreHandler;

/// Runs the service until Ctrl-C or a fatal server error.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // -- Store recovery (must finish before any request is accepted) --
    let manager = open_store(Path::new(&config.storage_dir))?;

    // -- WS server --
    let service_id = config
        .service_unique_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(%service_id, "service identity");

    let server_config = ServerConfig {
        bind_address: config.bind_ip()?,
        port: config.port,
    };
    let server = StoreServer::new(server_config, StoreHandler::new(manager, service_id));
    let server_run = Arc::clone(&server);
    let mut server_task = tokio::spawn(async move { server_run.run().await });

    // -- Main loop: wait for shutdown --
    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    // -- Graceful shutdown --
    server.shutdown();
    server_task.await??;
    Ok(())
}

/// Opens the store at `storage_dir` and purges transfers left over from a
/// previous run.
pub fn open_store(storage_dir: &Path) -> anyhow::Result<StoreManager> {
    let registry = Arc::new(SessionRegistry::open(storage_dir)?);
    let purged = registry.sweep_orphans()?;
    if purged.is_empty() {
        tracing::info!(storage_dir = %storage_dir.display(), "store opened, nothing to recover");
    } else {
        tracing::warn!(
            storage_dir = %storage_dir.display(),
            purged = purged.len(),
            "store opened, purged interrupted transfers"
        );
    }
    Ok(StoreManager::new(registry))
}
