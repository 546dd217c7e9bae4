//! Service wiring and lifecycle
//!
//! Builds the shared services (receiver manager, pipeline, consumer
//! registry, client pool, vault, storage), rehydrates the persisted
//! declaration and runs until a shutdown signal. Only initialization
//! failures exit non-zero; runtime errors are logged by their subsystems.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tstream_config::BootstrapConfig;
use tstream_consumers::ConsumerRegistry;
use tstream_controller::{ConfigWorker, FileStorage, Reconciler, Storage};
use tstream_http::ClientPool;
use tstream_pipeline::{INPUT_CHANNEL_SIZE, Pipeline};
use tstream_sources::ReceiverManager;
use tstream_vault::SecretVault;

/// Build everything and run until SIGINT/SIGTERM
pub async fn run(bootstrap: BootstrapConfig) -> Result<()> {
    let manager = Arc::new(ReceiverManager::new());
    let pipeline = Arc::new(Pipeline::new());
    let pool = Arc::new(ClientPool::new());
    let vault = SecretVault::new();
    let registry = ConsumerRegistry::with_builtins();

    let (records_tx, records_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
    let cancel = CancellationToken::new();
    let pipeline_task = tokio::spawn(Arc::clone(&pipeline).run(records_rx, cancel.clone()));

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&bootstrap.storage.path));
    let reconciler = Reconciler::new(
        Arc::clone(&manager),
        Arc::clone(&pipeline),
        registry,
        pool,
        vault.clone(),
        records_tx,
    );
    let worker = Arc::new(ConfigWorker::new(storage, vault, reconciler));
    worker.set_debug(bootstrap.controls.debug);

    // Rehydrate; a bad or missing blob starts the agent empty
    let outcome = worker
        .load()
        .await
        .context("failed to initialize from stored declaration")?;
    tracing::info!(
        components = outcome.components,
        debug = bootstrap.controls.debug,
        "agent running"
    );

    wait_for_shutdown().await;
    tracing::info!("shutdown signal received, draining");

    worker.shutdown().await;
    cancel.cancel();
    let _ = pipeline_task.await;

    tracing::info!("agent stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut interrupt =
            signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
