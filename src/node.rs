//! One application node: projection, log, coordinator, appliers and the
//! registry facade, wired from a [`NodeConfig`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::applier::{Applier, ApplyStats};
use crate::config::{LogBackend, NodeConfig};
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::log::{FileLog, InMemoryLog, LogTransport};
use crate::registry::Registry;
use crate::store::{SqliteStore, Store};

pub struct Node {
    config: NodeConfig,
    store: Arc<SqliteStore>,
    log: Arc<dyn LogTransport>,
    applier: Arc<Applier>,
    registry: Arc<Registry>,
    tasks: Vec<JoinHandle<()>>,
}

/// Opens the node's projection, creating the data directory and bringing
/// the schema up to date.
pub fn open_store(config: &NodeConfig) -> Result<Arc<SqliteStore>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    Ok(Arc::new(store))
}

pub fn open_log(config: &NodeConfig) -> Result<Arc<dyn LogTransport>> {
    Ok(match config.log_backend {
        LogBackend::Memory => Arc::new(InMemoryLog::new(config.partitions)),
        LogBackend::File => Arc::new(FileLog::open(config.log_dir(), config.partitions)?),
    })
}

/// Applies everything in the node's log that its projection has not seen,
/// without starting a node. Used to rebuild a projection offline.
pub fn replay(config: &NodeConfig) -> Result<ApplyStats> {
    let store = open_store(config)?;
    let log = open_log(config)?;
    Applier::new(store, log).catch_up()
}

impl Node {
    /// Starts a node on the log named by its configuration.
    pub fn start(config: NodeConfig) -> Result<Self> {
        let log = open_log(&config)?;
        Self::start_with_log(config, log)
    }

    /// Starts a node on an existing log, which other nodes may share.
    /// Must be called from within a Tokio runtime.
    pub fn start_with_log(config: NodeConfig, log: Arc<dyn LogTransport>) -> Result<Self> {
        config.validate()?;
        if log.partition_count() != config.partitions {
            return Err(Error::Config(format!(
                "log has {} partitions but the node is configured for {}",
                log.partition_count(),
                config.partitions
            )));
        }

        let store = open_store(&config)?;
        let coordinator = Arc::new(Coordinator::new(
            config.node_id.clone(),
            Arc::clone(&log),
            config.apply_timeout(),
        ));
        let applier = Arc::new(
            Applier::new(store.clone(), Arc::clone(&log))
                .with_coordinator(Arc::clone(&coordinator))
                .with_poll_interval(config.poll_interval()),
        );

        let caught_up = applier.catch_up()?;
        info!(
            node_id = %config.node_id,
            applied = caught_up.applied,
            rejected = caught_up.rejected,
            skipped = caught_up.skipped,
            "projection caught up with log"
        );

        let tasks = applier.spawn();
        let registry = Arc::new(
            Registry::new(store.clone(), coordinator, config.canonical_dedup)
                .with_orphan_grace(config.orphan_grace()),
        );
        info!(node_id = %config.node_id, "node started");

        Ok(Self {
            config,
            store,
            log,
            applier,
            registry,
            tasks,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn log(&self) -> &Arc<dyn LogTransport> {
        &self.log
    }

    /// Records in the log this node has not applied yet.
    pub fn lag(&self) -> Result<u64> {
        self.applier.lag()
    }

    /// Stops the appliers and waits for them to finish.
    pub async fn shutdown(self) {
        self.applier.shutdown();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "applier task failed");
            }
        }
        info!(node_id = %self.config.node_id, "node stopped");
    }
}
