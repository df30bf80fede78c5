//! Background refresh loop.
//!
//! Each cycle runs the [`SnapshotBuilder`]; a complete snapshot is
//! published, a failed cycle leaves the last good snapshot in place.
//! Cycles repeat on a fixed delay with no backoff until cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::builder::{RefreshError, SnapshotBuilder};
use crate::snapshot::SnapshotStore;

/// Default delay between cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Cycle counters.
#[derive(Debug, Default)]
pub struct PollerStats {
    cycles_ok: AtomicU64,
    cycles_failed: AtomicU64,
}

impl PollerStats {
    pub fn cycles_ok(&self) -> u64 {
        self.cycles_ok.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }
}

/// Drives the builder and owns writes to the snapshot store.
pub struct Poller {
    builder: SnapshotBuilder,
    store: Arc<SnapshotStore>,
    interval: Duration,
    stats: Arc<PollerStats>,
}

impl Poller {
    pub fn new(builder: SnapshotBuilder, store: Arc<SnapshotStore>, interval: Duration) -> Self {
        Self {
            builder,
            store,
            interval,
            stats: Arc::new(PollerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PollerStats> {
        self.stats.clone()
    }

    /// Run a single cycle and publish the result if it succeeded.
    pub async fn poll_once(&self) -> Result<(), RefreshError> {
        match self.builder.build().await {
            Ok(snapshot) => {
                let (sponsors, positions, liquidations) = (
                    snapshot.sponsors.len(),
                    snapshot.positions.len(),
                    snapshot.undisputed_liquidations.len(),
                );
                self.store.publish(snapshot);
                self.stats.cycles_ok.fetch_add(1, Ordering::Relaxed);

                info!(
                    sponsors = sponsors,
                    positions = positions,
                    undisputed_liquidations = liquidations,
                    "EMP snapshot updated"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "EMP snapshot refresh failed, keeping last snapshot");
                Err(e)
            }
        }
    }

    /// Loop until `cancel` fires. An in-flight cycle is dropped on cancel.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Starting EMP poller");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                // failure already logged and counted
                _ = self.poll_once() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(
            cycles_ok = self.stats.cycles_ok(),
            cycles_failed = self.stats.cycles_failed(),
            "EMP poller stopped"
        );
    }

    /// Spawn [`Poller::run`] on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
