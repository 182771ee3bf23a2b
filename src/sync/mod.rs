//! Replaying queued mutations against the remote service.

use crate::store::{Mutation, OfflineStore, StoreError};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};


/// Reports whether the remote service is reachable
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity toggled by whoever observes the network
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            info!(online, "Connectivity changed");
        }
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// The remote side of a drain.
///
/// `Ok` means the remote has durably accepted the mutation; any error halts
/// the drain with the mutation still queued.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn apply(&self, mutation: &Mutation) -> Result<()>;
}

/// Accepts every mutation and logs it
#[derive(Debug, Default)]
pub struct LoggingRemote;

#[async_trait]
impl RemoteSync for LoggingRemote {
    async fn apply(&self, mutation: &Mutation) -> Result<()> {
        info!(
            mutation_id = %mutation.id,
            kind = ?mutation.kind,
            enqueued_at = %mutation.enqueued_at,
            "Mutation synced"
        );
        Ok(())
    }
}

/// Drain `store` every `period` until the task is cancelled.
///
/// Failures are logged; the next tick tries again.
pub async fn run_sync_loop(
    store: Arc<OfflineStore>,
    remote: Arc<dyn RemoteSync>,
    connectivity: Arc<dyn Connectivity>,
    period: Duration,
    apply_timeout: Duration,
) {
    info!(
        interval_seconds = period.as_secs(),
        apply_timeout_ms = apply_timeout.as_millis() as u64,
        "Starting sync loop"
    );

    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;

        match store
            .drain(remote.as_ref(), connectivity.as_ref(), apply_timeout)
            .await
        {
            Ok(report) => {
                debug!(
                    applied = report.applied,
                    remaining = report.remaining,
                    halted = ?report.halted,
                    "Sync pass complete"
                );
            }
            Err(StoreError::DrainInProgress) => {
                debug!("Drain already running, skipping sync pass");
            }
            Err(e) => {
                error!(error = %e, "Sync pass failed");
            }
        }
    }
}
