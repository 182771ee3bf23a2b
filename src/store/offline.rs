use super::{
    KvStore, Mutation, MutationDraft, OfflineSnapshot, SnapshotPatch, StoreError, QUEUE_KEY,
    SNAPSHOT_KEY,
};
use crate::sync::{Connectivity, RemoteSync};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a drain stopped before emptying its batch
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum DrainHalt {
    /// Connectivity reported offline; nothing was attempted
    Offline,
    /// The remote refused this mutation
    Rejected { mutation_id: String, reason: String },
    /// The remote did not answer within the timeout
    TimedOut { mutation_id: String },
}

/// Outcome of one drain pass
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrainReport {
    /// Mutations accepted by the remote and removed from the queue
    pub applied: usize,
    /// Mutations still queued after the pass
    pub remaining: usize,
    pub halted: Option<DrainHalt>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

/// Bytes held by each record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub snapshot_bytes: usize,
    pub queue_bytes: usize,
}

impl StorageUsage {
    pub fn total(&self) -> usize {
        self.snapshot_bytes + self.queue_bytes
    }
}

/// Snapshot and mutation queue on top of a [`KvStore`].
///
/// - Snapshot saves are read-merge-write under a write lock; readers take the
///   read lock, so nobody sees a half-applied patch.
/// - Enqueue and queue removal serialize on one mutex, so appends keep
///   arrival order.
/// - Only one drain runs at a time.
pub struct OfflineStore {
    medium: Arc<dyn KvStore>,
    snapshot_lock: RwLock<()>,
    queue_lock: Mutex<()>,
    drain_guard: tokio::sync::Mutex<()>,
}

impl OfflineStore {
    pub fn new(medium: Arc<dyn KvStore>) -> Self {
        Self {
            medium,
            snapshot_lock: RwLock::new(()),
            queue_lock: Mutex::new(()),
            drain_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the given fields of the snapshot and stamp `last_sync`.
    ///
    /// If persisting fails the previous snapshot stays authoritative.
    pub fn save_snapshot(&self, patch: SnapshotPatch) -> Result<OfflineSnapshot, StoreError> {
        let _guard = self.snapshot_lock.write().unwrap();

        let mut snapshot = self.read_snapshot()?;
        patch.apply_to(&mut snapshot);
        snapshot.last_sync = snapshot.last_sync.max(Utc::now());

        let bytes = serde_json::to_vec(&snapshot)?;
        self.medium
            .set(SNAPSHOT_KEY, &bytes)
            .map_err(StoreError::Storage)?;

        debug!(
            sensors = snapshot.sensors.len(),
            alerts = snapshot.alerts.len(),
            last_sync = %snapshot.last_sync,
            "Snapshot saved"
        );

        Ok(snapshot)
    }

    /// Last saved snapshot, or an empty one synced at the epoch.
    pub fn load_snapshot(&self) -> Result<OfflineSnapshot, StoreError> {
        let _guard = self.snapshot_lock.read().unwrap();
        self.read_snapshot()
    }

    fn read_snapshot(&self) -> Result<OfflineSnapshot, StoreError> {
        match self.medium.get(SNAPSHOT_KEY).map_err(StoreError::Storage)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(OfflineSnapshot::default()),
        }
    }

    /// Append a mutation to the tail of the queue.
    ///
    /// Assigns a UUIDv7 id and the current time when the draft has none.
    /// Fails with [`StoreError::DuplicateMutation`] if the id is already
    /// queued.
    pub fn enqueue(&self, draft: MutationDraft) -> Result<Mutation, StoreError> {
        let mutation = draft.into_mutation(Utc::now());

        let _guard = self.queue_lock.lock().unwrap();
        let mut queue = self.read_queue()?;
        if queue.iter().any(|m| m.id == mutation.id) {
            warn!(mutation_id = %mutation.id, "Rejected mutation with a queued id");
            return Err(StoreError::DuplicateMutation(mutation.id));
        }
        queue.push(mutation.clone());
        self.write_queue(&queue)?;

        debug!(
            mutation_id = %mutation.id,
            kind = ?mutation.kind,
            queued = queue.len(),
            "Mutation enqueued"
        );

        Ok(mutation)
    }

    /// Queued mutations, oldest first
    pub fn pending(&self) -> Result<Vec<Mutation>, StoreError> {
        let _guard = self.queue_lock.lock().unwrap();
        self.read_queue()
    }

    fn read_queue(&self) -> Result<Vec<Mutation>, StoreError> {
        match self.medium.get(QUEUE_KEY).map_err(StoreError::Storage)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_queue(&self, queue: &[Mutation]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(queue)?;
        self.medium.set(QUEUE_KEY, &bytes).map_err(StoreError::Storage)
    }

    /// Drop one mutation the remote has accepted.
    ///
    /// Matches the whole record, so a mutation queued later under the same id
    /// (after a `clear_queue`) is left alone.
    fn remove_applied(&self, applied: &Mutation) -> Result<(), StoreError> {
        let _guard = self.queue_lock.lock().unwrap();
        let mut queue = self.read_queue()?;

        match queue.iter().position(|m| m == applied) {
            Some(index) => {
                queue.remove(index);
                self.write_queue(&queue)
            }
            None => {
                warn!(mutation_id = %applied.id, "Applied mutation no longer queued");
                Ok(())
            }
        }
    }

    /// Replay queued mutations against `remote`, oldest first.
    ///
    /// The batch is the queue as it stands when the drain starts; mutations
    /// enqueued meanwhile wait for the next drain. Each mutation is removed
    /// only after `remote` accepts it. The first rejection or timeout halts
    /// the pass and leaves that mutation and everything after it queued.
    ///
    /// Returns `Err` only when the store itself fails, or when another drain
    /// is already running.
    pub async fn drain<R, C>(
        &self,
        remote: &R,
        connectivity: &C,
        apply_timeout: Duration,
    ) -> Result<DrainReport, StoreError>
    where
        R: RemoteSync + ?Sized,
        C: Connectivity + ?Sized,
    {
        let _flight = self
            .drain_guard
            .try_lock()
            .map_err(|_| StoreError::DrainInProgress)?;

        if !connectivity.is_online() {
            let remaining = self.pending()?.len();
            debug!(remaining, "Offline, skipping drain");
            return Ok(DrainReport {
                applied: 0,
                remaining,
                halted: Some(DrainHalt::Offline),
            });
        }

        let batch = self.pending()?;
        let mut applied = 0;
        let mut halted = None;

        for mutation in &batch {
            match tokio::time::timeout(apply_timeout, remote.apply(mutation)).await {
                Ok(Ok(())) => {
                    self.remove_applied(mutation)?;
                    applied += 1;
                }
                Ok(Err(e)) => {
                    warn!(
                        mutation_id = %mutation.id,
                        kind = ?mutation.kind,
                        error = %e,
                        "Remote rejected mutation, halting drain"
                    );
                    halted = Some(DrainHalt::Rejected {
                        mutation_id: mutation.id.clone(),
                        reason: format!("{:#}", e),
                    });
                    break;
                }
                Err(_) => {
                    warn!(
                        mutation_id = %mutation.id,
                        timeout_ms = apply_timeout.as_millis() as u64,
                        "Remote apply timed out, halting drain"
                    );
                    halted = Some(DrainHalt::TimedOut {
                        mutation_id: mutation.id.clone(),
                    });
                    break;
                }
            }
        }

        let remaining = self.pending()?.len();
        if applied > 0 || halted.is_some() {
            info!(applied, remaining, halted = halted.is_some(), "Drain finished");
        }

        Ok(DrainReport {
            applied,
            remaining,
            halted,
        })
    }

    /// Drop every queued mutation. Only call once the remote has them all.
    pub fn clear_queue(&self) -> Result<(), StoreError> {
        let _guard = self.queue_lock.lock().unwrap();
        self.medium.remove(QUEUE_KEY).map_err(StoreError::Storage)?;
        info!("Sync queue cleared");
        Ok(())
    }

    /// Drop the snapshot and the queue
    pub fn clear(&self) -> Result<(), StoreError> {
        let _snapshot = self.snapshot_lock.write().unwrap();
        let _queue = self.queue_lock.lock().unwrap();
        self.medium
            .remove(SNAPSHOT_KEY)
            .map_err(StoreError::Storage)?;
        self.medium.remove(QUEUE_KEY).map_err(StoreError::Storage)?;
        info!("Offline data cleared");
        Ok(())
    }

    pub fn storage_usage(&self) -> Result<StorageUsage, StoreError> {
        let snapshot_bytes = {
            let _guard = self.snapshot_lock.read().unwrap();
            self.medium
                .get(SNAPSHOT_KEY)
                .map_err(StoreError::Storage)?
                .map_or(0, |b| b.len())
        };
        let queue_bytes = {
            let _guard = self.queue_lock.lock().unwrap();
            self.medium
                .get(QUEUE_KEY)
                .map_err(StoreError::Storage)?
                .map_or(0, |b| b.len())
        };
        Ok(StorageUsage {
            snapshot_bytes,
            queue_bytes,
        })
    }
}
