//! Offline-first persistence.
//!
//! The [`OfflineStore`] keeps two records in a key/value medium: the last
//! known [`OfflineSnapshot`] of farm state, and an ordered queue of pending
//! [`Mutation`]s that are replayed against the remote service once the
//! device is online again.
//!
//! # Layout
//!
//! ```text
//! agrigrow_offline_data  ->  OfflineSnapshot (JSON)
//! agrigrow_sync_queue    ->  [Mutation, ...] (JSON, FIFO)
//! ```

use crate::model::{Alert, Crop, Weather};
use crate::sensor::Sensor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

mod file;
mod manager;
mod medium;
mod offline;
mod sqlite;

pub use file::FileStore;
pub use manager::{SnapshotManager, DEFAULT_MAX_ALERTS};
pub use medium::{KvStore, MemoryStore};
pub use offline::{DrainHalt, DrainReport, OfflineStore, StorageUsage};
pub use sqlite::SqliteStore;


/// Storage key of the snapshot record
pub const SNAPSHOT_KEY: &str = "agrigrow_offline_data";

/// Storage key of the mutation queue
pub const QUEUE_KEY: &str = "agrigrow_sync_queue";

/// Last known farm state, readable while offline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSnapshot {
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub crops: Vec<Crop>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub weather: Option<Weather>,
    /// When the snapshot was last saved. Never moves backwards.
    pub last_sync: DateTime<Utc>,
}

impl Default for OfflineSnapshot {
    /// Empty snapshot, last synced at the Unix epoch
    fn default() -> Self {
        Self {
            sensors: Vec::new(),
            crops: Vec::new(),
            alerts: Vec::new(),
            weather: None,
            last_sync: DateTime::<Utc>::default(),
        }
    }
}

/// Fields to replace in the snapshot. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPatch {
    pub sensors: Option<Vec<Sensor>>,
    pub crops: Option<Vec<Crop>>,
    pub alerts: Option<Vec<Alert>>,
    pub weather: Option<Weather>,
}

impl SnapshotPatch {
    pub fn sensors(sensors: Vec<Sensor>) -> Self {
        Self {
            sensors: Some(sensors),
            ..Default::default()
        }
    }

    pub fn with_alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Field-level replace over `snapshot` (no deep merge)
    pub(crate) fn apply_to(self, snapshot: &mut OfflineSnapshot) {
        if let Some(sensors) = self.sensors {
            snapshot.sensors = sensors;
        }
        if let Some(crops) = self.crops {
            snapshot.crops = crops;
        }
        if let Some(alerts) = self.alerts {
            snapshot.alerts = alerts;
        }
        if let Some(weather) = self.weather {
            snapshot.weather = Some(weather);
        }
    }
}

/// Domain operation a mutation replays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    UpdateSensor,
    AddAlert,
    AcknowledgeAlert,
    UpdateCrop,
    DeleteCrop,
}

/// A queued state change. Immutable once enqueued.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    /// UUIDv7 (time-ordered) unless the caller supplied one
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MutationKind,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

/// A mutation before it is enqueued; missing id and timestamp are assigned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MutationKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl MutationDraft {
    pub fn new(kind: MutationKind, payload: Value) -> Self {
        Self {
            id: None,
            kind,
            payload,
            enqueued_at: None,
        }
    }

    pub(crate) fn into_mutation(self, now: DateTime<Utc>) -> Mutation {
        Mutation {
            id: self.id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            kind: self.kind,
            payload: self.payload,
            enqueued_at: self.enqueued_at.unwrap_or(now),
        }
    }
}

/// Offline store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistence medium failed to read or write
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    /// A stored record could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A mutation with this id is already queued
    #[error("mutation '{0}' is already queued")]
    DuplicateMutation(String),

    /// Another drain is already replaying the queue
    #[error("a drain is already in progress")]
    DrainInProgress,
}
