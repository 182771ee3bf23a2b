use super::{MutationDraft, MutationKind, OfflineSnapshot, OfflineStore, SnapshotPatch, StoreError};
use crate::model::Alert;
use crate::sensor::{SensorReading, SensorRegistry};
use crate::weather::WeatherSource;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Alerts kept when no cap is configured
pub const DEFAULT_MAX_ALERTS: usize = 100;

/// Folds live sensor state into the offline snapshot.
///
/// Every `period` the registry's sensors (plus weather, when a source is
/// attached) are saved. Readings that escalate a sensor's status become
/// alerts, which are added to the snapshot and queued as `ADD_ALERT`. Only
/// the newest `max_alerts` alerts are kept.
pub struct SnapshotManager {
    registry: Arc<SensorRegistry>,
    store: Arc<OfflineStore>,
    weather: Option<Arc<dyn WeatherSource>>,
    period: Duration,
    max_alerts: usize,
    alerts: Mutex<Vec<Alert>>,
}

impl SnapshotManager {
    pub fn new(registry: Arc<SensorRegistry>, store: Arc<OfflineStore>, period: Duration) -> Self {
        Self {
            registry,
            store,
            weather: None,
            period,
            max_alerts: DEFAULT_MAX_ALERTS,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_max_alerts(mut self, max_alerts: usize) -> Self {
        self.max_alerts = max_alerts;
        self
    }

    /// Run until the task is cancelled.
    pub async fn run(&self) {
        info!(
            interval_seconds = self.period.as_secs(),
            sensors = self.registry.len(),
            max_alerts = self.max_alerts,
            "Starting snapshot manager"
        );

        if let Err(e) = self.restore() {
            error!(error = %e, "Failed to load previous alerts");
        }

        let mut readings = self.registry.subscribe();
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.save() {
                        error!(error = %e, "Failed to save offline snapshot");
                    }
                }
                result = readings.recv() => match result {
                    Ok(reading) => {
                        if let Err(e) = self.record_reading(&reading) {
                            error!(
                                sensor_id = %reading.sensor.id,
                                error = %e,
                                "Failed to record sensor alert"
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Snapshot manager lagged behind sensor readings");
                    }
                    Err(RecvError::Closed) => {
                        info!("Sensor reading channel closed, stopping snapshot manager");
                        return;
                    }
                },
            }
        }
    }

    /// Load alerts from the last saved snapshot, keeping the newest
    /// `max_alerts`.
    pub fn restore(&self) -> Result<usize, StoreError> {
        let mut saved = self.store.load_snapshot()?.alerts;
        truncate_oldest(&mut saved, self.max_alerts);

        let count = saved.len();
        *self.alerts.lock().unwrap() = saved;
        debug!(alerts = count, "Restored alerts from snapshot");
        Ok(count)
    }

    /// Save current sensors, alerts and weather.
    pub fn save(&self) -> Result<OfflineSnapshot, StoreError> {
        let alerts = self.alerts.lock().unwrap().clone();
        let mut patch = SnapshotPatch::sensors(self.registry.list_all()).with_alerts(alerts);
        if let Some(weather) = &self.weather {
            patch = patch.with_weather(weather.current());
        }

        let snapshot = self.store.save_snapshot(patch)?;
        debug!(
            sensors = snapshot.sensors.len(),
            alerts = snapshot.alerts.len(),
            "Offline snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Turn an escalating reading into an alert.
    ///
    /// Returns the alert when one was raised. A reading whose alert title
    /// matches one still unacknowledged raises nothing, so a sensor that
    /// keeps crossing the same threshold queues a single `ADD_ALERT`.
    pub fn record_reading(&self, reading: &SensorReading) -> Result<Option<Alert>, StoreError> {
        let Some(alert) = Alert::from_escalation(reading) else {
            return Ok(None);
        };

        let mut alerts = self.alerts.lock().unwrap();
        if alerts
            .iter()
            .any(|a| !a.acknowledged && a.title == alert.title)
        {
            debug!(
                sensor_id = %reading.sensor.id,
                title = %alert.title,
                "Alert already open, not raising again"
            );
            return Ok(None);
        }

        let payload = serde_json::to_value(&alert)?;
        self.store
            .enqueue(MutationDraft::new(MutationKind::AddAlert, payload))?;

        alerts.push(alert.clone());
        let dropped = truncate_oldest(&mut alerts, self.max_alerts);
        if dropped > 0 {
            debug!(dropped, kept = alerts.len(), "Dropped oldest alerts");
        }

        self.store.save_snapshot(SnapshotPatch {
            alerts: Some(alerts.clone()),
            ..Default::default()
        })?;

        info!(
            sensor_id = %reading.sensor.id,
            alert_id = %alert.id,
            severity = ?alert.severity,
            title = %alert.title,
            "Sensor alert raised"
        );

        Ok(Some(alert))
    }

    /// Mark an alert acknowledged and queue `ACKNOWLEDGE_ALERT`.
    ///
    /// Returns `None` for an unknown id. Acknowledging twice queues nothing
    /// the second time.
    pub fn acknowledge(&self, alert_id: &str) -> Result<Option<Alert>, StoreError> {
        let mut alerts = self.alerts.lock().unwrap();
        let Some(index) = alerts.iter().position(|a| a.id == alert_id) else {
            return Ok(None);
        };
        if alerts[index].acknowledged {
            return Ok(Some(alerts[index].clone()));
        }

        self.store.enqueue(MutationDraft::new(
            MutationKind::AcknowledgeAlert,
            json!({ "alertId": alert_id }),
        ))?;

        alerts[index].acknowledged = true;
        self.store.save_snapshot(SnapshotPatch {
            alerts: Some(alerts.clone()),
            ..Default::default()
        })?;

        info!(alert_id = %alert_id, "Alert acknowledged");
        Ok(Some(alerts[index].clone()))
    }

    /// Alerts kept so far, oldest first
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

/// Drop from the front until at most `max` remain; returns how many went.
fn truncate_oldest(alerts: &mut Vec<Alert>, max: usize) -> usize {
    let excess = alerts.len().saturating_sub(max);
    alerts.drain(..excess);
    excess
}
