//! Virtual field sensors.
//!
//! A [`SensorRegistry`] owns one [`Sensor`] per configured entry and is the
//! only place sensor values change. The [`Simulator`] drives it: each sensor
//! gets its own randomized schedule, and every firing becomes one tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod registry;
mod simulator;

pub use registry::SensorRegistry;
pub use simulator::{Simulator, SimulatorConfig};


/// Kind of physical quantity a sensor measures.
///
/// Kinds outside the known set are kept as `Other` so a misconfigured sensor
/// still ticks (raw drift, no clamping, always `normal`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorKind {
    SoilMoisture,
    Ph,
    Humidity,
    Temperature,
    Light,
    Other(String),
}

impl SensorKind {
    pub fn as_str(&self) -> &str {
        match self {
            SensorKind::SoilMoisture => "soil_moisture",
            SensorKind::Ph => "ph",
            SensorKind::Humidity => "humidity",
            SensorKind::Temperature => "temperature",
            SensorKind::Light => "light",
            SensorKind::Other(name) => name,
        }
    }

    /// Physical range a simulated value is clamped to.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            SensorKind::Temperature => Some(Bounds::new(10.0, 40.0)),
            SensorKind::Humidity => Some(Bounds::new(30.0, 95.0)),
            SensorKind::SoilMoisture => Some(Bounds::new(20.0, 80.0)),
            SensorKind::Ph => Some(Bounds::new(5.0, 8.0)),
            SensorKind::Light => Some(Bounds::new(5000.0, 60000.0)),
            SensorKind::Other(_) => None,
        }
    }
}

impl From<&str> for SensorKind {
    fn from(s: &str) -> Self {
        match s {
            "soil_moisture" => SensorKind::SoilMoisture,
            "ph" => SensorKind::Ph,
            "humidity" => SensorKind::Humidity,
            "temperature" => SensorKind::Temperature,
            "light" => SensorKind::Light,
            other => SensorKind::Other(other.to_string()),
        }
    }
}

impl From<String> for SensorKind {
    fn from(s: String) -> Self {
        SensorKind::from(s.as_str())
    }
}

impl From<SensorKind> for String {
    fn from(kind: SensorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive value range for a sensor kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Health of a reading. Ordered from best to worst.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Normal,
    Warning,
    Critical,
}

impl Default for SensorStatus {
    fn default() -> Self {
        SensorStatus::Normal
    }
}

/// Classify a value for its kind. Depends on nothing but the arguments.
///
/// Only soil moisture, temperature and pH have thresholds; everything else
/// is `Normal`.
pub fn classify(kind: &SensorKind, value: f64) -> SensorStatus {
    match kind {
        SensorKind::SoilMoisture => {
            if value < 30.0 {
                SensorStatus::Critical
            } else if value < 40.0 {
                SensorStatus::Warning
            } else {
                SensorStatus::Normal
            }
        }
        SensorKind::Temperature => {
            if value > 35.0 || value < 15.0 {
                SensorStatus::Critical
            } else if value > 30.0 || value < 18.0 {
                SensorStatus::Warning
            } else {
                SensorStatus::Normal
            }
        }
        SensorKind::Ph => {
            if value < 5.5 || value > 7.5 {
                SensorStatus::Critical
            } else if value < 6.0 || value > 7.0 {
                SensorStatus::Warning
            } else {
                SensorStatus::Normal
            }
        }
        SensorKind::Humidity | SensorKind::Light | SensorKind::Other(_) => SensorStatus::Normal,
    }
}

/// One entry of the sensor configuration list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub id: String,
    pub kind: SensorKind,
    pub location: String,
    pub base_value: f64,
    pub variance: f64,
    pub unit: String,
}

impl SensorConfig {
    pub fn new(
        id: &str,
        kind: SensorKind,
        location: &str,
        base_value: f64,
        variance: f64,
        unit: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            location: location.to_string(),
            base_value,
            variance,
            unit: unit.to_string(),
        }
    }
}

/// Sensors deployed on the demo farm (two fields).
pub fn default_sensor_configs() -> Vec<SensorConfig> {
    vec![
        SensorConfig::new("temp_01", SensorKind::Temperature, "Field A", 25.0, 5.0, "°C"),
        SensorConfig::new("humid_01", SensorKind::Humidity, "Field A", 65.0, 15.0, "%"),
        SensorConfig::new("soil_01", SensorKind::SoilMoisture, "Field A", 45.0, 10.0, "%"),
        SensorConfig::new("ph_01", SensorKind::Ph, "Field A", 6.5, 0.5, "pH"),
        SensorConfig::new("light_01", SensorKind::Light, "Field A", 30000.0, 10000.0, "lux"),
        SensorConfig::new("temp_02", SensorKind::Temperature, "Field B", 23.0, 4.0, "°C"),
        SensorConfig::new("humid_02", SensorKind::Humidity, "Field B", 70.0, 12.0, "%"),
        SensorConfig::new("soil_02", SensorKind::SoilMoisture, "Field B", 55.0, 8.0, "%"),
    ]
}

/// A virtual sensor and its latest reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: String,
    pub kind: SensorKind,
    pub location: String,
    pub value: f64,
    pub unit: String,
    pub status: SensorStatus,
    pub updated_at: DateTime<Utc>,
    /// Drift scale; a tick moves the value by at most a tenth of this.
    pub variance: f64,
}

impl Sensor {
    pub(crate) fn from_config(config: &SensorConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: config.id.clone(),
            kind: config.kind.clone(),
            location: config.location.clone(),
            value: config.base_value,
            unit: config.unit.clone(),
            status: SensorStatus::Normal,
            updated_at: now,
            variance: config.variance,
        }
    }

    /// Apply one tick with the given trend in `[-1, 1]`.
    ///
    /// Returns false when the kind has no bounds; the raw delta is still
    /// applied and the status is left as is.
    pub(crate) fn advance(&mut self, trend: f64, now: DateTime<Utc>) -> bool {
        let delta = trend.clamp(-1.0, 1.0) * (self.variance * 0.1);
        self.updated_at = now;

        match self.kind.bounds() {
            Some(bounds) => {
                self.value = bounds.clamp(self.value + delta);
                self.status = classify(&self.kind, self.value);
                true
            }
            None => {
                self.value += delta;
                false
            }
        }
    }
}

/// Post-tick copy of a sensor, as delivered to `on_update` and subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    #[serde(flatten)]
    pub sensor: Sensor,
    pub previous_status: SensorStatus,
}

impl SensorReading {
    /// True when this tick made the sensor's status worse.
    pub fn escalated(&self) -> bool {
        self.sensor.status > self.previous_status
    }
}

/// Sensor registry and simulator errors
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate sensor id '{0}'")]
    DuplicateSensor(String),
    #[error("simulator is already running")]
    AlreadyRunning,
    #[error("simulator must be started inside a Tokio runtime")]
    NoRuntime,
}
