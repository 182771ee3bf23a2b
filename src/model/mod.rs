//! Farm records carried in the offline snapshot alongside sensors.

use crate::sensor::{SensorKind, SensorReading, SensorStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current weather as reported by the weather collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    /// Air temperature (°C)
    pub temperature: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Expected precipitation (mm)
    pub precipitation: f64,
    /// Wind speed (km/h)
    pub wind_speed: f64,
    pub conditions: String,
    #[serde(default)]
    pub forecast: Vec<DailyForecast>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub conditions: String,
    pub precipitation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropHealth {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// A planted crop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: String,
    pub name: String,
    pub planting_date: DateTime<Utc>,
    pub expected_harvest: DateTime<Utc>,
    /// Free-form growth stage label (e.g. "Flowering")
    pub current_stage: String,
    pub health: CropHealth,
    /// Predicted yield (tons/hectare)
    pub yield_prediction: f64,
    /// Planted area (hectares)
    pub area: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Irrigation,
    Fertilizer,
    Pest,
    Weather,
    Harvest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Something the farmer should look at
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    /// Derive an alert from a reading whose status just got worse.
    ///
    /// Soil moisture maps to irrigation, pH to fertilizer and temperature to
    /// weather. Returns `None` when the status did not escalate or the kind
    /// has no alert mapping.
    pub fn from_escalation(reading: &SensorReading) -> Option<Self> {
        if !reading.escalated() {
            return None;
        }

        let sensor = &reading.sensor;
        let (kind, subject) = match sensor.kind {
            SensorKind::SoilMoisture => (AlertKind::Irrigation, "Soil moisture"),
            SensorKind::Ph => (AlertKind::Fertilizer, "Soil pH"),
            SensorKind::Temperature => (AlertKind::Weather, "Temperature"),
            SensorKind::Humidity | SensorKind::Light | SensorKind::Other(_) => return None,
        };

        let (severity, level) = match sensor.status {
            SensorStatus::Critical => (AlertSeverity::Critical, "critical"),
            SensorStatus::Warning => (AlertSeverity::Medium, "warning"),
            SensorStatus::Normal => return None,
        };

        Some(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            severity,
            title: format!("{} {} in {}", subject, level, sensor.location),
            message: format!(
                "Sensor {} reads {:.1}{} ({}).",
                sensor.id, sensor.value, sensor.unit, level
            ),
            timestamp: sensor.updated_at,
            acknowledged: false,
        })
    }
}
