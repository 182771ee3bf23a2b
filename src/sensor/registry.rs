use crate::sensor::{RegistryError, Sensor, SensorConfig, SensorKind, SensorReading};
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Owns every configured sensor and its current reading.
///
/// Reads go straight to the concurrent map and never wait on a tick of a
/// different sensor. The only write path is [`SensorRegistry::tick_with`],
/// which the simulator's consumer task calls serially.
pub struct SensorRegistry {
    /// Lock-free concurrent map for fast reads
    sensors: DashMap<String, Sensor>,

    /// Sensor ids in configuration order
    order: Vec<String>,

    /// Broadcast channel for post-tick readings
    reading_tx: broadcast::Sender<SensorReading>,
}

impl SensorRegistry {
    /// Build one sensor per config entry, starting at its base value.
    ///
    /// Fails only when two entries share an id.
    pub fn initialize(configs: &[SensorConfig]) -> Result<Self, RegistryError> {
        let now = Utc::now();
        let sensors = DashMap::with_capacity(configs.len());
        let mut order = Vec::with_capacity(configs.len());

        for config in configs {
            if sensors.contains_key(&config.id) {
                return Err(RegistryError::DuplicateSensor(config.id.clone()));
            }
            match config.kind.bounds() {
                None => warn!(
                    sensor_id = %config.id,
                    kind = %config.kind,
                    "Sensor kind has no bounds, values will drift unclamped"
                ),
                Some(bounds) if !bounds.contains(config.base_value) => warn!(
                    sensor_id = %config.id,
                    base_value = config.base_value,
                    min = bounds.min,
                    max = bounds.max,
                    "Base value outside sensor bounds, first tick will clamp it"
                ),
                Some(_) => {}
            }
            sensors.insert(config.id.clone(), Sensor::from_config(config, now));
            order.push(config.id.clone());
        }

        let (reading_tx, _) = broadcast::channel(1000);

        Ok(Self {
            sensors,
            order,
            reading_tx,
        })
    }

    /// Get sensor by ID
    pub fn get(&self, id: &str) -> Option<Sensor> {
        self.sensors.get(id).map(|s| s.clone())
    }

    /// All sensors in configuration order
    pub fn list_all(&self) -> Vec<Sensor> {
        self.order.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn list_by_kind(&self, kind: &SensorKind) -> Vec<Sensor> {
        self.list_all()
            .into_iter()
            .filter(|s| &s.kind == kind)
            .collect()
    }

    pub fn list_by_location(&self, location: &str) -> Vec<Sensor> {
        self.list_all()
            .into_iter()
            .filter(|s| s.location == location)
            .collect()
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Subscribe to post-tick readings
    pub fn subscribe(&self) -> broadcast::Receiver<SensorReading> {
        self.reading_tx.subscribe()
    }

    /// Advance one sensor by a random trend drawn from `rng`.
    ///
    /// Returns `None` if no sensor has this id.
    pub(crate) fn tick_with<R: Rng + ?Sized>(&self, id: &str, rng: &mut R) -> Option<SensorReading> {
        let trend: f64 = rng.gen_range(-1.0..=1.0);
        self.tick_by(id, trend)
    }

    /// Advance one sensor by an explicit trend in `[-1, 1]`.
    pub(crate) fn tick_by(&self, id: &str, trend: f64) -> Option<SensorReading> {
        let reading = {
            let mut sensor = self.sensors.get_mut(id)?;
            let previous_status = sensor.status;

            if !sensor.advance(trend, Utc::now()) {
                warn!(
                    sensor_id = %id,
                    kind = %sensor.kind,
                    "No bounds for sensor kind, skipped clamping and classification"
                );
            }

            SensorReading {
                sensor: sensor.clone(),
                previous_status,
            }
        };

        debug!(
            sensor_id = %id,
            value = reading.sensor.value,
            status = ?reading.sensor.status,
            "Sensor ticked"
        );

        // No subscribers is fine
        let _ = self.reading_tx.send(reading.clone());

        Some(reading)
    }
}
