use crate::sensor::{RegistryError, SensorReading, SensorRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Scheduling parameters for the simulator
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Lower bound (inclusive) of a sensor's tick period
    pub min_period: Duration,
    /// Upper bound (exclusive) of a sensor's tick period
    pub max_period: Duration,
    /// Capacity of the tick request channel
    pub channel_capacity: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_period: Duration::from_secs(5),
            max_period: Duration::from_secs(10),
            channel_capacity: 256,
        }
    }
}

/// Request from a sensor's timer task to tick that sensor
#[derive(Debug)]
struct TickRequest {
    sensor_id: String,
}

/// Handles of a running simulation
struct Running {
    timers: Vec<JoinHandle<()>>,
    consumer: JoinHandle<()>,
}

/// Drives a [`SensorRegistry`] on per-sensor randomized schedules.
///
/// Timer tasks only post [`TickRequest`]s; a single consumer task applies
/// them to the registry and invokes the update callback, so ticks never
/// overlap and the callback runs serially.
pub struct Simulator {
    registry: Arc<SensorRegistry>,
    config: SimulatorConfig,
    running: Mutex<Option<Running>>,
}

impl Simulator {
    pub fn new(registry: Arc<SensorRegistry>, config: SimulatorConfig) -> Self {
        Self {
            registry,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }

    /// Start ticking every sensor on its own schedule.
    ///
    /// Each sensor draws its period once, uniformly from
    /// `[min_period, max_period)`, and first fires one period after start.
    /// Fails outside a Tokio runtime, or if already running.
    pub fn start<F>(&self, mut on_update: F) -> Result<(), RegistryError>
    where
        F: FnMut(&SensorReading) + Send + 'static,
    {
        if Handle::try_current().is_err() {
            return Err(RegistryError::NoRuntime);
        }

        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return Err(RegistryError::AlreadyRunning);
        }
        if self.registry.is_empty() {
            warn!("No sensors configured, simulator will only idle");
        }

        let (tx, mut rx) = mpsc::channel::<TickRequest>(self.config.channel_capacity.max(1));
        let mut rng = StdRng::from_entropy();

        let mut timers = Vec::with_capacity(self.registry.len());
        for sensor_id in self.registry.ids() {
            let period = draw_period(&mut rng, self.config.min_period, self.config.max_period);
            let tx = tx.clone();
            let sensor_id = sensor_id.clone();

            timers.push(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    ticker.tick().await;
                    let request = TickRequest {
                        sensor_id: sensor_id.clone(),
                    };
                    if tx.send(request).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let registry = Arc::clone(&self.registry);
        let consumer = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            while let Some(request) = rx.recv().await {
                match registry.tick_with(&request.sensor_id, &mut rng) {
                    Some(reading) => on_update(&reading),
                    None => warn!(sensor_id = %request.sensor_id, "Tick for unknown sensor, ignoring"),
                }
            }
        });

        info!(
            sensors = timers.len(),
            min_period_ms = self.config.min_period.as_millis() as u64,
            max_period_ms = self.config.max_period.as_millis() as u64,
            "Sensor simulation started"
        );

        *running = Some(Running { timers, consumer });
        Ok(())
    }

    /// Stop all schedules.
    ///
    /// When this returns, no further ticks or callbacks happen. Safe to call
    /// when not running.
    pub async fn stop(&self) {
        let running = self.running.lock().unwrap().take();
        let Some(running) = running else {
            return;
        };

        for timer in &running.timers {
            timer.abort();
        }
        running.consumer.abort();

        // Aborted tasks finish at their next await point; a tick in progress
        // completes first.
        futures::future::join_all(running.timers).await;
        let _ = running.consumer.await;

        info!("Sensor simulation stopped");
    }
}

/// Draw a whole-millisecond period uniformly from `[min, max)`, or `min` if
/// the range is empty. Never zero.
fn draw_period<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    let min_ms = (min.as_millis() as u64).max(1);
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rng.gen_range(min_ms..max_ms))
}
