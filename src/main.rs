use agrigrow::api::{create_router, AppState};
use agrigrow::config::AgrigrowConfig;
use agrigrow::sensor::{SensorRegistry, Simulator};
use agrigrow::store::{OfflineStore, SnapshotManager};
use agrigrow::sync::{run_sync_loop, Connectivity, ConnectivityFlag, LoggingRemote, RemoteSync};
use agrigrow::weather::{SimulatedWeather, WeatherSource};
use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrigrow=info".into()),
        )
        .init();

    info!("Agrigrow starting...");

    let config = AgrigrowConfig::load().context("Failed to load configuration")?;
    info!(
        bind = %config.api.bind,
        sensors = config.simulator.sensors.len(),
        storage = ?config.storage.backend,
        sync_enabled = config.sync.enabled,
        "Configuration loaded"
    );

    // Offline store
    let medium = config
        .storage
        .open()
        .context("Failed to open offline storage")?;
    let store = Arc::new(OfflineStore::new(medium));

    // Sensors
    let registry = Arc::new(
        SensorRegistry::initialize(&config.simulator.sensors)
            .context("Invalid sensor configuration")?,
    );
    let simulator = Simulator::new(Arc::clone(&registry), config.simulator.simulator_config());

    let weather: Arc<dyn WeatherSource> = Arc::new(SimulatedWeather::new());
    let remote: Arc<dyn RemoteSync> = Arc::new(LoggingRemote);
    let connectivity: Arc<dyn Connectivity> = Arc::new(ConnectivityFlag::new(true));

    // Snapshot folding
    let manager = Arc::new(
        SnapshotManager::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            config.sync.snapshot_interval(),
        )
        .with_weather(Arc::clone(&weather))
        .with_max_alerts(config.sync.max_alerts),
    );
    let manager_handle = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run().await })
    };

    // Background sync
    let sync_handle = if config.sync.enabled {
        Some(tokio::spawn(run_sync_loop(
            Arc::clone(&store),
            Arc::clone(&remote),
            Arc::clone(&connectivity),
            config.sync.interval(),
            config.sync.apply_timeout(),
        )))
    } else {
        info!("Background sync disabled");
        None
    };

    simulator.start(|reading| {
        debug!(
            sensor_id = %reading.sensor.id,
            value = reading.sensor.value,
            status = ?reading.sensor.status,
            "Sensor update"
        );
    })?;

    // HTTP API
    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        store: Arc::clone(&store),
        remote,
        connectivity,
        weather,
        alerts: Arc::clone(&manager),
        apply_timeout: config.sync.apply_timeout(),
        default_stage: config.api.crop_stage.clone(),
    });
    let router = create_router(state).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(&config.api.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.api.bind))?;
    info!(bind = %config.api.bind, "API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    simulator.stop().await;
    if let Some(handle) = sync_handle {
        handle.abort();
    }
    manager_handle.abort();

    // Keep the last readings for the next offline start
    if let Err(e) = manager.save() {
        tracing::error!(error = %e, "Failed to save final snapshot");
    }

    info!("Agrigrow stopped");
    Ok(())
}
