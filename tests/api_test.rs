// Integration tests for the sensor, recommendation and offline APIs

use agrigrow::api::{create_router, AppState};
use agrigrow::model::Weather;
use agrigrow::sensor::{SensorConfig, SensorKind, SensorReading, SensorRegistry, SensorStatus};
use agrigrow::store::{MemoryStore, Mutation, MutationKind, OfflineStore, SnapshotManager};
use agrigrow::sync::{ConnectivityFlag, RemoteSync};
use agrigrow::weather::FixedWeather;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Remote that refuses one mutation id
struct RefusingRemote(&'static str);

#[async_trait]
impl RemoteSync for RefusingRemote {
    async fn apply(&self, mutation: &Mutation) -> anyhow::Result<()> {
        if mutation.id == self.0 {
            anyhow::bail!("conflict on {}", mutation.id);
        }
        Ok(())
    }
}

struct TestApp {
    router: Router,
    registry: Arc<SensorRegistry>,
    store: Arc<OfflineStore>,
    alerts: Arc<SnapshotManager>,
    connectivity: Arc<ConnectivityFlag>,
}

fn test_sensors() -> Vec<SensorConfig> {
    vec![
        SensorConfig::new("temp_a", SensorKind::Temperature, "Field A", 32.0, 5.0, "°C"),
        SensorConfig::new("soil_a", SensorKind::SoilMoisture, "Field A", 45.0, 10.0, "%"),
        SensorConfig::new("ph_a", SensorKind::Ph, "Field A", 5.5, 0.5, "pH"),
        SensorConfig::new("soil_b", SensorKind::SoilMoisture, "Field B", 35.0, 8.0, "%"),
        SensorConfig::new("temp_b", SensorKind::Temperature, "Field B", 25.0, 4.0, "°C"),
        SensorConfig::new("humid_b", SensorKind::Humidity, "Field B", 70.0, 12.0, "%"),
    ]
}

fn test_weather(precipitation: f64) -> Weather {
    Weather {
        temperature: 28.0,
        humidity: 70.0,
        precipitation,
        wind_speed: 8.0,
        conditions: "Partly Cloudy".to_string(),
        forecast: Vec::new(),
    }
}

fn create_test_app(remote: Arc<dyn RemoteSync>) -> TestApp {
    let registry = Arc::new(SensorRegistry::initialize(&test_sensors()).unwrap());
    let store = Arc::new(OfflineStore::new(Arc::new(MemoryStore::new())));
    let connectivity = Arc::new(ConnectivityFlag::new(true));
    let alerts = Arc::new(SnapshotManager::new(
        registry.clone(),
        store.clone(),
        Duration::from_secs(60),
    ));

    let state = Arc::new(AppState {
        registry: registry.clone(),
        store: store.clone(),
        remote,
        connectivity: connectivity.clone(),
        weather: Arc::new(FixedWeather(test_weather(2.0))),
        alerts: alerts.clone(),
        apply_timeout: Duration::from_secs(1),
        default_stage: "vegetative".to_string(),
    });

    TestApp {
        router: create_router(state),
        registry,
        store,
        alerts,
        connectivity,
    }
}

fn default_app() -> TestApp {
    create_test_app(Arc::new(RefusingRemote("never")))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_list_sensors_in_configuration_order() {
    let app = default_app();
    let (status, json) = get(&app.router, "/api/sensors").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["temp_a", "soil_a", "ph_a", "soil_b", "temp_b", "humid_b"]);
}

#[tokio::test]
async fn test_list_sensors_filters() {
    let app = default_app();

    let (_, json) = get(&app.router, "/api/sensors?kind=soil_moisture").await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = get(&app.router, "/api/sensors?kind=soil_moisture&location=Field%20B").await;
    let sensors = json.as_array().unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0]["id"], "soil_b");
    assert_eq!(sensors[0]["value"], 35.0);
    // Status is only classified from the first tick on
    assert_eq!(sensors[0]["status"], "normal");

    let (_, json) = get(&app.router, "/api/sensors?kind=co2").await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_sensor() {
    let app = default_app();

    let (status, json) = get(&app.router, "/api/sensors/ph_a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "ph");
    assert_eq!(json["unit"], "pH");

    let (status, json) = get(&app.router, "/api/sensors/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Sensor 'nope' not found");
}

#[tokio::test]
async fn test_irrigation_for_dry_field() {
    let app = default_app();
    let (status, json) = get(&app.router, "/api/recommendations/irrigation?location=Field%20B").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["shouldIrrigate"], true);
    assert_eq!(json["intensity"], "medium");
    assert_eq!(json["duration"], 40.0);
    assert_eq!(json["waterAmount"], 2.5);
    assert_eq!(json["timing"], "morning");
    assert_eq!(json["humidity"], 70.0);
    assert_eq!(
        json["reason"],
        "Soil moisture is low (35.0%) and no significant rain expected."
    );
}

#[tokio::test]
async fn test_irrigation_uses_first_sensor_of_each_kind() {
    let app = default_app();
    let (_, json) = get(&app.router, "/api/recommendations/irrigation").await;

    assert_eq!(json["shouldIrrigate"], false);
    assert_eq!(json["reason"], "Soil moisture is adequate (45.0%).");
    assert_eq!(json["timing"], "early morning or evening");
}

#[tokio::test]
async fn test_fertilizer_with_low_ph() {
    let app = default_app();
    let (status, json) = get(
        &app.router,
        "/api/recommendations/fertilizer?stage=Flowering&location=Field%20A",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stage"], "flowering");
    assert_eq!(json["type"], "Balanced (NPK 15-15-15)");
    assert_eq!(json["amount"], 120);
    assert_eq!(json["phCorrection"], "lime");
    assert_eq!(
        json["reason"],
        "Balanced nutrients support flower and fruit development. Consider lime application to raise pH."
    );
    assert_eq!(
        json["nutrients"],
        json!({ "nitrogen": 24, "phosphorus": 12, "potassium": 18 })
    );
}

#[tokio::test]
async fn test_fertilizer_defaults_stage() {
    let app = default_app();
    let (_, json) = get(&app.router, "/api/recommendations/fertilizer?location=Field%20B").await;

    assert_eq!(json["stage"], "vegetative");
    assert_eq!(json["amount"], 150);
    assert_eq!(json["phCorrection"], Value::Null);
    assert_eq!(json["nutrients"]["potassium"], 22);
}

#[tokio::test]
async fn test_empty_snapshot() {
    let app = default_app();
    let (status, json) = get(&app.router, "/api/offline/snapshot").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sensors"], json!([]));
    assert_eq!(json["weather"], Value::Null);
    assert_eq!(json["lastSync"], "1970-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_enqueue_and_list_mutations() {
    let app = default_app();

    let (status, created) = post_json(
        &app.router,
        "/api/offline/mutations",
        json!({ "type": "ACKNOWLEDGE_ALERT", "payload": { "alertId": "a1" } }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["type"], "ACKNOWLEDGE_ALERT");
    assert!(created["id"].as_str().is_some());
    assert!(created["enqueuedAt"].as_str().is_some());

    let (status, _) = post_json(
        &app.router,
        "/api/offline/mutations",
        json!({ "id": "m2", "type": "DELETE_CROP", "payload": { "id": "crop_1" } }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = get(&app.router, "/api/offline/mutations").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![created["id"].as_str().unwrap(), "m2"]);

    let (_, usage) = get(&app.router, "/api/offline/usage").await;
    assert!(usage["queueBytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_enqueue_rejects_unknown_type() {
    let app = default_app();
    let (status, json) = post_json(
        &app.router,
        "/api/offline/mutations",
        json!({ "type": "PLANT_TREE", "payload": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("PLANT_TREE"));
    assert!(app.store.pending().unwrap().is_empty());
}

#[tokio::test]
async fn test_enqueue_rejects_malformed_body() {
    let app = default_app();
    let (status, json) = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/offline/mutations")
            .header("content-type", "application/json")
            .body(Body::from("{\"type\": "))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, json) = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/offline/mutations")
            .body(Body::from(r#"{"type":"DELETE_CROP","payload":{}}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json["error"].is_string());
    assert!(app.store.pending().unwrap().is_empty());
}

#[tokio::test]
async fn test_enqueue_rejects_duplicate_id() {
    let app = default_app();
    let body = json!({ "id": "dup", "type": "UPDATE_CROP", "payload": { "id": "crop_1" } });

    let (status, _) = post_json(&app.router, "/api/offline/mutations", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = post_json(&app.router, "/api/offline/mutations", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "mutation 'dup' is already queued");
    assert_eq!(app.store.pending().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sync_halts_at_refused_mutation() {
    let app = create_test_app(Arc::new(RefusingRemote("b")));
    for id in ["a", "b", "c"] {
        post_json(
            &app.router,
            "/api/offline/mutations",
            json!({ "id": id, "type": "UPDATE_CROP", "payload": { "id": id } }),
        )
        .await;
    }

    let (status, json) = post_json(&app.router, "/api/offline/sync", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], 1);
    assert_eq!(json["remaining"], 2);
    assert_eq!(json["halted"]["cause"], "rejected");
    assert_eq!(json["halted"]["mutation_id"], "b");

    let ids: Vec<String> = app
        .store
        .pending()
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[tokio::test]
async fn test_sync_while_offline() {
    let app = default_app();
    post_json(
        &app.router,
        "/api/offline/mutations",
        json!({ "type": "ADD_ALERT", "payload": { "title": "Low soil moisture" } }),
    )
    .await;
    app.connectivity.set_online(false);

    let (status, json) = post_json(&app.router, "/api/offline/sync", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], 0);
    assert_eq!(json["remaining"], 1);
    assert_eq!(json["halted"]["cause"], "offline");
}

/// Raise a warning alert for `soil_b` without running the simulator
fn raise_soil_alert(app: &TestApp) -> String {
    let mut sensor = app.registry.get("soil_b").unwrap();
    sensor.value = 35.0;
    sensor.status = SensorStatus::Warning;
    let reading = SensorReading {
        sensor,
        previous_status: SensorStatus::Normal,
    };
    app.alerts.record_reading(&reading).unwrap().unwrap().id
}

#[tokio::test]
async fn test_list_and_acknowledge_alert() {
    let app = default_app();
    let alert_id = raise_soil_alert(&app);

    let (status, json) = get(&app.router, "/api/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["id"], alert_id.as_str());
    assert_eq!(json[0]["type"], "irrigation");
    assert_eq!(json[0]["acknowledged"], false);

    let uri = format!("/api/alerts/{}/acknowledge", alert_id);
    let (status, json) = post_json(&app.router, &uri, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["acknowledged"], true);

    let pending = app.store.pending().unwrap();
    let last = pending.last().unwrap();
    assert_eq!(last.kind, MutationKind::AcknowledgeAlert);
    assert_eq!(last.payload, json!({ "alertId": alert_id }));

    let (_, snapshot) = get(&app.router, "/api/offline/snapshot").await;
    assert_eq!(snapshot["alerts"][0]["acknowledged"], true);
}

#[tokio::test]
async fn test_acknowledge_unknown_alert() {
    let app = default_app();
    let (status, json) = post_json(&app.router, "/api/alerts/nope/acknowledge", json!({})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Alert 'nope' not found");
    assert!(app.store.pending().unwrap().is_empty());
}
