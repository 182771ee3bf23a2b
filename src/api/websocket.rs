use super::AppState;
use crate::sensor::{Sensor, SensorReading, SensorStatus};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Message pushed to clients after every sensor tick
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub sensor: Sensor,
    pub previous_status: SensorStatus,
}

impl From<SensorReading> for SensorUpdateMessage {
    fn from(reading: SensorReading) -> Self {
        Self {
            message_type: "sensor_update",
            sensor: reading.sensor,
            previous_status: reading.previous_status,
        }
    }
}

/// GET /api/ws - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("WebSocket upgrade request received");
    let readings = state.registry.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, readings))
}

pub fn create_ws_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// Forward live readings until the client goes away
async fn handle_socket(mut socket: WebSocket, mut readings: broadcast::Receiver<SensorReading>) {
    info!("WebSocket connection established");

    loop {
        tokio::select! {
            Some(msg) = socket.recv() => {
                match msg {
                    Ok(Message::Close(_)) => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Ok(_) => {
                        // Clients only listen
                    }
                    Err(e) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            result = readings.recv() => {
                match result {
                    Ok(reading) => {
                        if let Err(e) = send_update(&mut socket, reading).await {
                            error!(error = %e, "Failed to send sensor update");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "WebSocket lagged, skipped sensor updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Sensor broadcast channel closed");
                        break;
                    }
                }
            }

            else => {
                break;
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn send_update(socket: &mut WebSocket, reading: SensorReading) -> anyhow::Result<()> {
    let json = serde_json::to_string(&SensorUpdateMessage::from(reading))?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{default_sensor_configs, SensorRegistry};

    #[test]
    fn test_sensor_update_message_format() {
        let registry = SensorRegistry::initialize(&default_sensor_configs()).unwrap();
        let reading = registry.tick_by("ph_01", 1.0).unwrap();

        let value = serde_json::to_value(SensorUpdateMessage::from(reading)).unwrap();
        assert_eq!(value["type"], "sensor_update");
        assert_eq!(value["sensor"]["id"], "ph_01");
        assert_eq!(value["sensor"]["kind"], "ph");
        assert_eq!(value["previousStatus"], "normal");
        assert!(value["sensor"]["updatedAt"].is_string());
    }
}
