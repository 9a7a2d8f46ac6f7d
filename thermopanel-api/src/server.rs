//! In-memory stand-in for the thermostat's http api.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::types::{
    AcStatus, AcStatusReading, FanSpeed, FanSpeedReading, TemperatureReading, ToggleAck,
    UpdateAck,
};

const SUCCESS: &str = "success";

#[derive(Debug, Clone, PartialEq)]
pub struct ThermostatState {
    pub temperature: f64,
    pub fan_speed: String,
    pub ac_status: String,
}

impl Default for ThermostatState {
    fn default() -> Self {
        ThermostatState {
            temperature: 20.0,
            fan_speed: FanSpeed::Medium.to_string(),
            ac_status: AcStatus::Off.to_string(),
        }
    }
}

pub type SharedState = Arc<Mutex<ThermostatState>>;

pub fn shared(state: ThermostatState) -> SharedState {
    Arc::new(Mutex::new(state))
}

// fields missing from an update keep their current value
#[derive(Debug, Deserialize)]
struct TemperatureBody {
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FanSpeedBody {
    fan_speed: Option<String>,
}

async fn get_temperature(State(state): State<SharedState>) -> Json<TemperatureReading> {
    Json(TemperatureReading {
        current_temperature: state.lock().await.temperature,
    })
}

async fn update_temperature(
    State(state): State<SharedState>,
    Json(body): Json<TemperatureBody>,
) -> Json<UpdateAck> {
    if let Some(temperature) = body.temperature {
        debug!("temperature set to {}", temperature);
        state.lock().await.temperature = temperature;
    }
    Json(UpdateAck {
        status: SUCCESS.to_string(),
        message: String::from("Temperature updated"),
    })
}

async fn get_fan_speed(State(state): State<SharedState>) -> Json<FanSpeedReading> {
    Json(FanSpeedReading {
        fan_speed: state.lock().await.fan_speed.clone(),
    })
}

async fn set_fan_speed(
    State(state): State<SharedState>,
    Json(body): Json<FanSpeedBody>,
) -> Json<UpdateAck> {
    if let Some(fan_speed) = body.fan_speed {
        debug!("fan speed set to {}", fan_speed);
        state.lock().await.fan_speed = fan_speed;
    }
    Json(UpdateAck {
        status: SUCCESS.to_string(),
        message: String::from("Fan speed set"),
    })
}

async fn get_ac_status(State(state): State<SharedState>) -> Json<AcStatusReading> {
    Json(AcStatusReading {
        ac_status: state.lock().await.ac_status.clone(),
    })
}

/// Flips the stored status, the request body is not consulted
async fn toggle_ac(State(state): State<SharedState>) -> Json<ToggleAck> {
    let mut state = state.lock().await;
    let next = if state.ac_status == AcStatus::Off.as_ref() {
        AcStatus::On
    } else {
        AcStatus::Off
    };
    state.ac_status = next.to_string();
    debug!("ac toggled to {}", state.ac_status);
    Json(ToggleAck {
        status: SUCCESS.to_string(),
        ac_status: state.ac_status.clone(),
    })
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/temperature", get(get_temperature))
        .route("/update_temperature", post(update_temperature))
        .route("/fan_speed", get(get_fan_speed))
        .route("/set_fan_speed", post(set_fan_speed))
        .route("/ac_status", get(get_ac_status))
        .route("/toggle_ac", post(toggle_ac))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve<A: ToSocketAddrs>(addr: A, state: SharedState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("thermostat api listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod test {
    use super::*;
    use reqwest::StatusCode;

    async fn start(state: SharedState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn missing_fields_keep_state() {
        let state = shared(ThermostatState::default());
        let base = start(state.clone()).await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{}/update_temperature", base))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let res = client
            .post(format!("{}/set_fan_speed", base))
            .json(&serde_json::json!({ "speed": "high" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        assert_eq!(*state.lock().await, ThermostatState::default());
    }

    #[tokio::test]
    async fn accepts_unknown_fan_speed() {
        let state = shared(ThermostatState::default());
        let base = start(state.clone()).await;
        reqwest::Client::new()
            .post(format!("{}/set_fan_speed", base))
            .json(&serde_json::json!({ "fan_speed": "turbo" }))
            .send()
            .await
            .unwrap();
        assert_eq!(state.lock().await.fan_speed, "turbo");
    }

    #[tokio::test]
    async fn toggle_ignores_body() {
        let state = shared(ThermostatState::default());
        let base = start(state.clone()).await;
        let ack: ToggleAck = reqwest::Client::new()
            .post(format!("{}/toggle_ac", base))
            .json(&serde_json::json!({ "ac_status": "Off" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ack.status, "success");
        assert_eq!(ack.ac_status, "On");
    }

    #[tokio::test]
    async fn unknown_status_toggles_off() {
        let state = shared(ThermostatState {
            ac_status: String::from("broken"),
            ..ThermostatState::default()
        });
        let base = start(state.clone()).await;
        reqwest::Client::new()
            .post(format!("{}/toggle_ac", base))
            .send()
            .await
            .unwrap();
        assert_eq!(state.lock().await.ac_status, "Off");
    }

    #[tokio::test]
    async fn non_json_update_is_rejected() {
        let state = shared(ThermostatState::default());
        let base = start(state.clone()).await;
        let res = reqwest::Client::new()
            .post(format!("{}/update_temperature", base))
            .body("temperature=25")
            .send()
            .await
            .unwrap();
        assert!(res.status().is_client_error());
        assert_eq!(state.lock().await.temperature, 20.0);
    }
}
