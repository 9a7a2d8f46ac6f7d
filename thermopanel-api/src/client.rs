use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::types::{
    AcStatus, AcStatusReading, AcToggle, FanSpeedReading, FanSpeedUpdate, Snapshot,
    TemperatureReading, TemperatureUpdate, ToggleAck, UpdateAck,
};
use crate::DEFAULT_ENDPOINT;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not build http client")]
    Build(#[source] reqwest::Error),
    #[error("Request to {0} failed")]
    Request(String, #[source] reqwest::Error),
    #[error("{0} returned status {1}")]
    Status(String, reqwest::StatusCode),
    #[error("Could not parse response from {0}")]
    Parse(String, #[source] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Handle on the thermostat's http api, cheap to clone
#[derive(Debug, Clone)]
pub struct ThermostatClient {
    client: Client,
    endpoint: String,
}

impl ThermostatClient {
    pub fn new<S: Into<String>>(endpoint: S) -> Result<ThermostatClient> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Build)?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(ThermostatClient { client, endpoint })
    }

    pub fn default_endpoint() -> Result<Self> {
        Self::new(DEFAULT_ENDPOINT)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn parse<T: DeserializeOwned>(url: String, response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(ClientError::Status(url, response.status()));
        }
        response
            .json()
            .await
            .map_err(|source| ClientError::Parse(url, source))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        trace!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request(url.clone(), source))?;
        Self::parse(url, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        trace!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Request(url.clone(), source))?;
        Self::parse(url, response).await
    }

    pub async fn temperature(&self) -> Result<f64> {
        self.get::<TemperatureReading>("temperature")
            .await
            .map(|r| r.current_temperature)
    }

    pub async fn fan_speed(&self) -> Result<String> {
        self.get::<FanSpeedReading>("fan_speed")
            .await
            .map(|r| r.fan_speed)
    }

    pub async fn ac_status(&self) -> Result<String> {
        self.get::<AcStatusReading>("ac_status")
            .await
            .map(|r| r.ac_status)
    }

    pub async fn update_temperature(&self, temperature: f64) -> Result<UpdateAck> {
        self.post("update_temperature", &TemperatureUpdate { temperature })
            .await
    }

    /// Sent as-is, the server does not check it against the known speeds
    pub async fn set_fan_speed(&self, fan_speed: &str) -> Result<UpdateAck> {
        self.post(
            "set_fan_speed",
            &FanSpeedUpdate {
                fan_speed: fan_speed.to_string(),
            },
        )
        .await
    }

    pub async fn toggle_ac(&self, status: AcStatus) -> Result<ToggleAck> {
        self.post(
            "toggle_ac",
            &AcToggle {
                ac_status: status.to_string(),
            },
        )
        .await
    }

    /// Fetches all three values at once. A value that can't be fetched is
    /// logged and left at its default, it never fails the whole snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        let (temperature, fan_speed, ac_status) =
            tokio::join!(self.temperature(), self.fan_speed(), self.ac_status());
        Snapshot {
            temperature: or_default(temperature),
            fan_speed: or_default(fan_speed),
            ac_status: or_default(ac_status),
        }
    }
}

fn or_default<T: Default>(res: Result<T>) -> T {
    res.unwrap_or_else(|e| {
        warn!("{}", e);
        T::default()
    })
}
