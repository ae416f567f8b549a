use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{EtlError, Result};

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

/// Longest slice of an error body kept in [`EtlError::UpstreamUnavailable`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(EtlError::Config(format!(
                "coordinate out of range: lat={lat}, lon={lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

#[derive(Clone)]
pub struct UpstreamSettings {
    pub connection_id: String,
    /// Scheme and host, no trailing slash.
    pub base_url: String,
    pub api_key: String,
    pub coordinate: Coordinate,
    pub timeout: Duration,
}

impl fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("connection_id", &self.connection_id)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("coordinate", &self.coordinate)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Source of current-weather payloads.
#[async_trait]
pub trait WeatherSource: Send + Sync + fmt::Debug {
    /// Succeeds only if the endpoint currently answers HTTP 200.
    async fn probe(&self) -> Result<()>;

    /// Decoded body of one current-weather request.
    async fn fetch(&self) -> Result<Value>;
}

/// OpenWeatherMap current weather for a fixed coordinate.
///
/// No `units` parameter is sent, so temperatures arrive in Kelvin.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    settings: UpstreamSettings,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(settings: UpstreamSettings) -> Result<Self> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, http })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.settings.base_url, CURRENT_WEATHER_PATH)
    }

    async fn get(&self) -> Result<(StatusCode, String)> {
        let coordinate = self.settings.coordinate;
        let res = self
            .http
            .get(self.endpoint())
            .query(&[
                ("lat", coordinate.lat.to_string()),
                ("lon", coordinate.lon.to_string()),
                ("appid", self.settings.api_key.clone()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        info!(
            connection = %self.settings.connection_id,
            status = status.as_u16(),
            "weather API responded"
        );
        debug!(body = %truncate_body(&body, MAX_ERROR_BODY), "weather API response body");

        Ok((status, body))
    }

    fn require_ok(&self, status: StatusCode, body: &str) -> Result<()> {
        if status == StatusCode::OK {
            return Ok(());
        }
        warn!(
            connection = %self.settings.connection_id,
            status = status.as_u16(),
            "weather API unavailable"
        );
        Err(EtlError::UpstreamUnavailable {
            status: status.as_u16(),
            body: truncate_body(body, MAX_ERROR_BODY),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn probe(&self) -> Result<()> {
        let (status, body) = self.get().await?;
        self.require_ok(status, &body)
    }

    async fn fetch(&self) -> Result<Value> {
        let (status, body) = self.get().await?;
        self.require_ok(status, &body)?;

        serde_json::from_str(&body)
            .map_err(|e| EtlError::malformed("$", format!("body is not valid JSON: {e}")))
    }
}

fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
