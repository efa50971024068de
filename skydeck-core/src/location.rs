//! Turning user input into a [`LocationQuery`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt::Debug;

use crate::{
    error::{LocationError, WeatherError},
    model::{Coordinates, LocationQuery},
};

pub const DEFAULT_IP_GEOLOCATION_URL: &str = "http://ip-api.com/json";

/// Single-shot position source.
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

impl LocationQuery {
    /// Build a city query from free text. Blank text is rejected.
    pub fn from_text(text: &str) -> Result<Self, WeatherError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(WeatherError::InputRejected);
        }
        Ok(LocationQuery::City(trimmed.to_string()))
    }
}

/// Ask `geolocator` for one fix. Failures are surfaced, never retried.
pub async fn resolve_current_position(
    geolocator: &dyn Geolocator,
) -> Result<LocationQuery, WeatherError> {
    match geolocator.current_position().await {
        Ok(coords) => {
            tracing::debug!(lat = coords.lat, lon = coords.lon, "Resolved current position");
            Ok(LocationQuery::Coordinates(coords))
        }
        Err(err) => {
            tracing::warn!(error = %err, "Geolocation failed");
            Err(WeatherError::LocationUnavailable(err))
        }
    }
}

/// Position known ahead of time (e.g. passed on the command line).
#[derive(Debug, Clone, Default)]
pub struct FixedPosition {
    position: Option<Coordinates>,
}

impl FixedPosition {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.position.ok_or(LocationError::ServiceUnavailable)
    }
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpGeolocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: Client::new() }
    }
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new(DEFAULT_IP_GEOLOCATION_URL)
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LocationError::Other(format!("IP geolocation request failed: {e}")))?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LocationError::PermissionDenied);
        }
        if !status.is_success() {
            return Err(LocationError::Other(format!("IP geolocation returned status {status}")));
        }

        let body: IpApiResponse = res
            .json()
            .await
            .map_err(|e| LocationError::Other(format!("IP geolocation parse error: {e}")))?;

        if body.status.as_deref() == Some("fail") {
            return Err(LocationError::Other(
                body.message.unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates { lat, lon }),
            _ => Err(LocationError::ServiceUnavailable),
        }
    }
}
