//! Error taxonomy for the dashboard.
//!
//! Every variant is recoverable: callers show `user_message()` and keep
//! whatever was displayed before.

use thiserror::Error;

/// Failures of the platform location service.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Blank search text. Ignored without any feedback.
    #[error("Empty location query")]
    InputRejected,

    #[error("Unable to get your location: {0}")]
    LocationUnavailable(#[from] LocationError),

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Weather provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Offline and no cached data for {0}")]
    OfflineNoCache(String),

    #[error("Malformed provider response: {0}")]
    MalformedProviderResponse(String),

    #[error("Stored value for '{key}' is corrupt: {message}")]
    PersistenceCorrupt { key: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl WeatherError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InputRejected => String::new(),
            Self::LocationUnavailable(_) => "Unable to get your location".to_string(),
            Self::NotFound(_) => "City not found".to_string(),
            Self::ProviderUnavailable(_) | Self::MalformedProviderResponse(_) => {
                "Failed to fetch weather".to_string()
            }
            Self::OfflineNoCache(_) => "Offline & no cached data".to_string(),
            Self::PersistenceCorrupt { .. } | Self::Storage(_) => {
                "Could not access saved data".to_string()
            }
        }
    }

    /// Errors that should produce no user-visible feedback.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::InputRejected)
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedProviderResponse(err.to_string())
        } else {
            Self::ProviderUnavailable(err.to_string())
        }
    }
}
