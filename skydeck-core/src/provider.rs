use crate::{
    Config, LocationQuery, Units, WeatherSnapshot, error::WeatherError,
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of weather snapshots.
///
/// Implementations perform whatever requests they need and return a fully
/// mapped snapshot, or nothing at all: a partial result is an error.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(
        &self,
        query: &LocationQuery,
        units: Units,
    ) -> Result<WeatherSnapshot, WeatherError>;
}

/// Construct the configured provider.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No OpenWeather API key configured.\n\
                 Hint: run `skydeck configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    let provider = OpenWeatherProvider::with_base_url(api_key, &config.provider.base_url);
    Ok(Box::new(provider))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Replays a queue of canned results and counts calls.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedProvider {
        results: Arc<Mutex<Vec<Result<WeatherSnapshot, WeatherError>>>>,
        pub calls: Arc<Mutex<Vec<(LocationQuery, Units)>>>,
    }

    impl ScriptedProvider {
        pub fn new(results: Vec<Result<WeatherSnapshot, WeatherError>>) -> Self {
            Self { results: Arc::new(Mutex::new(results)), calls: Arc::default() }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn fetch(
            &self,
            query: &LocationQuery,
            units: Units,
        ) -> Result<WeatherSnapshot, WeatherError> {
            self.calls.lock().unwrap().push((query.clone(), units));
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                return Err(WeatherError::ProviderUnavailable("no scripted result".into()));
            }
            results.remove(0)
        }
    }
}
