//! Weather lookup via wttr.in

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::WeatherConfig;
use crate::{Error, Result};

/// Short weather summaries
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// One-line conditions for `location`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Weather`] if the lookup fails or times out
    async fn lookup(&self, location: &str) -> Result<String>;
}

/// Client for wttr.in's one-line format
#[derive(Debug, Clone)]
pub struct WttrClient {
    client: Client,
    base_url: String,
}

impl WttrClient {
    /// Create a new weather client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        Self::with_timeout(config.url.clone(), config.timeout)
    }

    /// Create a client for `base_url` with an explicit request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, location: &str) -> String {
        format!(
            "{}/{}?format=3",
            self.base_url,
            urlencoding::encode(location)
        )
    }
}

#[async_trait]
impl WeatherService for WttrClient {
    async fn lookup(&self, location: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url_for(location))
            .send()
            .await
            .map_err(|e| Error::Weather(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Weather(format!("weather service returned {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Weather(e.to_string()))?;
        let text = text.trim();

        if text.is_empty() {
            return Err(Error::Weather("empty weather report".to_string()));
        }

        Ok(text.to_string())
    }
}
