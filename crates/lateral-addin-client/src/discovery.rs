//! Server discovery: resolve a customer sub-domain to its backend URLs.

use lateral_addin_core::AddinError;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const DEFAULT_DISCOVERY_URL: &str = "https://lateral1.com/getServerSettings.php";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEntry {
    pub url: String,
}

/// Backend URLs configured for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    pub staging: ServerEntry,
    pub production: ServerEntry,
}

impl ServerSettings {
    /// Dropdown options, staging first.
    pub fn urls(&self) -> Vec<String> {
        vec![self.staging.url.clone(), self.production.url.clone()]
    }
}

#[derive(Deserialize)]
struct DiscoveryResponse {
    data: Vec<DiscoveryRow>,
}

/// `server_settings` is itself a JSON document encoded as a string.
#[derive(Deserialize)]
struct DiscoveryRow {
    server_settings: String,
}

/// Client for the discovery endpoint. Unauthenticated.
#[derive(Clone)]
pub struct ServerDiscovery {
    http: Client,
    url: String,
}

impl Default for ServerDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_URL)
    }
}

impl ServerDiscovery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_servers(&self, sub_domain: &str) -> Result<ServerSettings, AddinError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("code", sub_domain)])
            .send()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;

        let discovery: DiscoveryResponse = serde_json::from_str(&body)?;
        let row = discovery.data.into_iter().next().ok_or_else(|| {
            AddinError::InvalidResponse(format!("no server settings for '{}'", sub_domain))
        })?;
        let settings: ServerSettings = serde_json::from_str(&row.server_settings)?;

        debug!(
            "Discovered servers for {}: staging={} production={}",
            sub_domain, settings.staging.url, settings.production.url
        );
        Ok(settings)
    }
}
