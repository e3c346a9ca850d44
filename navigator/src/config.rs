use std::{fs::File, io, io::Read, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::location::WatchOptions;
use crate::map_view::MapStyleConfig;

pub const OSRM_BASE_URL_ENV: &str = "OSRM_BASE_URL";
pub const NOMINATIM_ENDPOINT_ENV: &str = "NOMINATIM_ENDPOINT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Top-level configuration. Every field has a default, so an empty JSON
/// object is a valid config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub routing: RoutingConfig,
    pub geocoding: GeocodingConfig,
    pub location: WatchOptions,
    pub map: MapStyleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Directions endpoint up to, but excluding, the profile segment.
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org/route/v1".into(),
            profile: "driving".into(),
            timeout_secs: 10,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub endpoint: String,
    /// Sent as `User-Agent`; the public search service rejects anonymous clients.
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".into(),
            user_agent: concat!("BikeOS/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 10,
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl NavigatorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Applies service URL overrides; `lookup` is usually `std::env::var`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(OSRM_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("routing base url overridden to {url}");
            self.routing.base_url = url;
        }
        if let Some(url) = lookup(NOMINATIM_ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("geocoding endpoint overridden to {url}");
            self.geocoding.endpoint = url;
        }
    }
}
