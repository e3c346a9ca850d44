use async_trait::async_trait;
use serde::Deserialize;
use shared::{Coordinate, PlaceMatch};

use crate::config::{ConfigError, GeocodingConfig};
use crate::error::{NavError, Result};

const SERVICE: &str = "geocoding";

/// Resolves free-text place queries. The first candidate wins; there is no
/// ranking or disambiguation.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<PlaceMatch>;
}

// The search service sends coordinates as decimal strings.
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: String,
}

impl NominatimClient {
    pub fn new(config: &GeocodingConfig) -> std::result::Result<Self, ConfigError> {
        let user_agent = config.user_agent.trim();
        if user_agent.is_empty() {
            return Err(ConfigError::Invalid(
                "geocoding requires a user agent".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<PlaceMatch> {
        let query = normalize_query(query)?;
        tracing::debug!("geocoding {query:?} via {}", self.endpoint);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("format", "json"), ("q", query)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Network(format!(
                "geocoding service answered {status}"
            )));
        }
        let body = response.text().await?;
        parse_search_results(query, &body)
    }
}

/// Trims the query; an empty query never reaches the network.
pub fn normalize_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(NavError::EmptyQuery);
    }
    Ok(trimmed)
}

pub fn parse_search_results(query: &str, body: &str) -> Result<PlaceMatch> {
    let results: Vec<SearchResult> =
        serde_json::from_str(body).map_err(|err| NavError::parse(SERVICE, err))?;
    let Some(best) = results.into_iter().next() else {
        return Err(NavError::NotFound(query.to_string()));
    };

    let lat = parse_degrees(&best.lat, "lat")?;
    let lon = parse_degrees(&best.lon, "lon")?;
    let coordinate = Coordinate::new(lon, lat).map_err(|err| NavError::parse(SERVICE, err))?;

    Ok(PlaceMatch {
        coordinate,
        label: best.display_name,
    })
}

fn parse_degrees(raw: &str, field: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| NavError::parse(SERVICE, format!("{field} {raw:?} is not a number")))
}
