use async_trait::async_trait;
use geo_types::{Coord, LineString};
use serde::Deserialize;
use shared::{polyline, Coordinate, Route};

use crate::config::{ConfigError, RoutingConfig};
use crate::error::{NavError, Result};

const EARTH_RADIUS_KM: f64 = 6_371.0;
const SERVICE: &str = "routing";

/// Source of routes between two points.
///
/// `OsrmClient` talks to a directions service over HTTP; tests swap in
/// canned implementations.
///
/// # Contract
/// - The first alternative the service offers is returned, unranked.
/// - Zero alternatives is `NavError::NoRoute`.
/// - No retries; the caller decides whether to ask again.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, start: Coordinate, destination: Coordinate) -> Result<Route>;
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: String,
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmClient {
    pub fn new(config: &RoutingConfig) -> std::result::Result<Self, ConfigError> {
        if config.profile.trim().is_empty() {
            return Err(ConfigError::Invalid("routing profile is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
        })
    }

    /// `{base}/{profile}/{startLon},{startLat};{destLon},{destLat}?overview=full`
    pub fn route_url(&self, start: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/{}/{},{};{},{}?overview=full",
            self.base_url,
            self.profile,
            start.lon(),
            start.lat(),
            destination.lon(),
            destination.lat()
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn route(&self, start: Coordinate, destination: Coordinate) -> Result<Route> {
        let url = self.route_url(start, destination);
        tracing::debug!("requesting route {url}");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Network(format!(
                "routing service answered {status}"
            )));
        }
        let body = response.text().await?;
        let route = parse_directions(&body)?;
        tracing::debug!(
            "route has {} points, {:.2} km",
            route.len(),
            approximate_distance_km(route.coordinates())
        );
        Ok(route)
    }
}

/// Picks the first alternative of a directions response and decodes it.
pub fn parse_directions(body: &str) -> Result<Route> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|err| NavError::parse(SERVICE, err))?;
    let Some(first) = response.routes.into_iter().next() else {
        tracing::warn!("routing service returned no routes (code {:?})", response.code);
        return Err(NavError::NoRoute);
    };
    route_from_polyline(&first.geometry)
}

/// Decodes an encoded geometry and flips its `(lat, lon)` pairs into
/// `(lon, lat)` coordinates.
pub fn route_from_polyline(geometry: &str) -> Result<Route> {
    let coordinates = polyline::decode(geometry)?
        .into_iter()
        .map(|(lat, lon)| Coordinate::new(lon, lat).map_err(|err| NavError::parse(SERVICE, err)))
        .collect::<Result<Vec<_>>>()?;
    Route::new(coordinates).map_err(|err| {
        tracing::warn!("discarding degenerate route geometry: {err}");
        NavError::NoRoute
    })
}

pub fn line_string(route: &Route) -> LineString<f64> {
    route
        .coordinates()
        .iter()
        .map(|c| Coord { x: c.lon(), y: c.lat() })
        .collect()
}

pub fn approximate_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlat = (b.lat() - a.lat()).to_radians();
    let dlon = (b.lon() - a.lon()).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
