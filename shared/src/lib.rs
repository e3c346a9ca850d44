use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod polyline;

/// A WGS84 position stored as `(longitude, latitude)`.
///
/// Values are validated on construction and serialize as a GeoJSON
/// position `[lon, lat]`, which is also what the map collaborator emits
/// for tap events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    lon: f64,
    lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Result<Self, CoordinateError> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        Ok(Self { lon, lat })
    }

    pub fn lon(self) -> f64 {
        self.lon
    }

    pub fn lat(self) -> f64 {
        self.lat
    }
}

impl TryFrom<[f64; 2]> for Coordinate {
    type Error = CoordinateError;

    fn try_from([lon, lat]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lon, lat)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(coord: Coordinate) -> Self {
        [coord.lon, coord.lat]
    }
}

/// A renderable path of at least two coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Route {
    coordinates: Vec<Coordinate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a route needs at least 2 coordinates, got {0}")]
pub struct RouteTooShort(pub usize);

impl Route {
    pub fn new(coordinates: Vec<Coordinate>) -> Result<Self, RouteTooShort> {
        if coordinates.len() < 2 {
            return Err(RouteTooShort(coordinates.len()));
        }
        Ok(Self { coordinates })
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn start(&self) -> Coordinate {
        self.coordinates[0]
    }

    pub fn end(&self) -> Coordinate {
        self.coordinates[self.coordinates.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Never true for a constructed route.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

impl TryFrom<Vec<Coordinate>> for Route {
    type Error = RouteTooShort;

    fn try_from(coordinates: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Self::new(coordinates)
    }
}

impl From<Route> for Vec<Coordinate> {
    fn from(route: Route) -> Self {
        route.coordinates
    }
}

/// Best geocoding match for a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMatch {
    pub coordinate: Coordinate,
    pub label: String,
}

/// Latest known device position and speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coordinate: Coordinate,
    pub speed_kmh: f64,
    pub recorded_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(coordinate: Coordinate, speed_mps: Option<f64>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            speed_kmh: speed_kmh_from_mps(speed_mps),
            recorded_at,
        }
    }
}

/// Converts a sensor speed in m/s to km/h. Missing, negative or non-finite
/// readings are sensor noise and report as exactly zero.
pub fn speed_kmh_from_mps(speed_mps: Option<f64>) -> f64 {
    match speed_mps.map(|mps| mps * 3.6) {
        Some(kmh) if kmh.is_finite() && kmh > 0.0 => kmh,
        _ => 0.0,
    }
}
