pub mod config;
pub mod error;
pub mod geocoding;
pub mod location;
pub mod map_view;
pub mod routing;
pub mod screens;
pub mod theme;
pub mod workflow;

pub use shared::{polyline, Coordinate, LocationSample, PlaceMatch, Route};
