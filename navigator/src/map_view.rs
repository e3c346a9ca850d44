//! Descriptions handed to the map renderer: the raster style, the route
//! line feature and the camera, plus parsing of its tap events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{Coordinate, Route};

use crate::routing::line_string;

/// Berlin, shown until the first fix arrives.
pub const DEFAULT_CENTER: [f64; 2] = [13.405, 52.52];
pub const DEFAULT_ZOOM: f64 = 14.0;

const TILE_SOURCE_ID: &str = "streets";
const ROUTE_SOURCE_ID: &str = "routeSource";
const ROUTE_LAYER_ID: &str = "routeFill";
const ROUTE_LINE_COLOR: &str = "#38bdf8";
const ROUTE_LINE_WIDTH: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyleConfig {
    /// Raster tile URL template with `{x}`, `{y}` and `{z}` placeholders.
    pub tile_url: String,
    pub tile_size: u32,
    pub max_zoom: u8,
    pub attribution: String,
}

impl Default for MapStyleConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://mt1.google.com/vt/lyrs=m&x={x}&y={y}&z={z}".into(),
            tile_size: 256,
            max_zoom: 20,
            attribution: "Map data &copy; Google".into(),
        }
    }
}

/// Style document (version 8) with a single raster source and layer.
pub fn style_document(config: &MapStyleConfig) -> Value {
    json!({
        "version": 8,
        "sources": {
            TILE_SOURCE_ID: {
                "type": "raster",
                "tiles": [config.tile_url],
                "tileSize": config.tile_size,
                "attribution": config.attribution,
                "maxzoom": config.max_zoom,
            }
        },
        "layers": [
            {
                "id": TILE_SOURCE_ID,
                "type": "raster",
                "source": TILE_SOURCE_ID,
            }
        ]
    })
}

/// GeoJSON `Feature` with a `LineString` geometry in `[lon, lat]` order.
pub fn route_feature(route: &Route) -> Value {
    let coordinates: Vec<[f64; 2]> = line_string(route).0.iter().map(|c| [c.x, c.y]).collect();
    json!({
        "type": "Feature",
        "properties": {},
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        }
    })
}

/// Line layer drawn on top of the route source.
pub fn route_layer() -> Value {
    json!({
        "id": ROUTE_LAYER_ID,
        "type": "line",
        "source": ROUTE_SOURCE_ID,
        "paint": {
            "line-color": ROUTE_LINE_COLOR,
            "line-width": ROUTE_LINE_WIDTH,
        },
        "layout": {
            "line-cap": "round",
            "line-join": "round",
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: [f64; 2],
    pub zoom: f64,
    pub follow_user: bool,
}

impl Camera {
    /// Centers on the user once located, otherwise on [`DEFAULT_CENTER`].
    pub fn for_location(location: Option<Coordinate>) -> Self {
        Self {
            center: location.map(<[f64; 2]>::from).unwrap_or(DEFAULT_CENTER),
            zoom: DEFAULT_ZOOM,
            follow_user: location.is_some(),
        }
    }
}

/// A press on the map, already validated as a coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapTap {
    pub coordinate: Coordinate,
}

#[derive(Deserialize)]
struct TapEvent {
    geometry: TapGeometry,
}

#[derive(Deserialize)]
struct TapGeometry {
    coordinates: Coordinate,
}

impl MapTap {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }

    /// Parses `{"geometry": {"coordinates": [lon, lat]}}`; other fields are ignored.
    pub fn from_event(event: &Value) -> Result<Self, serde_json::Error> {
        let event = TapEvent::deserialize(event)?;
        Ok(Self::new(event.geometry.coordinates))
    }
}
