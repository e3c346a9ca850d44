//! View models for the map overlay and the settings screen. Layout and
//! styling belong to the UI toolkit; these only decide what is shown.

use serde::Serialize;
use shared::Coordinate;

use crate::theme::{Palette, ThemeState};

pub const VERSION_LABEL: &str = concat!("BikeOS v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOverlay {
    pub button_label: &'static str,
    /// Text for the info notice; only available once located.
    pub info: Option<String>,
}

impl MapOverlay {
    pub fn new(location: Option<Coordinate>) -> Self {
        match location {
            Some(coord) => Self {
                button_label: "Show Info",
                info: Some(location_info(coord)),
            },
            None => Self {
                button_label: "Locating...",
                info: None,
            },
        }
    }
}

pub fn location_info(coord: Coordinate) -> String {
    format!("Lat: {:.4}, Lon: {:.4}", coord.lat(), coord.lon())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsScreen {
    pub dark_mode: bool,
    pub palette: Palette,
    pub version: &'static str,
}

impl SettingsScreen {
    pub fn new(theme: &ThemeState) -> Self {
        Self {
            dark_mode: theme.is_dark(),
            palette: theme.palette,
            version: VERSION_LABEL,
        }
    }
}
