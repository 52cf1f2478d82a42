// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Persistent configuration in TOML via confy: tile credential, map
//! defaults, and overlay presentation. The UI theme is deliberately not
//! persisted; it is a session-only toggle.

use serde::{Deserialize, Serialize};

use crate::weather::WeatherLayer;

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// OpenWeatherMap API key (optional, env var takes precedence)
    #[serde(default)]
    pub openweathermap_api_key: Option<String>,

    /// Map zoom level for the backdrop
    #[serde(default = "default_zoom")]
    pub default_zoom: u8,

    /// Weather overlay opacity (0.0 - 1.0)
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f32,

    /// Which weather layer to animate
    #[serde(default)]
    pub weather_layer: WeatherLayer,

    /// Skip geolocation and start centered here
    #[serde(default)]
    pub override_latitude: Option<f64>,

    /// Skip geolocation and start centered here
    #[serde(default)]
    pub override_longitude: Option<f64>,
}

// Default value functions for serde
fn default_zoom() -> u8 {
    6
}

fn default_overlay_opacity() -> f32 {
    0.4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openweathermap_api_key: None,
            default_zoom: default_zoom(),
            overlay_opacity: default_overlay_opacity(),
            weather_layer: WeatherLayer::default(),
            override_latitude: None,
            override_longitude: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("stormgrid", "config")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store("stormgrid", "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("stormgrid", "config")
    }

    /// Startup center override, when both coordinates are set
    pub fn override_center(&self) -> Option<(f64, f64)> {
        match (self.override_latitude, self.override_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.default_zoom, 6);
        assert!((config.overlay_opacity - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.weather_layer, WeatherLayer::Precipitation);
        assert_eq!(config.override_center(), None);
    }

    #[test]
    fn test_missing_fields_fill_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_zoom, 6);
        assert!((config.overlay_opacity - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.openweathermap_api_key, None);
    }

    #[test]
    fn test_override_center_needs_both_coordinates() {
        let config = AppConfig {
            override_latitude: Some(40.7),
            ..AppConfig::default()
        };
        assert_eq!(config.override_center(), None);

        let config = AppConfig {
            override_latitude: Some(40.7),
            override_longitude: Some(-74.0),
            ..AppConfig::default()
        };
        assert_eq!(config.override_center(), Some((40.7, -74.0)));
    }
}
