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

//! OpenWeatherMap overlay layers and credential resolution.

use serde::{Deserialize, Serialize};

/// Number of time-lapse frames the overlay cycles through
pub const FRAME_COUNT: u32 = 6;

/// Available weather layer types from OpenWeatherMap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WeatherLayer {
    #[default]
    Precipitation,
    Clouds,
    Wind,
}

impl WeatherLayer {
    /// Get the OpenWeatherMap layer name for URL construction
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherLayer::Precipitation => "precipitation_new",
            WeatherLayer::Clouds => "clouds_new",
            WeatherLayer::Wind => "wind_new",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            WeatherLayer::Precipitation => "Precipitation",
            WeatherLayer::Clouds => "Clouds",
            WeatherLayer::Wind => "Wind",
        }
    }

    pub fn all() -> [WeatherLayer; 3] {
        [
            WeatherLayer::Precipitation,
            WeatherLayer::Clouds,
            WeatherLayer::Wind,
        ]
    }
}

/// Tile URL for one animation frame of a weather layer.
///
/// The frame index selects one of the provider's precomputed time-lapse
/// images; the base map carries no frame parameter.
pub fn overlay_tile_url(layer: WeatherLayer, zoom: u8, x: u32, y: u32, api_key: &str, frame: u32) -> String {
    format!(
        "https://tile.openweathermap.org/map/{}/{}/{}/{}.png?appid={}&frame={}",
        layer.as_str(),
        zoom,
        x,
        y,
        api_key,
        frame % FRAME_COUNT
    )
}

/// Resolve the API key from the environment variable or config.
///
/// The environment variable takes precedence; an empty string counts as
/// absent either way.
pub fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
    if let Ok(key) = std::env::var("OPENWEATHERMAP_API_KEY") {
        if !key.is_empty() {
            return Some(key);
        }
    }

    config_key.map(|s| s.to_owned()).filter(|s| !s.is_empty())
}

/// Get the source of the API key for UI display
pub fn api_key_source(config_key: Option<&str>) -> Option<&'static str> {
    if std::env::var("OPENWEATHERMAP_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
    {
        Some("environment variable")
    } else if config_key.map(|k| !k.is_empty()).unwrap_or(false) {
        Some("config file")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_names() {
        assert_eq!(WeatherLayer::Precipitation.as_str(), "precipitation_new");
        assert_eq!(WeatherLayer::Clouds.as_str(), "clouds_new");
        assert_eq!(WeatherLayer::Wind.as_str(), "wind_new");
    }

    #[test]
    fn test_overlay_url_embeds_key_and_frame() {
        let url = overlay_tile_url(WeatherLayer::Precipitation, 3, 2, 3, "secret", 4);
        assert_eq!(
            url,
            "https://tile.openweathermap.org/map/precipitation_new/3/2/3.png?appid=secret&frame=4"
        );
    }

    #[test]
    fn test_overlay_url_wraps_frame_index() {
        let url = overlay_tile_url(WeatherLayer::Clouds, 5, 10, 11, "k", FRAME_COUNT + 2);
        assert!(url.ends_with("&frame=2"));
    }
}
