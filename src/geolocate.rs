//! One-shot IP-based geolocation used to pick the initial map center.

use crate::map::GeoPoint;

/// Why geolocation produced no position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    Unavailable,
}

impl std::fmt::Display for LocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationError::Unavailable => write!(f, "location unavailable"),
        }
    }
}

/// Center used when geolocation fails
pub const FALLBACK_CENTER: GeoPoint = GeoPoint { lat: 0.0, lon: 0.0 };

/// Look up the current position from IP geolocation services.
///
/// Blocking; run on a background thread. Tries ipapi.co first, then
/// ip-api.com. The caller falls back to [`FALLBACK_CENTER`] and surfaces a
/// notice on failure.
pub fn current_location() -> Result<GeoPoint, LocationError> {
    log::info!("Fetching current location...");

    if let Ok(response) = reqwest::blocking::get("https://ipapi.co/json/") {
        if let Ok(text) = response.text() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                if let (Some(lat), Some(lon)) = (
                    value.get("latitude").and_then(|v| v.as_f64()),
                    value.get("longitude").and_then(|v| v.as_f64()),
                ) {
                    log::info!("Location found via ipapi.co: {}, {}", lat, lon);
                    return Ok(GeoPoint::new(lat, lon));
                }
            }
        }
    }

    // Fallback to ip-api.com (no API key needed)
    if let Ok(response) = reqwest::blocking::get("http://ip-api.com/json/") {
        if let Ok(text) = response.text() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                if let (Some(lat), Some(lon)) = (
                    value.get("lat").and_then(|v| v.as_f64()),
                    value.get("lon").and_then(|v| v.as_f64()),
                ) {
                    log::info!("Location found via ip-api.com: {}, {}", lat, lon);
                    return Ok(GeoPoint::new(lat, lon));
                }
            }
        }
    }

    log::warn!("Failed to fetch location from all sources");
    Err(LocationError::Unavailable)
}
