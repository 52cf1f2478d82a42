//! Web Mercator projection between geographic coordinates and slippy-map
//! tile space.

/// Web Mercator projection utilities
pub struct WebMercator;

impl WebMercator {
    /// Convert latitude to a fractional Web Mercator tile Y coordinate
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat.to_radians();
        let n = 2_f64.powi(zoom as i32);
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * n
    }

    /// Convert longitude to a fractional Web Mercator tile X coordinate
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(zoom as i32);
        ((lon + 180.0) / 360.0) * n
    }

    /// Integer tile X index containing the given longitude
    pub fn tile_x(lon: f64, zoom: u8) -> i64 {
        Self::lon_to_x(lon, zoom).floor() as i64
    }

    /// Integer tile Y index containing the given latitude
    pub fn tile_y(lat: f64, zoom: u8) -> i64 {
        Self::lat_to_y(lat, zoom).floor() as i64
    }

    /// Convert a tile Y coordinate back to latitude
    #[allow(dead_code)]
    pub fn tile_to_lat(y: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(zoom as i32);
        let lat_rad = ((std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh()).atan();
        lat_rad.to_degrees()
    }

    /// Convert a tile X coordinate back to longitude
    #[allow(dead_code)]
    pub fn tile_to_lon(x: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(zoom as i32);
        x / n * 360.0 - 180.0
    }
}

/// A geographic point. Replaced wholesale on update, never mutated in place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: lon.clamp(-180.0, 180.0),
        }
    }
}
