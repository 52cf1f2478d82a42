//! Map rendering and tile management.
//!
//! Web Mercator projection, layered tile fetching and caching, and the
//! animated weather-overlay compositor.

pub mod basemap;
pub mod compositor;
pub mod mercator;
pub mod tiles;

pub use basemap::BasemapStyle;
pub use compositor::Compositor;
pub use mercator::{GeoPoint, WebMercator};
pub use tiles::TileManager;
