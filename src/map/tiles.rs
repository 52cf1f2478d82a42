//! Tile addressing, disk caching, and asynchronous fetching for both the
//! basemap layer and the animated weather overlay.

use egui::{ColorImage, TextureHandle};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

use super::basemap::{basemap_tile_url, BasemapStyle};
use crate::weather::{overlay_tile_url, WeatherLayer};

pub const TILE_SIZE: u32 = 256;
const CACHE_DURATION_DAYS: u64 = 7;

/// A discrete tile address in the provider's slippy-map scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }
}

/// Which image layer a tile request addresses.
///
/// The basemap is static; the weather overlay is parameterized by an
/// animation frame index, so each frame is a distinct cacheable tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileLayer {
    Basemap(BasemapStyle),
    Weather { layer: WeatherLayer, frame: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileRequest {
    pub coord: TileCoord,
    pub layer: TileLayer,
}

pub enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

impl std::fmt::Debug for TileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileState::Loading => write!(f, "Loading"),
            TileState::Loaded(_) => write!(f, "Loaded"),
            TileState::Failed => write!(f, "Failed"),
        }
    }
}

pub struct TileManager {
    cache_dir: PathBuf,
    tiles: Arc<Mutex<HashMap<TileRequest, TileState>>>,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    cancel: CancellationToken,
    api_key: Option<String>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("cache_dir", &self.cache_dir)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl TileManager {
    pub fn new(api_key: Option<String>) -> Self {
        let cache_dir = Self::get_cache_dir();

        if let Err(e) = fs::create_dir_all(&cache_dir) {
            log::error!("Failed to create cache directory: {}", e);
        }

        Self::cleanup_old_tiles(&cache_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("Failed to build tile fetch runtime");

        Self {
            cache_dir,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            client: reqwest::Client::new(),
            runtime,
            cancel: CancellationToken::new(),
            api_key,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Drop queued downloads for the current generation.
    ///
    /// Called when the map center or layer changes; tiles already on disk or
    /// in memory stay valid, only pending fetches are abandoned. In-flight
    /// HTTP transfers are not aborted mid-stream; a stale tile that still
    /// lands is overwritten on the next pass. Failed tiles are forgotten so
    /// a transient network blip gets retried on the fresh pass instead of
    /// leaving a permanent hole.
    pub fn cancel_pending(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        let mut tiles = self.tiles.lock().unwrap();
        tiles.retain(|_, state| !matches!(state, TileState::Failed));
    }

    /// Evict cached textures that can no longer appear: any coord outside
    /// the current viewport set, including other zoom levels.
    ///
    /// All overlay frames for a visible coord are kept so the animation
    /// cycle reuses them; in-flight downloads are kept so a re-request does
    /// not double-fetch.
    pub fn evict_offscreen(&self, visible: &[TileCoord]) {
        let keep: HashSet<TileCoord> = visible.iter().copied().collect();
        let mut tiles = self.tiles.lock().unwrap();
        tiles.retain(|req, state| {
            keep.contains(&req.coord) || matches!(state, TileState::Loading)
        });
    }

    fn get_cache_dir() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("stormgrid");
        path.push("tiles");
        path
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        if let Ok(entries) = fs::read_dir(cache_dir) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    if let Ok(modified) = metadata.modified() {
                        if let Ok(age) = now.duration_since(modified) {
                            if age > max_age {
                                let _ = fs::remove_file(entry.path());
                                log::debug!("Removed old tile cache: {:?}", entry.path());
                            }
                        }
                    }
                }
            }
        }
    }

    /// URL for a tile request, or None when the overlay credential is absent
    pub fn url(&self, req: &TileRequest) -> Option<String> {
        let TileCoord { x, y, zoom } = req.coord;
        match req.layer {
            TileLayer::Basemap(style) => Some(basemap_tile_url(style, zoom, x, y)),
            TileLayer::Weather { layer, frame } => {
                let key = self.api_key.as_deref()?;
                Some(overlay_tile_url(layer, zoom, x, y, key, frame))
            }
        }
    }

    /// Get cache filename based on hash of URL
    fn cache_filename(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash = hasher.finalize();
        format!("{:x}.png", hash)
    }

    /// Get tile from cache or queue for download
    pub fn get_tile(&self, req: TileRequest, ctx: &egui::Context) -> Option<TextureHandle> {
        let url = self.url(&req)?;
        let mut tiles = self.tiles.lock().unwrap();

        match tiles.get(&req) {
            Some(TileState::Loaded(texture)) => Some(texture.clone()),
            Some(TileState::Loading) | Some(TileState::Failed) => None,
            None => {
                let cache_path = self.cache_dir.join(Self::cache_filename(&url));

                if cache_path.exists() {
                    match Self::load_tile_from_disk(&cache_path, ctx, &req) {
                        Ok(texture) => {
                            tiles.insert(req, TileState::Loaded(texture.clone()));
                            Some(texture)
                        }
                        Err(e) => {
                            log::warn!("Failed to load cached tile: {}", e);
                            tiles.insert(req, TileState::Loading);
                            self.spawn_download(req, url, cache_path, ctx.clone());
                            None
                        }
                    }
                } else {
                    tiles.insert(req, TileState::Loading);
                    self.spawn_download(req, url, cache_path, ctx.clone());
                    None
                }
            }
        }
    }

    fn load_tile_from_disk(
        path: &Path,
        ctx: &egui::Context,
        req: &TileRequest,
    ) -> Result<TextureHandle, String> {
        let img_data = fs::read(path).map_err(|e| e.to_string())?;
        let texture = Self::decode_to_texture(&img_data, ctx, req)?;
        Ok(texture)
    }

    fn decode_to_texture(
        bytes: &[u8],
        ctx: &egui::Context,
        req: &TileRequest,
    ) -> Result<TextureHandle, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        let rgba = img.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let color_image = ColorImage::from_rgba_unmultiplied(size, &rgba.into_raw());

        Ok(ctx.load_texture(
            format!(
                "tile_{:?}_{}_{}/{}",
                req.layer, req.coord.zoom, req.coord.x, req.coord.y
            ),
            color_image,
            Default::default(),
        ))
    }

    fn spawn_download(&self, req: TileRequest, url: String, cache_path: PathBuf, ctx: egui::Context) {
        let tiles = self.tiles.clone();
        let client = self.client.clone();
        let cancel = self.cancel.clone();

        self.runtime.spawn(async move {
            if cancel.is_cancelled() {
                tiles.lock().unwrap().remove(&req);
                return;
            }

            let result = Self::download_tile(&client, &url, &cache_path, &ctx, &req).await;

            let mut tiles = tiles.lock().unwrap();
            match result {
                Ok(texture) => {
                    tiles.insert(req, TileState::Loaded(texture));
                    ctx.request_repaint();
                }
                Err(e) => {
                    // A failed tile degrades visual completeness only; the
                    // pass still settles and the game is unaffected.
                    log::warn!("Tile fetch failed ({}): {}", url, e);
                    tiles.insert(req, TileState::Failed);
                    ctx.request_repaint();
                }
            }
        });
    }

    async fn download_tile(
        client: &reqwest::Client,
        url: &str,
        cache_path: &Path,
        ctx: &egui::Context,
        req: &TileRequest,
    ) -> Result<TextureHandle, String> {
        log::debug!("Downloading tile: {}", url);

        let response = client.get(url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        if let Err(e) = fs::write(cache_path, &bytes) {
            log::warn!("Failed to save tile to cache: {}", e);
        }

        Self::decode_to_texture(&bytes, ctx, req)
    }

    /// True when every request in the set has finished loading, one way or
    /// the other. Requests not yet issued count as unsettled.
    pub fn all_settled(&self, reqs: &[TileRequest]) -> bool {
        let tiles = self.tiles.lock().unwrap();
        reqs.iter().all(|req| {
            matches!(
                tiles.get(req),
                Some(TileState::Loaded(_)) | Some(TileState::Failed)
            )
        })
    }

    pub fn has_loading_tiles(&self) -> bool {
        let tiles = self.tiles.lock().unwrap();
        tiles.values().any(|state| matches!(state, TileState::Loading))
    }

    pub fn error_count(&self) -> usize {
        let tiles = self.tiles.lock().unwrap();
        tiles
            .values()
            .filter(|state| matches!(state, TileState::Failed))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> TileCoord {
        TileCoord::new(2, 3, 3)
    }

    #[test]
    fn test_basemap_url_needs_no_credential() {
        let manager = TileManager::new(None);
        let req = TileRequest {
            coord: coord(),
            layer: TileLayer::Basemap(BasemapStyle::Dark),
        };
        assert_eq!(
            manager.url(&req).as_deref(),
            Some("https://b.basemaps.cartocdn.com/dark_all/3/2/3.png")
        );
    }

    #[test]
    fn test_overlay_url_requires_credential() {
        let req = TileRequest {
            coord: coord(),
            layer: TileLayer::Weather {
                layer: WeatherLayer::Precipitation,
                frame: 1,
            },
        };

        let without_key = TileManager::new(None);
        assert_eq!(without_key.url(&req), None);

        let with_key = TileManager::new(Some("secret".to_owned()));
        let url = with_key.url(&req).unwrap();
        assert!(url.contains("precipitation_new/3/2/3.png"));
        assert!(url.contains("appid=secret"));
        assert!(url.contains("frame=1"));
    }

    #[test]
    fn test_unissued_requests_are_unsettled() {
        let manager = TileManager::new(None);
        let req = TileRequest {
            coord: coord(),
            layer: TileLayer::Basemap(BasemapStyle::Light),
        };
        assert!(!manager.all_settled(&[req]));
        assert!(manager.all_settled(&[]));
    }

    #[test]
    fn test_retarget_clears_failed_tiles_for_retry() {
        let mut manager = TileManager::new(None);
        let req = TileRequest {
            coord: coord(),
            layer: TileLayer::Basemap(BasemapStyle::Dark),
        };

        manager.tiles.lock().unwrap().insert(req, TileState::Failed);
        assert_eq!(manager.error_count(), 1);
        assert!(manager.all_settled(&[req]));

        manager.cancel_pending();
        assert_eq!(manager.error_count(), 0);
        // Back to unissued, so the next pass fetches it again
        assert!(!manager.all_settled(&[req]));
    }

    #[test]
    fn test_offscreen_tiles_are_evicted() {
        let manager = TileManager::new(None);
        let visible = TileCoord::new(1, 1, 5);
        let offscreen = TileCoord::new(9, 9, 5);
        let other_zoom = TileCoord::new(1, 1, 6);

        let base = |coord| TileRequest {
            coord,
            layer: TileLayer::Basemap(BasemapStyle::Dark),
        };
        let frame = |coord, frame| TileRequest {
            coord,
            layer: TileLayer::Weather {
                layer: WeatherLayer::Precipitation,
                frame,
            },
        };

        {
            let mut tiles = manager.tiles.lock().unwrap();
            tiles.insert(base(visible), TileState::Failed);
            tiles.insert(frame(visible, 0), TileState::Failed);
            tiles.insert(frame(visible, 3), TileState::Failed);
            tiles.insert(base(offscreen), TileState::Failed);
            tiles.insert(base(other_zoom), TileState::Failed);
            tiles.insert(frame(offscreen, 1), TileState::Loading);
        }

        manager.evict_offscreen(&[visible]);

        let tiles = manager.tiles.lock().unwrap();
        // Every frame of a visible coord survives for the animation cycle
        assert!(tiles.contains_key(&base(visible)));
        assert!(tiles.contains_key(&frame(visible, 0)));
        assert!(tiles.contains_key(&frame(visible, 3)));
        // Offscreen and other-zoom entries are gone
        assert!(!tiles.contains_key(&base(offscreen)));
        assert!(!tiles.contains_key(&base(other_zoom)));
        // In-flight downloads are left to finish
        assert!(tiles.contains_key(&frame(offscreen, 1)));
    }

    #[test]
    fn test_cache_filename_is_stable() {
        let a = TileManager::cache_filename("https://example.com/1/2/3.png");
        let b = TileManager::cache_filename("https://example.com/1/2/3.png");
        assert_eq!(a, b);
        assert!(a.ends_with(".png"));
    }
}
