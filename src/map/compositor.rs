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

//! Viewport tiling and the animated overlay redraw cycle.
//!
//! Every pass draws the full tile set for the current frame; the frame index
//! advances only after the pass settles (every tile of both layers loaded
//! or failed) and the redraw interval has elapsed, so a slow fetch
//! throttles the animation instead of queueing a backlog.

use std::time::{Duration, Instant};

use egui::{Color32, Painter, Pos2, Rect};

use super::basemap::BasemapStyle;
use super::mercator::{GeoPoint, WebMercator};
use super::tiles::{TileCoord, TileLayer, TileManager, TileRequest, TILE_SIZE};
use crate::weather::{WeatherLayer, FRAME_COUNT};

/// Delay between animation frame advances
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// How often to repaint while waiting for a pass to settle
const SETTLE_POLL: Duration = Duration::from_millis(150);

/// All tiles needed to cover a viewport centered on `center`, with each
/// tile's pixel origin relative to the viewport center.
///
/// Two tiles of overscan per axis cover the fractional offset at the edges.
/// X wraps across the antimeridian; Y rows outside the projection are
/// skipped.
pub fn visible_tiles(
    center: GeoPoint,
    zoom: u8,
    viewport_width: f32,
    viewport_height: f32,
) -> Vec<(TileCoord, f32, f32)> {
    let mut tiles = Vec::new();

    let center_tile_x = WebMercator::lon_to_x(center.lon, zoom);
    let center_tile_y = WebMercator::lat_to_y(center.lat, zoom);

    let tiles_wide = (viewport_width / TILE_SIZE as f32).ceil() as i64 + 2;
    let tiles_high = (viewport_height / TILE_SIZE as f32).ceil() as i64 + 2;

    let start_x = WebMercator::tile_x(center.lon, zoom) - tiles_wide / 2;
    let start_y = WebMercator::tile_y(center.lat, zoom) - tiles_high / 2;

    let max_tile = 2_i64.pow(zoom as u32);

    for dy in 0..tiles_high {
        for dx in 0..tiles_wide {
            let tile_x = start_x + dx;
            let tile_y = start_y + dy;

            // Longitude wraps around; latitude does not
            let wrapped_x = ((tile_x % max_tile) + max_tile) % max_tile;

            if tile_y >= 0 && tile_y < max_tile {
                let coord = TileCoord::new(wrapped_x as u32, tile_y as u32, zoom);

                // Keeps the exact center point centered rather than snapped
                // to the tile corner
                let offset_x = (tile_x as f64 - center_tile_x) * TILE_SIZE as f64;
                let offset_y = (tile_y as f64 - center_tile_y) * TILE_SIZE as f64;

                tiles.push((coord, offset_x as f32, offset_y as f32));
            }
        }
    }

    tiles
}

/// Owns the animation frame counter and the settle-then-advance cycle.
///
/// The counter is only ever touched from the UI thread; fetch results
/// arrive through the `TileManager`'s shared state.
#[derive(Debug)]
pub struct Compositor {
    frame_index: u32,
    next_advance_at: Option<Instant>,
    interval: Duration,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            next_advance_at: None,
            interval: REDRAW_INTERVAL,
        }
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Abandon the current pass after a center or layer change.
    ///
    /// Queued downloads are dropped and the advance timer reset; the next
    /// draw call starts a fresh pass immediately.
    pub fn retarget(&mut self, tile_manager: &mut TileManager) {
        tile_manager.cancel_pending();
        self.next_advance_at = None;
    }

    /// Advance the cycle; returns true when the frame index stepped.
    ///
    /// A settled pass arms the interval timer; once it expires the frame
    /// advances by exactly one, modulo the frame count, and the next pass
    /// begins. An unsettled pass disarms the timer so the interval is
    /// measured from settle, not from the previous advance.
    fn tick(&mut self, now: Instant, pass_settled: bool) -> bool {
        if !pass_settled {
            self.next_advance_at = None;
            return false;
        }

        match self.next_advance_at {
            None => {
                self.next_advance_at = Some(now + self.interval);
                false
            }
            Some(at) if now >= at => {
                self.frame_index = (self.frame_index + 1) % FRAME_COUNT;
                self.next_advance_at = None;
                true
            }
            Some(_) => false,
        }
    }

    /// Draw one full composite pass: basemap, then the weather overlay for
    /// the current frame at the given alpha.
    ///
    /// The surface region is repainted in full every pass; egui's immediate
    /// mode makes the clear implicit. Returns the number of tiles blitted.
    #[allow(clippy::too_many_arguments, reason = "one call site, plain draw parameters")]
    pub fn draw(
        &mut self,
        painter: &Painter,
        rect: Rect,
        ctx: &egui::Context,
        tile_manager: &TileManager,
        center: GeoPoint,
        zoom: u8,
        style: BasemapStyle,
        weather: Option<WeatherLayer>,
        overlay_alpha: f32,
    ) -> usize {
        let placements = visible_tiles(center, zoom, rect.width(), rect.height());
        let origin = rect.center();

        let coords: Vec<TileCoord> = placements.iter().map(|&(coord, _, _)| coord).collect();
        tile_manager.evict_offscreen(&coords);

        let mut drawn = 0;
        let mut pass_requests = Vec::with_capacity(placements.len() * 2);

        for &(coord, offset_x, offset_y) in &placements {
            let tile_rect = Rect::from_min_size(
                Pos2::new(origin.x + offset_x, origin.y + offset_y),
                egui::vec2(TILE_SIZE as f32, TILE_SIZE as f32),
            );
            if !rect.intersects(tile_rect) {
                continue;
            }

            for req in layer_requests(coord, style, weather, self.frame_index) {
                let tint = match req.layer {
                    TileLayer::Basemap(_) => Color32::WHITE,
                    TileLayer::Weather { .. } => {
                        Color32::WHITE.gamma_multiply(overlay_alpha.clamp(0.0, 1.0))
                    }
                };
                pass_requests.push(req);
                if let Some(texture) = tile_manager.get_tile(req, ctx) {
                    blit(painter, &texture, tile_rect, tint);
                    drawn += 1;
                }
            }
        }

        // Both layers count toward settlement; the basemap alone animates
        // nothing, but the cycle still runs so enabling a layer picks up
        // mid-cycle.
        let settled = tile_manager.all_settled(&pass_requests);
        self.tick(Instant::now(), settled);

        if settled {
            if let Some(at) = self.next_advance_at {
                ctx.request_repaint_after(at.saturating_duration_since(Instant::now()));
            } else {
                ctx.request_repaint();
            }
        } else {
            ctx.request_repaint_after(SETTLE_POLL);
        }

        drawn
    }
}

/// Every layer a pass must fetch and settle for one tile: the basemap
/// always, plus the overlay frame when a weather layer is configured.
fn layer_requests(
    coord: TileCoord,
    style: BasemapStyle,
    weather: Option<WeatherLayer>,
    frame: u32,
) -> Vec<TileRequest> {
    let mut requests = vec![TileRequest {
        coord,
        layer: TileLayer::Basemap(style),
    }];
    if let Some(layer) = weather {
        requests.push(TileRequest {
            coord,
            layer: TileLayer::Weather { layer, frame },
        });
    }
    requests
}

fn blit(painter: &Painter, texture: &egui::TextureHandle, rect: Rect, tint: Color32) {
    painter.image(
        texture.id(),
        rect,
        Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
        tint,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_800_600_needs_5_by_5() {
        let center = GeoPoint::new(0.0, 0.0);
        let tiles = visible_tiles(center, 4, 800.0, 600.0);
        // ceil(800/256)+2 = 5, ceil(600/256)+2 = 5
        assert_eq!(tiles.len(), 25);
    }

    #[test]
    fn test_rows_outside_projection_are_skipped() {
        let center = GeoPoint::new(84.0, 0.0);
        let tiles = visible_tiles(center, 2, 800.0, 600.0);
        assert!(tiles.len() < 25);
        assert!(tiles.iter().all(|(c, _, _)| c.y < 4));
    }

    #[test]
    fn test_x_wraps_at_antimeridian() {
        let center = GeoPoint::new(0.0, 179.5);
        let tiles = visible_tiles(center, 3, 800.0, 600.0);
        assert_eq!(tiles.len(), 25);
        assert!(tiles.iter().all(|(c, _, _)| c.x < 8));
        // The wrap produces both edge columns
        assert!(tiles.iter().any(|(c, _, _)| c.x == 7));
        assert!(tiles.iter().any(|(c, _, _)| c.x == 0));
    }

    #[test]
    fn test_center_tile_offset_is_fractional() {
        // Center sits a quarter of the way into its tile; the tile's origin
        // must land a quarter tile left of the viewport center.
        let zoom = 3;
        let lon = WebMercator::tile_to_lon(2.25, zoom);
        let center = GeoPoint::new(0.0, lon);
        let tiles = visible_tiles(center, zoom, 300.0, 300.0);
        let (_, off_x, _) = tiles
            .iter()
            .find(|(c, _, _)| c.x == 2 && c.y == 4)
            .expect("center tile present");
        assert!((off_x - (-0.25 * TILE_SIZE as f32)).abs() < 0.5);
    }

    #[test]
    fn test_pass_settles_on_both_layers() {
        let coord = TileCoord::new(2, 3, 5);

        // Overlay configured: the basemap tile is part of the settle set
        // too, so a loading basemap holds the frame back.
        let reqs = layer_requests(
            coord,
            BasemapStyle::Dark,
            Some(WeatherLayer::Clouds),
            2,
        );
        assert_eq!(reqs.len(), 2);
        assert!(reqs.contains(&TileRequest {
            coord,
            layer: TileLayer::Basemap(BasemapStyle::Dark),
        }));
        assert!(reqs.contains(&TileRequest {
            coord,
            layer: TileLayer::Weather {
                layer: WeatherLayer::Clouds,
                frame: 2,
            },
        }));

        // No overlay: the pass still waits on the basemap rather than
        // settling vacuously.
        let base_only = layer_requests(coord, BasemapStyle::Light, None, 0);
        assert_eq!(
            base_only,
            vec![TileRequest {
                coord,
                layer: TileLayer::Basemap(BasemapStyle::Light),
            }]
        );
    }

    #[test]
    fn test_frame_advances_once_per_settled_interval() {
        let mut compositor = Compositor::new();
        let t0 = Instant::now();

        // Unsettled passes never advance
        assert!(!compositor.tick(t0, false));
        assert_eq!(compositor.frame_index(), 0);

        // Settling arms the timer without advancing
        assert!(!compositor.tick(t0, true));
        assert!(!compositor.tick(t0 + Duration::from_millis(500), true));
        assert_eq!(compositor.frame_index(), 0);

        // Interval elapsed: advance by exactly one
        assert!(compositor.tick(t0 + Duration::from_millis(1100), true));
        assert_eq!(compositor.frame_index(), 1);
    }

    #[test]
    fn test_frame_index_cycles_modulo_frame_count() {
        let mut compositor = Compositor::new();
        let mut now = Instant::now();
        let mut seen = Vec::new();

        for _ in 0..(FRAME_COUNT * 2) {
            compositor.tick(now, true);
            now += Duration::from_secs(2);
            assert!(compositor.tick(now, true));
            now += Duration::from_millis(1);
            seen.push(compositor.frame_index());
        }

        assert_eq!(seen, vec![1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn test_slow_fetch_disarms_timer() {
        let mut compositor = Compositor::new();
        let t0 = Instant::now();

        compositor.tick(t0, true);
        // Pass became unsettled again (new frame's tiles still loading)
        compositor.tick(t0 + Duration::from_millis(500), false);
        // Interval restarts from the new settle, not the old arm
        assert!(!compositor.tick(t0 + Duration::from_millis(1100), true));
        assert_eq!(compositor.frame_index(), 0);
    }
}
