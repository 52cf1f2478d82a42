mod config;
mod game;
mod geocode;
mod geolocate;
mod map;
mod weather;

use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use eframe::egui;
use egui::{Color32, Pos2, Rect, RichText, Stroke, Vec2};

use config::AppConfig;
use game::{GameState, Mark};
use geocode::{LookupError, PlaceMatch};
use geolocate::{LocationError, FALLBACK_CENTER};
use map::{BasemapStyle, Compositor, GeoPoint, TileManager};
use weather::WeatherLayer;

const MIN_ZOOM: u8 = 1;
const MAX_ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayerArg {
    Precipitation,
    Clouds,
    Wind,
}

impl From<LayerArg> for WeatherLayer {
    fn from(arg: LayerArg) -> Self {
        match arg {
            LayerArg::Precipitation => WeatherLayer::Precipitation,
            LayerArg::Clouds => WeatherLayer::Clouds,
            LayerArg::Wind => WeatherLayer::Wind,
        }
    }
}

/// Tic-tac-toe over an animated weather map
#[derive(Debug, Parser)]
#[command(name = "stormgrid", version)]
struct Args {
    /// Center latitude (skips geolocation, requires --lon)
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Center longitude (skips geolocation, requires --lat)
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Map zoom level (1-12)
    #[arg(long)]
    zoom: Option<u8>,

    /// Weather overlay layer
    #[arg(long, value_enum)]
    layer: Option<LayerArg>,

    /// OpenWeatherMap API key (overrides env var and config file)
    #[arg(long)]
    api_key: Option<String>,
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();
    let args = Args::parse();

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_title("StormGrid"),
        ..Default::default()
    };

    eframe::run_native(
        "StormGrid",
        options,
        Box::new(move |_cc| Ok(Box::new(StormGridApp::new(&args, config)))),
    )
}

struct StormGridApp {
    game: GameState,
    config: AppConfig,
    tile_manager: TileManager,
    compositor: Compositor,
    /// None until geolocation resolves; the compositor does not run without
    /// a center
    center: Option<GeoPoint>,
    zoom: u8,
    dark_mode: bool,
    weather_enabled: bool,
    api_key: Option<String>,
    api_key_from_cli: bool,
    search_text: String,
    location_rx: Option<Receiver<Result<GeoPoint, LocationError>>>,
    search_rx: Option<Receiver<Result<PlaceMatch, LookupError>>>,
    notice: Option<(chrono::DateTime<chrono::Local>, String)>,
}

impl StormGridApp {
    fn new(args: &Args, mut config: AppConfig) -> Self {
        if let Some(layer) = args.layer {
            config.weather_layer = layer.into();
        }

        let api_key_from_cli = args.api_key.as_deref().is_some_and(|k| !k.is_empty());
        let api_key = args
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| weather::resolve_api_key(config.openweathermap_api_key.as_deref()));
        if api_key.is_none() {
            log::warn!("No OpenWeatherMap API key; weather overlay disabled");
        }

        let cli_center = args
            .lat
            .zip(args.lon)
            .map(|(lat, lon)| GeoPoint::new(lat, lon));
        let center = cli_center.or_else(|| {
            config
                .override_center()
                .map(|(lat, lon)| GeoPoint::new(lat, lon))
        });

        // One-shot geolocation off the UI thread; the map stays blank until
        // it answers or fails
        let location_rx = if center.is_none() {
            let (tx, rx) = channel();
            thread::spawn(move || {
                let _ = tx.send(geolocate::current_location());
            });
            Some(rx)
        } else {
            None
        };

        let zoom = args
            .zoom
            .unwrap_or(config.default_zoom)
            .clamp(MIN_ZOOM, MAX_ZOOM);

        Self {
            game: GameState::new(),
            tile_manager: TileManager::new(api_key.clone()),
            compositor: Compositor::new(),
            center,
            zoom,
            dark_mode: true,
            weather_enabled: true,
            api_key,
            api_key_from_cli,
            search_text: String::new(),
            location_rx,
            search_rx: None,
            notice: None,
            config,
        }
    }

    fn set_notice(&mut self, text: String) {
        self.notice = Some((chrono::Local::now(), text));
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            log::warn!("Failed to save config: {}", e);
        }
    }

    fn start_search(&mut self) {
        let query = self.search_text.trim().to_owned();
        if query.is_empty() || self.search_rx.is_some() {
            return;
        }

        let api_key = self.api_key.clone();
        let (tx, rx) = channel();
        thread::spawn(move || {
            let _ = tx.send(geocode::resolve_place(&query, api_key.as_deref()));
        });
        self.search_rx = Some(rx);
    }

    fn poll_background_tasks(&mut self) {
        if let Some(rx) = self.location_rx.take() {
            match rx.try_recv() {
                Ok(Ok(point)) => {
                    log::info!("Map centered at {:.4}, {:.4}", point.lat, point.lon);
                    self.center = Some(point);
                }
                Ok(Err(e)) => {
                    self.center = Some(FALLBACK_CENTER);
                    self.set_notice(format!("{e}; showing the default center"));
                }
                Err(TryRecvError::Empty) => self.location_rx = Some(rx),
                Err(TryRecvError::Disconnected) => {
                    self.center = Some(FALLBACK_CENTER);
                    self.set_notice("Location lookup stopped; showing the default center".to_owned());
                }
            }
        }

        if let Some(rx) = self.search_rx.take() {
            match rx.try_recv() {
                Ok(Ok(place)) => {
                    self.center = Some(place.point());
                    self.compositor.retarget(&mut self.tile_manager);
                    self.set_notice(format!("Centered on {}", place.label()));
                    self.search_text.clear();
                }
                // Lookup failures keep the previous center
                Ok(Err(e)) => self.set_notice(e.to_string()),
                Err(TryRecvError::Empty) => self.search_rx = Some(rx),
                Err(TryRecvError::Disconnected) => {
                    self.set_notice("Place lookup stopped".to_owned());
                }
            }
        }
    }

    fn draw_scene(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(
            egui::vec2(ui.available_width(), ui.available_height()),
            egui::Sense::click(),
        );
        let rect = response.rect;

        let backdrop = if self.dark_mode {
            Color32::from_rgb(18, 22, 30)
        } else {
            Color32::from_rgb(200, 220, 240)
        };
        painter.rect_filled(rect, 0.0, backdrop);

        if let Some(center) = self.center {
            let weather = (self.weather_enabled && self.tile_manager.has_api_key())
                .then_some(self.config.weather_layer);
            let style = if self.dark_mode {
                BasemapStyle::Dark
            } else {
                BasemapStyle::Light
            };

            self.compositor.draw(
                &painter,
                rect,
                ui.ctx(),
                &self.tile_manager,
                center,
                self.zoom,
                style,
                weather,
                self.config.overlay_opacity,
            );
        } else {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Locating...",
                egui::FontId::proportional(18.0),
                ui.visuals().text_color(),
            );
        }

        let board = board_rect(rect);
        self.draw_board(&painter, board);

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Some(index) = cell_index_at(board, pos) {
                    self.game.place_mark(index);
                }
            }
        }
    }

    fn draw_board(&self, painter: &egui::Painter, board: Rect) {
        let grid_color = if self.dark_mode {
            Color32::from_rgb(225, 230, 240)
        } else {
            Color32::from_rgb(40, 45, 55)
        };

        // Translucent backing keeps the board readable over busy weather
        painter.rect_filled(board.expand(14.0), 6.0, Color32::from_black_alpha(96));

        let cell = board.width() / 3.0;
        for i in 1..3 {
            let x = board.left() + cell * i as f32;
            painter.line_segment(
                [Pos2::new(x, board.top()), Pos2::new(x, board.bottom())],
                Stroke::new(3.0, grid_color),
            );
            let y = board.top() + cell * i as f32;
            painter.line_segment(
                [Pos2::new(board.left(), y), Pos2::new(board.right(), y)],
                Stroke::new(3.0, grid_color),
            );
        }

        for (index, cell_mark) in self.game.cells().iter().enumerate() {
            let Some(mark) = cell_mark else { continue };
            let r = cell_rect(board, index).shrink(cell * 0.24);
            match mark {
                Mark::X => {
                    let stroke = Stroke::new(5.0, Color32::from_rgb(235, 100, 90));
                    painter.line_segment([r.left_top(), r.right_bottom()], stroke);
                    painter.line_segment([r.right_top(), r.left_bottom()], stroke);
                }
                Mark::O => {
                    painter.circle_stroke(
                        r.center(),
                        r.width() / 2.0,
                        Stroke::new(5.0, Color32::from_rgb(90, 170, 235)),
                    );
                }
            }
        }

        if let Some(triple) = self.game.winning_triple() {
            let a = cell_rect(board, triple[0]).center();
            let b = cell_rect(board, triple[2]).center();
            painter.line_segment([a, b], Stroke::new(6.0, Color32::from_rgb(120, 220, 120)));
        }
    }

    fn draw_side_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(6.0);
        ui.heading("StormGrid");
        ui.add_space(6.0);

        ui.label(RichText::new(self.game.status_text()).size(18.0).strong());
        ui.add_space(4.0);
        if ui.button("New game").clicked() {
            self.game.reset();
        }
        ui.separator();

        let theme_label = if self.dark_mode {
            "Switch to light theme"
        } else {
            "Switch to dark theme"
        };
        if ui.button(theme_label).clicked() {
            self.dark_mode = !self.dark_mode;
            // New basemap style, so drop the pass in flight
            self.compositor.retarget(&mut self.tile_manager);
        }
        ui.separator();

        ui.label(RichText::new("MAP CENTER").size(11.0).monospace());
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.search_text)
                    .hint_text("Place name")
                    .desired_width(160.0),
            );
            let searching = self.search_rx.is_some();
            if ui.add_enabled(!searching, egui::Button::new("Go")).clicked() {
                self.start_search();
            }
        });
        if let Some(center) = self.center {
            ui.label(
                RichText::new(format!("{:.4}°, {:.4}°  z{}", center.lat, center.lon, self.zoom))
                    .size(10.0)
                    .monospace(),
            );
        }
        ui.horizontal(|ui| {
            if ui.button("−").clicked() && self.zoom > MIN_ZOOM {
                self.zoom -= 1;
                self.compositor.retarget(&mut self.tile_manager);
            }
            if ui.button("+").clicked() && self.zoom < MAX_ZOOM {
                self.zoom += 1;
                self.compositor.retarget(&mut self.tile_manager);
            }
            ui.label(RichText::new("zoom").size(10.0).weak());
        });
        ui.separator();

        ui.label(RichText::new("WEATHER OVERLAY").size(11.0).monospace());
        if self.tile_manager.has_api_key() {
            ui.checkbox(&mut self.weather_enabled, "Animate overlay");

            let mut layer = self.config.weather_layer;
            egui::ComboBox::from_label("Layer")
                .selected_text(layer.display_name())
                .show_ui(ui, |ui| {
                    for candidate in WeatherLayer::all() {
                        ui.selectable_value(&mut layer, candidate, candidate.display_name());
                    }
                });
            if layer != self.config.weather_layer {
                self.config.weather_layer = layer;
                self.compositor.retarget(&mut self.tile_manager);
                self.save_config();
            }

            let mut opacity = self.config.overlay_opacity;
            if ui
                .add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity"))
                .changed()
            {
                self.config.overlay_opacity = opacity;
                self.save_config();
            }

            let key_source = if self.api_key_from_cli {
                Some("command line")
            } else {
                weather::api_key_source(self.config.openweathermap_api_key.as_deref())
            };
            if let Some(source) = key_source {
                ui.label(RichText::new(format!("API key from {}", source)).size(9.0).weak());
            }
            ui.label(
                RichText::new(format!(
                    "frame {}/{}",
                    self.compositor.frame_index() + 1,
                    weather::FRAME_COUNT
                ))
                .size(9.0)
                .monospace()
                .weak(),
            );
        } else {
            ui.label(
                RichText::new("Overlay disabled: no OpenWeatherMap API key")
                    .color(Color32::from_rgb(230, 160, 60)),
            );
            ui.label(
                RichText::new("Set OPENWEATHERMAP_API_KEY or add it to the config file:")
                    .size(10.0)
                    .weak(),
            );
            if let Ok(path) = AppConfig::get_config_path() {
                ui.label(RichText::new(path.display().to_string()).size(9.0).monospace().weak());
            }
        }
        ui.separator();

        if let Some((at, text)) = &self.notice {
            ui.label(
                RichText::new(format!("{} {}", at.format("%H:%M:%S"), text))
                    .color(Color32::from_rgb(230, 180, 80))
                    .size(11.0),
            );
        }

        let errors = self.tile_manager.error_count();
        if self.tile_manager.has_loading_tiles() {
            ui.label(RichText::new("Loading map tiles...").size(10.0).weak());
        } else if errors > 0 {
            ui.label(RichText::new(format!("{} tiles failed to load", errors)).size(10.0).weak());
        }
    }
}

impl eframe::App for StormGridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        self.poll_background_tasks();

        egui::SidePanel::right("controls")
            .default_width(260.0)
            .show(ctx, |ui| self.draw_side_panel(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_scene(ui));

        if self.location_rx.is_some() || self.search_rx.is_some() {
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}

/// Square board centered in the viewport
fn board_rect(viewport: Rect) -> Rect {
    let side = (viewport.width().min(viewport.height()) * 0.55).clamp(180.0, 460.0);
    Rect::from_center_size(viewport.center(), Vec2::splat(side))
}

fn cell_rect(board: Rect, index: usize) -> Rect {
    let cell = board.width() / 3.0;
    let col = (index % 3) as f32;
    let row = (index / 3) as f32;
    Rect::from_min_size(
        Pos2::new(board.left() + col * cell, board.top() + row * cell),
        Vec2::splat(cell),
    )
}

/// Map a click position to a board cell index, row-major from the top left
fn cell_index_at(board: Rect, pos: Pos2) -> Option<usize> {
    if !board.contains(pos) {
        return None;
    }
    let cell = board.width() / 3.0;
    let col = (((pos.x - board.left()) / cell).floor() as usize).min(2);
    let row = (((pos.y - board.top()) / cell).floor() as usize).min(2);
    Some(row * 3 + col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_maps_to_cell_index() {
        let board = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::splat(300.0));
        assert_eq!(cell_index_at(board, Pos2::new(50.0, 50.0)), Some(0));
        assert_eq!(cell_index_at(board, Pos2::new(150.0, 50.0)), Some(1));
        assert_eq!(cell_index_at(board, Pos2::new(250.0, 250.0)), Some(8));
        assert_eq!(cell_index_at(board, Pos2::new(150.0, 150.0)), Some(4));
    }

    #[test]
    fn test_click_outside_board_is_ignored() {
        let board = Rect::from_min_size(Pos2::new(100.0, 100.0), Vec2::splat(300.0));
        assert_eq!(cell_index_at(board, Pos2::new(50.0, 50.0)), None);
        assert_eq!(cell_index_at(board, Pos2::new(500.0, 200.0)), None);
    }

    #[test]
    fn test_cell_rects_tile_the_board() {
        let board = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::splat(300.0));
        for index in 0..9 {
            let r = cell_rect(board, index);
            assert_eq!(cell_index_at(board, r.center()), Some(index));
        }
    }
}
