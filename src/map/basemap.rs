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

/// Carto CDN basemap style, matching the app theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasemapStyle {
    Light,
    Dark,
}

impl BasemapStyle {
    fn path(self) -> &'static str {
        match self {
            BasemapStyle::Light => "light_all",
            BasemapStyle::Dark => "dark_all",
        }
    }
}

/// Tile URL on the Carto CDN for the given style.
/// Uses subdomain load balancing across a-d.basemaps.cartocdn.com
pub fn basemap_tile_url(style: BasemapStyle, zoom: u8, x: u32, y: u32) -> String {
    // Subdomain load balancing (a, b, c, d) based on tile coordinates
    let subdomain = ['a', 'b', 'c', 'd'][((x + y) % 4) as usize];

    format!(
        "https://{}.basemaps.cartocdn.com/{}/{}/{}/{}.png",
        subdomain,
        style.path(),
        zoom,
        x,
        y
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdomain_rotation() {
        assert_eq!(
            basemap_tile_url(BasemapStyle::Dark, 3, 0, 0),
            "https://a.basemaps.cartocdn.com/dark_all/3/0/0.png"
        );
        assert_eq!(
            basemap_tile_url(BasemapStyle::Dark, 3, 2, 3),
            "https://b.basemaps.cartocdn.com/dark_all/3/2/3.png"
        );
    }

    #[test]
    fn test_style_selects_path() {
        assert!(basemap_tile_url(BasemapStyle::Light, 1, 1, 1).contains("/light_all/"));
    }
}
