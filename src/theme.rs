//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::game::Tile;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Tile and UI colours. Defaults are One Dark.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Tile colours, indexed by `Tile::index()`: sword, shield, potion, coin, enemy.
    pub tiles: [Color; 5],
    /// Board background.
    pub bg: Color,
    /// Border / grid.
    pub div_line: Color,
    /// Status text.
    pub main_fg: Color,
    /// Titles and labels.
    pub title: Color,
    /// Background of selected tiles.
    pub selection: Color,
    /// Hover cursor brackets.
    pub cursor: Color,
    /// Secondary status text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const ONEDARK_TILES: [Color; 5] = [
    Color::Rgb(0x61, 0xAF, 0xEF), // cpu_box / blue
    Color::Rgb(0x98, 0xC3, 0x79), // mem_box / green
    Color::Rgb(0xC6, 0x78, 0xDD), // net_box / magenta
    Color::Rgb(0xE5, 0xC0, 0x7B), // title / yellow
    Color::Rgb(0xE0, 0x6C, 0x75), // cpu_end / red
];

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            tiles: ONEDARK_TILES,
            bg: Color::Rgb(0x28, 0x2C, 0x34),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            selection: Color::Rgb(0xDC, 0xDF, 0xE4),
            cursor: Color::Rgb(0xD1, 0x9A, 0x66),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// No path (or a missing file) gives the One Dark defaults.
    /// `palette` then overrides tile colours for HighContrast / Colorblind.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.tiles = [
                    Color::Rgb(0x00, 0x88, 0xFF), // blue
                    Color::Rgb(0x00, 0xFF, 0x00), // green
                    Color::Rgb(0xFF, 0x00, 0xFF), // magenta
                    Color::Rgb(0xFF, 0xFF, 0x00), // yellow
                    Color::Rgb(0xFF, 0x00, 0x00), // red
                ];
                self.selection = Color::White;
            }
            crate::Palette::Colorblind => {
                // Okabe-Ito style: no red/green pair
                self.tiles = [
                    Color::Rgb(0x00, 0x77, 0xBB), // blue
                    Color::Rgb(0x00, 0x99, 0x88), // teal
                    Color::Rgb(0xEE, 0x33, 0x77), // magenta
                    Color::Rgb(0xEE, 0x77, 0x33), // orange
                    Color::Rgb(0xBB, 0xBB, 0xBB), // grey
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let d = Self::onedark_default();
        Self {
            tiles: [
                get("cpu_box").unwrap_or(d.tiles[0]),
                get("mem_box")
                    .or_else(|| get("cpu_start"))
                    .unwrap_or(d.tiles[1]),
                get("net_box").unwrap_or(d.tiles[2]),
                get("title")
                    .or_else(|| get("cpu_mid"))
                    .unwrap_or(d.tiles[3]),
                get("cpu_end")
                    .or_else(|| get("temp_end"))
                    .unwrap_or(d.tiles[4]),
            ],
            bg: get("main_bg").or_else(|| get("meter_bg")).unwrap_or(d.bg),
            div_line: get("div_line").unwrap_or(d.div_line),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            selection: get("selected_bg")
                .or_else(|| get("selected_fg"))
                .unwrap_or(d.selection),
            cursor: get("hi_fg").unwrap_or(d.cursor),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
        }
    }

    #[inline]
    pub fn tile_color(&self, tile: Tile) -> Color {
        self.tiles[tile.index()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(|| ThemeError::InvalidHex(s.to_string()))
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(ThemeError::InvalidHex(s.to_string())),
    };
    Ok(Color::Rgb(r, g, b))
}
