//! Tilestui — match-three tile puzzle in the terminal.

mod app;
mod game;
mod input;
mod logging;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use thiserror::Error;

/// Largest board side; keeps the board on an ordinary terminal.
pub const MAX_BOARD_DIM: u16 = 16;
/// Accepted `--frame-rate` range (frames per second).
pub const FRAME_RATE_RANGE: std::ops::RangeInclusive<f64> = 0.1..=1000.0;

/// Game settings derived from the CLI and validated before the terminal is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    pub coin_threshold: u32,
    pub seed: Option<u64>,
    pub frame_rate: f64,
    pub no_animation: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("--{name} must be between 1 and {max} (got {value})")]
    Dimension {
        name: &'static str,
        value: u16,
        max: u16,
    },
    #[error("--coin-threshold must be at least 1")]
    CoinThreshold,
    #[error("--frame-rate must be between 0.1 and 1000 (got {0})")]
    FrameRate(f64),
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        for (name, value) in [("rows", args.rows), ("cols", args.cols)] {
            if value == 0 || value > MAX_BOARD_DIM {
                return Err(ConfigError::Dimension {
                    name,
                    value,
                    max: MAX_BOARD_DIM,
                });
            }
        }
        if args.coin_threshold == 0 {
            return Err(ConfigError::CoinThreshold);
        }
        if !FRAME_RATE_RANGE.contains(&args.frame_rate) {
            return Err(ConfigError::FrameRate(args.frame_rate));
        }
        Ok(Self {
            rows: args.rows as usize,
            cols: args.cols as usize,
            coin_threshold: args.coin_threshold,
            seed: args.seed,
            frame_rate: args.frame_rate,
            no_animation: args.no_animation,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;
    let config = GameConfig::from_args(&args)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|err| {
        tracing::warn!(%err, "theme not loaded; using defaults");
        theme::Theme::default_for_palette(args.palette)
    });
    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// Match-three tile puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "tilestui",
    version,
    about = "Match-three tile puzzle in the terminal. Drag across 3+ matching tiles to clear them; coins earn rewards.",
    long_about = "Tilestui is a terminal match-three puzzle.\n\n\
        Drag across a chain of touching tiles of the same kind (diagonals count). Release to clear \
        chains of three or more: each tile scores a point, the tiles above fall and new ones drop in. \
        Matching coins fills the coin counter; every full threshold pays out a reward.\n\n\
        CONTROLS:\n  Mouse       Drag with the left button, release to clear\n  \
        Arrows/hjkl Move cursor   Space/Enter Start or finish a chain\n  \
        R           Restart       P           Pause      Q / Esc  Quit"
)]
pub struct Args {
    /// Board rows.
    #[arg(long, default_value = "6", value_name = "ROWS")]
    pub rows: u16,

    /// Board columns.
    #[arg(long, default_value = "6", value_name = "COLS")]
    pub cols: u16,

    /// Coins needed for one reward.
    #[arg(long, default_value = "2", value_name = "N")]
    pub coin_threshold: u32,

    /// Seed for tile generation (same seed, same boards).
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Target render frames per second (0.1 to 1000).
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Disable the fade-in of fallen and refilled tiles.
    #[arg(long)]
    pub no_animation: bool,

    /// Write logs to this file (filter with RUST_LOG).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
