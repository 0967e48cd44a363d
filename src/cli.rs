// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use soomfon_panel::{Fit, Rotation};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "soomfon_driver")]
#[command(author, version, about = "SOOMFON stream controller Linux driver")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/soomfon/driver.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); overrides the config file
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected panels
    #[command(visible_alias = "ls")]
    List,

    /// Print decoded button/encoder events until Ctrl-C
    #[command(visible_alias = "mon")]
    Monitor {
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Wake the displays
    Wake,

    /// Clear one LCD button (0-5), or all of them
    Clear {
        /// LCD button index; omit to clear every button
        button: Option<u8>,
    },

    /// Set display brightness
    #[command(visible_alias = "br")]
    Brightness {
        /// Brightness percent (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },

    /// Commit pending display changes
    Refresh,

    /// Show an image file (PNG/JPEG) on an LCD button
    #[command(visible_alias = "img")]
    Image {
        /// LCD button index (0-5)
        button: u8,
        /// Image file
        file: PathBuf,
        /// How to fit the image onto the 72x72 display
        #[arg(long, value_enum, default_value_t = FitArg::Cover)]
        fit: FitArg,
        /// Clockwise rotation in degrees (0, 90, 180, 270)
        #[arg(long, default_value = "0", value_parser = parse_rotation)]
        rotate: Rotation,
        /// Mirror left-right
        #[arg(long)]
        flip_h: bool,
        /// Mirror top-bottom
        #[arg(long)]
        flip_v: bool,
        /// Letterbox color for --fit contain, as RRGGBB
        #[arg(long, value_parser = parse_color)]
        background: Option<[u8; 3]>,
    },

    /// Fill an LCD button with one color
    Solid {
        /// LCD button index (0-5)
        button: u8,
        r: u8,
        g: u8,
        b: u8,
    },

    /// Show the diagnostic gradient on an LCD button
    Gradient {
        /// LCD button index (0-5)
        button: u8,
    },

    /// Send a raw report (hex bytes, zero-padded to 64)
    Raw {
        /// Report bytes, e.g. `00 03 50` or `000350`
        #[arg(required = true, num_args = 1..)]
        bytes: Vec<String>,
    },

    /// Clear every display and release the panel
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FitArg {
    Cover,
    Contain,
    Stretch,
}

impl From<FitArg> for Fit {
    fn from(arg: FitArg) -> Self {
        match arg {
            FitArg::Cover => Fit::Cover,
            FitArg::Contain => Fit::Contain,
            FitArg::Stretch => Fit::Stretch,
        }
    }
}

fn parse_rotation(s: &str) -> Result<Rotation, String> {
    s.parse::<u16>()
        .ok()
        .and_then(Rotation::from_degrees)
        .ok_or_else(|| format!("rotation must be 0, 90, 180 or 270, got '{s}'"))
}

fn parse_color(s: &str) -> Result<[u8; 3], String> {
    let hex = s.trim_start_matches('#');
    if hex.len() != 6 {
        return Err(format!("color must be RRGGBB, got '{s}'"));
    }
    let bytes = soomfon_driver::parse_hex_bytes(&[hex])?;
    Ok([bytes[0], bytes[1], bytes[2]])
}
