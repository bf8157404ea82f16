use clap::{Parser, Subcommand};
use feature_locator::blob_detection::DEFAULT_LOCATION;
use feature_locator::frame::Rect;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "feature-locator",
    version,
    about = "🎯 Locate UI controls and moving features in captured frames"
)]
pub struct Args {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Templates and coordinate store (default: $FEATURE_LOCATOR_DATA_DIR or ~/.feature-locator)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Search a template image in a frame
    Match {
        frame: PathBuf,
        template: PathBuf,
        #[arg(long, default_value_t = 0.85)]
        threshold: f32,
        /// Report every placement instead of the best one
        #[arg(long)]
        all: bool,
        /// Minimum spacing between placements reported with --all
        #[arg(long, default_value_t = 10)]
        min_distance: u32,
        /// Keep re-reading the frame file for up to this long until the template appears
        #[arg(long, conflicts_with = "all")]
        wait_ms: Option<u64>,
        /// Write a debug overlay PNG
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
    /// Run one blob scan on a frame
    Blob {
        frame: PathBuf,
        #[arg(long, default_value = DEFAULT_LOCATION)]
        location: String,
        /// Scan this x,y,width,height rectangle instead of the location's region
        #[arg(long, value_parser = parse_rect)]
        region: Option<Rect>,
        /// Enable water, bubble, edge and color-fallback checks
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
    /// Scan frames until the feature holds still, then print the cast
    Settle {
        /// One file (re-read on every scan) or a sequence of frames
        #[arg(required = true, num_args = 1..)]
        frames: Vec<PathBuf>,
        #[arg(long, default_value = DEFAULT_LOCATION)]
        location: String,
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
        #[arg(long, default_value_t = 5000)]
        max_wait_ms: u64,
        #[arg(long, default_value_t = 2)]
        required: u32,
        #[arg(long, default_value_t = 20)]
        tolerance: i32,
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
    /// Find a registered element in a frame, using and updating the cache
    Locate {
        name: String,
        #[arg(long)]
        frame: PathBuf,
        #[arg(long, default_value = "")]
        description: String,
        /// Ignore the cached position
        #[arg(long)]
        force: bool,
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
    /// Cut an element's template out of a frame
    Register {
        name: String,
        #[arg(long)]
        frame: PathBuf,
        /// x,y,width,height
        #[arg(long, value_parser = parse_rect)]
        rect: Rect,
    },
    /// Set or clear the fallback coordinate of an element
    SetManual {
        name: String,
        #[arg(required_unless_present = "clear")]
        x: Option<i32>,
        #[arg(required_unless_present = "clear")]
        y: Option<i32>,
        #[arg(long)]
        clear: bool,
    },
    /// Forget cached positions (all elements when no name is given)
    ClearCache { name: Option<String> },
    /// Delete an element's template and every stored coordinate
    Forget { name: String },
    /// Override a location's scan region, as percentages x,y,width,height of the window
    SetRegion {
        location: String,
        #[arg(value_parser = parse_percent_rect, required_unless_present = "reset")]
        percent: Option<[f64; 4]>,
        /// Drop the override and use the preset again
        #[arg(long, conflicts_with = "percent")]
        reset: bool,
    },
    /// Show elements, templates and locations
    List,
}

fn split_four<T: std::str::FromStr>(s: &str) -> Result<[T; 4], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected x,y,width,height, got '{}'", s));
    }
    let mut out = Vec::with_capacity(4);
    for part in parts {
        out.push(
            part.parse::<T>()
                .map_err(|_| format!("invalid number '{}' in '{}'", part, s))?,
        );
    }
    out.try_into()
        .map_err(|_| format!("expected x,y,width,height, got '{}'", s))
}

pub fn parse_rect(s: &str) -> Result<Rect, String> {
    let [x, y, width, height] = split_four::<u32>(s)?;
    Ok(Rect::new(x, y, width, height))
}

pub fn parse_percent_rect(s: &str) -> Result<[f64; 4], String> {
    let values = split_four::<f64>(s)?;
    if values.iter().any(|v| !(0.0..=100.0).contains(v)) {
        return Err(format!("percentages must be within 0-100, got '{}'", s));
    }
    Ok(values)
}
