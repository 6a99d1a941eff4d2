//! # Lapsetr
//!
//! Exposure ramping for unattended sunrise and sunset time-lapses.
//!
//! Lapsetr walks a camera from a start exposure to an end exposure across the
//! twilight window in 1/3-stop steps, keeping the shooting interval long enough
//! for the slowest shutter speed the ramp will reach.
//!
//! ## Architecture
//!
//! - **args**: Command-line parsing
//! - **config**: Configuration loading, validation, and default generation
//! - **constants**: Exposure tables, ramp constants and defaults
//! - **exposure**: Exposure settings snapped to the 1/3-stop tables
//! - **lock**: Single-instance lock file
//! - **logger**: Structured logging with visual formatting
//! - **ramp**: Twilight schedule and step policy
//! - **timelapse**: Capture loop over a clock and a camera
//! - **utils**: Formatting and time parsing helpers

pub mod args;
pub mod config;
pub mod constants;
pub mod exposure;
pub mod lock;
pub mod logger;
pub mod ramp;
pub mod timelapse;
pub mod utils;

// Re-export important types for easier access
pub use config::{CameraProfile, Config};
pub use exposure::{ExposureSetting, Step};
pub use logger::{Log, LogLevel};
pub use ramp::{Adjustment, ExposureRamp, RampDirection, RampPhase, TickResult};
pub use timelapse::{Camera, Clock, RunSummary, run_timelapse};
