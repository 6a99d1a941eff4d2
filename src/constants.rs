//! Exposure scales, application defaults and operational constants for lapsetr.
//!
//! This module contains the camera's discrete exposure scales, the configuration
//! defaults and validation limits, and the timing constants used by the
//! capture loop.

// ═══ Exposure Scales ═══
// Standard values in 1/3-stop increments, ordered by increasing exposure.
// Index 0 always contributes the least light on its axis.

/// ISO sensitivities, 100 to 25600.
pub const ISO_VALUES: [u32; 25] = [
    100, 125, 160, 200, 250, 320, 400, 500, 640, 800, 1000, 1250, 1600, 2000, 2500, 3200, 4000,
    5000, 6400, 8000, 10000, 12800, 16000, 20000, 25600,
];

/// Aperture f-ratios, f/22 down to f/1.2. Numerically decreasing because a
/// wider aperture lets in more light.
pub const APERTURE_VALUES: [f64; 24] = [
    22.0, 20.0, 18.0, 16.0, 14.0, 13.0, 11.0, 10.0, 9.0, 8.0, 7.1, 6.3, 5.6, 5.0, 4.5, 4.0, 3.5,
    3.2, 2.8, 2.5, 2.0, 1.8, 1.4, 1.2,
];

/// Shutter durations in seconds, 1/8000 s to 30 s.
pub const SHUTTER_VALUES: [f64; 55] = [
    1.0 / 8000.0,
    1.0 / 6400.0,
    1.0 / 5000.0,
    1.0 / 4000.0,
    1.0 / 3200.0,
    1.0 / 2500.0,
    1.0 / 2000.0,
    1.0 / 1600.0,
    1.0 / 1250.0,
    1.0 / 1000.0,
    1.0 / 800.0,
    1.0 / 640.0,
    1.0 / 500.0,
    1.0 / 400.0,
    1.0 / 320.0,
    1.0 / 250.0,
    1.0 / 200.0,
    1.0 / 160.0,
    1.0 / 125.0,
    1.0 / 100.0,
    1.0 / 80.0,
    1.0 / 60.0,
    1.0 / 50.0,
    1.0 / 40.0,
    1.0 / 30.0,
    1.0 / 25.0,
    1.0 / 20.0,
    1.0 / 15.0,
    1.0 / 13.0,
    1.0 / 10.0,
    1.0 / 8.0,
    1.0 / 6.0,
    1.0 / 5.0,
    1.0 / 4.0,
    1.0 / 3.0,
    1.0 / 2.5,
    1.0 / 2.0,
    1.0 / 1.6,
    1.0 / 1.3,
    1.0,
    1.3,
    1.6,
    2.0,
    2.5,
    3.0,
    4.0,
    5.0,
    6.0,
    8.0,
    10.0,
    13.0,
    15.0,
    20.0,
    25.0,
    30.0,
];

// ═══ Ramp Constants ═══

pub const READOUT_OVERHEAD_SECONDS: u64 = 2; // Sensor buffer read-out between frames
pub const STEP_ROUNDING_FACTOR: f64 = 9.0; // Step count is rounded up in ninths of a stop...
pub const STEPS_PER_STOP: f64 = 3.0; // ...then expressed in thirds

// ═══ Application Configuration Defaults ═══
// These values are used when config options are not specified by the user

pub const DEFAULT_CAMERA_NAME: &str = "camera";
pub const DEFAULT_BASE_ISO: u32 = 100;
pub const DEFAULT_MAX_ISO: u32 = 25600;

// Values written into a freshly generated config (a typical sunset run)
pub const DEFAULT_START_F_RATIO: f64 = 2.8;
pub const DEFAULT_START_SHUTTER: f64 = 1.0 / 1000.0;
pub const DEFAULT_START_ISO: u32 = 100;
pub const DEFAULT_END_F_RATIO: f64 = 2.8;
pub const DEFAULT_END_SHUTTER: f64 = 20.0;
pub const DEFAULT_END_ISO: u32 = 4000;
pub const DEFAULT_CIVIL_TWILIGHT: &str = "21:30:00";
pub const DEFAULT_ASTRO_TWILIGHT: &str = "23:00:00";
pub const DEFAULT_CAPTURE_LEAD_MINUTES: i64 = 30; // capture starts this long before civil twilight
pub const DEFAULT_CAPTURE_TAIL_MINUTES: i64 = 30; // and ends this long after astronomical twilight

// ═══ Validation Limits ═══

pub const MINIMUM_TWILIGHT_MINUTES: i64 = 5;
pub const MAXIMUM_TWILIGHT_MINUTES: i64 = 6 * 60; // high latitudes in summer

// ═══ Operational Timing Constants ═══

pub const CHECK_INTERVAL_SECS: u64 = 1; // How often to check the running flag during sleep
pub const LOCK_FILE_NAME: &str = "lapsetr.lock";

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1; // General failure
