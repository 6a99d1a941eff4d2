//! Utility functions shared across the codebase.
//!
//! Formatting of durations and shutter speeds for log output, parsing of the
//! instants accepted in the configuration file, and path display helpers.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::path::Path;
use std::time::Duration;

/// Format a duration as `1h 05m 00s`, `4m 10s` or `22s`.
///
/// Sub-second remainders are dropped.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use lapsetr::utils::format_duration;
/// assert_eq!(format_duration(Duration::from_secs(22)), "22s");
/// assert_eq!(format_duration(Duration::from_secs(3900)), "1h 05m 00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a shutter duration the way cameras display it.
///
/// Durations under a second are shown as a fraction (`1/250s`, `1/2.5s`),
/// longer ones in plain seconds (`1.3s`, `20s`).
///
/// # Examples
/// ```
/// use lapsetr::utils::format_shutter;
/// assert_eq!(format_shutter(1.0 / 250.0), "1/250s");
/// assert_eq!(format_shutter(20.0), "20s");
/// ```
pub fn format_shutter(seconds: f64) -> String {
    if seconds >= 1.0 {
        return format!("{}s", seconds);
    }

    let denominator = 1.0 / seconds;
    if (denominator - denominator.round()).abs() < 0.05 {
        format!("1/{}s", denominator.round() as u64)
    } else {
        format!("1/{:.1}s", denominator)
    }
}

/// Parse an instant from the configuration file.
///
/// Accepts RFC 3339 (`2024-06-21T21:30:00+02:00`) or a local date and time
/// (`2024-06-21 21:30:00`).
pub fn parse_instant(value: &str) -> Result<DateTime<Local>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Local));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").with_context(|| {
        format!(
            "Invalid time '{}'. Use RFC 3339 or YYYY-MM-DD HH:MM:SS",
            value
        )
    })?;

    Local
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("Local time '{}' is ambiguous or does not exist", value))
}

/// Show a path with the home directory replaced by `~`.
pub fn path_for_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}
