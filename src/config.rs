//! Configuration system for lapsetr with validation and default generation.
//!
//! The configuration describes one capture run: the camera, the two exposure
//! endpoints, and the four instants that frame the run. Twilight instants are
//! supplied by the user (from an almanac or ephemeris service), never computed.
//!
//! ## Configuration Sources
//!
//! 1. An explicit path given with `--config <path>`
//! 2. **XDG_CONFIG_HOME**/lapsetr/lapsetr.toml, created with defaults if missing
//!
//! ## Configuration Structure
//!
//! ```toml
//! #[Camera]
//! camera_name = "EOS R5"
//! base_iso = 100
//! max_iso = 6400
//!
//! #[Exposure at the start of the run]
//! start_f_ratio = 2.8
//! start_shutter = 0.001
//! start_iso = 100
//!
//! #[Exposure at the end of the run]
//! end_f_ratio = 2.8
//! end_shutter = 20
//! end_iso = 4000
//!
//! #[Timing]
//! capture_start = "2024-06-21 21:00:00"
//! capture_end = "2024-06-21 23:30:00"
//! civil_twilight = "2024-06-21T21:30:00+02:00"
//! astro_twilight = "2024-06-21T23:00:00+02:00"
//! ```
//!
//! Instants are RFC 3339 or local `YYYY-MM-DD HH:MM:SS`.
//!
//! ## Validation
//!
//! - **Exposure inputs**: every f-ratio, shutter and ISO must be positive
//! - **Camera range**: both endpoint ISOs (after snapping) must lie within
//!   `base_iso..=max_iso`
//! - **Windows**: capture must end after it starts; the twilight instants must
//!   differ by between 5 minutes and 6 hours
//! - **Warnings only**: differing endpoint apertures, or endpoints that move the
//!   exposure against the twilight direction

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::exposure::ExposureSetting;
use crate::logger::Log;
use crate::ramp::{ExposureRamp, RampDirection};
use crate::utils::{format_shutter, parse_instant, path_for_display};

/// The camera's native ISO range, used to sanity-check the endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProfile {
    pub name: String,
    pub base_iso: u32,
    pub max_iso: u32,
}

impl CameraProfile {
    pub fn supports_iso(&self, iso: u32) -> bool {
        (self.base_iso..=self.max_iso).contains(&iso)
    }
}

/// Configuration for one capture run, loaded from `lapsetr.toml`.
///
/// Camera fields are optional and fall back to the defaults in
/// [`crate::constants`]. Exposure endpoints and instants are required.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub camera_name: Option<String>,
    pub base_iso: Option<u32>,
    pub max_iso: Option<u32>,
    pub start_f_ratio: f64,
    pub start_shutter: f64, // seconds
    pub start_iso: f64,
    pub end_f_ratio: f64,
    pub end_shutter: f64, // seconds
    pub end_iso: f64,
    pub capture_start: String,
    pub capture_end: String,
    pub civil_twilight: String,
    pub astro_twilight: String,
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("lapsetr").join("lapsetr.toml"))
    }

    /// Load configuration from an explicit path, or from the default location.
    ///
    /// A default configuration file is written first if the default location
    /// has none. An explicit path must already exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<(Self, PathBuf)> {
        let config_path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::get_config_path()?;
                if !path.exists() {
                    Self::create_default_config(&path)
                        .context("Failed to create default config during load")?;
                    Log::log_block_start(&format!(
                        "Created default configuration at {}",
                        path_for_display(&path)
                    ));
                    Log::log_indented("Edit the twilight times before your first run");
                }
                path
            }
        };

        let config = Self::load_from_path(&config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                config_path.display()
            )
        })?;

        Ok((config, config_path))
    }

    /// Load and validate a configuration file. Does not create missing files.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.apply_defaults();
        validate_config(&config)?;

        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.camera_name.is_none() {
            self.camera_name = Some(DEFAULT_CAMERA_NAME.to_string());
        }
        if self.base_iso.is_none() {
            self.base_iso = Some(DEFAULT_BASE_ISO);
        }
        if self.max_iso.is_none() {
            self.max_iso = Some(DEFAULT_MAX_ISO);
        }
    }

    /// Write a commented configuration for a typical sunset run today.
    pub fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let today = Local::now().date_naive();
        let civil = today.and_time(
            NaiveTime::parse_from_str(DEFAULT_CIVIL_TWILIGHT, "%H:%M:%S")
                .context("Invalid default civil twilight time")?,
        );
        let astro = today.and_time(
            NaiveTime::parse_from_str(DEFAULT_ASTRO_TWILIGHT, "%H:%M:%S")
                .context("Invalid default astronomical twilight time")?,
        );
        let capture_start = civil - chrono::Duration::minutes(DEFAULT_CAPTURE_LEAD_MINUTES);
        let capture_end = astro + chrono::Duration::minutes(DEFAULT_CAPTURE_TAIL_MINUTES);

        let quoted = |instant: NaiveDateTime| format!("\"{}\"", instant.format("%Y-%m-%d %H:%M:%S"));

        let content = ConfigBuilder::new()
            .add_section("Camera")
            .add_setting(
                "camera_name",
                &format!("\"{}\"", DEFAULT_CAMERA_NAME),
                "Shown in the capture log",
            )
            .add_setting("base_iso", &DEFAULT_BASE_ISO.to_string(), "Lowest native ISO")
            .add_setting("max_iso", &DEFAULT_MAX_ISO.to_string(), "Highest usable ISO")
            .add_section("Exposure at the start of the run")
            .add_setting(
                "start_f_ratio",
                &DEFAULT_START_F_RATIO.to_string(),
                "Aperture, kept for the whole run",
            )
            .add_setting(
                "start_shutter",
                &DEFAULT_START_SHUTTER.to_string(),
                &format!("Seconds ({})", format_shutter(DEFAULT_START_SHUTTER)),
            )
            .add_setting("start_iso", &DEFAULT_START_ISO.to_string(), "Sensitivity")
            .add_section("Exposure at the end of the run")
            .add_setting(
                "end_f_ratio",
                &DEFAULT_END_F_RATIO.to_string(),
                "Ignored during the run, aperture stays at start_f_ratio",
            )
            .add_setting(
                "end_shutter",
                &DEFAULT_END_SHUTTER.to_string(),
                &format!("Seconds ({})", format_shutter(DEFAULT_END_SHUTTER)),
            )
            .add_setting("end_iso", &DEFAULT_END_ISO.to_string(), "Sensitivity")
            .add_section("Timing")
            .add_setting("capture_start", &quoted(capture_start), "First frame")
            .add_setting("capture_end", &quoted(capture_end), "No frames after this")
            .add_setting(
                "civil_twilight",
                &quoted(civil),
                "Civil dusk (sunset) or civil dawn (sunrise)",
            )
            .add_setting(
                "astro_twilight",
                &quoted(astro),
                "Astronomical dusk (sunset) or dawn (sunrise)",
            )
            .build();

        fs::write(path, content)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;

        Ok(())
    }

    pub fn camera(&self) -> CameraProfile {
        CameraProfile {
            name: self
                .camera_name
                .clone()
                .unwrap_or_else(|| DEFAULT_CAMERA_NAME.to_string()),
            base_iso: self.base_iso.unwrap_or(DEFAULT_BASE_ISO),
            max_iso: self.max_iso.unwrap_or(DEFAULT_MAX_ISO),
        }
    }

    pub fn start_exposure(&self) -> Result<ExposureSetting> {
        ExposureSetting::new(self.start_f_ratio, self.start_shutter, self.start_iso)
            .context("Invalid start exposure")
    }

    pub fn end_exposure(&self) -> Result<ExposureSetting> {
        ExposureSetting::new(self.end_f_ratio, self.end_shutter, self.end_iso)
            .context("Invalid end exposure")
    }

    pub fn capture_start_time(&self) -> Result<DateTime<Local>> {
        parse_instant(&self.capture_start).context("Invalid capture_start")
    }

    pub fn capture_end_time(&self) -> Result<DateTime<Local>> {
        parse_instant(&self.capture_end).context("Invalid capture_end")
    }

    pub fn civil_twilight_time(&self) -> Result<DateTime<Local>> {
        parse_instant(&self.civil_twilight).context("Invalid civil_twilight")
    }

    pub fn astro_twilight_time(&self) -> Result<DateTime<Local>> {
        parse_instant(&self.astro_twilight).context("Invalid astro_twilight")
    }

    /// Plan the exposure ramp described by this configuration.
    pub fn build_ramp(&self) -> Result<ExposureRamp> {
        ExposureRamp::new(
            self.start_exposure()?,
            self.end_exposure()?,
            self.capture_start_time()?,
            self.capture_end_time()?,
            self.civil_twilight_time()?,
            self.astro_twilight_time()?,
        )
    }

    pub fn log_config(&self, config_path: &Path) {
        Log::log_block_start(&format!(
            "Loaded configuration from {}",
            path_for_display(config_path)
        ));

        let camera = self.camera();
        Log::log_indented(&format!(
            "Camera: {} (ISO {}-{})",
            camera.name, camera.base_iso, camera.max_iso
        ));

        match (self.start_exposure(), self.end_exposure()) {
            (Ok(start), Ok(end)) => {
                Log::log_indented(&format!(
                    "Start exposure: {} (EV {:.2})",
                    start,
                    start.exposure_value()
                ));
                Log::log_indented(&format!(
                    "End exposure: {} (EV {:.2})",
                    end,
                    end.exposure_value()
                ));
            }
            _ => Log::log_indented("Exposure endpoints: invalid"),
        }

        Log::log_indented(&format!("Capture start: {}", self.capture_start));
        Log::log_indented(&format!("Capture end: {}", self.capture_end));
        Log::log_indented(&format!("Civil twilight: {}", self.civil_twilight));
        Log::log_indented(&format!("Astronomical twilight: {}", self.astro_twilight));
    }
}

/// Validate a configuration, rejecting values that cannot produce a ramp.
///
/// Suspicious but usable values are logged as warnings.
pub fn validate_config(config: &Config) -> Result<()> {
    let start = config.start_exposure()?;
    let end = config.end_exposure()?;

    let camera = config.camera();
    if camera.base_iso == 0 || camera.base_iso > camera.max_iso {
        anyhow::bail!(
            "Camera ISO range is invalid: base_iso {} must be positive and not above max_iso {}",
            camera.base_iso,
            camera.max_iso
        );
    }
    for (label, exposure) in [("Start", &start), ("End", &end)] {
        if !camera.supports_iso(exposure.iso()) {
            anyhow::bail!(
                "{} ISO {} is outside the range of {} (ISO {}-{})",
                label,
                exposure.iso(),
                camera.name,
                camera.base_iso,
                camera.max_iso
            );
        }
    }

    let capture_start = config.capture_start_time()?;
    let capture_end = config.capture_end_time()?;
    if capture_end <= capture_start {
        anyhow::bail!(
            "capture_end ({}) must be after capture_start ({})",
            config.capture_end,
            config.capture_start
        );
    }

    let civil = config.civil_twilight_time()?;
    let astro = config.astro_twilight_time()?;
    if civil == astro {
        anyhow::bail!("civil_twilight and astro_twilight must be different instants");
    }

    let twilight_minutes = (astro - civil).num_minutes().abs();
    if !(MINIMUM_TWILIGHT_MINUTES..=MAXIMUM_TWILIGHT_MINUTES).contains(&twilight_minutes) {
        anyhow::bail!(
            "Twilight window of {} minutes must be between {} and {} minutes",
            twilight_minutes,
            MINIMUM_TWILIGHT_MINUTES,
            MAXIMUM_TWILIGHT_MINUTES
        );
    }

    if start.aperture_index() != end.aperture_index() {
        Log::log_warning(&format!(
            "Aperture is fixed during a run; f/{} will be used throughout (end_f_ratio f/{} ignored)",
            start.f_ratio(),
            end.f_ratio()
        ));
    }

    // Sunset needs more light at the end (lower EV), sunrise less
    let direction = if astro < civil {
        RampDirection::Brightening
    } else {
        RampDirection::Darkening
    };
    let (start_ev, end_ev) = (start.exposure_value(), end.exposure_value());
    let against_direction = match direction {
        RampDirection::Darkening => end_ev > start_ev,
        RampDirection::Brightening => end_ev < start_ev,
    };
    if against_direction {
        Log::log_warning(&format!(
            "End exposure (EV {:.2}) moves the wrong way for a {} from start exposure (EV {:.2})",
            end_ev,
            direction.as_str(),
            start_ev
        ));
    }

    if capture_end < civil.min(astro) || capture_start > civil.max(astro) {
        Log::log_warning("Capture window does not overlap the twilight window; exposure will not change");
    }

    Ok(())
}

/// Builds a commented TOML file with aligned comments.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

enum EntryType {
    Section,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("#[{}]", title),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        let line = format!("{} = {}", key, value);
        self.entries.push(ConfigEntry {
            content: line.clone(),
            entry_type: EntryType::Setting {
                line,
                comment: format!("# {}", comment),
            },
        });
        self
    }

    fn build(self) -> String {
        // Widest setting line plus one space
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_section = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{}{}{}", line, padding, comment));
                }
            }
        }

        result.push(String::new());
        result.join("\n")
    }
}
