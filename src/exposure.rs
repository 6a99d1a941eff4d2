//! Camera exposure settings snapped to the standard 1/3-stop scales.
//!
//! An [`ExposureSetting`] stores three indices into the scale tables in
//! [`crate::constants`] rather than raw values, so every setting it can
//! represent is one the camera can actually be set to. Physical values are
//! read back from the tables on demand.

use anyhow::Result;
use std::fmt;

use crate::constants::{APERTURE_VALUES, ISO_VALUES, SHUTTER_VALUES};

/// Direction of a single one-third-stop adjustment on one axis.
///
/// `Increase` always means "more light": a higher ISO, a longer shutter,
/// or a wider aperture (smaller f-number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Increase,
    Decrease,
}

impl Step {
    /// Move `index` one position along a table of `len` entries, or `None`
    /// if that would leave the table.
    fn apply(self, index: usize, len: usize) -> Option<usize> {
        match self {
            Step::Increase if index + 1 < len => Some(index + 1),
            Step::Decrease if index > 0 => Some(index - 1),
            _ => None,
        }
    }
}

/// Find the index of the table entry closest to `target`.
///
/// Scans the whole table; on a tie the first entry found wins. Values past
/// either end of the table resolve to that end.
pub fn closest_index<T: Copy + Into<f64>>(values: &[T], target: f64) -> usize {
    let mut best_index = 0;
    let mut best_diff = f64::INFINITY;
    for (index, value) in values.iter().enumerate() {
        let diff = ((*value).into() - target).abs();
        if diff < best_diff {
            best_index = index;
            best_diff = diff;
        }
    }
    best_index
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        anyhow::bail!("Invalid {}: {} (must be a positive number)", name, value);
    }
    Ok(())
}

/// A camera exposure as positions on the aperture, shutter and ISO scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureSetting {
    aperture_index: usize,
    shutter_index: usize,
    iso_index: usize,
}

impl ExposureSetting {
    /// Snap approximate photographic values to the nearest settings on each scale.
    ///
    /// # Arguments
    /// * `f_ratio` - Aperture f-number, e.g. `2.8`
    /// * `shutter_seconds` - Shutter duration in seconds, e.g. `1.0 / 250.0`
    /// * `iso` - Sensor sensitivity, e.g. `400.0`
    ///
    /// # Returns
    /// The snapped setting, or an error if any input is zero, negative or not finite
    pub fn new(f_ratio: f64, shutter_seconds: f64, iso: f64) -> Result<Self> {
        require_positive("f-ratio", f_ratio)?;
        require_positive("shutter duration", shutter_seconds)?;
        require_positive("ISO", iso)?;

        Ok(Self {
            aperture_index: closest_index(&APERTURE_VALUES, f_ratio),
            shutter_index: closest_index(&SHUTTER_VALUES, shutter_seconds),
            iso_index: closest_index(&ISO_VALUES, iso),
        })
    }

    pub fn iso(&self) -> u32 {
        ISO_VALUES[self.iso_index]
    }

    pub fn shutter(&self) -> f64 {
        SHUTTER_VALUES[self.shutter_index]
    }

    pub fn f_ratio(&self) -> f64 {
        APERTURE_VALUES[self.aperture_index]
    }

    pub fn aperture_index(&self) -> usize {
        self.aperture_index
    }

    pub fn shutter_index(&self) -> usize {
        self.shutter_index
    }

    pub fn iso_index(&self) -> usize {
        self.iso_index
    }

    /// Exposure value in stops: `log2(N² / t / (ISO / 100))`.
    ///
    /// Larger values mean less light reaches the sensor, so a brighter scene
    /// needs a higher EV.
    pub fn exposure_value(&self) -> f64 {
        let f_ratio = self.f_ratio();
        (f_ratio * f_ratio / self.shutter() / (f64::from(self.iso()) / 100.0)).log2()
    }

    /// Open up or stop down the aperture by one third of a stop.
    ///
    /// Returns the new f-ratio, or `None` if the aperture is already at the
    /// end of its scale in that direction.
    pub fn adjust_aperture(&mut self, step: Step) -> Option<f64> {
        self.aperture_index = step.apply(self.aperture_index, APERTURE_VALUES.len())?;
        Some(self.f_ratio())
    }

    /// Lengthen or shorten the shutter by one third of a stop.
    pub fn adjust_shutter(&mut self, step: Step) -> Option<f64> {
        self.shutter_index = step.apply(self.shutter_index, SHUTTER_VALUES.len())?;
        Some(self.shutter())
    }

    /// Raise or lower the ISO by one third of a stop.
    pub fn adjust_iso(&mut self, step: Step) -> Option<u32> {
        self.iso_index = step.apply(self.iso_index, ISO_VALUES.len())?;
        Some(self.iso())
    }
}

impl fmt::Display for ExposureSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ISO {}, {}s, f/{}", self.iso(), self.shutter(), self.f_ratio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;

    fn max_exposure() -> ExposureSetting {
        ExposureSetting {
            aperture_index: APERTURE_VALUES.len() - 1,
            shutter_index: SHUTTER_VALUES.len() - 1,
            iso_index: ISO_VALUES.len() - 1,
        }
    }

    fn min_exposure() -> ExposureSetting {
        ExposureSetting {
            aperture_index: 0,
            shutter_index: 0,
            iso_index: 0,
        }
    }

    #[test]
    fn test_snaps_exact_table_values() {
        let exposure = ExposureSetting::new(2.8, 20.0, 4000.0).unwrap();
        assert_eq!(exposure.f_ratio(), 2.8);
        assert_eq!(exposure.shutter(), 20.0);
        assert_eq!(exposure.iso(), 4000);
    }

    #[test]
    fn test_snaps_approximate_values_to_nearest() {
        let exposure = ExposureSetting::new(2.7, 1.0 / 990.0, 420.0).unwrap();
        assert_eq!(exposure.f_ratio(), 2.8);
        assert_eq!(exposure.shutter(), 1.0 / 1000.0);
        assert_eq!(exposure.iso(), 400);
    }

    #[test]
    fn test_snap_tie_prefers_first_entry() {
        // 112.5 is exactly halfway between ISO 100 and ISO 125
        assert_eq!(closest_index(&ISO_VALUES, 112.5), 0);
        // 21.0 is halfway between f/22 and f/20
        assert_eq!(closest_index(&APERTURE_VALUES, 21.0), 0);
    }

    #[test]
    fn test_snap_clamps_outside_the_scales() {
        let bright = ExposureSetting::new(100.0, 1.0e-6, 1.0).unwrap();
        assert_eq!(bright, min_exposure());

        let dark = ExposureSetting::new(0.5, 3600.0, 1.0e6).unwrap();
        assert_eq!(dark, max_exposure());
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(ExposureSetting::new(0.0, 1.0, 100.0).is_err());
        assert!(ExposureSetting::new(2.8, -1.0, 100.0).is_err());
        assert!(ExposureSetting::new(2.8, 1.0, 0.0).is_err());
        assert!(ExposureSetting::new(f64::NAN, 1.0, 100.0).is_err());
        assert!(ExposureSetting::new(2.8, f64::INFINITY, 100.0).is_err());

        let err = ExposureSetting::new(2.8, 1.0, -5.0).unwrap_err();
        assert!(err.to_string().starts_with("Invalid ISO"));
    }

    #[test]
    fn test_exposure_value() {
        // f/4 at 1s and ISO 100 is EV 4
        let exposure = ExposureSetting::new(4.0, 1.0, 100.0).unwrap();
        assert!((exposure.exposure_value() - 4.0).abs() < 1e-9);

        // Doubling ISO from 100 to 200 takes away exactly one stop
        let doubled = ExposureSetting::new(4.0, 1.0, 200.0).unwrap();
        assert!((doubled.exposure_value() - 3.0).abs() < 1e-9);

        let night = ExposureSetting::new(TEST_F_RATIO, TEST_DARK_SHUTTER, TEST_DARK_ISO).unwrap();
        let expected = (2.8f64 * 2.8 / 20.0 / 40.0).log2();
        assert!((night.exposure_value() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_adjust_returns_new_value() {
        let mut exposure = ExposureSetting::new(2.8, 1.0 / 1000.0, 100.0).unwrap();

        assert_eq!(exposure.adjust_iso(Step::Increase), Some(125));
        assert_eq!(exposure.adjust_shutter(Step::Increase), Some(1.0 / 800.0));
        assert_eq!(exposure.adjust_shutter(Step::Decrease), Some(1.0 / 1000.0));
        // Opening up means a smaller f-number
        assert_eq!(exposure.adjust_aperture(Step::Increase), Some(2.5));
        assert_eq!(exposure.adjust_aperture(Step::Decrease), Some(2.8));
    }

    #[test]
    fn test_adjust_past_minimum_is_no_change() {
        let mut exposure = min_exposure();
        assert_eq!(exposure.adjust_iso(Step::Decrease), None);
        assert_eq!(exposure.adjust_shutter(Step::Decrease), None);
        assert_eq!(exposure.adjust_aperture(Step::Decrease), None);
        assert_eq!(exposure, min_exposure());

        // Repeated requests stay put
        assert_eq!(exposure.adjust_iso(Step::Decrease), None);
        assert_eq!(exposure.iso_index(), 0);
    }

    #[test]
    fn test_adjust_past_maximum_is_no_change() {
        let mut exposure = max_exposure();
        assert_eq!(exposure.adjust_iso(Step::Increase), None);
        assert_eq!(exposure.adjust_shutter(Step::Increase), None);
        assert_eq!(exposure.adjust_aperture(Step::Increase), None);
        assert_eq!(exposure, max_exposure());
    }

    #[test]
    fn test_iso_round_trip() {
        let original = ExposureSetting::new(5.6, 1.0 / 60.0, 800.0).unwrap();
        let mut exposure = original;
        exposure.adjust_iso(Step::Increase);
        exposure.adjust_iso(Step::Decrease);
        assert_eq!(exposure, original);
    }

    #[test]
    fn test_display() {
        let exposure = ExposureSetting::new(2.8, 20.0, 4000.0).unwrap();
        assert_eq!(exposure.to_string(), "ISO 4000, 20s, f/2.8");
    }
}
