//! Exposure ramping across a twilight window.
//!
//! An [`ExposureRamp`] walks the live exposure from a start setting to an end
//! setting one third of a stop at a time, spreading the steps evenly over the
//! time between civil and astronomical twilight. It performs no I/O: the
//! capture loop calls [`ExposureRamp::tick`] once per frame and uses the
//! result to decide what to shoot and how long to wait.
//!
//! ## Direction
//! - **Darkening** (sunset, astronomical twilight after civil): the shutter is
//!   lengthened first, then the ISO raised.
//! - **Brightening** (sunrise, astronomical twilight before civil): the ISO is
//!   lowered first, then the shutter shortened.
//!
//! Aperture never changes during a run.

use chrono::{DateTime, Duration, Local};
use std::time::Duration as StdDuration;

use crate::constants::{READOUT_OVERHEAD_SECONDS, STEP_ROUNDING_FACTOR, STEPS_PER_STOP};
use crate::exposure::{ExposureSetting, Step};

/// Which way the light is changing over the twilight window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Brightening, // Sunrise: exposure decreases over time
    Darkening,   // Sunset: exposure increases over time
}

impl RampDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RampDirection::Brightening => "sunrise",
            RampDirection::Darkening => "sunset",
        }
    }
}

/// Lifecycle of a ramp as seen by the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPhase {
    NotStarted,
    Waiting,
    Ramping,
    Completed,
}

/// A single step applied by the ramp, carrying the new value on that axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    Shutter(f64),
    Iso(u32),
}

/// Outcome of one [`ExposureRamp::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickResult {
    /// Capture has not started yet; wait this long.
    Waiting(StdDuration),
    /// Take a frame with `exposure`, then wait out `shooting_interval` before the next tick.
    Shoot {
        exposure: ExposureSetting,
        shooting_interval: StdDuration,
        adjustment: Option<Adjustment>,
    },
    /// The capture loop has closed the ramp.
    Completed,
}

/// Pacing of exposure adjustments. Absent when the endpoints need no steps.
#[derive(Debug, Clone, Copy)]
struct Cadence {
    interval_seconds: f64,
    interval: Duration,
    next_adjustment: DateTime<Local>,
}

/// Number of one-third-stop steps needed to cover `exposure_diff` stops.
///
/// The difference is first rounded up to a whole ninth of a stop and only then
/// expressed in thirds, so the result is not always an integer.
pub fn step_count(exposure_diff: f64) -> f64 {
    (exposure_diff * STEP_ROUNDING_FACTOR).ceil() / STEPS_PER_STOP
}

/// Plans and applies exposure changes for one sunrise or sunset.
#[derive(Debug, Clone)]
pub struct ExposureRamp {
    start_exposure: ExposureSetting,
    end_exposure: ExposureSetting,
    current_exposure: ExposureSetting,
    capture_start: DateTime<Local>,
    capture_end: DateTime<Local>,
    civil_twilight: DateTime<Local>,
    astro_twilight: DateTime<Local>,
    direction: RampDirection,
    ramp_start: DateTime<Local>,
    shooting_interval: StdDuration,
    cadence: Option<Cadence>,
    phase: RampPhase,
}

impl ExposureRamp {
    /// Plan a ramp between two exposures over a twilight window.
    ///
    /// The direction is derived from the twilight instants. The ramp begins at
    /// the earlier of the two, or at `capture_start` if capture begins later.
    ///
    /// # Arguments
    /// * `start_exposure` - Setting at the beginning of the window
    /// * `end_exposure` - Setting the ramp should arrive at
    /// * `capture_start` / `capture_end` - When the rig shoots
    /// * `civil_twilight` / `astro_twilight` - The twilight instants for this event
    ///
    /// # Returns
    /// The planned ramp, or an error for an empty capture or twilight window
    pub fn new(
        start_exposure: ExposureSetting,
        end_exposure: ExposureSetting,
        capture_start: DateTime<Local>,
        capture_end: DateTime<Local>,
        civil_twilight: DateTime<Local>,
        astro_twilight: DateTime<Local>,
    ) -> anyhow::Result<Self> {
        if capture_end <= capture_start {
            anyhow::bail!(
                "Invalid capture window: end {} is not after start {}",
                capture_end.format("%Y-%m-%d %H:%M:%S"),
                capture_start.format("%Y-%m-%d %H:%M:%S")
            );
        }
        if civil_twilight == astro_twilight {
            anyhow::bail!("Invalid twilight window: civil and astronomical twilight are the same instant");
        }

        let direction = if astro_twilight < civil_twilight {
            RampDirection::Brightening
        } else {
            RampDirection::Darkening
        };

        let window_start = civil_twilight.min(astro_twilight);
        let ramp_start = window_start.max(capture_start);

        let longest_shutter = start_exposure.shutter().max(end_exposure.shutter());
        let shooting_interval =
            StdDuration::from_secs(longest_shutter.round() as u64 + READOUT_OVERHEAD_SECONDS);

        let exposure_diff =
            (start_exposure.exposure_value() - end_exposure.exposure_value()).abs();
        let total_steps = step_count(exposure_diff);
        let twilight_seconds = (astro_twilight - civil_twilight).num_milliseconds().abs() as f64 / 1000.0;

        let cadence = if total_steps > 0.0 {
            let interval_seconds = twilight_seconds / total_steps;
            let interval = Duration::milliseconds((interval_seconds * 1000.0).round() as i64);
            Some(Cadence {
                interval_seconds,
                interval,
                next_adjustment: ramp_start + interval,
            })
        } else {
            None
        };

        Ok(Self {
            start_exposure,
            end_exposure,
            current_exposure: start_exposure,
            capture_start,
            capture_end,
            civil_twilight,
            astro_twilight,
            direction,
            ramp_start,
            shooting_interval,
            cadence,
            phase: RampPhase::NotStarted,
        })
    }

    /// Advance the ramp to `now`.
    ///
    /// Before capture starts this only reports how long to wait. Afterwards it
    /// applies at most one exposure step if one is due, then reports the
    /// exposure for the next frame. Missed steps are not caught up in bulk.
    pub fn tick(&mut self, now: DateTime<Local>) -> TickResult {
        if self.phase == RampPhase::Completed {
            return TickResult::Completed;
        }

        if now < self.capture_start {
            self.phase = RampPhase::Waiting;
            let wait = (self.capture_start - now).to_std().unwrap_or_default();
            return TickResult::Waiting(wait);
        }

        self.phase = RampPhase::Ramping;

        let mut adjustment = None;
        if let Some(cadence) = self.cadence {
            if now >= cadence.next_adjustment {
                adjustment = self.adjust_exposure();
                self.cadence = Some(Cadence {
                    next_adjustment: cadence.next_adjustment + cadence.interval,
                    ..cadence
                });
            }
        }

        TickResult::Shoot {
            exposure: self.current_exposure,
            shooting_interval: self.shooting_interval,
            adjustment,
        }
    }

    /// Apply one step of the priority policy to the current exposure.
    ///
    /// Each axis moves only as far as the furthest of the two endpoints on that
    /// axis, and the first axis is exhausted before the second moves. Returns
    /// `None` once both axes have reached their bounds.
    pub fn adjust_exposure(&mut self) -> Option<Adjustment> {
        let current = &mut self.current_exposure;
        let (start, end) = (&self.start_exposure, &self.end_exposure);

        match self.direction {
            RampDirection::Darkening => {
                if current.shutter_index() < start.shutter_index().max(end.shutter_index()) {
                    current.adjust_shutter(Step::Increase).map(Adjustment::Shutter)
                } else if current.iso_index() < start.iso_index().max(end.iso_index()) {
                    current.adjust_iso(Step::Increase).map(Adjustment::Iso)
                } else {
                    None
                }
            }
            RampDirection::Brightening => {
                if current.iso_index() > start.iso_index().min(end.iso_index()) {
                    current.adjust_iso(Step::Decrease).map(Adjustment::Iso)
                } else if current.shutter_index() > start.shutter_index().min(end.shutter_index()) {
                    current.adjust_shutter(Step::Decrease).map(Adjustment::Shutter)
                } else {
                    None
                }
            }
        }
    }

    /// How many more steps [`Self::adjust_exposure`] will make before it stops.
    pub fn remaining_steps(&self) -> usize {
        let current = &self.current_exposure;
        let (start, end) = (&self.start_exposure, &self.end_exposure);

        match self.direction {
            RampDirection::Darkening => {
                start.shutter_index().max(end.shutter_index()).saturating_sub(current.shutter_index())
                    + start.iso_index().max(end.iso_index()).saturating_sub(current.iso_index())
            }
            RampDirection::Brightening => {
                current.iso_index().saturating_sub(start.iso_index().min(end.iso_index()))
                    + current.shutter_index().saturating_sub(start.shutter_index().min(end.shutter_index()))
            }
        }
    }

    /// Close the ramp. Called by the capture loop once the capture window has ended.
    pub fn complete(&mut self) {
        self.phase = RampPhase::Completed;
    }

    pub fn phase(&self) -> RampPhase {
        self.phase
    }

    pub fn direction(&self) -> RampDirection {
        self.direction
    }

    pub fn start_exposure(&self) -> &ExposureSetting {
        &self.start_exposure
    }

    pub fn end_exposure(&self) -> &ExposureSetting {
        &self.end_exposure
    }

    pub fn current_exposure(&self) -> &ExposureSetting {
        &self.current_exposure
    }

    pub fn capture_start(&self) -> DateTime<Local> {
        self.capture_start
    }

    pub fn capture_end(&self) -> DateTime<Local> {
        self.capture_end
    }

    pub fn civil_twilight(&self) -> DateTime<Local> {
        self.civil_twilight
    }

    pub fn astro_twilight(&self) -> DateTime<Local> {
        self.astro_twilight
    }

    /// When the ramp window opens, after clamping to the capture start.
    pub fn ramp_start(&self) -> DateTime<Local> {
        self.ramp_start
    }

    pub fn shooting_interval(&self) -> StdDuration {
        self.shooting_interval
    }

    /// Seconds between exposure steps, or `None` if the endpoints need no steps.
    pub fn adjustment_interval_seconds(&self) -> Option<f64> {
        self.cadence.map(|cadence| cadence.interval_seconds)
    }

    pub fn next_adjustment_time(&self) -> Option<DateTime<Local>> {
        self.cadence.map(|cadence| cadence.next_adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 21, hour, minute, 0).unwrap()
    }

    fn bright() -> ExposureSetting {
        ExposureSetting::new(TEST_F_RATIO, TEST_BRIGHT_SHUTTER, TEST_BRIGHT_ISO).unwrap()
    }

    fn dark() -> ExposureSetting {
        ExposureSetting::new(TEST_F_RATIO, TEST_DARK_SHUTTER, TEST_DARK_ISO).unwrap()
    }

    /// Sunset: civil twilight 21:30, astronomical 23:00, shooting 21:00 to 23:30.
    fn sunset_ramp() -> ExposureRamp {
        ExposureRamp::new(bright(), dark(), at(21, 0), at(23, 30), at(21, 30), at(23, 0)).unwrap()
    }

    /// Sunrise: astronomical twilight 04:00, civil 05:30, shooting 03:30 to 06:00.
    fn sunrise_ramp() -> ExposureRamp {
        ExposureRamp::new(dark(), bright(), at(3, 30), at(6, 0), at(5, 30), at(4, 0)).unwrap()
    }

    /// Tick once per shooting interval from capture start to capture end.
    fn run_to_end(ramp: &mut ExposureRamp) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();
        let step = Duration::from_std(ramp.shooting_interval()).unwrap();
        let mut now = ramp.capture_start();
        while now < ramp.capture_end() {
            if let TickResult::Shoot {
                adjustment: Some(adjustment),
                ..
            } = ramp.tick(now)
            {
                adjustments.push(adjustment);
            }
            now += step;
        }
        adjustments
    }

    #[test]
    fn test_direction_from_twilight_order() {
        assert_eq!(sunset_ramp().direction(), RampDirection::Darkening);
        assert_eq!(sunrise_ramp().direction(), RampDirection::Brightening);
    }

    #[test]
    fn test_equal_twilight_instants_rejected() {
        let result = ExposureRamp::new(bright(), dark(), at(21, 0), at(23, 30), at(22, 0), at(22, 0));
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("Invalid twilight window"));
    }

    #[test]
    fn test_empty_capture_window_rejected() {
        let result = ExposureRamp::new(bright(), dark(), at(23, 0), at(23, 0), at(21, 30), at(23, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_shooting_interval_uses_longest_shutter() {
        assert_eq!(sunset_ramp().shooting_interval(), StdDuration::from_secs(22));

        let fast = ExposureRamp::new(bright(), bright(), at(21, 0), at(23, 30), at(21, 30), at(23, 0))
            .unwrap();
        assert_eq!(fast.shooting_interval(), StdDuration::from_secs(READOUT_OVERHEAD_SECONDS));
    }

    #[test]
    fn test_adjustment_interval_divides_window_by_steps() {
        let ramp = sunset_ramp();
        // 19.6 stops round up to 59 one-third steps across 90 minutes
        let expected = (TEST_TWILIGHT_MINUTES * 60) as f64 / 59.0;
        let interval = ramp.adjustment_interval_seconds().unwrap();
        assert!((interval - expected).abs() < 1e-6);
        assert!(interval > 0.0);

        // Same cadence for the mirrored sunrise
        let sunrise = sunrise_ramp().adjustment_interval_seconds().unwrap();
        assert!((sunrise - expected).abs() < 1e-6);
    }

    #[test]
    fn test_step_count_rounds_in_ninths() {
        assert_eq!(step_count(0.0), 0.0);
        assert_eq!(step_count(1.0), 3.0);
        // 0.35 stops is 3.15 ninths, rounded up to 4 ninths
        assert!((step_count(0.35) - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_endpoints_never_adjust() {
        let mut ramp =
            ExposureRamp::new(dark(), dark(), at(21, 0), at(23, 30), at(21, 30), at(23, 0)).unwrap();
        assert_eq!(ramp.adjustment_interval_seconds(), None);
        assert_eq!(ramp.next_adjustment_time(), None);

        assert!(run_to_end(&mut ramp).is_empty());
        assert_eq!(*ramp.current_exposure(), dark());
    }

    #[test]
    fn test_waiting_before_capture_start() {
        let mut ramp = sunset_ramp();
        assert_eq!(ramp.phase(), RampPhase::NotStarted);

        let result = ramp.tick(at(20, 50));
        assert_eq!(result, TickResult::Waiting(StdDuration::from_secs(600)));
        assert_eq!(ramp.phase(), RampPhase::Waiting);
        assert_eq!(*ramp.current_exposure(), bright());

        match ramp.tick(at(21, 0)) {
            TickResult::Shoot {
                exposure,
                shooting_interval,
                adjustment,
            } => {
                assert_eq!(exposure, bright());
                assert_eq!(shooting_interval, StdDuration::from_secs(22));
                assert_eq!(adjustment, None);
            }
            other => panic!("Expected a shot, got {:?}", other),
        }
        assert_eq!(ramp.phase(), RampPhase::Ramping);
    }

    #[test]
    fn test_no_adjustment_before_twilight() {
        let mut ramp = sunset_ramp();
        let mut now = at(21, 0);
        while now < at(21, 30) {
            if let TickResult::Shoot { adjustment, .. } = ramp.tick(now) {
                assert_eq!(adjustment, None);
            }
            now += Duration::seconds(22);
        }
        assert_eq!(*ramp.current_exposure(), bright());
    }

    #[test]
    fn test_ramp_start_clamped_to_capture_start() {
        let ramp =
            ExposureRamp::new(bright(), dark(), at(22, 0), at(23, 30), at(21, 30), at(23, 0)).unwrap();
        assert_eq!(ramp.ramp_start(), at(22, 0));

        let interval = ramp.adjustment_interval_seconds().unwrap();
        let expected_next = at(22, 0) + Duration::milliseconds((interval * 1000.0).round() as i64);
        assert_eq!(ramp.next_adjustment_time(), Some(expected_next));

        // Capture starting early leaves the ramp at the twilight boundary
        assert_eq!(sunset_ramp().ramp_start(), at(21, 30));
        assert_eq!(sunrise_ramp().ramp_start(), at(4, 0));
    }

    #[test]
    fn test_sunset_reaches_end_exposure() {
        let mut ramp = sunset_ramp();
        assert_eq!(ramp.remaining_steps(), 59);

        let adjustments = run_to_end(&mut ramp);
        assert_eq!(adjustments.len(), 59);
        assert_eq!(*ramp.current_exposure(), dark());
        assert_eq!(ramp.remaining_steps(), 0);

        // Shutter moves first, then ISO
        assert!(adjustments[..43].iter().all(|a| matches!(a, Adjustment::Shutter(_))));
        assert!(adjustments[43..].iter().all(|a| matches!(a, Adjustment::Iso(_))));

        // Further ticks leave the final setting alone
        match ramp.tick(at(23, 59)) {
            TickResult::Shoot { exposure, .. } => assert_eq!(exposure, dark()),
            other => panic!("Expected a shot, got {:?}", other),
        }
        assert_eq!(ramp.adjust_exposure(), None);
    }

    #[test]
    fn test_sunrise_lowers_iso_before_shutter() {
        let mut ramp = sunrise_ramp();
        let adjustments = run_to_end(&mut ramp);

        let iso_steps = adjustments
            .iter()
            .take_while(|a| matches!(a, Adjustment::Iso(_)))
            .count();
        assert_eq!(iso_steps, 16);
        assert!(adjustments[iso_steps..].iter().all(|a| matches!(a, Adjustment::Shutter(_))));
        assert_eq!(adjustments.last(), Some(&Adjustment::Shutter(1.0 / 1000.0)));
        assert_eq!(*ramp.current_exposure(), bright());
    }

    #[test]
    fn test_one_adjustment_per_tick() {
        let mut ramp = sunset_ramp();
        // Well past the whole window, yet only a single step is applied
        match ramp.tick(at(23, 20)) {
            TickResult::Shoot { adjustment, .. } => {
                assert_eq!(adjustment, Some(Adjustment::Shutter(1.0 / 800.0)))
            }
            other => panic!("Expected a shot, got {:?}", other),
        }
        assert_eq!(ramp.remaining_steps(), 58);
    }

    #[test]
    fn test_start_and_end_exposures_are_not_mutated() {
        let mut ramp = sunset_ramp();
        run_to_end(&mut ramp);
        assert_eq!(*ramp.start_exposure(), bright());
        assert_eq!(*ramp.end_exposure(), dark());
    }

    #[test]
    fn test_aperture_stays_fixed() {
        let start = ExposureSetting::new(4.0, TEST_BRIGHT_SHUTTER, TEST_BRIGHT_ISO).unwrap();
        let mut ramp =
            ExposureRamp::new(start, dark(), at(21, 0), at(23, 30), at(21, 30), at(23, 0)).unwrap();
        run_to_end(&mut ramp);
        assert_eq!(ramp.current_exposure().f_ratio(), 4.0);
        assert_eq!(ramp.current_exposure().shutter(), TEST_DARK_SHUTTER);
        assert_eq!(ramp.current_exposure().iso(), 4000);
    }

    #[test]
    fn test_completed_ramp_stops_ticking() {
        let mut ramp = sunset_ramp();
        ramp.tick(at(22, 0));
        ramp.complete();
        assert_eq!(ramp.phase(), RampPhase::Completed);

        let before = *ramp.current_exposure();
        assert_eq!(ramp.tick(at(22, 30)), TickResult::Completed);
        assert_eq!(*ramp.current_exposure(), before);
    }
}
