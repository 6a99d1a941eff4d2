//! Capture loop driving an [`ExposureRamp`] against a clock and a camera.
//!
//! The ramp itself never touches the clock or the camera. This module owns the
//! wait-shoot-wait cycle: it asks the ramp what to do at the current instant,
//! fires the camera with the current shutter duration, and sleeps out the rest
//! of the shooting interval. Sleeping happens in short chunks so a shutdown
//! signal is noticed promptly.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration as StdDuration;

use crate::constants::CHECK_INTERVAL_SECS;
use crate::exposure::ExposureSetting;
use crate::logger::Log;
use crate::ramp::{Adjustment, ExposureRamp, RampPhase, TickResult};
use crate::utils::{format_duration, format_shutter};

const CHECK_INTERVAL: StdDuration = StdDuration::from_secs(CHECK_INTERVAL_SECS);

/// Source of the current time, and the way to wait for it to pass.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
    fn sleep(&self, duration: StdDuration);
}

/// Wall clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        thread::sleep(duration);
    }
}

/// Clock that only moves when slept on. Used for dry runs and tests.
pub struct SimulatedClock {
    now: Cell<DateTime<Local>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Cell::new(start),
        }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }

    fn sleep(&self, duration: StdDuration) {
        let step = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        self.now.set(self.now.get() + step);
    }
}

/// Something that can take one exposure of a given length.
///
/// `trigger` is expected to block until the exposure has finished.
#[cfg_attr(test, mockall::automock)]
pub trait Camera {
    fn trigger(&mut self, shutter_seconds: f64) -> Result<()>;
}

/// Camera stand-in that logs each exposure and waits out its duration.
pub struct LoggingCamera<'a> {
    name: String,
    clock: &'a dyn Clock,
}

impl<'a> LoggingCamera<'a> {
    pub fn new(name: &str, clock: &'a dyn Clock) -> Self {
        Self {
            name: name.to_string(),
            clock,
        }
    }
}

impl Camera for LoggingCamera<'_> {
    fn trigger(&mut self, shutter_seconds: f64) -> Result<()> {
        Log::log_debug(&format!(
            "{}: taking exposure of {}",
            self.name,
            format_shutter(shutter_seconds)
        ));
        self.clock.sleep(StdDuration::from_secs_f64(shutter_seconds));
        Ok(())
    }
}

/// Totals for a finished capture run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u32,
    pub adjustments: u32,
    pub final_exposure: ExposureSetting,
}

/// Sleep in small intervals, returning early once `running` is cleared.
fn sleep_while_running(clock: &dyn Clock, duration: StdDuration, running: &AtomicBool) {
    let mut slept = StdDuration::ZERO;
    while slept < duration && running.load(Ordering::SeqCst) {
        let chunk = CHECK_INTERVAL.min(duration - slept);
        clock.sleep(chunk);
        slept += chunk;
    }
}

fn describe_adjustment(adjustment: Adjustment) -> String {
    match adjustment {
        Adjustment::Shutter(seconds) => format!("shutter {}", format_shutter(seconds)),
        Adjustment::Iso(iso) => format!("ISO {}", iso),
    }
}

/// Run the capture loop until the capture window closes or `running` is cleared.
///
/// # Arguments
/// * `ramp` - Planned ramp; its current exposure is advanced in place
/// * `camera` - Receives one trigger per frame
/// * `clock` - Supplies the time and performs all waiting
/// * `running` - Cleared by the signal handler to stop the loop
///
/// # Returns
/// Frame and adjustment counts, or the first camera error
pub fn run_timelapse(
    ramp: &mut ExposureRamp,
    camera: &mut dyn Camera,
    clock: &dyn Clock,
    running: &AtomicBool,
) -> Result<RunSummary> {
    let mut frames = 0;
    let mut adjustments = 0;

    while running.load(Ordering::SeqCst) {
        let now = clock.now();
        if now >= ramp.capture_end() {
            ramp.complete();
            Log::log_block_start(&format!(
                "Capture window closed at {}",
                ramp.capture_end().format("%H:%M:%S")
            ));
            break;
        }

        let previous_phase = ramp.phase();
        match ramp.tick(now) {
            TickResult::Waiting(wait) => {
                Log::log_block_start(&format!(
                    "Capture starts at {} (in {})",
                    ramp.capture_start().format("%H:%M:%S"),
                    format_duration(wait)
                ));
                sleep_while_running(clock, wait, running);
            }
            TickResult::Shoot {
                exposure,
                shooting_interval,
                adjustment,
            } => {
                if previous_phase != RampPhase::Ramping {
                    Log::log_block_start(&format!(
                        "Commencing {} capture at {}",
                        ramp.direction().as_str(),
                        exposure
                    ));
                }

                if let Some(adjustment) = adjustment {
                    adjustments += 1;
                    Log::log_decorated(&format!(
                        "Adjusted {} → {}",
                        describe_adjustment(adjustment),
                        exposure
                    ));
                    if ramp.remaining_steps() == 0 {
                        Log::log_block_start(&format!("Ramp complete, holding {}", exposure));
                    }
                }

                let shot_started = clock.now();
                camera
                    .trigger(exposure.shutter())
                    .with_context(|| format!("Failed to capture frame {}", frames + 1))?;
                frames += 1;

                let elapsed = (clock.now() - shot_started).to_std().unwrap_or_default();
                let remaining = shooting_interval.saturating_sub(elapsed);
                Log::log_debug(&format!(
                    "Frame {} done. Next frame in {}",
                    frames,
                    format_duration(remaining)
                ));
                sleep_while_running(clock, remaining, running);
            }
            TickResult::Completed => break,
        }
    }

    Ok(RunSummary {
        frames,
        adjustments,
        final_exposure: *ramp.current_exposure(),
    })
}
