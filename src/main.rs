use anyhow::Result;
use signal_hook::{
    consts::signal::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    path::PathBuf,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use lapsetr::args::{CliAction, ParsedArgs, display_help, display_version_info};
use lapsetr::constants::EXIT_FAILURE;
use lapsetr::lock::InstanceLock;
use lapsetr::ramp::ExposureRamp;
use lapsetr::timelapse::{
    Clock, LoggingCamera, RunSummary, SimulatedClock, SystemClock, run_timelapse,
};
use lapsetr::utils::{format_duration, path_for_display};
use lapsetr::{Config, ExposureSetting, Log};

/// Print the snapped setting and its exposure value.
fn show_exposure_value(f_ratio: f64, shutter_seconds: f64, iso: f64) -> Result<()> {
    Log::log_version();
    let exposure = ExposureSetting::new(f_ratio, shutter_seconds, iso)?;
    Log::log_decorated(&format!(
        "EV for {} is {:.2}",
        exposure,
        exposure.exposure_value()
    ));
    Log::log_end();
    Ok(())
}

fn log_plan(ramp: &ExposureRamp) {
    Log::log_block_start(&format!(
        "Planned {} ramp from {} to {}",
        ramp.direction().as_str(),
        ramp.start_exposure(),
        ramp.end_exposure()
    ));
    Log::log_indented(&format!(
        "Shooting interval: {}",
        format_duration(ramp.shooting_interval())
    ));
    match ramp.adjustment_interval_seconds() {
        Some(seconds) => {
            Log::log_indented(&format!(
                "{} adjustments, one every {:.1} seconds from {}",
                ramp.remaining_steps(),
                seconds,
                ramp.ramp_start().format("%H:%M:%S")
            ));
        }
        None => Log::log_indented("Endpoints match, exposure is held for the whole run"),
    }
}

fn log_summary(summary: &RunSummary) {
    Log::log_block_start(&format!(
        "Captured {} frames with {} exposure adjustments",
        summary.frames, summary.adjustments
    ));
    Log::log_indented(&format!("Final exposure: {}", summary.final_exposure));
}

/// Spawn the shutdown handler and return the flag it clears.
fn install_signal_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    thread::spawn(move || {
        for signal in signals.forever() {
            Log::log_pipe();
            Log::log_info(&format!("Shutdown signal received: {:?}", signal));
            r.store(false, Ordering::SeqCst);
        }
    });

    Ok(running)
}

/// Capture in real time, holding the instance lock for the duration.
fn run_capture(config_path: Option<PathBuf>) -> Result<()> {
    let lock_path = InstanceLock::default_path();
    let Some(lock) = InstanceLock::acquire(&lock_path)? else {
        let owner = InstanceLock::read_owner_pid(&lock_path)
            .map(|pid| format!(" (PID {})", pid))
            .unwrap_or_default();
        Log::log_error(&format!(
            "Another instance of lapsetr is already running{}.\n\
            • Only one instance may control the camera.",
            owner
        ));
        std::process::exit(EXIT_FAILURE);
    };
    Log::log_decorated(&format!(
        "Lock acquired at {}",
        path_for_display(lock.path())
    ));

    let (config, path) = Config::load(config_path.as_deref())?;
    config.log_config(&path);

    let mut ramp = config.build_ramp()?;
    log_plan(&ramp);

    let running = install_signal_handler()?;
    let clock = SystemClock;
    let camera_name = config.camera().name;
    let mut camera = LoggingCamera::new(&camera_name, &clock);

    let result = run_timelapse(&mut ramp, &mut camera, &clock, &running);

    Log::log_block_start("Shutting down lapsetr...");
    if let Err(e) = lock.release() {
        Log::log_warning(&format!("{:#}", e));
    }

    let summary = result?;
    log_summary(&summary);
    Log::log_end();
    Ok(())
}

/// Run the whole capture window instantly on a simulated clock.
fn run_simulation(config_path: Option<PathBuf>) -> Result<()> {
    let (config, path) = Config::load(config_path.as_deref())?;
    config.log_config(&path);

    let mut ramp = config.build_ramp()?;
    log_plan(&ramp);

    let clock = SimulatedClock::new(ramp.capture_start());
    let running = AtomicBool::new(true);
    let camera_name = config.camera().name;
    let mut camera = LoggingCamera::new(&camera_name, &clock);

    Log::log_block_start("Simulating capture run...");
    let summary = run_timelapse(&mut ramp, &mut camera, &clock, &running)?;
    Log::log_indented(&format!(
        "Simulated clock stopped at {}",
        clock.now().format("%Y-%m-%d %H:%M:%S")
    ));
    log_summary(&summary);
    Log::log_end();
    Ok(())
}

fn main() -> Result<()> {
    let parsed = ParsedArgs::from_env();

    match parsed.action {
        CliAction::ShowVersion => {
            display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::ShowExposureValue {
            f_ratio,
            shutter_seconds,
            iso,
        } => show_exposure_value(f_ratio, shutter_seconds, iso),
        CliAction::Run {
            debug_enabled,
            config_path,
        } => {
            Log::set_debug_enabled(debug_enabled);
            Log::log_version();
            run_capture(config_path)
        }
        CliAction::Simulate {
            debug_enabled,
            config_path,
        } => {
            Log::set_debug_enabled(debug_enabled);
            Log::log_version();
            run_simulation(config_path)
        }
    }
}
