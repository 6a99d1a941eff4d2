//! Command-line argument parsing and processing.
//!
//! Parses the handful of flags lapsetr understands into a [`CliAction`]. Unknown
//! options and malformed values are reported and turn into a help screen.

use std::path::PathBuf;

use crate::logger::Log;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the capture loop in real time
    Run {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
    },
    /// Dry-run the whole capture window on a simulated clock
    Simulate {
        debug_enabled: bool,
        config_path: Option<PathBuf>,
    },
    /// Print the snapped setting and exposure value for the given values
    ShowExposureValue {
        f_ratio: f64,
        shutter_seconds: f64,
        iso: f64,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or malformed arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

fn parse_number(label: &str, value: &str, error_found: &mut bool) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(number) => Some(number),
        Err(_) => {
            Log::log_warning(&format!("Invalid {} value: {}", label, value));
            *error_found = true;
            None
        }
    }
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments, program name first
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut run_simulation = false;
        let mut config_path: Option<PathBuf> = None;
        let mut ev_values: Option<(f64, f64, f64)> = None;
        let mut run_ev = false;
        let mut unknown_arg_found = false;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--simulate" | "-s" => run_simulation = true,
                "--config" | "-c" => {
                    if i + 1 < args_vec.len() {
                        config_path = Some(PathBuf::from(&args_vec[i + 1]));
                        i += 1;
                    } else {
                        Log::log_warning("Missing path for --config. Usage: --config <path>");
                        unknown_arg_found = true;
                    }
                }
                "--ev" | "-e" => {
                    run_ev = true;
                    // Parse: --ev <f-ratio> <shutter> <iso>
                    if i + 3 < args_vec.len() {
                        let f_ratio = parse_number("f-ratio", &args_vec[i + 1], &mut unknown_arg_found);
                        let shutter = parse_number("shutter", &args_vec[i + 2], &mut unknown_arg_found);
                        let iso = parse_number("ISO", &args_vec[i + 3], &mut unknown_arg_found);
                        if let (Some(f_ratio), Some(shutter), Some(iso)) = (f_ratio, shutter, iso) {
                            ev_values = Some((f_ratio, shutter, iso));
                        }
                        i += 3;
                    } else {
                        Log::log_warning(
                            "Missing arguments for --ev. Usage: --ev <f-ratio> <shutter> <iso>",
                        );
                        unknown_arg_found = true;
                    }
                }
                _ => {
                    if arg_str.starts_with('-') {
                        Log::log_warning(&format!("Unknown option: {}", arg_str));
                        unknown_arg_found = true;
                    }
                    // Non-option arguments are currently ignored
                }
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else if run_ev {
            match ev_values {
                Some((f_ratio, shutter_seconds, iso)) => CliAction::ShowExposureValue {
                    f_ratio,
                    shutter_seconds,
                    iso,
                },
                None => CliAction::ShowHelpDueToError,
            }
        } else if run_simulation {
            CliAction::Simulate {
                debug_enabled,
                config_path,
            }
        } else {
            CliAction::Run {
                debug_enabled,
                config_path,
            }
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

pub fn display_version_info() {
    Log::log_version();
    Log::log_pipe();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

pub fn display_help() {
    Log::log_version();
    Log::log_block_start(env!("CARGO_PKG_DESCRIPTION"));
    Log::log_block_start("Usage: lapsetr [OPTIONS]");
    Log::log_block_start("Options:");
    Log::log_indented("-c, --config <path>          Use this configuration file");
    Log::log_indented("-d, --debug                  Enable detailed debug output");
    Log::log_indented("-e, --ev <f> <shutter> <iso> Show the exposure value of a setting");
    Log::log_indented("-h, --help                   Print help information");
    Log::log_indented("-s, --simulate               Dry-run the capture window instantly");
    Log::log_indented("-V, --version                Print version information");
    Log::log_end();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args() {
        let parsed = ParsedArgs::parse(vec!["lapsetr"]);
        assert_eq!(
            parsed.action,
            CliAction::Run {
                debug_enabled: false,
                config_path: None
            }
        );
    }

    #[test]
    fn test_parse_debug_flag() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "-d"]);
        assert_eq!(
            parsed.action,
            CliAction::Run {
                debug_enabled: true,
                config_path: None
            }
        );
    }

    #[test]
    fn test_parse_config_path() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--config", "/tmp/run.toml", "--debug"]);
        assert_eq!(
            parsed.action,
            CliAction::Run {
                debug_enabled: true,
                config_path: Some(PathBuf::from("/tmp/run.toml"))
            }
        );
    }

    #[test]
    fn test_parse_config_missing_path() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--config"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_simulate() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "-s", "-c", "run.toml"]);
        assert_eq!(
            parsed.action,
            CliAction::Simulate {
                debug_enabled: false,
                config_path: Some(PathBuf::from("run.toml"))
            }
        );
    }

    #[test]
    fn test_parse_ev() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--ev", "2.8", "20", "4000"]);
        assert_eq!(
            parsed.action,
            CliAction::ShowExposureValue {
                f_ratio: 2.8,
                shutter_seconds: 20.0,
                iso: 4000.0
            }
        );
    }

    #[test]
    fn test_parse_ev_invalid_number() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--ev", "2.8", "fast", "4000"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_ev_missing_values() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--ev", "2.8"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_help_flag() {
        assert_eq!(ParsedArgs::parse(vec!["lapsetr", "--help"]).action, CliAction::ShowHelp);
        assert_eq!(ParsedArgs::parse(vec!["lapsetr", "-h"]).action, CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_unknown_flag() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--debug", "--invalid"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_version_takes_precedence() {
        let parsed = ParsedArgs::parse(vec!["lapsetr", "--version", "--help", "--debug"]);
        assert_eq!(parsed.action, CliAction::ShowVersion);
    }
}
