//! Startup tasks shared by every subcommand.

mod logger;

pub use logger::initialize_logger;

use log::{error, info};
use std::process::Command;

use crate::config::AppConfig;

/// Check that the configured model runner can at least be started.
pub fn check_model_runner(config: &AppConfig) {
    let Some(program) = config.model_command.split_whitespace().next() else {
        error!("No model runner configured. Set COLORIZER_MODEL_COMMAND.");
        return;
    };

    match Command::new(program).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version_info = String::from_utf8_lossy(&output.stdout);
            let version_info = if version_info.trim().is_empty() {
                String::from_utf8_lossy(&output.stderr)
            } else {
                version_info
            };
            let version = version_info.lines().next().unwrap_or("Unknown version");
            info!("{} version: {}", program, version.trim());
        }
        Ok(_) => {
            error!(
                "`{}` was found, but it returned an error. Please ensure it's correctly installed.",
                program
            );
        }
        Err(_) => {
            error!(
                "`{}` is not installed or not available in PATH. Please install it before running the application.",
                program
            );
        }
    }
}

pub fn initialize(config: &AppConfig) {
    initialize_logger();
    check_model_runner(config);
}
