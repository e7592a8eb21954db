use anyhow::{Context, Result};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::common::{
    ASSUMED_TDP_WATTS, DEFAULT_DENOISE_SIGMA, DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_TARGET_SIZE,
};

const ENV_PREFIX: &str = "COLORIZER_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

/// Per-job settings handed to the colorization adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorizeConfig {
    /// Target size the model resizes the page to
    pub size: u32,
    pub denoiser: bool,
    pub denoise_sigma: u32,
}

impl Default for ColorizeConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_TARGET_SIZE,
            denoiser: true,
            denoise_sigma: DEFAULT_DENOISE_SIGMA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub sample_interval: Duration,
    pub tdp_watts: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            tdp_watts: ASSUMED_TDP_WATTS,
        }
    }
}

/// Process-wide settings, read from `COLORIZER_*` environment variables
/// (and a `.env` file if present). Command line flags are applied on top.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root under which every session workspace lives
    pub session_base: PathBuf,
    pub generator: PathBuf,
    pub extractor: Option<PathBuf>,
    /// Command line of the external model runner, split on whitespace
    pub model_command: String,
    pub device: Device,
    pub size: u32,
    pub denoiser: bool,
    pub denoise_sigma: u32,
    pub sample_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_base: PathBuf::from("./static/tmp_sessions"),
            generator: PathBuf::from("networks/generator.zip"),
            extractor: Some(PathBuf::from("networks/extractor.pth")),
            model_command: "python3 colorize_runner.py".to_string(),
            device: Device::Cpu,
            size: DEFAULT_TARGET_SIZE,
            denoiser: true,
            denoise_sigma: DEFAULT_DENOISE_SIGMA,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<AppConfig>()
            .context("failed to read COLORIZER_* environment variables")
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, AppConfig>(vars)
            .context("failed to parse configuration variables")
    }

    pub fn colorize_config(&self) -> ColorizeConfig {
        ColorizeConfig {
            size: self.size,
            denoiser: self.denoiser,
            denoise_sigma: self.denoise_sigma,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            sample_interval: Duration::from_millis(self.sample_interval_ms.max(1)),
            tdp_watts: ASSUMED_TDP_WATTS,
        }
    }
}
