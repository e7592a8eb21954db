use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use path_clean::PathClean;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::adapter::ExternalColorizer;
use crate::common::errors::JobError;
use crate::common::{BATCH_OUTPUT_DIR, VALID_IMAGE_EXTENSIONS};
use crate::config::{AppConfig, Device};
use crate::monitor::ResourceMonitor;
use crate::utils::PathExt;
use crate::workflow::{Orchestrator, run_batch};

#[derive(Debug, Parser)]
#[command(
    name = "colorizer",
    version,
    about = "Colorize manga pages through an external model, with per-session workspaces"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Colorize one image, or every file of a directory
    Colorize(ColorizeArgs),
    /// Serve the session-based HTTP API
    Serve(ServeArgs),
}

/// Model settings; each flag overrides its `COLORIZER_*` variable.
#[derive(Debug, Clone, Default, Args)]
pub struct ModelArgs {
    /// Generator weights
    #[arg(long)]
    pub generator: Option<PathBuf>,

    /// Extractor weights
    #[arg(long)]
    pub extractor: Option<PathBuf>,

    /// Command line of the external model runner
    #[arg(long)]
    pub model_command: Option<String>,

    /// Run the model on the GPU
    #[arg(short = 'g', long)]
    pub gpu: bool,

    /// Disable the denoiser
    #[arg(long = "no-denoise")]
    pub no_denoise: bool,

    /// Denoiser strength
    #[arg(long)]
    pub denoise_sigma: Option<u32>,

    /// Target size
    #[arg(short = 's', long)]
    pub size: Option<u32>,

    /// Resource sampling interval in milliseconds
    #[arg(long)]
    pub sample_interval_ms: Option<u64>,
}

impl ModelArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(generator) = &self.generator {
            config.generator = generator.clone();
        }
        if let Some(extractor) = &self.extractor {
            config.extractor = Some(extractor.clone());
        }
        if let Some(command) = &self.model_command {
            config.model_command = command.clone();
        }
        if self.gpu {
            config.device = Device::Cuda;
        }
        if self.no_denoise {
            config.denoiser = false;
        }
        if let Some(sigma) = self.denoise_sigma {
            config.denoise_sigma = sigma;
        }
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(interval) = self.sample_interval_ms {
            config.sample_interval_ms = interval;
        }
    }
}

#[derive(Debug, Args)]
pub struct ColorizeArgs {
    /// Image file or directory of images
    #[arg(short = 'p', long)]
    pub path: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub address: IpAddr,

    #[arg(long, default_value_t = 5673)]
    pub port: u16,

    /// Root directory for session workspaces
    #[arg(long)]
    pub session_base: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,
}

// ────────────────────────────────────────────────────────────────
// colorize subcommand
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Directory { target: PathBuf },
    File { outputs_dir: PathBuf, name: String },
}

/// Decide what a source path means. Unusable paths are usage errors.
pub fn classify_source(path: &Path) -> Result<SourceKind, JobError> {
    if path.is_dir() {
        return Ok(SourceKind::Directory {
            target: path.join(BATCH_OUTPUT_DIR),
        });
    }
    if path.is_file() {
        if !VALID_IMAGE_EXTENSIONS.contains(&path.ext_lower().as_str()) {
            return Err(JobError::usage("Wrong format"));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| JobError::usage("Wrong path"))?;
        let outputs_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        return Ok(SourceKind::File { outputs_dir, name });
    }
    Err(JobError::usage("Wrong path"))
}

/// Run one CLI invocation inside a single monitor span.
pub fn run_colorize(config: &AppConfig, path: &Path) -> Result<()> {
    let path = path.to_path_buf().clean();
    let kind = classify_source(&path)?;

    let colorizer = ExternalColorizer::from_config(config)?;
    let orchestrator = Orchestrator::new(Box::new(colorizer), config.monitor_settings());
    let colorize_config = config.colorize_config();

    let monitor = ResourceMonitor::start(config.monitor_settings());
    let start = Instant::now();

    let result = match kind {
        SourceKind::Directory { target } => std::fs::create_dir_all(&target)
            .context(format!("failed to create output directory {:?}", target))
            .and_then(|_| run_batch(&orchestrator, &path, &target, &colorize_config))
            .map(|report| {
                if !report.is_clean() {
                    info!(
                        "{} of {} files failed; see errors above",
                        report.failed.len(),
                        report.failed.len() + report.produced.len()
                    );
                }
            }),
        SourceKind::File { outputs_dir, name } => orchestrator
            .ensure_colorized_from(&path, &outputs_dir, &name, &colorize_config)
            .map(|outcome| info!("Wrote {:?}", outcome.output_path))
            .map_err(anyhow::Error::from),
    };

    monitor.stop().log("whole run");
    info!("Total elapsed time: {:.1}s", start.elapsed().as_secs_f64());
    result
}
