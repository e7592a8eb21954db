//! Process-backed adapter - hands the image to an external model runner.
//!
//! The runner is invoked once per job as
//! `<model_command> --generator G [--extractor E] --device D --size N
//!  (--denoiser-sigma S | --no-denoise) --input IN.png --output OUT.png`
//! and must write a colorized PNG to `OUT.png`.

use anyhow::{Context, Result, anyhow, bail};
use image::{DynamicImage, ImageFormat};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use uuid::Uuid;

use super::Colorizer;
use crate::config::{AppConfig, ColorizeConfig, Device};

const STDERR_TAIL_LINES: usize = 20;

pub struct ExternalColorizer {
    program: String,
    base_args: Vec<String>,
    generator: PathBuf,
    extractor: Option<PathBuf>,
    device: Device,
    scratch_root: PathBuf,
    loaded: Option<(DynamicImage, ColorizeConfig)>,
}

impl ExternalColorizer {
    pub fn new(
        model_command: &str,
        generator: impl Into<PathBuf>,
        extractor: Option<PathBuf>,
        device: Device,
    ) -> Result<Self> {
        let mut words = model_command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| anyhow!("model command is empty"))?;
        let generator = generator.into();

        if !generator.exists() {
            warn!("Generator weights not found at {:?}", generator);
        }
        info!(
            "Colorization model runner `{}` on {} (generator {:?})",
            program,
            device.as_str(),
            generator
        );

        Ok(Self {
            program,
            base_args: words.collect(),
            generator,
            extractor,
            device,
            scratch_root: std::env::temp_dir(),
            loaded: None,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.model_command,
            &config.generator,
            config.extractor.clone(),
            config.device,
        )
    }

    fn build_command(&self, config: &ColorizeConfig, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd.arg("--generator").arg(&self.generator);
        if let Some(extractor) = &self.extractor {
            cmd.arg("--extractor").arg(extractor);
        }
        cmd.args(["--device", self.device.as_str()]);
        cmd.args(["--size", &config.size.to_string()]);
        if config.denoiser {
            cmd.args(["--denoiser-sigma", &config.denoise_sigma.to_string()]);
        } else {
            cmd.arg("--no-denoise");
        }
        cmd.arg("--input").arg(input);
        cmd.arg("--output").arg(output);
        cmd.stdin(Stdio::null()).stdout(Stdio::null());
        cmd
    }

    fn run_in(
        &self,
        scratch: &Path,
        image: &DynamicImage,
        config: &ColorizeConfig,
    ) -> Result<DynamicImage> {
        let input = scratch.join("input.png");
        let output = scratch.join("output.png");

        image
            .save_with_format(&input, ImageFormat::Png)
            .context(format!("failed to stage model input at {:?}", input))?;

        let result = self
            .build_command(config, &input, &output)
            .output()
            .context(format!("failed to spawn model runner `{}`", self.program))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            bail!(
                "model runner failed with exit code {}:\n{}",
                result.status.code().unwrap_or(-1),
                tail
            );
        }

        image::open(&output).context(format!("failed to decode model output {:?}", output))
    }
}

impl Colorizer for ExternalColorizer {
    fn set_image(&mut self, image: DynamicImage, config: &ColorizeConfig) -> Result<()> {
        self.loaded = Some((image, *config));
        Ok(())
    }

    fn colorize(&mut self) -> Result<DynamicImage> {
        let (image, config) = self
            .loaded
            .take()
            .ok_or_else(|| anyhow!("colorize called before an image was loaded"))?;

        let scratch = self
            .scratch_root
            .join(format!("colorizer-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&scratch)
            .context(format!("failed to create scratch directory {:?}", scratch))?;

        let result = self.run_in(&scratch, &image, &config);

        if let Err(err) = std::fs::remove_dir_all(&scratch) {
            warn!("Failed to remove scratch directory {:?}: {}", scratch, err);
        }
        result
    }
}
