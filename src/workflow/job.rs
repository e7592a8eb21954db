//! Job orchestrator - one input name in, one colorized PNG out, at most once
//! per cache key.

use anyhow::Context;
use image::{DynamicImage, ImageFormat};
use log::info;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

use crate::adapter::Colorizer;
use crate::common::errors::JobError;
use crate::config::{ColorizeConfig, MonitorSettings};
use crate::monitor::{ResourceSummary, monitored};
use crate::utils::colorized_name;

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub output_path: PathBuf,
    /// True when the output already existed and nothing was recomputed
    pub cached: bool,
    pub summary: Option<ResourceSummary>,
}

/// Explicit job context: owns the adapter and the monitor settings.
///
/// The adapter sits behind a mutex, so colorization calls through one
/// orchestrator are always serialized.
pub struct Orchestrator {
    colorizer: Mutex<Box<dyn Colorizer>>,
    monitor: MonitorSettings,
}

impl Orchestrator {
    pub fn new(colorizer: Box<dyn Colorizer>, monitor: MonitorSettings) -> Self {
        Self {
            colorizer: Mutex::new(colorizer),
            monitor,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        self.monitor
    }

    /// Return the colorized output for `inputs_dir/input_name`, producing it
    /// into `outputs_dir` only if it does not exist yet.
    pub fn ensure_colorized(
        &self,
        inputs_dir: &Path,
        outputs_dir: &Path,
        input_name: &str,
        config: &ColorizeConfig,
    ) -> Result<PathBuf, JobError> {
        self.ensure_colorized_from(&inputs_dir.join(input_name), outputs_dir, input_name, config)
            .map(|outcome| outcome.output_path)
    }

    /// General form: read `source`, name the output after `logical_name`.
    pub fn ensure_colorized_from(
        &self,
        source: &Path,
        outputs_dir: &Path,
        logical_name: &str,
        config: &ColorizeConfig,
    ) -> Result<JobOutcome, JobError> {
        let output_path = outputs_dir.join(colorized_name(logical_name));

        // Existence is the whole cache check; the input is not even opened.
        if output_path.is_file() {
            return Ok(JobOutcome {
                output_path,
                cached: true,
                summary: None,
            });
        }

        if !source.is_file() {
            return Err(JobError::SourceNotFound(source.to_path_buf()));
        }

        // Taken before the span starts, so time spent queued behind another
        // job is not billed to this one. A panic in an earlier job leaves no
        // state that the next `set_image` does not overwrite.
        let mut colorizer = self
            .colorizer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have produced it while we waited.
        if output_path.is_file() {
            return Ok(JobOutcome {
                output_path,
                cached: true,
                summary: None,
            });
        }

        let start_time = Instant::now();
        let label = format!("colorizing {:?}", source);
        let (result, summary) = monitored(self.monitor, &label, || {
            colorize_into(&mut **colorizer, source, &output_path, config)
        });
        drop(colorizer);
        result?;

        info!(duration = &*format!("{:?}", start_time.elapsed());
            "Colorized {:?} -> {:?}",
            source,
            output_path
        );

        Ok(JobOutcome {
            output_path,
            cached: false,
            summary: Some(summary),
        })
    }
}

fn colorize_into(
    colorizer: &mut dyn Colorizer,
    source: &Path,
    output_path: &Path,
    config: &ColorizeConfig,
) -> Result<(), JobError> {
    let image = decode_image(source)?;
    colorizer
        .set_image(image, config)
        .map_err(JobError::Adapter)?;
    let colorized = colorizer.colorize().map_err(JobError::Adapter)?;
    write_png_atomically(&colorized, output_path)
}

fn decode_image(source: &Path) -> Result<DynamicImage, JobError> {
    let bytes = match fs::read(source) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(JobError::SourceNotFound(source.to_path_buf()));
        }
        Err(err) => return Err(JobError::io(source, err)),
    };
    image::load_from_memory(&bytes)
        .context(format!("failed to decode image: {:?}", source))
        .map_err(JobError::Adapter)
}

/// Encode to PNG and move into place, so the derived path only ever holds a
/// complete image.
fn write_png_atomically(image: &DynamicImage, output_path: &Path) -> Result<(), JobError> {
    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
        .map_err(|err| JobError::io(output_path, std::io::Error::other(err)))?;

    let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{}-{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp_path, &encoded).map_err(|err| JobError::io(&tmp_path, err))?;
    if let Err(err) = fs::rename(&tmp_path, output_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(JobError::io(output_path, err));
    }
    Ok(())
}
