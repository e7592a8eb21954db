//! Batch driver - colorizes every file of a directory, one at a time.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::job::Orchestrator;
use crate::common::errors::{JobError, error_chain};
use crate::config::ColorizeConfig;
use crate::utils::normalized_name;

#[derive(Debug, Default)]
pub struct BatchReport {
    pub produced: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, JobError)>,
    pub skipped_dirs: usize,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Colorize every non-directory entry of `source_dir` into `target_dir`.
///
/// Entries are processed sequentially in listing order. Nothing is
/// pre-filtered: a non-image fails inside the pipeline, is recorded in the
/// report and the batch moves on. Only failing to list `source_dir` aborts.
pub fn run_batch(
    orchestrator: &Orchestrator,
    source_dir: &Path,
    target_dir: &Path,
    config: &ColorizeConfig,
) -> Result<BatchReport> {
    let entries: Vec<_> = fs::read_dir(source_dir)
        .context(format!("failed to list batch directory {:?}", source_dir))?
        .collect();

    let progress = ProgressBar::new(entries.len() as u64).with_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut report = BatchReport::default();

    for entry in entries {
        progress.inc(1);
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Failed to read entry of {:?}: {}", source_dir, err);
                report
                    .failed
                    .push((source_dir.to_path_buf(), JobError::io(source_dir, err)));
                continue;
            }
        };

        let file_path = entry.path();
        if file_path.is_dir() {
            report.skipped_dirs += 1;
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let logical_name = normalized_name(&file_name);
        progress.set_message(file_name.clone());
        info!("{}", file_path.display());

        match orchestrator.ensure_colorized_from(&file_path, target_dir, &logical_name, config) {
            Ok(outcome) => report.produced.push(outcome.output_path),
            Err(err) => {
                error!("Failed to colorize {:?}: {}", file_path, error_chain(&err));
                report.failed.push((file_path, err));
            }
        }
    }

    progress.finish_and_clear();
    info!(
        "Batch finished: {} produced, {} failed, {} directories skipped",
        report.produced.len(),
        report.failed.len(),
        report.skipped_dirs
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::{FakeColorizer, write_png};
    use crate::config::MonitorSettings;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    fn orchestrator() -> (Orchestrator, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        let (fake, calls) = FakeColorizer::new();
        let settings = MonitorSettings {
            sample_interval: Duration::from_millis(5),
            ..MonitorSettings::default()
        };
        (Orchestrator::new(Box::new(fake), settings), calls)
    }

    #[test]
    fn corrupt_file_does_not_stop_the_batch() {
        let (orchestrator, calls) = orchestrator();
        let tmp = TempDir::new().unwrap();
        let source = tmp.path();
        let target = source.join("colorization");
        fs::create_dir_all(&target).unwrap();
        fs::create_dir_all(source.join("nested")).unwrap();
        write_png(&source.join("good.jpg"));
        fs::write(source.join("corrupt.png"), b"\x89PNG but not really").unwrap();

        let report =
            run_batch(&orchestrator, source, &target, &ColorizeConfig::default()).unwrap();

        assert!(target.join("good_colorized.png").is_file());
        assert!(!target.join("corrupt_colorized.png").exists());
        assert_eq!(report.produced, vec![target.join("good_colorized.png")]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("corrupt.png"));
        assert!(matches!(report.failed[0].1, JobError::Adapter(_)));
        assert_eq!(report.skipped_dirs, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn rerunning_a_batch_reuses_outputs() {
        let (orchestrator, calls) = orchestrator();
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("pages");
        let target = tmp.path().join("out");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        write_png(&source.join("01.png"));
        write_png(&source.join("02.jpeg"));

        let config = ColorizeConfig::default();
        let first = run_batch(&orchestrator, &source, &target, &config).unwrap();
        let second = run_batch(&orchestrator, &source, &target, &config).unwrap();

        assert!(first.is_clean() && second.is_clean());
        assert_eq!(first.produced.len(), 2);
        assert_eq!(second.produced.len(), 2);
        assert!(target.join("02_colorized.png").is_file());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_source_directory_aborts() {
        let (orchestrator, _) = orchestrator();
        let tmp = TempDir::new().unwrap();
        let result = run_batch(
            &orchestrator,
            &tmp.path().join("absent"),
            tmp.path(),
            &ColorizeConfig::default(),
        );
        assert!(result.is_err());
    }
}
