//! Resource monitor - samples CPU and memory of the current process while a
//! unit of work runs on another thread.
//!
//! Stopping is cooperative: the owner signals the sampler over a channel and
//! the sampler notices it at the top of its next iteration, or while waiting
//! out the sample interval. Worst-case stop latency is one interval, and
//! `stop` only returns after the sampler thread has exited.

mod summary;

pub use summary::{ResourceSample, ResourceSummary, estimate_energy_wh};

use anyhow::{Result, anyhow};
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::config::MonitorSettings;

// ────────────────────────────────────────────────────────────────
// Process probe
// ────────────────────────────────────────────────────────────────

struct ProcessProbe {
    system: System,
    pid: Pid,
}

impl ProcessProbe {
    fn current() -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|err| anyhow!("failed to resolve current pid: {}", err))?;
        let mut probe = Self {
            system: System::new(),
            pid,
        };
        // CPU usage is a delta between refreshes, so prime it once.
        probe.refresh();
        Ok(probe)
    }

    fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
    }

    fn sample(&mut self) -> Option<ResourceSample> {
        self.refresh();
        let process = self.system.process(self.pid)?;
        Some(ResourceSample {
            cpu_percent: process.cpu_usage() as f64,
            memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
        })
    }
}

// ────────────────────────────────────────────────────────────────
// Monitor span
// ────────────────────────────────────────────────────────────────

/// Handle to a running sampler. One handle is one span.
pub struct ResourceMonitor {
    started: Instant,
    settings: MonitorSettings,
    stop_tx: Option<Sender<()>>,
    sampler: Option<JoinHandle<Vec<ResourceSample>>>,
}

impl ResourceMonitor {
    /// Start sampling the current process every `settings.sample_interval`.
    ///
    /// If the sampler thread cannot be spawned the span still works and
    /// reports an empty sample set.
    pub fn start(settings: MonitorSettings) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let interval = settings.sample_interval;

        let sampler = thread::Builder::new()
            .name("resource-monitor".to_string())
            .spawn(move || sampling_loop(stop_rx, interval));

        let sampler = match sampler {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("Failed to spawn resource monitor thread: {}", err);
                None
            }
        };

        Self {
            started: Instant::now(),
            settings,
            stop_tx: Some(stop_tx),
            sampler,
        }
    }

    /// Signal the sampler, wait for it to exit and summarize the whole span.
    pub fn stop(mut self) -> ResourceSummary {
        let samples = self.halt();
        ResourceSummary::from_samples(&samples, self.started.elapsed(), self.settings.tdp_watts)
    }

    fn halt(&mut self) -> Vec<ResourceSample> {
        // Dropping the sender also wakes the sampler, but say it explicitly.
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        match self.sampler.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!("Resource monitor thread panicked; summary has no samples");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.halt();
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

fn sampling_loop(stop_rx: Receiver<()>, interval: Duration) -> Vec<ResourceSample> {
    let mut samples = Vec::new();
    let mut probe = match ProcessProbe::current() {
        Ok(probe) => probe,
        Err(err) => {
            warn!("Resource monitor disabled: {:?}", err);
            return samples;
        }
    };

    loop {
        if stop_requested(&stop_rx) {
            break;
        }

        if let Some(sample) = probe.sample() {
            debug!(
                "[Monitor] CPU: {:.1}% | Memory: {:.1} MB",
                sample.cpu_percent, sample.memory_mb
            );
            samples.push(sample);
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    samples
}

/// Run `work` inside one monitor span and log the summary whether it
/// succeeds or fails.
pub fn monitored<T, E>(
    settings: MonitorSettings,
    label: &str,
    work: impl FnOnce() -> Result<T, E>,
) -> (Result<T, E>, ResourceSummary) {
    let monitor = ResourceMonitor::start(settings);
    let result = work();
    let summary = monitor.stop();
    summary.log(label);
    (result, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> MonitorSettings {
        MonitorSettings {
            sample_interval: Duration::from_millis(10),
            ..MonitorSettings::default()
        }
    }

    #[test]
    fn stop_returns_after_sampler_collected_the_span() {
        let monitor = ResourceMonitor::start(fast_settings());
        thread::sleep(Duration::from_millis(80));
        let summary = monitor.stop();

        assert!(summary.samples >= 1);
        assert!(summary.peak_memory_mb > 0.0);
        assert!(summary.duration_secs >= 0.08);
        assert!(summary.energy_wh >= 0.0);
    }

    #[test]
    fn stop_latency_is_bounded_by_the_interval() {
        let settings = MonitorSettings {
            sample_interval: Duration::from_secs(30),
            ..MonitorSettings::default()
        };
        let monitor = ResourceMonitor::start(settings);
        let begin = Instant::now();
        let _ = monitor.stop();
        assert!(begin.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn monitored_reports_summary_on_failure() {
        let (result, summary) =
            monitored::<(), _>(fast_settings(), "failing job", || Err("adapter exploded"));
        assert_eq!(result, Err("adapter exploded"));
        assert!(summary.duration_secs >= 0.0);
    }

    #[test]
    fn dropping_the_handle_joins_the_sampler() {
        let monitor = ResourceMonitor::start(fast_settings());
        drop(monitor);
    }
}
