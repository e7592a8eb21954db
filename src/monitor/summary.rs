use log::info;
use serde::Serialize;
use std::time::Duration;

/// One reading of the current process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// Aggregate of one monitored span.
///
/// `energy_wh` is a rough CPU-only estimate derived from a nominal TDP and the
/// average CPU load. It is never a calibrated measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub avg_cpu_percent: f64,
    pub peak_memory_mb: f64,
    pub duration_secs: f64,
    pub energy_wh: f64,
    pub samples: usize,
}

pub fn estimate_energy_wh(tdp_watts: f64, avg_cpu_percent: f64, duration_secs: f64) -> f64 {
    let power_watts = tdp_watts * (avg_cpu_percent / 100.0);
    power_watts * (duration_secs / 3600.0)
}

impl ResourceSummary {
    /// Summarize a full sample set. An empty set yields zero CPU and memory.
    pub fn from_samples(samples: &[ResourceSample], duration: Duration, tdp_watts: f64) -> Self {
        let avg_cpu_percent = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.cpu_percent).sum::<f64>() / samples.len() as f64
        };
        let peak_memory_mb = samples
            .iter()
            .map(|s| s.memory_mb)
            .fold(0.0_f64, f64::max);
        let duration_secs = duration.as_secs_f64();

        Self {
            avg_cpu_percent,
            peak_memory_mb,
            duration_secs,
            energy_wh: estimate_energy_wh(tdp_watts, avg_cpu_percent, duration_secs),
            samples: samples.len(),
        }
    }

    pub fn log(&self, label: &str) {
        info!(duration = &*format!("{:?}", Duration::from_secs_f64(self.duration_secs));
            "Resource summary for {}\nAverage CPU: {:.1}%\nPeak Memory: {:.1} MB\nDuration: {:.1} seconds\nEstimated Energy Used: {:.3} Wh ({} samples)",
            label,
            self.avg_cpu_percent,
            self.peak_memory_mb,
            self.duration_secs,
            self.energy_wh,
            self.samples,
        );
    }
}
