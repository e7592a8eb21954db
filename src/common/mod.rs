pub mod errors;

pub const VALID_IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png"];

/// Marker appended to the input stem to name a colorized output.
pub const COLORIZED_SUFFIX: &str = "_colorized";

pub const OUTPUT_EXTENSION: &str = "png";

/// Directory created beside a batch source to hold its outputs.
pub const BATCH_OUTPUT_DIR: &str = "colorization";

pub const INPUTS_DIR: &str = "inputs";

pub const OUTPUTS_DIR: &str = "outputs";

pub const SESSION_COOKIE: &str = "workspace_id";

/// Nominal CPU package power used for the energy estimate. Not a measurement.
pub const ASSUMED_TDP_WATTS: f64 = 45.0;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_TARGET_SIZE: u32 = 576;

pub const DEFAULT_DENOISE_SIGMA: u32 = 25;

use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};

// Rocket-specific Tokio Runtime
// Colorization itself runs on the blocking pool, so the worker count stays small.
pub static ROCKET_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(std::thread::available_parallelism().map_or(2, |n| n.get()))
        .thread_name("rocket-io-worker")
        .enable_all()
        .build()
        .expect("Failed to build Rocket Tokio runtime")
});
