pub mod batch;
pub mod job;
pub mod session;

pub use batch::{BatchReport, run_batch};
pub use job::{JobOutcome, Orchestrator};
pub use session::SessionService;
