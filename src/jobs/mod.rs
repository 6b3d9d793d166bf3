/// Background refresh job
///
/// - `stats`: per-run counters, API budget, report rendering
/// - `refresh_run`: the run orchestrator and its busy guard
pub mod refresh_run;
pub mod stats;

pub use refresh_run::RefreshRunner;
