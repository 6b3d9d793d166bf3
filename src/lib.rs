/// CDN Refresh Service Library
///
/// Refreshes expired video CDN URLs in the catalog database by
/// re-querying the video provider API on an externally triggered daily
/// cadence. Work that exceeds the per-run provider API budget is
/// deferred to a persistent queue and drained first on the next run.
///
/// # Modules
///
/// - `handlers`: HTTP trigger, status, diagnostic, and webhook endpoints
/// - `models`: refresh tasks, record kinds, resolver outcome types
/// - `services`: URL prober, source resolver, record updater, notifier
/// - `jobs`: the refresh run orchestrator and per-run statistics
/// - `db`: repositories for the refresh queue and catalog tables
/// - `error`: error types and handling
/// - `config`: configuration management
/// - `metrics`: observability counters
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
