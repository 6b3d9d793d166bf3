/// Per-run statistics and the provider API call budget
///
/// One `RunContext` is constructed at the start of every refresh run and
/// threaded through each phase. Nothing here is shared between runs.
use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::models::{FailureKind, RecordKind};

/// Maximum number of example titles shown per failure bucket in the report.
pub const MAX_FAILURE_EXAMPLES: usize = 5;

/// Provider API call budget for one run.
///
/// Shared across the drain and sweep phases; the ceiling is kept below
/// the provider's own per-window rate limit as a safety margin.
#[derive(Debug, Clone, Copy)]
pub struct ApiBudget {
    used: u32,
    ceiling: u32,
}

impl ApiBudget {
    pub fn new(ceiling: u32) -> Self {
        Self { used: 0, ceiling }
    }

    /// Record one provider API call. Called exactly once per resolve.
    pub fn spend(&mut self) {
        self.used += 1;
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.ceiling
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

/// One example entry inside a failure bucket.
#[derive(Debug, Clone)]
pub struct FailureExample {
    pub provider_video_id: String,
    pub title: Option<String>,
}

/// A bounded list of failures of one class. Counts every failure but
/// keeps at most `MAX_FAILURE_EXAMPLES` examples for the report.
#[derive(Debug, Default)]
pub struct FailureBucket {
    pub total: u32,
    pub examples: Vec<FailureExample>,
}

impl FailureBucket {
    fn push(&mut self, provider_video_id: &str, title: Option<&str>) {
        self.total += 1;
        if self.examples.len() < MAX_FAILURE_EXAMPLES {
            self.examples.push(FailureExample {
                provider_video_id: provider_video_id.to_string(),
                title: title.map(str::to_string),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Counters collected over one refresh run.
#[derive(Debug)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub checked: u32,
    pub still_valid: u32,
    pub updated: u32,
    pub failed: u32,
    pub queued: u32,
    updated_by_kind: HashMap<RecordKind, u32>,
    pub not_found: FailureBucket,
    pub permission_denied: FailureBucket,
    pub api_errors: FailureBucket,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            checked: 0,
            still_valid: 0,
            updated: 0,
            failed: 0,
            queued: 0,
            updated_by_kind: HashMap::new(),
            not_found: FailureBucket::default(),
            permission_denied: FailureBucket::default(),
            api_errors: FailureBucket::default(),
        }
    }

    pub fn record_updated(&mut self, kind: RecordKind) {
        *self.updated_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn updated_for_kind(&self, kind: RecordKind) -> u32 {
        self.updated_by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Bucket a resolver failure. Rate-limit and transport failures fold
    /// into the other-API-errors bucket; the task error message keeps the
    /// precise kind.
    pub fn record_failure(
        &mut self,
        kind: FailureKind,
        provider_video_id: &str,
        title: Option<&str>,
    ) {
        let bucket = match kind {
            FailureKind::NotFound => &mut self.not_found,
            FailureKind::PermissionDenied => &mut self.permission_denied,
            FailureKind::RateLimited | FailureKind::ApiError | FailureKind::NetworkError => {
                &mut self.api_errors
            }
        };
        bucket.push(provider_video_id, title);
    }

    /// Surface a database update failure that followed a successful
    /// resolve, so the report can explain the failed count. Lands in the
    /// other-API-errors bucket alongside the unclassified failures.
    pub fn record_update_failure(&mut self, provider_video_id: &str, title: Option<&str>) {
        self.api_errors.push(provider_video_id, title);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Run state threaded through every orchestrator phase.
#[derive(Debug)]
pub struct RunContext {
    pub stats: RunStats,
    pub budget: ApiBudget,
}

impl RunContext {
    pub fn new(budget_ceiling: u32) -> Self {
        Self {
            stats: RunStats::new(),
            budget: ApiBudget::new(budget_ceiling),
        }
    }
}

/// Render the human-readable run report pushed to the notification sink.
pub fn render_report(stats: &RunStats, budget: &ApiBudget) -> String {
    let mut report = String::new();

    report.push_str("CDN refresh run report\n");
    report.push_str(&format!(
        "Started: {}\n",
        stats.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Duration: {}s\n", stats.elapsed_secs()));
    report.push_str(&format!(
        "Checked: {} | Still valid: {} | Updated: {} | Failed: {} | Queued: {}\n",
        stats.checked, stats.still_valid, stats.updated, stats.failed, stats.queued
    ));

    let by_kind: Vec<String> = RecordKind::ALL
        .iter()
        .map(|kind| format!("{}={}", kind.as_str(), stats.updated_for_kind(*kind)))
        .collect();
    report.push_str(&format!("Updated by kind: {}\n", by_kind.join(", ")));
    report.push_str(&format!(
        "API calls: {}/{}\n",
        budget.used(),
        budget.ceiling()
    ));

    render_bucket(&mut report, "Not found", &stats.not_found);
    render_bucket(&mut report, "Permission denied", &stats.permission_denied);
    render_bucket(&mut report, "Other API errors", &stats.api_errors);

    report.push('\n');
    report.push_str(closing_line(stats));
    report
}

fn render_bucket(report: &mut String, label: &str, bucket: &FailureBucket) {
    if bucket.is_empty() {
        return;
    }

    report.push_str(&format!("{} ({}):\n", label, bucket.total));
    for example in &bucket.examples {
        let title = example.title.as_deref().unwrap_or("<untitled>");
        report.push_str(&format!("  - {} [{}]\n", title, example.provider_video_id));
    }
    if bucket.total as usize > bucket.examples.len() {
        report.push_str(&format!(
            "  ... and {} more\n",
            bucket.total as usize - bucket.examples.len()
        ));
    }
}

/// Closing status line, chosen by precedence:
/// all-updated > all-still-valid > queued-pending > completed-with-failures.
fn closing_line(stats: &RunStats) -> &'static str {
    if stats.updated > 0 && stats.failed == 0 && stats.queued == 0 {
        "All expired links refreshed successfully."
    } else if stats.checked > 0 && stats.updated == 0 && stats.failed == 0 && stats.queued == 0 {
        "All links are still valid, no updates needed."
    } else if stats.queued > 0 {
        "Budget exhausted, remaining records queued for the next run."
    } else if stats.failed > 0 {
        "Run completed with failures, see buckets above."
    } else {
        "No records were eligible for checking."
    }
}
