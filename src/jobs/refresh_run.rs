/// Refresh run orchestrator
///
/// Drives one refresh cycle through four strictly sequential phases:
/// reset, drain the deferred queue, sweep the catalog, report. The run
/// shares one API call budget across drain and sweep; records that the
/// budget cannot cover are deferred to the queue for the next run.
///
/// The 24-hour cadence is owned by external callers (HTTP trigger or
/// chat command); the runner itself never re-schedules.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::PgPool;

use crate::db::{catalog_repo, task_repo};
use crate::jobs::stats::{render_report, RunContext};
use crate::metrics;
use crate::models::{CatalogRecord, RecordKind, ResolveOutcome, TaskStatus};
use crate::services::{Notifier, RecordUpdater, SourceResolver, UrlProber};

pub struct RefreshRunner {
    pool: PgPool,
    prober: UrlProber,
    resolver: SourceResolver,
    updater: RecordUpdater,
    notifier: Notifier,
    budget_ceiling: u32,
    busy: AtomicBool,
}

impl RefreshRunner {
    pub fn new(
        pool: PgPool,
        prober: UrlProber,
        resolver: SourceResolver,
        notifier: Notifier,
        budget_ceiling: u32,
    ) -> Self {
        let updater = RecordUpdater::new(pool.clone());
        Self {
            pool,
            prober,
            resolver,
            updater,
            notifier,
            budget_ceiling,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a run in the background if none is active.
    ///
    /// The compare-and-set guard is the single-run-at-a-time gate for
    /// every trigger path. Returns false when a run is already active.
    pub fn try_trigger(self: Arc<Self>) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let runner = self;
        tokio::spawn(async move {
            runner.run().await;
            runner.busy.store(false, Ordering::SeqCst);
        });
        true
    }

    /// Execute one complete refresh run and push the report.
    ///
    /// Per-item failures are counted and bucketed, never aborting the
    /// run; only unexpected errors escaping a phase land here, where they
    /// become a distinct error notification. Partial statistics survive.
    pub async fn run(&self) {
        metrics::record_run_started();
        tracing::info!(budget_ceiling = self.budget_ceiling, "Refresh run starting");

        let mut ctx = RunContext::new(self.budget_ceiling);
        self.notifier.send("CDN refresh run started").await;

        match self.execute(&mut ctx).await {
            Ok(()) => {
                metrics::record_run_finished("success");
                tracing::info!(
                    checked = ctx.stats.checked,
                    still_valid = ctx.stats.still_valid,
                    updated = ctx.stats.updated,
                    failed = ctx.stats.failed,
                    queued = ctx.stats.queued,
                    api_calls = ctx.budget.used(),
                    duration_s = ctx.stats.elapsed_secs(),
                    "Refresh run completed"
                );
                self.notifier.send(&render_report(&ctx.stats, &ctx.budget)).await;
            }
            Err(e) => {
                metrics::record_run_finished("error");
                tracing::error!(error = %e, "Refresh run aborted");
                self.notifier
                    .send(&format!("CDN refresh run failed: {}", e))
                    .await;
            }
        }
    }

    /// One-off resolve for operator diagnostics. Uses a throwaway budget
    /// and touches no database state.
    pub async fn diagnose(&self, video_id: &str) -> ResolveOutcome {
        let mut budget = crate::jobs::stats::ApiBudget::new(1);
        self.resolver.resolve(video_id, &mut budget).await
    }

    async fn execute(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
        self.drain_deferred(ctx).await?;
        self.sweep_catalog(ctx).await?;
        Ok(())
    }

    /// Phase 2: work through previously deferred tasks, oldest first,
    /// until the queue or the budget runs out. Unreached tasks stay
    /// pending for the next run.
    async fn drain_deferred(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
        let tasks = task_repo::drain(&self.pool, ctx.budget.ceiling() as i64).await?;
        if tasks.is_empty() {
            tracing::info!("No deferred tasks to drain");
            return Ok(());
        }

        tracing::info!(count = tasks.len(), "Draining deferred tasks");

        for task in tasks {
            if ctx.budget.exhausted() {
                tracing::info!("API budget exhausted, remaining tasks stay pending");
                break;
            }

            ctx.stats.checked += 1;

            let kind = match RecordKind::from_str(&task.record_kind) {
                Some(kind) => kind,
                None => {
                    let message = format!("unknown record kind: {}", task.record_kind);
                    tracing::warn!(task_id = %task.id, message, "Skipping malformed task");
                    ctx.stats.failed += 1;
                    task_repo::mark_processed(
                        &self.pool,
                        task.id,
                        TaskStatus::Failed,
                        Some(&message),
                    )
                    .await;
                    continue;
                }
            };

            match self
                .resolver
                .resolve(&task.provider_video_id, &mut ctx.budget)
                .await
            {
                ResolveOutcome::Resolved { url } => {
                    if self
                        .updater
                        .apply(kind, task.record_id, &url, &mut ctx.stats)
                        .await
                    {
                        ctx.stats.updated += 1;
                        task_repo::mark_processed(&self.pool, task.id, TaskStatus::Completed, None)
                            .await;
                    } else {
                        ctx.stats.failed += 1;
                        task_repo::mark_processed(
                            &self.pool,
                            task.id,
                            TaskStatus::Failed,
                            Some("database update failed"),
                        )
                        .await;
                    }
                }
                ResolveOutcome::Failed { kind: failure, message } => {
                    ctx.stats.failed += 1;
                    ctx.stats.record_failure(
                        failure,
                        &task.provider_video_id,
                        task.title.as_deref(),
                    );
                    task_repo::mark_processed(
                        &self.pool,
                        task.id,
                        TaskStatus::Failed,
                        Some(&message),
                    )
                    .await;
                }
            }
        }

        Ok(())
    }

    /// Phase 3: sweep every record kind in fixed order. When the budget
    /// runs out mid-kind, the rest of that kind is deferred to the queue;
    /// subsequent kinds still get their own sweep and their own budget
    /// check (fairness across kinds).
    async fn sweep_catalog(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
        for &kind in RecordKind::ALL {
            let records = catalog_repo::list_refreshable(&self.pool, kind).await?;
            tracing::info!(
                record_kind = kind.as_str(),
                count = records.len(),
                "Sweeping catalog records"
            );

            for (idx, record) in records.iter().enumerate() {
                if ctx.budget.exhausted() {
                    self.defer_remaining(kind, &records[idx..], ctx).await;
                    break;
                }

                ctx.stats.checked += 1;

                if self.prober.probe(Some(&record.video_url)).await {
                    ctx.stats.still_valid += 1;
                    continue;
                }

                match self
                    .resolver
                    .resolve(&record.provider_video_id, &mut ctx.budget)
                    .await
                {
                    ResolveOutcome::Resolved { url } => {
                        if self.updater.apply(kind, record.id, &url, &mut ctx.stats).await {
                            ctx.stats.updated += 1;
                        } else {
                            ctx.stats.failed += 1;
                            ctx.stats.record_update_failure(
                                &record.provider_video_id,
                                record.title.as_deref(),
                            );
                        }
                    }
                    ResolveOutcome::Failed { kind: failure, message } => {
                        ctx.stats.failed += 1;
                        ctx.stats.record_failure(
                            failure,
                            &record.provider_video_id,
                            record.title.as_deref(),
                        );
                        tracing::warn!(
                            record_kind = kind.as_str(),
                            record_id = %record.id,
                            message,
                            "Sweep resolve failed"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Defer records the budget could not cover. Enqueue failures are
    /// logged inside the repo and simply not counted as queued.
    async fn defer_remaining(&self, kind: RecordKind, records: &[CatalogRecord], ctx: &mut RunContext) {
        tracing::warn!(
            record_kind = kind.as_str(),
            remaining = records.len(),
            "API budget exhausted, deferring remaining records"
        );

        for record in records {
            if task_repo::enqueue(
                &self.pool,
                kind,
                record.id,
                &record.provider_video_id,
                Some(&record.video_url),
                record.title.as_deref(),
            )
            .await
            {
                ctx.stats.queued += 1;
            }
        }
    }
}
