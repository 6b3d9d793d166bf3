/// Repository for the `refresh_queue` table (deferred-work store)
///
/// Tasks are appended when a run's API budget runs out, drained oldest
/// first by later runs, and moved to a terminal status exactly once.
/// Rows are never deleted; the queue doubles as an audit trail.
///
/// Writes here are non-fatal to the refresh run: `enqueue` and
/// `mark_processed` log failures and report them as `false` instead of
/// raising. Only the drain read propagates, as the run cannot proceed
/// without it.
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{QueueSummary, RecordKind, RefreshTask, TaskStatus};

const ENQUEUE_SQL: &str = r#"
    INSERT INTO refresh_queue (record_kind, record_id, provider_video_id, previous_url, title)
    VALUES ($1, $2, $3, $4, $5)
"#;

const DRAIN_SQL: &str = r#"
    SELECT id, record_kind, record_id, provider_video_id, previous_url, title,
           status, error_message, created_at, processed_at
    FROM refresh_queue
    WHERE status = 'pending'
    ORDER BY created_at ASC
    LIMIT $1
"#;

// Guarded on pending so a repeat call with the same terminal status
// matches zero rows, and a terminal task can never transition backwards.
const MARK_PROCESSED_SQL: &str = r#"
    UPDATE refresh_queue
    SET status = $2, error_message = $3, processed_at = NOW()
    WHERE id = $1 AND status = 'pending'
"#;

const SUMMARY_SQL: &str = r#"
    SELECT
        COUNT(*) FILTER (WHERE status = 'pending')   AS pending,
        COUNT(*) FILTER (WHERE status = 'completed') AS completed,
        COUNT(*) FILTER (WHERE status = 'failed')    AS failed
    FROM refresh_queue
"#;

/// Append a pending refresh task.
///
/// A persistence failure is non-fatal to the caller: it is logged and
/// `false` is returned, with no retry.
pub async fn enqueue(
    pool: &PgPool,
    kind: RecordKind,
    record_id: Uuid,
    provider_video_id: &str,
    previous_url: Option<&str>,
    title: Option<&str>,
) -> bool {
    let result = sqlx::query(ENQUEUE_SQL)
        .bind(kind.as_str())
        .bind(record_id)
        .bind(provider_video_id)
        .bind(previous_url)
        .bind(title)
        .execute(pool)
        .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(
                record_kind = kind.as_str(),
                %record_id,
                error = %e,
                "Failed to enqueue refresh task"
            );
            false
        }
    }
}

/// Fetch up to `limit` pending tasks, oldest first.
///
/// The limit is the run's budget ceiling, so a drain never reads more
/// tasks than the run could possibly process.
pub async fn drain(pool: &PgPool, limit: i64) -> Result<Vec<RefreshTask>, sqlx::Error> {
    sqlx::query_as::<_, RefreshTask>(DRAIN_SQL)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Move a task from `pending` to a terminal status.
///
/// Idempotent for a repeated terminal status (the pending guard matches
/// zero rows the second time). A write failure is logged and reported as
/// `false`; the task stays pending and is retried on the next drain.
pub async fn mark_processed(
    pool: &PgPool,
    task_id: Uuid,
    status: TaskStatus,
    error_message: Option<&str>,
) -> bool {
    let result = sqlx::query(MARK_PROCESSED_SQL)
        .bind(task_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(pool)
        .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(
                %task_id,
                status = status.as_str(),
                error = %e,
                "Failed to mark refresh task processed"
            );
            false
        }
    }
}

/// Counts by status, for the status endpoint and operator visibility.
pub async fn summary(pool: &PgPool) -> Result<QueueSummary, sqlx::Error> {
    sqlx::query_as::<_, QueueSummary>(SUMMARY_SQL)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    // A lazy pool pointed at a closed port: queries fail at connect time
    // without a database, exercising the non-fatal write paths.
    fn unreachable_pool() -> PgPool {
        PgPool::connect_lazy("postgresql://127.0.0.1:1/refresh_test").unwrap()
    }

    #[test]
    fn test_drain_is_bounded_and_fifo() {
        assert!(DRAIN_SQL.contains("WHERE status = 'pending'"));
        assert!(DRAIN_SQL.contains("ORDER BY created_at ASC"));
        assert!(DRAIN_SQL.contains("LIMIT $1"));
    }

    #[test]
    fn test_mark_processed_only_leaves_pending() {
        // The pending guard makes a repeat terminal call a no-op and
        // forbids completed -> failed (or any backwards) transitions.
        assert!(MARK_PROCESSED_SQL.contains("WHERE id = $1 AND status = 'pending'"));
        assert!(MARK_PROCESSED_SQL.contains("processed_at = NOW()"));
    }

    #[test]
    fn test_enqueue_never_sets_a_terminal_status() {
        // New tasks rely on the column default of 'pending'.
        assert!(!ENQUEUE_SQL.contains("status"));
    }

    #[test]
    fn test_summary_counts_every_status() {
        for status in ["pending", "completed", "failed"] {
            assert!(SUMMARY_SQL.contains(&format!("WHERE status = '{}'", status)));
        }
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_non_fatal() {
        let pool = unreachable_pool();
        let ok = enqueue(
            &pool,
            RecordKind::Episode,
            Uuid::new_v4(),
            "vid1",
            Some("https://cdn.example.com/old.mp4"),
            Some("Pilot"),
        )
        .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_mark_processed_failure_is_non_fatal() {
        let pool = unreachable_pool();
        let ok = mark_processed(&pool, Uuid::new_v4(), TaskStatus::Failed, Some("boom")).await;
        assert!(!ok);
    }
}
