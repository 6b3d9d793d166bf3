/// Record updater: the only component that mutates catalog rows
///
/// Maps a record kind to its table and URL column through the fixed
/// schema map and rewrites a single row's URL. Failures are non-fatal to
/// the caller: they are logged and reported as `false`.
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::catalog_repo;
use crate::jobs::stats::RunStats;
use crate::metrics;
use crate::models::RecordKind;

#[derive(Clone)]
pub struct RecordUpdater {
    pool: PgPool,
}

impl RecordUpdater {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply a freshly resolved URL to one catalog record.
    ///
    /// Increments the per-kind updated counter on success. A write error
    /// or a vanished row returns `false`.
    pub async fn apply(
        &self,
        kind: RecordKind,
        record_id: Uuid,
        new_url: &str,
        stats: &mut RunStats,
    ) -> bool {
        match catalog_repo::update_video_url(&self.pool, kind, record_id, new_url).await {
            Ok(0) => {
                tracing::warn!(
                    record_kind = kind.as_str(),
                    %record_id,
                    "URL update matched no catalog row"
                );
                false
            }
            Ok(_) => {
                stats.record_updated(kind);
                metrics::record_url_updated(kind.as_str());
                tracing::info!(
                    record_kind = kind.as_str(),
                    %record_id,
                    "Refreshed catalog URL"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    record_kind = kind.as_str(),
                    %record_id,
                    error = %e,
                    "URL update failed"
                );
                false
            }
        }
    }
}
