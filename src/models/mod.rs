/// Data structures for the CDN refresh engine
///
/// This module defines the persisted refresh-queue task shape, the
/// catalog record shape shared by every record kind, and the resolver
/// outcome types used across the service.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kinds of catalog records whose CDN URLs this service refreshes.
///
/// Each kind maps to its own backing table and URL column. The mapping
/// is a fixed lookup table validated at startup, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Episode,
    Movie,
}

impl RecordKind {
    /// Fixed sweep order. Episodes first, then movies.
    pub const ALL: &'static [RecordKind] = &[RecordKind::Episode, RecordKind::Movie];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Episode => "episode",
            RecordKind::Movie => "movie",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "episode" => Some(RecordKind::Episode),
            "movie" => Some(RecordKind::Movie),
            _ => None,
        }
    }

    /// Backing table for this kind. Catalog tables are owned by the
    /// catalog system; this service never creates or deletes rows in them.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Episode => "episodes",
            RecordKind::Movie => "movies",
        }
    }

    /// Column holding the CDN URL. The column name differs per kind.
    pub fn url_column(&self) -> &'static str {
        match self {
            RecordKind::Episode => "video_url",
            RecordKind::Movie => "stream_url",
        }
    }
}

/// Validate the kind -> (table, column) schema map at startup.
///
/// The table and column names are interpolated into SQL as identifiers,
/// so they must be plain lowercase identifiers and tables must be unique.
pub fn validate_schema_map() -> Result<(), String> {
    let mut seen_tables = Vec::new();

    for kind in RecordKind::ALL {
        for ident in [kind.table(), kind.url_column()] {
            if ident.is_empty()
                || !ident
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(format!(
                    "invalid identifier '{}' in schema map for kind '{}'",
                    ident,
                    kind.as_str()
                ));
            }
        }

        if seen_tables.contains(&kind.table()) {
            return Err(format!(
                "duplicate table '{}' in schema map",
                kind.table()
            ));
        }
        seen_tables.push(kind.table());
    }

    Ok(())
}

/// Status of a deferred refresh task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// A deferred refresh task persisted in the `refresh_queue` table.
///
/// Created when a sweep skips a record because the API call budget ran
/// out. Tasks reach a terminal status and are never deleted (audit trail).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RefreshTask {
    pub id: Uuid,
    pub record_kind: String,
    pub record_id: Uuid,
    pub provider_video_id: String,
    pub previous_url: Option<String>,
    pub title: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A catalog row eligible for refreshing.
///
/// Both record kinds project onto this shape; the per-kind URL column is
/// aliased to `video_url` in the listing query. Listings filter out rows
/// with a null URL or null provider id, so those fields are non-optional.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogRecord {
    pub id: Uuid,
    pub title: Option<String>,
    pub video_url: String,
    pub provider_video_id: String,
}

/// Counts by status for the refresh queue.
#[derive(Debug, Clone, Copy, FromRow, Serialize)]
pub struct QueueSummary {
    pub pending: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Failure classification for provider API calls.
///
/// Kinds are listed in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Provider reports the video does not exist.
    NotFound,
    /// Provider denied access to the video.
    PermissionDenied,
    /// Provider-side quota exceeded (distinct from the local call budget).
    RateLimited,
    /// Any other structured provider error.
    ApiError,
    /// Transport-level failure with no structured response.
    NetworkError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ApiError => "api_error",
            FailureKind::NetworkError => "network_error",
        }
    }
}

/// Outcome of one provider resolve call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Resolved { url: String },
    Failed { kind: FailureKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_round_trip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_str(kind.as_str()), Some(*kind));
        }
        assert_eq!(RecordKind::from_str("series"), None);
        assert_eq!(RecordKind::from_str(""), None);
    }

    #[test]
    fn test_record_kind_schema_map() {
        assert_eq!(RecordKind::Episode.table(), "episodes");
        assert_eq!(RecordKind::Episode.url_column(), "video_url");
        assert_eq!(RecordKind::Movie.table(), "movies");
        assert_eq!(RecordKind::Movie.url_column(), "stream_url");
    }

    #[test]
    fn test_schema_map_validates() {
        assert!(validate_schema_map().is_ok());
    }

    #[test]
    fn test_sweep_order_is_fixed() {
        assert_eq!(
            RecordKind::ALL,
            &[RecordKind::Episode, RecordKind::Movie]
        );
    }

    #[test]
    fn test_task_status_as_str() {
        assert_eq!(TaskStatus::Pending.as_str(), "pending");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
        assert_eq!(TaskStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_failure_kind_as_str() {
        assert_eq!(FailureKind::NotFound.as_str(), "not_found");
        assert_eq!(FailureKind::PermissionDenied.as_str(), "permission_denied");
        assert_eq!(FailureKind::RateLimited.as_str(), "rate_limited");
        assert_eq!(FailureKind::ApiError.as_str(), "api_error");
        assert_eq!(FailureKind::NetworkError.as_str(), "network_error");
    }
}
