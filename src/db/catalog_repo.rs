/// Repository for the catalog tables (episodes, movies)
///
/// The catalog rows are owned by the catalog system. This service only
/// lists rows eligible for refreshing and rewrites the URL column of a
/// single row; it never inserts or deletes catalog rows.
///
/// Table and column names come from the `RecordKind` schema map, which is
/// validated at startup; they are the only identifiers interpolated here.
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CatalogRecord, RecordKind};

/// List all records of one kind that have both a URL and a provider
/// video id, in stable id order.
pub async fn list_refreshable(
    pool: &PgPool,
    kind: RecordKind,
) -> Result<Vec<CatalogRecord>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT id, title, {url} AS video_url, provider_video_id
        FROM {table}
        WHERE {url} IS NOT NULL AND provider_video_id IS NOT NULL
        ORDER BY id
        "#,
        url = kind.url_column(),
        table = kind.table(),
    );

    sqlx::query_as::<_, CatalogRecord>(&sql).fetch_all(pool).await
}

/// Rewrite the URL column of one record. Returns the affected row count
/// so the caller can tell a vanished row from a successful write.
pub async fn update_video_url(
    pool: &PgPool,
    kind: RecordKind,
    record_id: Uuid,
    new_url: &str,
) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "UPDATE {table} SET {url} = $1 WHERE id = $2",
        table = kind.table(),
        url = kind.url_column(),
    );

    let result = sqlx::query(&sql)
        .bind(new_url)
        .bind(record_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
