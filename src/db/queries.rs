use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::scan::PageScan;

fn page_scan_from_row(row: &PgRow) -> Result<PageScan, sqlx::Error> {
    let page_id: i64 = row.try_get("page_id")?;
    let workspace_id: i64 = row.try_get("workspace_id")?;

    Ok(PageScan {
        page_id: page_id as u32,
        language_id: row.try_get("language_id")?,
        workspace_id: workspace_id as u32,
        scan_id: row.try_get("scan_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Get the scan registered for a page version
pub async fn get_page_scan(
    pool: &PgPool,
    page_id: u32,
    language_id: i32,
    workspace_id: u32,
) -> Result<Option<PageScan>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT page_id, language_id, workspace_id, scan_id, created_at, updated_at
        FROM page_scans
        WHERE page_id = $1 AND language_id = $2 AND workspace_id = $3
        "#,
    )
    .bind(i64::from(page_id))
    .bind(language_id)
    .bind(i64::from(workspace_id))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(page_scan_from_row).transpose()
}

/// Register (or replace) the scan for a page version
pub async fn upsert_page_scan(
    pool: &PgPool,
    page_id: u32,
    language_id: i32,
    workspace_id: u32,
    scan_id: &str,
) -> Result<PageScan, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO page_scans (page_id, language_id, workspace_id, scan_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (page_id, language_id, workspace_id)
        DO UPDATE SET scan_id = EXCLUDED.scan_id, updated_at = NOW()
        RETURNING page_id, language_id, workspace_id, scan_id, created_at, updated_at
        "#,
    )
    .bind(i64::from(page_id))
    .bind(language_id)
    .bind(i64::from(workspace_id))
    .bind(scan_id)
    .fetch_one(pool)
    .await?;

    page_scan_from_row(&row)
}

/// Forget the scan for a page version. Returns whether a row was removed.
pub async fn delete_page_scan(
    pool: &PgPool,
    page_id: u32,
    language_id: i32,
    workspace_id: u32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM page_scans
        WHERE page_id = $1 AND language_id = $2 AND workspace_id = $3
        "#,
    )
    .bind(i64::from(page_id))
    .bind(language_id)
    .bind(i64::from(workspace_id))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
