//! Application log database queries.
//!
//! Write paths take any `PgExecutor` so the workflow driver can run them
//! inside a single transaction.

use sqlx::postgres::PgExecutor;

use crate::db::models::{ApplicationLogEntry, ApplicationRecord, NewLogEntry};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

const LOG_COLUMNS: &str = r#"
    id, main_db_id, application_step, user_name, application_status,
    application_decision, application_remarks, start_date, accomplished_date,
    del_index, del_previous, del_last_index, del_thread, created_at
"#;

/// Map a unique-index violation on `(main_db_id, del_index)` to a conflict.
fn map_insert_error(err: sqlx::Error, entry: &NewLogEntry) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Conflict(
            format!(
                "del_index {} already exists for main_db_id {}",
                entry.del_index, entry.main_db_id
            ),
        ),
        _ => AppError::Database(err),
    }
}

/// Insert a new log row.
pub async fn insert_entry<'e, E>(executor: E, entry: &NewLogEntry) -> AppResult<ApplicationLogEntry>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        r#"
        INSERT INTO regflow.application_logs (
            main_db_id, application_step, user_name, application_status,
            application_decision, application_remarks, start_date, accomplished_date,
            del_index, del_previous, del_last_index, del_thread, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
        RETURNING {}
        "#,
        LOG_COLUMNS
    );

    sqlx::query_as::<_, ApplicationLogEntry>(&query)
        .bind(entry.main_db_id)
        .bind(&entry.application_step)
        .bind(&entry.user_name)
        .bind(&entry.application_status)
        .bind(entry.application_decision.as_deref())
        .bind(entry.application_remarks.as_deref())
        .bind(entry.start_date)
        .bind(entry.accomplished_date)
        .bind(entry.del_index)
        .bind(entry.del_previous)
        .bind(entry.thread.last_index_flag())
        .bind(entry.thread.as_str())
        .fetch_one(executor)
        .await
        .map_err(|e| map_insert_error(e, entry))
}

/// Replace every mutable column of a log row.
pub async fn update_entry(
    pool: &DbPool,
    id: i64,
    entry: &NewLogEntry,
) -> AppResult<Option<ApplicationLogEntry>> {
    let query = format!(
        r#"
        UPDATE regflow.application_logs
        SET main_db_id = $2, application_step = $3, user_name = $4,
            application_status = $5, application_decision = $6,
            application_remarks = $7, start_date = $8, accomplished_date = $9,
            del_index = $10, del_previous = $11, del_last_index = $12, del_thread = $13
        WHERE id = $1
        RETURNING {}
        "#,
        LOG_COLUMNS
    );

    sqlx::query_as::<_, ApplicationLogEntry>(&query)
        .bind(id)
        .bind(entry.main_db_id)
        .bind(&entry.application_step)
        .bind(&entry.user_name)
        .bind(&entry.application_status)
        .bind(entry.application_decision.as_deref())
        .bind(entry.application_remarks.as_deref())
        .bind(entry.start_date)
        .bind(entry.accomplished_date)
        .bind(entry.del_index)
        .bind(entry.del_previous)
        .bind(entry.thread.last_index_flag())
        .bind(entry.thread.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| map_insert_error(e, entry))
}

/// Delete a log row. Returns whether a row was removed.
pub async fn delete_entry(pool: &DbPool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM regflow.application_logs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Get a log row by primary key.
pub async fn get_entry(pool: &DbPool, id: i64) -> AppResult<Option<ApplicationLogEntry>> {
    let query = format!(
        "SELECT {} FROM regflow.application_logs WHERE id = $1",
        LOG_COLUMNS
    );

    let entry = sqlx::query_as::<_, ApplicationLogEntry>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(entry)
}

/// All rows of an application, newest first.
pub async fn list_by_main_db<'e, E>(
    executor: E,
    main_db_id: i64,
) -> AppResult<Vec<ApplicationLogEntry>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        r#"
        SELECT {}
        FROM regflow.application_logs
        WHERE main_db_id = $1
        ORDER BY del_index DESC, id DESC
        "#,
        LOG_COLUMNS
    );

    let entries = sqlx::query_as::<_, ApplicationLogEntry>(&query)
        .bind(main_db_id)
        .fetch_all(executor)
        .await?;

    Ok(entries)
}

/// Rows of one step of an application, newest first.
pub async fn list_by_step(
    pool: &DbPool,
    main_db_id: i64,
    step: &str,
) -> AppResult<Vec<ApplicationLogEntry>> {
    let query = format!(
        r#"
        SELECT {}
        FROM regflow.application_logs
        WHERE main_db_id = $1 AND application_step = $2
        ORDER BY del_index DESC, id DESC
        "#,
        LOG_COLUMNS
    );

    let entries = sqlx::query_as::<_, ApplicationLogEntry>(&query)
        .bind(main_db_id)
        .bind(step)
        .fetch_all(pool)
        .await?;

    Ok(entries)
}

/// Page through every log row, newest first.
pub async fn list_all(pool: &DbPool, limit: i64, offset: i64) -> AppResult<Vec<ApplicationLogEntry>> {
    let query = format!(
        r#"
        SELECT {}
        FROM regflow.application_logs
        ORDER BY created_at DESC, id DESC
        LIMIT $1 OFFSET $2
        "#,
        LOG_COLUMNS
    );

    let entries = sqlx::query_as::<_, ApplicationLogEntry>(&query)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(entries)
}

/// Resolve an application record by its DTN.
pub async fn find_application_by_dtn(
    pool: &DbPool,
    dtn: &str,
) -> AppResult<Option<ApplicationRecord>> {
    let record = sqlx::query_as::<_, ApplicationRecord>(
        r#"
        SELECT id, dtn, app_status, payload, created_at
        FROM regflow.main_db
        WHERE dtn = $1
        "#,
    )
    .bind(dtn)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Largest `del_index` recorded for an application.
pub async fn max_del_index<'e, E>(executor: E, main_db_id: i64) -> AppResult<Option<i64>>
where
    E: PgExecutor<'e>,
{
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT MAX(del_index) FROM regflow.application_logs WHERE main_db_id = $1",
    )
    .bind(main_db_id)
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}

/// Serialize index allocation for one application until the transaction ends.
pub async fn lock_application<'e, E>(executor: E, main_db_id: i64) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(main_db_id)
        .execute(executor)
        .await?;

    Ok(())
}
