//! SQLite persistence gateway.
//!
//! One `impl Database` block per table lives in its own module; all of them
//! funnel through the statement helpers below so that every failure is
//! logged the same way before it reaches a caller.

mod releases;
mod repositories;
mod schema;
mod seen_marks;

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};

use schema::SCHEMA;

pub use seen_marks::SeenMark;

/// Logged SQL is cut to this many characters.
const LOGGED_SQL_LEN: usize = 100;

/// Handle to the database. Cheap to clone; all clones share one connection
/// thread, so every statement is atomic with respect to the others.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| storage_error("schema", e))?;

        Ok(Self { conn })
    }

    /// Run one statement and return the number of affected rows.
    async fn execute(&self, sql: &'static str, params: Vec<Value>) -> Result<usize> {
        let start = Instant::now();
        let changed = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                Ok(stmt.execute(params_from_iter(params))?)
            })
            .await
            .map_err(|e| storage_error(sql, e))?;
        log_statement(sql, start, changed);
        Ok(changed)
    }

    /// Run a plain INSERT and return the new row id. Conflicts surface as
    /// constraint violations.
    async fn insert(&self, sql: &'static str, params: Vec<Value>) -> Result<i64> {
        let start = Instant::now();
        let id = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                stmt.execute(params_from_iter(params))?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e| storage_error(sql, e))?;
        log_statement(sql, start, 1);
        Ok(id)
    }

    /// Run an `INSERT .. ON CONFLICT DO NOTHING` and return the new row id,
    /// or `None` when the statement inserted nothing.
    async fn insert_or_ignore(&self, sql: &'static str, params: Vec<Value>) -> Result<Option<i64>> {
        let start = Instant::now();
        let id = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                let changed = stmt.execute(params_from_iter(params))?;
                Ok((changed > 0).then(|| conn.last_insert_rowid()))
            })
            .await
            .map_err(|e| storage_error(sql, e))?;
        log_statement(sql, start, usize::from(id.is_some()));
        Ok(id)
    }

    async fn query<T, F>(&self, sql: &'static str, params: Vec<Value>, map: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let start = Instant::now();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                let rows = stmt
                    .query_map(params_from_iter(params), |row| map(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| storage_error(sql, e))?;
        log_statement(sql, start, rows.len());
        Ok(rows)
    }

    async fn query_opt<T, F>(
        &self,
        sql: &'static str,
        params: Vec<Value>,
        map: F,
    ) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: Fn(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let start = Instant::now();
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                let row = stmt
                    .query_row(params_from_iter(params), |row| map(row))
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(|e| storage_error(sql, e))?;
        log_statement(sql, start, usize::from(row.is_some()));
        Ok(row)
    }
}

fn truncate_sql(sql: &str) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.chars().take(LOGGED_SQL_LEN).collect()
}

fn log_statement(sql: &str, start: Instant, rows: usize) {
    tracing::debug!(
        query = %truncate_sql(sql),
        duration_ms = start.elapsed().as_millis() as u64,
        rows,
        "Executed query"
    );
}

fn storage_error(sql: &str, err: tokio_rusqlite::Error) -> AppError {
    if is_constraint_error(&err) {
        tracing::warn!(query = %truncate_sql(sql), error = %err, "Constraint violation");
    } else {
        tracing::error!(query = %truncate_sql(sql), error = %err, "Database query failed");
    }
    AppError::Persistence(err)
}

fn is_constraint_error(err: &tokio_rusqlite::Error) -> bool {
    matches!(
        err,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// True when a storage constraint (UNIQUE, FOREIGN KEY, NOT NULL) rejected
/// the write.
pub(crate) fn is_constraint_violation(err: &AppError) -> bool {
    matches!(err, AppError::Persistence(inner) if is_constraint_error(inner))
}

/// Timestamps are stored as fixed-width RFC 3339 so that text ordering
/// matches chronological ordering.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop the sub-microsecond part so a value survives a round trip through
/// [`format_datetime`] unchanged.
pub(crate) fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn get_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp {raw:?}").into(),
        )
    })
}
