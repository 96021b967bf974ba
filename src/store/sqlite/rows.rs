//! Conversions between projection columns and domain values.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Params, Row};

use crate::error::{Error, Result};
use crate::types::{Page, Properties};

/// Fixed-width UTC timestamps, so text comparison orders them correctly.
pub(super) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(super) fn datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn millis_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(
        idx, millis,
    ))
}

/// Parses a stored enum name such as `ENABLED` or `AVRO`.
pub(super) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn optional_enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Properties stored inline as a JSON object; empty maps are stored as NULL.
pub(super) fn encode_properties(properties: &Properties) -> Result<Option<String>> {
    if properties.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(properties)?))
}

pub(super) fn properties_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Properties> {
    let text: Option<String> = row.get(idx)?;
    match text {
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(Properties::new()),
    }
}

pub(super) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Lock contention with another connection; the statement can be retried.
pub(super) fn is_busy(err: &Error) -> bool {
    matches!(
        err,
        Error::Database(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// True for a unique violation whose failing column list names `column`.
pub(super) fn violates_column(err: &rusqlite::Error, column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            message
                .split([',', ' ', ':'])
                .any(|part| part.rsplit('.').next() == Some(column))
        }
        _ => false,
    }
}

/// Classifies a failed insert: constraint violations become `AlreadyExists`.
pub(super) fn insert_result(
    result: rusqlite::Result<usize>,
    entity: &'static str,
    key: impl Into<String>,
) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(Error::already_exists(entity, key)),
        Err(e) => Err(Error::from(e)),
    }
}

pub(super) fn count<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<i64> {
    conn.query_row(sql, params, |row| row.get(0))
        .map_err(Error::from)
}

pub(super) fn page_params(page: Page) -> (i64, i64) {
    (i64::from(page.limit), i64::from(page.offset))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_datetimes_sort_as_text() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        let (a, b) = (format_datetime(&early), format_datetime(&late));
        assert_eq!(a, "2024-01-02T03:04:05.000Z");
        assert!(a < b);
    }

    #[test]
    fn test_violated_column_is_matched_exactly() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE v (g TEXT, version TEXT, versionOrder INTEGER);
             CREATE UNIQUE INDEX uq_order ON v(g, versionOrder);
             INSERT INTO v VALUES ('a', '1', 1);",
        )
        .unwrap();
        let err = conn
            .execute("INSERT INTO v VALUES ('a', '2', 1)", [])
            .unwrap_err();
        assert!(is_constraint_violation(&err));
        assert!(violates_column(&err, "versionOrder"));
        assert!(!violates_column(&err, "version"));
    }
}
