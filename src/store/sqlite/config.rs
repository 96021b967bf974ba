use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::{datetime_at, format_datetime, insert_result, millis_at};
use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::{ConfigProperty, DownloadContext};

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<ConfigProperty> {
    Ok(ConfigProperty {
        name: row.get(0)?,
        value: row.get(1)?,
        modified_on: datetime_at(row, 2)?,
    })
}

pub(super) fn get(conn: &Connection, name: &str) -> Result<Option<ConfigProperty>> {
    conn.query_row(
        SELECT_CONFIG_PROPERTY_BY_NAME,
        params![name],
        property_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(super) fn list(conn: &Connection) -> Result<Vec<ConfigProperty>> {
    let mut stmt = conn.prepare(SELECT_CONFIG_PROPERTIES)?;
    let properties = stmt
        .query_map([], property_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(properties)
}

pub(super) fn modified_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<ConfigProperty>> {
    let mut stmt = conn.prepare(SELECT_STALE_CONFIG_PROPERTIES)?;
    let properties = stmt
        .query_map(params![format_datetime(&since)], property_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(properties)
}

/// Replaces any existing value.
pub(super) fn set(conn: &Connection, property: &ConfigProperty) -> Result<()> {
    conn.execute(DELETE_CONFIG_PROPERTY, params![property.name])?;
    conn.execute(
        INSERT_CONFIG_PROPERTY,
        params![
            property.name,
            property.value,
            format_datetime(&property.modified_on),
        ],
    )?;
    Ok(())
}

pub(super) fn delete(conn: &Connection, name: &str) -> Result<usize> {
    Ok(conn.execute(DELETE_CONFIG_PROPERTY, params![name])?)
}

// Downloads

fn download_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadContext> {
    Ok(DownloadContext {
        download_id: row.get(0)?,
        expires: millis_at(row, 1)?,
        context: row.get(2)?,
    })
}

/// A download that has not expired as of `now`.
pub(super) fn download(
    conn: &Connection,
    download_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<DownloadContext>> {
    conn.query_row(
        SELECT_DOWNLOAD_CONTEXT,
        params![download_id, now.timestamp_millis()],
        download_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(super) fn insert_download(conn: &Connection, download: &DownloadContext) -> Result<()> {
    let result = conn.execute(
        INSERT_DOWNLOAD,
        params![
            download.download_id,
            download.expires.timestamp_millis(),
            download.context,
        ],
    );
    insert_result(result, "download", download.download_id.as_str())
}

/// Returns the download and removes it; a download is usable once.
pub(super) fn consume_download(
    conn: &Connection,
    download_id: &str,
    now: DateTime<Utc>,
) -> Result<DownloadContext> {
    let found = download(conn, download_id, now)?
        .ok_or_else(|| Error::not_found("download", download_id))?;
    conn.execute(DELETE_DOWNLOAD, params![download_id])?;
    Ok(found)
}

pub(super) fn delete_expired_downloads(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    Ok(conn.execute(DELETE_EXPIRED_DOWNLOADS, params![now.timestamp_millis()])?)
}
