use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::enum_at;
use super::sequences;
use crate::config::CanonicalDedup;
use crate::error::{Error, Result};
use crate::log::values::{CanonicalHashValue, ContentValue};
use crate::store::statements::*;
use crate::types::{ArtifactReference, ArtifactType, Content, Gav, SequenceName};

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content {
        content_id: row.get(0)?,
        content_hash: row.get(1)?,
        canonical_hash: row.get(2)?,
        content: row.get(3)?,
        references: Vec::new(),
    })
}

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactReference> {
    Ok(ArtifactReference {
        group_id: row.get(0)?,
        artifact_id: row.get(1)?,
        version: row.get(2)?,
        name: row.get(3)?,
    })
}

fn with_references(conn: &Connection, mut content: Content) -> Result<Content> {
    let mut stmt = conn.prepare(SELECT_REFERENCES)?;
    content.references = stmt
        .query_map(params![content.content_id], reference_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(content)
}

pub(super) fn get(conn: &Connection, content_id: i64) -> Result<Option<Content>> {
    let content = conn
        .query_row(SELECT_CONTENT_BY_ID, params![content_id], content_from_row)
        .optional()?;
    content.map(|c| with_references(conn, c)).transpose()
}

pub(super) fn get_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<Content>> {
    let content = conn
        .query_row(SELECT_CONTENT_BY_HASH, params![content_hash], content_from_row)
        .optional()?;
    content.map(|c| with_references(conn, c)).transpose()
}

pub(super) fn id_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<i64>> {
    conn.query_row(SELECT_CONTENT_ID_BY_HASH, params![content_hash], |row| {
        row.get(0)
    })
    .optional()
    .map_err(Error::from)
}

/// Lowest content id sharing a canonical hash.
pub(super) fn id_by_canonical_hash(conn: &Connection, canonical_hash: &str) -> Result<Option<i64>> {
    conn.query_row(
        SELECT_CONTENT_ID_BY_CANONICAL_HASH,
        params![canonical_hash],
        |row| row.get::<_, Option<i64>>(0),
    )
    .map_err(Error::from)
}

/// Resolves content bytes to a content id, inserting a row only when
/// neither the exact bytes nor (under `Reuse`) an equivalent canonical form
/// is stored. Returns the id and whether a row was created.
pub(super) fn create(conn: &Connection, value: &ContentValue) -> Result<(i64, bool)> {
    let claimed_on = value.claimed_on.timestamp_millis();
    if let Some(content_id) = existing(conn, value)? {
        conn.execute(UPDATE_CONTENT_CLAIM, params![claimed_on, content_id])?;
        return Ok((content_id, false));
    }

    let content_id = sequences::next(conn, SequenceName::ContentId)?;
    conn.execute(
        INSERT_CONTENT,
        params![
            content_id,
            value.canonical_hash,
            value.content_hash,
            value.content,
            claimed_on,
        ],
    )?;
    for reference in &value.references {
        conn.execute(
            INSERT_REFERENCE,
            params![
                content_id,
                reference.group_id,
                reference.artifact_id,
                reference.version,
                reference.name,
            ],
        )?;
    }
    Ok((content_id, true))
}

fn existing(conn: &Connection, value: &ContentValue) -> Result<Option<i64>> {
    if let Some(content_id) = id_by_hash(conn, &value.content_hash)? {
        return Ok(Some(content_id));
    }
    match (value.dedup, value.canonical_hash.as_deref()) {
        (CanonicalDedup::Reuse, Some(canonical_hash)) => id_by_canonical_hash(conn, canonical_hash),
        _ => Ok(None),
    }
}

pub(super) fn set_canonical_hash(conn: &Connection, value: &CanonicalHashValue) -> Result<()> {
    let rows = conn.execute(
        UPDATE_CONTENT_CANONICAL_HASH,
        params![value.canonical_hash, value.content_id, value.content_hash],
    )?;
    if rows == 0 {
        return Err(Error::not_found("content", value.content_id.to_string()));
    }
    Ok(())
}

pub(super) fn without_canonical_hash(conn: &Connection, limit: u32) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(SELECT_CONTENT_WITHOUT_CANONICAL_HASH)?;
    let rows = stmt
        .query_map(params![i64::from(limit)], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Type of the oldest version using the content, which decides how it is
/// canonicalized. `None` for unreferenced content.
pub(super) fn artifact_type(conn: &Connection, content_id: i64) -> Result<Option<ArtifactType>> {
    conn.query_row(SELECT_CONTENT_ARTIFACT_TYPE, params![content_id], |row| {
        enum_at(row, 0)
    })
    .optional()
    .map_err(Error::from)
}

/// Removes content that no version points at and that nobody claimed after
/// `claimed_before`, then the references of removed content. Returns the
/// number of content rows removed.
pub(super) fn delete_orphans(conn: &Connection, claimed_before: &DateTime<Utc>) -> Result<usize> {
    let rows = conn.execute(DELETE_ORPHANED_CONTENT, params![claimed_before.timestamp_millis()])?;
    conn.execute(DELETE_ORPHANED_REFERENCES, [])?;
    Ok(rows)
}

/// Versions whose content references `gav`.
pub(super) fn inbound_references(conn: &Connection, gav: &Gav) -> Result<Vec<ArtifactReference>> {
    let mut stmt = conn.prepare(SELECT_INBOUND_REFERENCES)?;
    let rows = stmt
        .query_map(
            params![gav.group_id, gav.artifact_id, gav.version],
            reference_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
