use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::{count, datetime_at, enum_at, format_datetime, insert_result, page_params};
use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::{Artifact, Page, Paged};

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        group_id: row.get(0)?,
        artifact_id: row.get(1)?,
        artifact_type: enum_at(row, 2)?,
        created_by: row.get(3)?,
        created_on: datetime_at(row, 4)?,
    })
}

pub(super) fn get(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<Option<Artifact>> {
    conn.query_row(
        SELECT_ARTIFACT,
        params![group_id, artifact_id],
        artifact_from_row,
    )
    .optional()
    .map_err(Error::from)
}

/// Looks up an artifact that the caller requires to exist.
pub(super) fn require(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<Artifact> {
    get(conn, group_id, artifact_id)?
        .ok_or_else(|| Error::not_found("artifact", format!("{group_id}/{artifact_id}")))
}

pub(super) fn list(conn: &Connection, group_id: &str, page: Page) -> Result<Paged<Artifact>> {
    let (limit, offset) = page_params(page);
    let mut stmt = conn.prepare(SELECT_ARTIFACTS_IN_GROUP)?;
    let items = stmt
        .query_map(params![group_id, limit, offset], artifact_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Paged {
        items,
        count: count(conn, SELECT_ARTIFACT_COUNT_IN_GROUP, params![group_id])?,
    })
}

pub(super) fn ids_in_group(conn: &Connection, group_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(SELECT_ARTIFACT_IDS_IN_GROUP)?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub(super) fn count_all(conn: &Connection) -> Result<i64> {
    count(conn, SELECT_ARTIFACT_COUNT, [])
}

pub(super) fn insert(conn: &Connection, artifact: &Artifact) -> Result<()> {
    let result = conn.execute(
        INSERT_ARTIFACT,
        params![
            artifact.group_id,
            artifact.artifact_id,
            artifact.artifact_type.as_str(),
            artifact.created_by,
            format_datetime(&artifact.created_on),
        ],
    );
    insert_result(
        result,
        "artifact",
        format!("{}/{}", artifact.group_id, artifact.artifact_id),
    )
}

pub(super) fn update_owner(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    owner: &str,
) -> Result<()> {
    let rows = conn.execute(UPDATE_ARTIFACT_OWNER, params![owner, group_id, artifact_id])?;
    if rows == 0 {
        return Err(Error::not_found("artifact", format!("{group_id}/{artifact_id}")));
    }
    Ok(())
}
