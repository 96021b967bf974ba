use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use tracing::warn;

use super::rows::{
    count, datetime_at, enum_at, format_datetime, is_constraint_violation, page_params,
    violates_column,
};
use crate::error::{Error, Result};
use crate::log::values::VersionValue;
use crate::store::statements::*;
use crate::types::{ArtifactVersion, Page, Paged, Properties, VersionState};

/// Attempts at claiming the next `versionOrder` before giving up.
const MAX_ORDER_ATTEMPTS: usize = 3;

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactVersion> {
    Ok(ArtifactVersion {
        global_id: row.get(0)?,
        group_id: row.get(1)?,
        artifact_id: row.get(2)?,
        version: row.get(3)?,
        version_order: row.get(4)?,
        artifact_type: enum_at(row, 5)?,
        state: enum_at(row, 6)?,
        name: row.get(7)?,
        description: row.get(8)?,
        labels: Vec::new(),
        properties: Properties::new(),
        created_by: row.get(9)?,
        created_on: datetime_at(row, 10)?,
        content_id: row.get(11)?,
    })
}

fn with_metadata(conn: &Connection, mut version: ArtifactVersion) -> Result<ArtifactVersion> {
    let mut stmt = conn.prepare(SELECT_LABELS)?;
    version.labels = stmt
        .query_map(params![version.global_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(SELECT_PROPERTIES)?;
    version.properties = stmt
        .query_map(params![version.global_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Properties, _>>()?;
    Ok(version)
}

fn select_one<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<ArtifactVersion>> {
    let version = conn.query_row(sql, params, version_from_row).optional()?;
    version.map(|v| with_metadata(conn, v)).transpose()
}

pub(super) fn get(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    version: &str,
) -> Result<Option<ArtifactVersion>> {
    select_one(conn, SELECT_VERSION, params![group_id, artifact_id, version])
}

pub(super) fn require(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    version: &str,
) -> Result<ArtifactVersion> {
    get(conn, group_id, artifact_id, version)?.ok_or_else(|| {
        Error::not_found("version", format!("{group_id}/{artifact_id}/{version}"))
    })
}

pub(super) fn by_global_id(conn: &Connection, global_id: i64) -> Result<Option<ArtifactVersion>> {
    select_one(conn, SELECT_VERSION_BY_GLOBAL_ID, params![global_id])
}

pub(super) fn latest(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    skip_disabled: bool,
) -> Result<Option<ArtifactVersion>> {
    let sql = if skip_disabled {
        SELECT_LATEST_VERSION_SKIP_DISABLED
    } else {
        SELECT_LATEST_VERSION
    };
    select_one(conn, sql, params![group_id, artifact_id])
}

pub(super) fn by_content_hash(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    content_hash: &str,
) -> Result<Option<ArtifactVersion>> {
    select_one(
        conn,
        SELECT_VERSION_BY_CONTENT_HASH,
        params![group_id, artifact_id, content_hash],
    )
}

pub(super) fn by_canonical_hash(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    canonical_hash: &str,
) -> Result<Option<ArtifactVersion>> {
    select_one(
        conn,
        SELECT_VERSION_BY_CANONICAL_HASH,
        params![group_id, artifact_id, canonical_hash],
    )
}

pub(super) fn list(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    page: Page,
) -> Result<Paged<ArtifactVersion>> {
    let (limit, offset) = page_params(page);
    let mut stmt = conn.prepare(SELECT_VERSIONS)?;
    let rows = stmt
        .query_map(params![group_id, artifact_id, limit, offset], version_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let items = rows
        .into_iter()
        .map(|v| with_metadata(conn, v))
        .collect::<Result<Vec<_>>>()?;
    Ok(Paged {
        items,
        count: count_for(conn, group_id, artifact_id)?,
    })
}

pub(super) fn count_for(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<i64> {
    count(conn, SELECT_VERSION_COUNT, params![group_id, artifact_id])
}

pub(super) fn count_all(conn: &Connection) -> Result<i64> {
    count(conn, SELECT_TOTAL_VERSION_COUNT, [])
}

/// Inserts a version row with the next `versionOrder` for its artifact,
/// then its labels and properties. Returns the stored version label.
pub(super) fn insert(conn: &Connection, value: &VersionValue) -> Result<String> {
    let gav_key = || {
        format!(
            "{}/{}/{}",
            value.group_id,
            value.artifact_id,
            value.version.as_deref().unwrap_or("<next>")
        )
    };

    if count(conn, SELECT_GLOBAL_ID_EXISTS, params![value.global_id])? > 0 {
        return Err(Error::already_exists("version", value.global_id.to_string()));
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let sql = if count_for(conn, &value.group_id, &value.artifact_id)? == 0 {
            INSERT_FIRST_VERSION
        } else {
            INSERT_VERSION
        };
        let result = conn.execute(
            sql,
            params![
                value.global_id,
                value.group_id,
                value.artifact_id,
                value.version,
                value.state.as_str(),
                value.name,
                value.description,
                value.created_by,
                format_datetime(&value.created_on),
                value.content_id,
            ],
        );
        match result {
            Ok(_) => break,
            Err(e) if violates_column(&e, "versionOrder") && attempt < MAX_ORDER_ATTEMPTS => {
                warn!(
                    global_id = value.global_id,
                    attempt, "versionOrder collision, retrying insert"
                );
            }
            Err(e) if is_constraint_violation(&e) => {
                return Err(Error::already_exists("version", gav_key()));
            }
            Err(e) => return Err(Error::from(e)),
        }
    }

    if value.version.is_none() {
        let result = conn.execute(AUTO_UPDATE_VERSION_FOR_GLOBAL_ID, params![value.global_id]);
        if let Err(e) = result {
            if is_constraint_violation(&e) {
                return Err(Error::already_exists("version", gav_key()));
            }
            return Err(Error::from(e));
        }
    }

    replace_labels(conn, value.global_id, &value.labels)?;
    replace_properties(conn, value.global_id, &value.properties)?;

    conn.query_row(
        SELECT_VERSION_LABEL_BY_GLOBAL_ID,
        params![value.global_id],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

pub(super) fn replace_labels(conn: &Connection, global_id: i64, labels: &[String]) -> Result<()> {
    conn.execute(DELETE_LABELS_BY_GLOBAL_ID, params![global_id])?;
    let unique: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
    for label in unique {
        conn.execute(INSERT_LABEL, params![global_id, label])?;
    }
    Ok(())
}

pub(super) fn replace_properties(
    conn: &Connection,
    global_id: i64,
    properties: &Properties,
) -> Result<()> {
    conn.execute(DELETE_PROPERTIES_BY_GLOBAL_ID, params![global_id])?;
    for (key, value) in properties {
        conn.execute(INSERT_PROPERTY, params![global_id, key, value])?;
    }
    Ok(())
}

pub(super) fn update_meta_data(
    conn: &Connection,
    global_id: i64,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    conn.execute(UPDATE_VERSION_META_DATA, params![name, description, global_id])?;
    Ok(())
}

pub(super) fn update_state(conn: &Connection, global_id: i64, state: VersionState) -> Result<()> {
    conn.execute(UPDATE_VERSION_STATE, params![state.as_str(), global_id])?;
    Ok(())
}

/// Deletes one version and the rows hanging off its globalId.
pub(super) fn delete(conn: &Connection, global_id: i64) -> Result<()> {
    conn.execute(DELETE_LABELS_BY_GLOBAL_ID, params![global_id])?;
    conn.execute(DELETE_PROPERTIES_BY_GLOBAL_ID, params![global_id])?;
    conn.execute(DELETE_COMMENTS_BY_GLOBAL_ID, params![global_id])?;
    conn.execute(DELETE_VERSION, params![global_id])?;
    Ok(())
}

/// Deletes every version of an artifact, dependents first.
pub(super) fn delete_all(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<usize> {
    conn.execute(DELETE_LABELS, params![group_id, artifact_id])?;
    conn.execute(DELETE_PROPERTIES, params![group_id, artifact_id])?;
    conn.execute(DELETE_COMMENTS, params![group_id, artifact_id])?;
    let rows = conn.execute(DELETE_VERSIONS, params![group_id, artifact_id])?;
    Ok(rows)
}
