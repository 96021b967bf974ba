use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

use super::rows::{count, is_constraint_violation, page_params, violates_column};
use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::{ArtifactBranch, Page};

const MAX_ORDER_ATTEMPTS: usize = 3;

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactBranch> {
    Ok(ArtifactBranch {
        group_id: row.get(0)?,
        artifact_id: row.get(1)?,
        branch_id: row.get(2)?,
        branch_order: row.get(3)?,
        version: row.get(4)?,
    })
}

pub(super) fn exists(conn: &Connection, group_id: &str, artifact_id: &str, branch_id: &str) -> Result<bool> {
    Ok(count(
        conn,
        SELECT_ARTIFACT_BRANCH_COUNT,
        params![group_id, artifact_id, branch_id],
    )? > 0)
}

/// Appends a version at `MAX(branchOrder) + 1`. A version appears at most
/// once per branch.
pub(super) fn append(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    branch_id: &str,
    version: &str,
) -> Result<ArtifactBranch> {
    let key = || format!("{group_id}/{artifact_id}/{branch_id}/{version}");

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = conn.execute(
            INSERT_ARTIFACT_BRANCH,
            params![group_id, artifact_id, branch_id, version],
        );
        match result {
            Ok(_) => break,
            Err(e) if violates_column(&e, "branchOrder") && attempt < MAX_ORDER_ATTEMPTS => {
                warn!(branch = %key(), attempt, "branchOrder collision, retrying append");
            }
            Err(e) if is_constraint_violation(&e) => {
                return Err(Error::already_exists("branch version", key()));
            }
            Err(e) => return Err(Error::from(e)),
        }
    }

    conn.query_row(
        SELECT_ARTIFACT_BRANCH_ENTRY,
        params![group_id, artifact_id, branch_id, version],
        branch_from_row,
    )
    .map_err(Error::from)
}

pub(super) fn ids(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(SELECT_ARTIFACT_BRANCH_IDS)?;
    let ids = stmt
        .query_map(params![group_id, artifact_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub(super) fn entries(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    branch_id: &str,
    skip_disabled: bool,
    page: Page,
) -> Result<Vec<ArtifactBranch>> {
    let sql = if skip_disabled {
        SELECT_ARTIFACT_BRANCH_ORDERED_NOT_DISABLED
    } else {
        SELECT_ARTIFACT_BRANCH_ORDERED
    };
    let (limit, offset) = page_params(page);
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(
            params![group_id, artifact_id, branch_id, limit, offset],
            branch_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(super) fn tip(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    branch_id: &str,
    skip_disabled: bool,
) -> Result<Option<ArtifactBranch>> {
    let sql = if skip_disabled {
        SELECT_ARTIFACT_BRANCH_TIP_NOT_DISABLED
    } else {
        SELECT_ARTIFACT_BRANCH_TIP
    };
    conn.query_row(sql, params![group_id, artifact_id, branch_id], branch_from_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn delete(conn: &Connection, group_id: &str, artifact_id: &str, branch_id: &str) -> Result<usize> {
    Ok(conn.execute(DELETE_ARTIFACT_BRANCH, params![group_id, artifact_id, branch_id])?)
}

pub(super) fn delete_all(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<usize> {
    Ok(conn.execute(
        DELETE_ALL_ARTIFACT_BRANCHES_IN_ARTIFACT,
        params![group_id, artifact_id],
    )?)
}

/// Removes a version from every branch it belongs to.
pub(super) fn remove_version(conn: &Connection, group_id: &str, artifact_id: &str, version: &str) -> Result<usize> {
    Ok(conn.execute(
        DELETE_VERSION_IN_ARTIFACT_BRANCHES,
        params![group_id, artifact_id, version],
    )?)
}

/// Versions that belong to no branch, in `versionOrder`.
pub(super) fn versions_without_branch(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(SELECT_VERSIONS_WITHOUT_ARTIFACT_BRANCH)?;
    let versions = stmt
        .query_map(params![group_id, artifact_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(versions)
}
