use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::{count, enum_at, insert_result, page_params};
use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::{Page, Paged, RoleMapping, RoleType};

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<RoleMapping> {
    Ok(RoleMapping {
        principal_id: row.get(0)?,
        role: enum_at(row, 1)?,
        principal_name: row.get(2)?,
    })
}

pub(super) fn get(conn: &Connection, principal_id: &str) -> Result<Option<RoleMapping>> {
    conn.query_row(
        SELECT_ROLE_MAPPING_BY_PRINCIPAL,
        params![principal_id],
        mapping_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(super) fn list(conn: &Connection, page: Page) -> Result<Paged<RoleMapping>> {
    let (limit, offset) = page_params(page);
    let mut stmt = conn.prepare(SELECT_ROLE_MAPPINGS)?;
    let items = stmt
        .query_map(params![limit, offset], mapping_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Paged {
        items,
        count: count(conn, SELECT_ROLE_MAPPING_COUNT, [])?,
    })
}

pub(super) fn insert(conn: &Connection, mapping: &RoleMapping) -> Result<()> {
    let result = conn.execute(
        INSERT_ROLE_MAPPING,
        params![
            mapping.principal_id,
            mapping.role.as_str(),
            mapping.principal_name,
        ],
    );
    insert_result(result, "role mapping", mapping.principal_id.as_str())
}

pub(super) fn update(conn: &Connection, principal_id: &str, role: RoleType) -> Result<()> {
    let rows = conn.execute(UPDATE_ROLE_MAPPING, params![role.as_str(), principal_id])?;
    if rows == 0 {
        return Err(Error::not_found("role mapping", principal_id));
    }
    Ok(())
}

pub(super) fn delete(conn: &Connection, principal_id: &str) -> Result<()> {
    let rows = conn.execute(DELETE_ROLE_MAPPING, params![principal_id])?;
    if rows == 0 {
        return Err(Error::not_found("role mapping", principal_id));
    }
    Ok(())
}
