use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::{
    count, datetime_at, encode_properties, format_datetime, insert_result, optional_enum_at,
    page_params, properties_at,
};
use crate::error::{Error, Result};
use crate::log::values::UpdateGroupValue;
use crate::store::statements::*;
use crate::types::{Group, Page, Paged};

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        group_id: row.get(0)?,
        description: row.get(1)?,
        artifacts_type: optional_enum_at(row, 2)?,
        created_by: row.get(3)?,
        created_on: datetime_at(row, 4)?,
        modified_by: row.get(5)?,
        modified_on: datetime_at(row, 6)?,
        properties: properties_at(row, 7)?,
    })
}

pub(super) fn get(conn: &Connection, group_id: &str) -> Result<Option<Group>> {
    conn.query_row(SELECT_GROUP_BY_ID, params![group_id], group_from_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn exists(conn: &Connection, group_id: &str) -> Result<bool> {
    Ok(count(conn, SELECT_GROUP_COUNT_BY_ID, params![group_id])? > 0)
}

pub(super) fn list(conn: &Connection, page: Page) -> Result<Paged<Group>> {
    let (limit, offset) = page_params(page);
    let mut stmt = conn.prepare(SELECT_GROUPS)?;
    let items = stmt
        .query_map(params![limit, offset], group_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Paged {
        items,
        count: count(conn, SELECT_GROUP_COUNT, [])?,
    })
}

pub(super) fn insert(conn: &Connection, group: &Group) -> Result<()> {
    let result = conn.execute(
        INSERT_GROUP,
        params![
            group.group_id,
            group.description,
            group.artifacts_type.map(|t| t.as_str()),
            group.created_by,
            format_datetime(&group.created_on),
            group.modified_by,
            format_datetime(&group.modified_on),
            encode_properties(&group.properties)?,
        ],
    );
    insert_result(result, "group", group.group_id.as_str())
}

pub(super) fn update(conn: &Connection, value: &UpdateGroupValue) -> Result<()> {
    let rows = conn.execute(
        UPDATE_GROUP,
        params![
            value.description,
            value.artifacts_type.map(|t| t.as_str()),
            value.modified_by,
            format_datetime(&value.modified_on),
            encode_properties(&value.properties)?,
            value.group_id,
        ],
    )?;
    if rows == 0 {
        return Err(Error::not_found("group", value.group_id.as_str()));
    }
    Ok(())
}

pub(super) fn delete(conn: &Connection, group_id: &str) -> Result<bool> {
    let rows = conn.execute(DELETE_GROUP, params![group_id])?;
    Ok(rows > 0)
}
