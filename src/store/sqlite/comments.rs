use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::{count, datetime_at, format_datetime, insert_result};
use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::Comment;

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        comment_id: row.get(0)?,
        global_id: row.get(1)?,
        created_by: row.get(2)?,
        created_on: datetime_at(row, 3)?,
        value: row.get(4)?,
    })
}

/// Newest first.
pub(super) fn list(conn: &Connection, global_id: i64) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(SELECT_COMMENTS)?;
    let comments = stmt
        .query_map(params![global_id], comment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub(super) fn get(conn: &Connection, comment_id: i64) -> Result<Option<Comment>> {
    conn.query_row(SELECT_COMMENT_BY_ID, params![comment_id], comment_from_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn insert(conn: &Connection, comment: &Comment) -> Result<()> {
    let result = conn.execute(
        INSERT_COMMENT,
        params![
            comment.comment_id,
            comment.global_id,
            comment.created_by,
            format_datetime(&comment.created_on),
            comment.value,
        ],
    );
    insert_result(result, "comment", comment.comment_id.to_string())
}

/// Ownership is checked by the statement itself. When it matched nothing,
/// tell a missing comment apart from someone else's.
fn ownership_failure(conn: &Connection, global_id: i64, comment_id: i64) -> Result<Error> {
    let exists = count(conn, SELECT_COMMENT_COUNT_BY_ID, params![global_id, comment_id])? > 0;
    Ok(if exists {
        Error::unauthorized("comment", comment_id.to_string())
    } else {
        Error::not_found("comment", comment_id.to_string())
    })
}

pub(super) fn update(
    conn: &Connection,
    global_id: i64,
    comment_id: i64,
    principal: &str,
    value: &str,
) -> Result<()> {
    let rows = conn.execute(
        UPDATE_COMMENT,
        params![value, global_id, comment_id, principal],
    )?;
    if rows == 0 {
        return Err(ownership_failure(conn, global_id, comment_id)?);
    }
    Ok(())
}

pub(super) fn delete(conn: &Connection, global_id: i64, comment_id: i64, principal: &str) -> Result<()> {
    let rows = conn.execute(DELETE_COMMENT, params![global_id, comment_id, principal])?;
    if rows == 0 {
        return Err(ownership_failure(conn, global_id, comment_id)?);
    }
    Ok(())
}
