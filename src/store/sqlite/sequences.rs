use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::SequenceName;

pub(super) fn current(conn: &Connection, name: SequenceName) -> Result<Option<i64>> {
    conn.query_row(
        SELECT_CURRENT_SEQUENCE_VALUE,
        params![name.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::from)
}

/// Increments a counter and returns the new value. A missing counter starts at 1.
pub(super) fn next(conn: &Connection, name: SequenceName) -> Result<i64> {
    let rows = conn.execute(INCREMENT_SEQUENCE_VALUE, params![name.as_str()])?;
    if rows == 0 {
        conn.execute(INSERT_SEQUENCE_VALUE, params![name.as_str(), 1_i64])?;
        return Ok(1);
    }
    current(conn, name)?.ok_or_else(|| Error::not_found("sequence", name.as_str()))
}

/// Raises a counter to at least `value`; never lowers it.
pub(super) fn raise(conn: &Connection, name: SequenceName, value: i64) -> Result<i64> {
    conn.execute(RAISE_SEQUENCE_VALUE, params![name.as_str(), value])?;
    current(conn, name)?.ok_or_else(|| Error::not_found("sequence", name.as_str()))
}
