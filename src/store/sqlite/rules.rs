use rusqlite::{Connection, OptionalExtension, Row, params};

use super::rows::{enum_at, insert_result};
use crate::error::{Error, Result};
use crate::store::statements::*;
use crate::types::{Rule, RuleType};

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<Rule> {
    Ok(Rule {
        rule_type: enum_at(row, 0)?,
        configuration: row.get(1)?,
    })
}

// Artifact rules

pub(super) fn artifact_rules(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(SELECT_ARTIFACT_RULES)?;
    let rules = stmt
        .query_map(params![group_id, artifact_id], rule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rules)
}

pub(super) fn artifact_rule(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    rule_type: RuleType,
) -> Result<Option<Rule>> {
    conn.query_row(
        SELECT_ARTIFACT_RULE_BY_TYPE,
        params![group_id, artifact_id, rule_type.as_str()],
        rule_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(super) fn insert_artifact_rule(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    rule: &Rule,
) -> Result<()> {
    let result = conn.execute(
        INSERT_ARTIFACT_RULE,
        params![group_id, artifact_id, rule.rule_type.as_str(), rule.configuration],
    );
    insert_result(
        result,
        "rule",
        format!("{group_id}/{artifact_id}/{}", rule.rule_type),
    )
}

pub(super) fn update_artifact_rule(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    rule: &Rule,
) -> Result<()> {
    let rows = conn.execute(
        UPDATE_ARTIFACT_RULE,
        params![rule.configuration, group_id, artifact_id, rule.rule_type.as_str()],
    )?;
    if rows == 0 {
        return Err(Error::not_found(
            "rule",
            format!("{group_id}/{artifact_id}/{}", rule.rule_type),
        ));
    }
    Ok(())
}

pub(super) fn delete_artifact_rule(
    conn: &Connection,
    group_id: &str,
    artifact_id: &str,
    rule_type: RuleType,
) -> Result<()> {
    let rows = conn.execute(
        DELETE_ARTIFACT_RULE,
        params![group_id, artifact_id, rule_type.as_str()],
    )?;
    if rows == 0 {
        return Err(Error::not_found(
            "rule",
            format!("{group_id}/{artifact_id}/{rule_type}"),
        ));
    }
    Ok(())
}

pub(super) fn delete_artifact_rules(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<usize> {
    Ok(conn.execute(DELETE_ARTIFACT_RULES, params![group_id, artifact_id])?)
}

// Global rules

pub(super) fn global_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(SELECT_GLOBAL_RULES)?;
    let rules = stmt
        .query_map([], rule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rules)
}

pub(super) fn global_rule(conn: &Connection, rule_type: RuleType) -> Result<Option<Rule>> {
    conn.query_row(
        SELECT_GLOBAL_RULE_BY_TYPE,
        params![rule_type.as_str()],
        rule_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(super) fn insert_global_rule(conn: &Connection, rule: &Rule) -> Result<()> {
    let result = conn.execute(
        INSERT_GLOBAL_RULE,
        params![rule.rule_type.as_str(), rule.configuration],
    );
    insert_result(result, "global rule", rule.rule_type.as_str())
}

pub(super) fn update_global_rule(conn: &Connection, rule: &Rule) -> Result<()> {
    let rows = conn.execute(
        UPDATE_GLOBAL_RULE,
        params![rule.configuration, rule.rule_type.as_str()],
    )?;
    if rows == 0 {
        return Err(Error::not_found("global rule", rule.rule_type.as_str()));
    }
    Ok(())
}

pub(super) fn delete_global_rule(conn: &Connection, rule_type: RuleType) -> Result<()> {
    let rows = conn.execute(DELETE_GLOBAL_RULE, params![rule_type.as_str()])?;
    if rows == 0 {
        return Err(Error::not_found("global rule", rule_type.as_str()));
    }
    Ok(())
}

pub(super) fn delete_global_rules(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(DELETE_GLOBAL_RULES, [])?)
}
