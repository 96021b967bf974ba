mod acls;
mod artifacts;
mod branches;
mod comments;
mod config;
mod content;
mod groups;
mod handlers;
mod rows;
mod rules;
mod sequences;
mod versions;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

use super::schema::{DB_VERSION_PROP, MIGRATIONS, Migration, latest_version};
use super::statements::*;
use super::{Applied, Store};
use crate::error::{Error, Result};
use crate::log::Message;
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A throwaway projection, used for replay checks and tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn offset_param(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| Error::InvalidState(format!("log offset {offset} out of range")))
}

fn read_next_offset(conn: &Connection, partition: u32) -> Result<u64> {
    let next: Option<i64> = conn
        .query_row(SELECT_NEXT_OFFSET, params![partition], |row| row.get(0))
        .optional()?;
    Ok(next.map_or(0, |n| n.max(0) as u64))
}

fn write_next_offset(conn: &Connection, partition: u32, next: u64) -> Result<()> {
    conn.execute(UPSERT_NEXT_OFFSET, params![partition, offset_param(next)?])?;
    Ok(())
}

/// Storage errors surface as `ApplyFailure`; domain errors pass through.
fn apply_failure(message: &Message, err: Error) -> Error {
    match err {
        Error::Database(e) => Error::ApplyFailure {
            key: message.scope().partition_key(),
            reason: e.to_string(),
        },
        other => other,
    }
}

/// The DDL version recorded in the marker table; zero for an empty database.
fn stored_version(conn: &Connection) -> Result<i32> {
    let has_marker: i64 = conn.query_row(SELECT_MARKER_TABLE_EXISTS, [], |row| row.get(0))?;
    if has_marker == 0 {
        return Ok(0);
    }
    let value: Option<Option<String>> = conn
        .query_row(SELECT_DATABASE_VERSION, params![DB_VERSION_PROP], |row| {
            row.get(0)
        })
        .optional()?;
    match value.flatten() {
        Some(text) => text
            .parse()
            .map_err(|_| Error::InvalidState(format!("unreadable schema version '{text}'"))),
        None => Ok(0),
    }
}

fn run_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.ddl)?;
    tx.execute(
        UPSERT_DATABASE_VERSION,
        params![DB_VERSION_PROP, migration.version.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let mut conn = self.conn();
        let current = stored_version(&conn)?;
        let latest = latest_version();

        if current > latest {
            return Err(Error::SchemaUpgradeFailure {
                from: current,
                to: latest,
                reason: "database was written by a newer release".to_string(),
            });
        }
        if current == latest {
            debug!(version = current, "schema is current");
            return Ok(());
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            run_migration(&mut conn, migration).map_err(|e| Error::SchemaUpgradeFailure {
                from: current,
                to: migration.version,
                reason: e.to_string(),
            })?;
            info!(version = migration.version, "applied schema upgrade");
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32> {
        stored_version(&self.conn())
    }

    fn apply(&self, partition: u32, offset: u64, message: &Message) -> Result<Applied> {
        let mut conn = self.conn();
        let next = read_next_offset(&conn, partition)?;
        if offset < next {
            debug!(partition, offset, "record already applied");
            return Ok(Applied::None);
        }
        if offset > next {
            return Err(Error::InvalidState(format!(
                "partition {partition}: offset {offset} applied before {next}"
            )));
        }

        let failed = |e: Error| apply_failure(message, e);
        let tx = conn.transaction().map_err(|e| failed(e.into()))?;
        match handlers::apply(&tx, message) {
            Ok(applied) => {
                write_next_offset(&tx, partition, offset + 1).map_err(failed)?;
                tx.commit().map_err(|e| failed(e.into()))?;
                Ok(applied)
            }
            Err(err) if rows::is_busy(&err) => {
                // Offset stays put; the record is applied again on retry.
                warn!(partition, offset, error = %err, "projection busy");
                Err(failed(err))
            }
            Err(err) => {
                drop(tx);
                write_next_offset(&conn, partition, offset + 1).map_err(failed)?;
                debug!(
                    partition,
                    offset,
                    message = %message.message_type(),
                    error = %err,
                    "message rejected"
                );
                Err(failed(err))
            }
        }
    }

    fn skip(&self, partition: u32, offset: u64) -> Result<()> {
        let conn = self.conn();
        let next = read_next_offset(&conn, partition)?;
        if offset < next {
            return Ok(());
        }
        if offset > next {
            return Err(Error::InvalidState(format!(
                "partition {partition}: offset {offset} skipped before {next}"
            )));
        }
        warn!(partition, offset, "skipping undecodable record");
        write_next_offset(&conn, partition, offset + 1)
    }

    fn next_offset(&self, partition: u32) -> Result<u64> {
        read_next_offset(&self.conn(), partition)
    }

    // Groups

    fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        groups::get(&self.conn(), group_id)
    }

    fn list_groups(&self, page: Page) -> Result<Paged<Group>> {
        groups::list(&self.conn(), page)
    }

    // Artifacts

    fn get_artifact(&self, group_id: &str, artifact_id: &str) -> Result<Option<Artifact>> {
        artifacts::get(&self.conn(), group_id, artifact_id)
    }

    fn list_artifacts(&self, group_id: &str, page: Page) -> Result<Paged<Artifact>> {
        artifacts::list(&self.conn(), group_id, page)
    }

    fn count_artifacts(&self) -> Result<i64> {
        artifacts::count_all(&self.conn())
    }

    // Versions

    fn get_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> Result<Option<ArtifactVersion>> {
        versions::get(&self.conn(), group_id, artifact_id, version)
    }

    fn get_version_by_global_id(&self, global_id: i64) -> Result<Option<ArtifactVersion>> {
        versions::by_global_id(&self.conn(), global_id)
    }

    fn list_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        page: Page,
    ) -> Result<Paged<ArtifactVersion>> {
        versions::list(&self.conn(), group_id, artifact_id, page)
    }

    fn count_versions(&self, group_id: &str, artifact_id: &str) -> Result<i64> {
        versions::count_for(&self.conn(), group_id, artifact_id)
    }

    fn count_all_versions(&self) -> Result<i64> {
        versions::count_all(&self.conn())
    }

    fn latest_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        skip_disabled: bool,
    ) -> Result<Option<ArtifactVersion>> {
        versions::latest(&self.conn(), group_id, artifact_id, skip_disabled)
    }

    fn version_by_content_hash(
        &self,
        group_id: &str,
        artifact_id: &str,
        content_hash: &str,
    ) -> Result<Option<ArtifactVersion>> {
        versions::by_content_hash(&self.conn(), group_id, artifact_id, content_hash)
    }

    fn version_by_canonical_hash(
        &self,
        group_id: &str,
        artifact_id: &str,
        canonical_hash: &str,
    ) -> Result<Option<ArtifactVersion>> {
        versions::by_canonical_hash(&self.conn(), group_id, artifact_id, canonical_hash)
    }

    // Content

    fn get_content(&self, content_id: i64) -> Result<Option<Content>> {
        content::get(&self.conn(), content_id)
    }

    fn get_content_by_hash(&self, content_hash: &str) -> Result<Option<Content>> {
        content::get_by_hash(&self.conn(), content_hash)
    }

    fn content_without_canonical_hash(&self, limit: u32) -> Result<Vec<(i64, String)>> {
        content::without_canonical_hash(&self.conn(), limit)
    }

    fn content_artifact_type(&self, content_id: i64) -> Result<Option<ArtifactType>> {
        content::artifact_type(&self.conn(), content_id)
    }

    fn inbound_references(&self, gav: &Gav) -> Result<Vec<ArtifactReference>> {
        content::inbound_references(&self.conn(), gav)
    }

    // Branches

    fn list_branches(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>> {
        branches::ids(&self.conn(), group_id, artifact_id)
    }

    fn branch_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        skip_disabled: bool,
        page: Page,
    ) -> Result<Vec<ArtifactBranch>> {
        branches::entries(
            &self.conn(),
            group_id,
            artifact_id,
            branch_id,
            skip_disabled,
            page,
        )
    }

    fn branch_tip(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        skip_disabled: bool,
    ) -> Result<Option<ArtifactBranch>> {
        branches::tip(&self.conn(), group_id, artifact_id, branch_id, skip_disabled)
    }

    fn versions_without_branch(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>> {
        branches::versions_without_branch(&self.conn(), group_id, artifact_id)
    }

    // Rules

    fn artifact_rules(&self, group_id: &str, artifact_id: &str) -> Result<Vec<Rule>> {
        rules::artifact_rules(&self.conn(), group_id, artifact_id)
    }

    fn artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule_type: RuleType,
    ) -> Result<Option<Rule>> {
        rules::artifact_rule(&self.conn(), group_id, artifact_id, rule_type)
    }

    fn global_rules(&self) -> Result<Vec<Rule>> {
        rules::global_rules(&self.conn())
    }

    fn global_rule(&self, rule_type: RuleType) -> Result<Option<Rule>> {
        rules::global_rule(&self.conn(), rule_type)
    }

    // Role mappings

    fn role_mapping(&self, principal_id: &str) -> Result<Option<RoleMapping>> {
        acls::get(&self.conn(), principal_id)
    }

    fn list_role_mappings(&self, page: Page) -> Result<Paged<RoleMapping>> {
        acls::list(&self.conn(), page)
    }

    // Comments

    fn list_comments(&self, global_id: i64) -> Result<Vec<Comment>> {
        comments::list(&self.conn(), global_id)
    }

    // Config properties

    fn config_property(&self, name: &str) -> Result<Option<ConfigProperty>> {
        config::get(&self.conn(), name)
    }

    fn config_properties(&self) -> Result<Vec<ConfigProperty>> {
        config::list(&self.conn())
    }

    fn stale_config_properties(&self, since: DateTime<Utc>) -> Result<Vec<ConfigProperty>> {
        config::modified_since(&self.conn(), since)
    }

    // Downloads

    fn download(&self, download_id: &str, now: DateTime<Utc>) -> Result<Option<DownloadContext>> {
        config::download(&self.conn(), download_id, now)
    }
}
