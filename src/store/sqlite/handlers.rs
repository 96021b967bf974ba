//! One handler per message type. Handlers decide only from the message and
//! the projection they run against, never from the clock or the node, so
//! every node reaches the same state from the same log.

use std::collections::BTreeSet;

use rusqlite::Connection;

use super::{acls, artifacts, branches, comments, config, content, groups, rules, sequences, versions};
use crate::error::{Error, Result};
use crate::log::Message;
use crate::log::values::*;
use crate::store::{Applied, LATEST_BRANCH};
use crate::types::{Comment, Group, VersionState};

pub(super) fn apply(conn: &Connection, message: &Message) -> Result<Applied> {
    match message {
        Message::NextSequenceValue(v) => {
            sequences::next(conn, v.sequence).map(Applied::SequenceValue)
        }
        Message::ResetSequence(v) => {
            sequences::raise(conn, v.sequence, v.value).map(Applied::SequenceValue)
        }

        Message::CreateGroup(group) => {
            groups::insert(conn, group)?;
            Ok(Applied::Group(group.clone()))
        }
        Message::UpdateGroup(v) => {
            groups::update(conn, v)?;
            let group = groups::get(conn, &v.group_id)?
                .ok_or_else(|| Error::not_found("group", v.group_id.as_str()))?;
            Ok(Applied::Group(group))
        }
        Message::DeleteGroup(v) => delete_group(conn, &v.group_id),

        Message::CreateArtifact(v) => create_artifact(conn, v),
        Message::UpdateArtifactOwner(v) => {
            artifacts::update_owner(conn, &v.group_id, &v.artifact_id, &v.owner)?;
            Ok(Applied::Artifact {
                artifact: artifacts::require(conn, &v.group_id, &v.artifact_id)?,
                version: None,
            })
        }
        Message::DeleteArtifact(v) => {
            artifacts::require(conn, &v.group_id, &v.artifact_id)?;
            delete_artifact(conn, &v.group_id, &v.artifact_id).map(Applied::Affected)
        }

        Message::CreateVersion(v) => {
            artifacts::require(conn, &v.group_id, &v.artifact_id)?;
            create_version(conn, v).map(Applied::Version)
        }
        Message::UpdateVersionMetaData(v) => update_version_meta_data(conn, v),
        Message::UpdateVersionState(v) => {
            let version = versions::require(conn, &v.group_id, &v.artifact_id, &v.version)?;
            versions::update_state(conn, version.global_id, v.state)?;
            reload_version(conn, version.global_id)
        }
        Message::DeleteVersion(v) => delete_version(conn, v),

        Message::CreateBranch(v) => create_branch(conn, v),
        Message::AppendBranchVersion(v) => {
            artifacts::require(conn, &v.group_id, &v.artifact_id)?;
            versions::require(conn, &v.group_id, &v.artifact_id, &v.version)?;
            branches::append(conn, &v.group_id, &v.artifact_id, &v.branch_id, &v.version)
                .map(Applied::Branch)
        }
        Message::DeleteBranch(v) => {
            if v.branch_id == LATEST_BRANCH {
                return Err(Error::InvalidState(format!(
                    "the {LATEST_BRANCH} branch cannot be deleted"
                )));
            }
            let rows = branches::delete(conn, &v.group_id, &v.artifact_id, &v.branch_id)?;
            if rows == 0 {
                return Err(Error::not_found(
                    "branch",
                    format!("{}/{}/{}", v.group_id, v.artifact_id, v.branch_id),
                ));
            }
            Ok(Applied::Affected(rows))
        }
        Message::BackfillBranches(v) => {
            artifacts::require(conn, &v.group_id, &v.artifact_id)?;
            let pending = branches::versions_without_branch(conn, &v.group_id, &v.artifact_id)?;
            for version in &pending {
                branches::append(conn, &v.group_id, &v.artifact_id, LATEST_BRANCH, version)?;
            }
            Ok(Applied::Affected(pending.len()))
        }

        Message::CreateArtifactRule(v) => {
            artifacts::require(conn, &v.group_id, &v.artifact_id)?;
            rules::insert_artifact_rule(conn, &v.group_id, &v.artifact_id, &v.rule)?;
            Ok(Applied::Rule(v.rule.clone()))
        }
        Message::UpdateArtifactRule(v) => {
            rules::update_artifact_rule(conn, &v.group_id, &v.artifact_id, &v.rule)?;
            Ok(Applied::Rule(v.rule.clone()))
        }
        Message::DeleteArtifactRule(v) => {
            rules::delete_artifact_rule(conn, &v.group_id, &v.artifact_id, v.rule_type)?;
            Ok(Applied::None)
        }
        Message::DeleteArtifactRules(v) => {
            rules::delete_artifact_rules(conn, &v.group_id, &v.artifact_id).map(Applied::Affected)
        }

        Message::CreateGlobalRule(rule) => {
            rules::insert_global_rule(conn, rule)?;
            Ok(Applied::Rule(rule.clone()))
        }
        Message::UpdateGlobalRule(rule) => {
            rules::update_global_rule(conn, rule)?;
            Ok(Applied::Rule(rule.clone()))
        }
        Message::DeleteGlobalRule(v) => {
            rules::delete_global_rule(conn, v.rule_type)?;
            Ok(Applied::None)
        }
        Message::DeleteGlobalRules(_) => rules::delete_global_rules(conn).map(Applied::Affected),

        Message::CreateComment(v) => {
            let version = versions::require(conn, &v.group_id, &v.artifact_id, &v.version)?;
            let comment = Comment {
                comment_id: v.comment_id,
                global_id: version.global_id,
                created_by: v.created_by.clone(),
                created_on: v.created_on,
                value: v.value.clone(),
            };
            comments::insert(conn, &comment)?;
            Ok(Applied::Comment(comment))
        }
        Message::UpdateComment(v) => {
            let version = versions::require(conn, &v.group_id, &v.artifact_id, &v.version)?;
            comments::update(conn, version.global_id, v.comment_id, &v.principal, &v.value)?;
            let comment = comments::get(conn, v.comment_id)?
                .ok_or_else(|| Error::not_found("comment", v.comment_id.to_string()))?;
            Ok(Applied::Comment(comment))
        }
        Message::DeleteComment(v) => {
            let version = versions::require(conn, &v.group_id, &v.artifact_id, &v.version)?;
            comments::delete(conn, version.global_id, v.comment_id, &v.principal)?;
            Ok(Applied::None)
        }

        Message::CreateContent(v) => {
            let (content_id, created) = content::create(conn, v)?;
            Ok(Applied::Content {
                content_id,
                created,
            })
        }
        Message::UpdateContentCanonicalHash(v) => {
            content::set_canonical_hash(conn, v)?;
            Ok(Applied::Content {
                content_id: v.content_id,
                created: false,
            })
        }
        Message::DeleteOrphanedContent(v) => {
            content::delete_orphans(conn, &v.claimed_before).map(Applied::Affected)
        }

        Message::CreateRoleMapping(mapping) => {
            acls::insert(conn, mapping)?;
            Ok(Applied::RoleMapping(mapping.clone()))
        }
        Message::UpdateRoleMapping(v) => {
            acls::update(conn, &v.principal_id, v.role)?;
            let mapping = acls::get(conn, &v.principal_id)?
                .ok_or_else(|| Error::not_found("role mapping", v.principal_id.as_str()))?;
            Ok(Applied::RoleMapping(mapping))
        }
        Message::DeleteRoleMapping(v) => {
            acls::delete(conn, &v.principal_id)?;
            Ok(Applied::None)
        }

        Message::SetConfigProperty(property) => {
            config::set(conn, property)?;
            Ok(Applied::None)
        }
        Message::DeleteConfigProperty(v) => config::delete(conn, &v.name).map(Applied::Affected),

        Message::CreateDownload(download) => {
            config::insert_download(conn, download)?;
            Ok(Applied::Download(download.clone()))
        }
        Message::ConsumeDownload(v) => {
            config::consume_download(conn, &v.download_id, v.now).map(Applied::Download)
        }
        Message::DeleteExpiredDownloads(v) => {
            config::delete_expired_downloads(conn, v.now).map(Applied::Affected)
        }
    }
}

/// Creates the artifact, its group when missing, and optionally its first
/// version, all in the caller's transaction.
fn create_artifact(conn: &Connection, value: &CreateArtifactValue) -> Result<Applied> {
    let artifact = &value.artifact;
    if !groups::exists(conn, &artifact.group_id)? {
        groups::insert(
            conn,
            &Group {
                group_id: artifact.group_id.clone(),
                description: None,
                artifacts_type: None,
                created_by: artifact.created_by.clone(),
                created_on: artifact.created_on,
                modified_by: artifact.created_by.clone(),
                modified_on: artifact.created_on,
                properties: Default::default(),
            },
        )?;
    }
    artifacts::insert(conn, artifact)?;

    let version = match &value.first_version {
        Some(first) => {
            if first.group_id != artifact.group_id || first.artifact_id != artifact.artifact_id {
                return Err(Error::BadRequest(
                    "first version does not belong to the new artifact".to_string(),
                ));
            }
            Some(create_version(conn, first)?)
        }
        None => None,
    };

    Ok(Applied::Artifact {
        artifact: artifacts::require(conn, &artifact.group_id, &artifact.artifact_id)?,
        version,
    })
}

/// Inserts the version and appends it to `latest` plus any requested
/// branches.
fn create_version(conn: &Connection, value: &VersionValue) -> Result<crate::types::ArtifactVersion> {
    let label = versions::insert(conn, value)?;

    let mut targets = BTreeSet::new();
    targets.insert(LATEST_BRANCH);
    targets.extend(value.branches.iter().map(String::as_str));
    for branch_id in targets {
        branches::append(conn, &value.group_id, &value.artifact_id, branch_id, &label)?;
    }

    versions::by_global_id(conn, value.global_id)?
        .ok_or_else(|| Error::not_found("version", value.global_id.to_string()))
}

fn reload_version(conn: &Connection, global_id: i64) -> Result<Applied> {
    versions::by_global_id(conn, global_id)?
        .map(Applied::Version)
        .ok_or_else(|| Error::not_found("version", global_id.to_string()))
}

fn update_version_meta_data(conn: &Connection, value: &VersionMetaDataValue) -> Result<Applied> {
    let version = versions::require(conn, &value.group_id, &value.artifact_id, &value.version)?;
    if version.state == VersionState::Disabled {
        return Err(Error::InvalidState(format!(
            "version {} is disabled",
            version.gav()
        )));
    }

    let name = value.name.as_deref().or(version.name.as_deref());
    let description = value
        .description
        .as_deref()
        .or(version.description.as_deref());
    versions::update_meta_data(conn, version.global_id, name, description)?;
    if let Some(labels) = &value.labels {
        versions::replace_labels(conn, version.global_id, labels)?;
    }
    if let Some(properties) = &value.properties {
        versions::replace_properties(conn, version.global_id, properties)?;
    }
    reload_version(conn, version.global_id)
}

fn delete_version(conn: &Connection, value: &VersionRef) -> Result<Applied> {
    let version = versions::require(conn, &value.group_id, &value.artifact_id, &value.version)?;
    if versions::count_for(conn, &value.group_id, &value.artifact_id)? <= 1 {
        return Err(Error::InvalidState(format!(
            "{} is the only version of its artifact; delete the artifact instead",
            version.gav()
        )));
    }
    branches::remove_version(conn, &value.group_id, &value.artifact_id, &value.version)?;
    versions::delete(conn, version.global_id)?;
    Ok(Applied::Version(version))
}

fn create_branch(conn: &Connection, value: &BranchValue) -> Result<Applied> {
    artifacts::require(conn, &value.group_id, &value.artifact_id)?;
    if value.versions.is_empty() {
        return Err(Error::BadRequest(
            "a branch needs at least one version".to_string(),
        ));
    }
    if branches::exists(conn, &value.group_id, &value.artifact_id, &value.branch_id)? {
        return Err(Error::already_exists(
            "branch",
            format!("{}/{}/{}", value.group_id, value.artifact_id, value.branch_id),
        ));
    }

    let mut tip = None;
    for version in &value.versions {
        versions::require(conn, &value.group_id, &value.artifact_id, version)?;
        tip = Some(branches::append(
            conn,
            &value.group_id,
            &value.artifact_id,
            &value.branch_id,
            version,
        )?);
    }
    tip.map(Applied::Branch)
        .ok_or_else(|| Error::BadRequest("a branch needs at least one version".to_string()))
}

/// Removes an artifact and everything it owns, dependents first. Content is
/// left for the orphan sweep. Returns the number of versions removed.
fn delete_artifact(conn: &Connection, group_id: &str, artifact_id: &str) -> Result<usize> {
    let removed = versions::delete_all(conn, group_id, artifact_id)?;
    branches::delete_all(conn, group_id, artifact_id)?;
    rules::delete_artifact_rules(conn, group_id, artifact_id)?;
    conn.execute(
        crate::store::statements::DELETE_ARTIFACT,
        rusqlite::params![group_id, artifact_id],
    )?;
    Ok(removed)
}

fn delete_group(conn: &Connection, group_id: &str) -> Result<Applied> {
    let artifact_ids = artifacts::ids_in_group(conn, group_id)?;
    for artifact_id in &artifact_ids {
        delete_artifact(conn, group_id, artifact_id)?;
    }
    let deleted = groups::delete(conn, group_id)?;
    if !deleted && artifact_ids.is_empty() {
        return Err(Error::not_found("group", group_id));
    }
    Ok(Applied::Affected(artifact_ids.len()))
}
