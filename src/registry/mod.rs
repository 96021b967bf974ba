//! Typed entry point for the request layer.
//!
//! Writes build a message, publish it through the coordinator and return the
//! state this node applied. Reads go straight to the local projection.

mod admin;
mod artifacts;
mod dto;

pub use dto::{
    ContentRequest, CreateArtifactRequest, CreateGroupRequest, CreateVersionRequest,
    CreatedArtifact, EditableVersionMetaData, UpdateGroupRequest,
};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

use crate::config::CanonicalDedup;
use crate::content::ExtractorRegistry;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::log::Message;
use crate::log::values::{ResetSequenceValue, SequenceValue};
use crate::store::{Applied, LATEST_BRANCH, Store};
use crate::types::*;

/// Unwraps the variant an operation's handler produces.
macro_rules! expect_applied {
    ($applied:expr, $pattern:pat => $value:expr) => {
        match $applied {
            $pattern => Ok($value),
            other => Err($crate::error::Error::InvalidState(format!(
                "unexpected apply outcome: {other:?}"
            ))),
        }
    };
}
pub(crate) use expect_applied;

pub struct Registry {
    store: Arc<dyn Store>,
    coordinator: Arc<Coordinator>,
    extractors: ExtractorRegistry,
    dedup: CanonicalDedup,
    orphan_grace: Duration,
}

/// Timestamps are taken once, when a message is built, at the precision the
/// projection stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

impl Registry {
    pub fn new(store: Arc<dyn Store>, coordinator: Arc<Coordinator>, dedup: CanonicalDedup) -> Self {
        Self {
            store,
            coordinator,
            extractors: ExtractorRegistry::with_defaults(),
            dedup,
            orphan_grace: Duration::ZERO,
        }
    }

    /// How long claimed content is protected from orphan sweeps.
    pub fn with_orphan_grace(mut self, orphan_grace: Duration) -> Self {
        self.orphan_grace = orphan_grace;
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    async fn submit(&self, message: Message) -> Result<Applied> {
        self.coordinator.submit(message).await
    }

    async fn next_sequence(&self, sequence: SequenceName) -> Result<i64> {
        let applied = self
            .submit(Message::NextSequenceValue(SequenceValue { sequence }))
            .await?;
        expect_applied!(applied, Applied::SequenceValue(value) => value)
    }

    /// Raises a counter to at least `value`, e.g. after importing rows that
    /// carry their own ids. Returns the counter's value afterwards.
    pub async fn reset_sequence(&self, sequence: SequenceName, value: i64) -> Result<i64> {
        let applied = self
            .submit(Message::ResetSequence(ResetSequenceValue { sequence, value }))
            .await?;
        expect_applied!(applied, Applied::SequenceValue(value) => value)
    }

    // Reads

    pub fn get_group(&self, group_id: &str) -> Result<Group> {
        self.store
            .get_group(group_id)?
            .ok_or_else(|| Error::not_found("group", group_id))
    }

    pub fn list_groups(&self, page: Page) -> Result<Paged<Group>> {
        self.store.list_groups(page)
    }

    pub fn get_artifact(&self, group_id: &str, artifact_id: &str) -> Result<Artifact> {
        self.store
            .get_artifact(group_id, artifact_id)?
            .ok_or_else(|| Error::not_found("artifact", format!("{group_id}/{artifact_id}")))
    }

    pub fn list_artifacts(&self, group_id: &str, page: Page) -> Result<Paged<Artifact>> {
        self.store.list_artifacts(group_id, page)
    }

    pub fn get_version(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<ArtifactVersion> {
        self.store
            .get_version(group_id, artifact_id, version)?
            .ok_or_else(|| Error::not_found("version", Gav::new(group_id, artifact_id, version).to_string()))
    }

    pub fn get_version_by_global_id(&self, global_id: i64) -> Result<ArtifactVersion> {
        self.store
            .get_version_by_global_id(global_id)?
            .ok_or_else(|| Error::not_found("version", global_id.to_string()))
    }

    pub fn list_versions(&self, group_id: &str, artifact_id: &str, page: Page) -> Result<Paged<ArtifactVersion>> {
        self.store.list_versions(group_id, artifact_id, page)
    }

    /// Tip of the `latest` branch, ignoring disabled versions.
    pub fn latest_version(&self, group_id: &str, artifact_id: &str) -> Result<ArtifactVersion> {
        self.branch_tip_version(group_id, artifact_id, LATEST_BRANCH)
    }

    /// The version at the tip of a branch, ignoring disabled versions.
    pub fn branch_tip_version(&self, group_id: &str, artifact_id: &str, branch_id: &str) -> Result<ArtifactVersion> {
        let tip = self
            .store
            .branch_tip(group_id, artifact_id, branch_id, true)?
            .ok_or_else(|| Error::not_found("branch", format!("{group_id}/{artifact_id}/{branch_id}")))?;
        self.get_version(group_id, artifact_id, &tip.version)
    }

    pub fn branch_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        page: Page,
    ) -> Result<Vec<ArtifactBranch>> {
        self.store
            .branch_versions(group_id, artifact_id, branch_id, false, page)
    }

    pub fn list_branches(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>> {
        self.store.list_branches(group_id, artifact_id)
    }

    /// Content of a version, with its references.
    pub fn version_content(&self, global_id: i64) -> Result<Content> {
        let version = self.get_version_by_global_id(global_id)?;
        self.store
            .get_content(version.content_id)?
            .ok_or_else(|| Error::not_found("content", version.content_id.to_string()))
    }

    pub fn get_content_by_hash(&self, content_hash: &str) -> Result<Content> {
        self.store
            .get_content_by_hash(content_hash)?
            .ok_or_else(|| Error::not_found("content", content_hash))
    }

    /// Newest version of an artifact holding exactly these bytes.
    pub fn find_version_by_content(&self, group_id: &str, artifact_id: &str, content: &[u8]) -> Result<ArtifactVersion> {
        let hash = crate::content::content_hash(content);
        self.store
            .version_by_content_hash(group_id, artifact_id, &hash)?
            .ok_or_else(|| Error::not_found("version", format!("{group_id}/{artifact_id}@{hash}")))
    }

    /// Newest version of an artifact whose content is equivalent to `content`
    /// once canonicalized.
    pub fn find_version_by_canonical_content(
        &self,
        group_id: &str,
        artifact_id: &str,
        content: &[u8],
    ) -> Result<ArtifactVersion> {
        let artifact = self.get_artifact(group_id, artifact_id)?;
        let hash = crate::content::canonical_hash(artifact.artifact_type, content)?;
        self.store
            .version_by_canonical_hash(group_id, artifact_id, &hash)?
            .ok_or_else(|| Error::not_found("version", format!("{group_id}/{artifact_id}@{hash}")))
    }

    pub fn inbound_references(&self, gav: &Gav) -> Result<Vec<ArtifactReference>> {
        self.store.inbound_references(gav)
    }

    pub fn artifact_rules(&self, group_id: &str, artifact_id: &str) -> Result<Vec<Rule>> {
        self.store.artifact_rules(group_id, artifact_id)
    }

    pub fn global_rules(&self) -> Result<Vec<Rule>> {
        self.store.global_rules()
    }

    pub fn get_role_mapping(&self, principal_id: &str) -> Result<RoleMapping> {
        self.store
            .role_mapping(principal_id)?
            .ok_or_else(|| Error::not_found("role mapping", principal_id))
    }

    pub fn list_role_mappings(&self, page: Page) -> Result<Paged<RoleMapping>> {
        self.store.list_role_mappings(page)
    }

    pub fn list_comments(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<Vec<Comment>> {
        let version = self.get_version(group_id, artifact_id, version)?;
        self.store.list_comments(version.global_id)
    }

    pub fn get_config_property(&self, name: &str) -> Result<ConfigProperty> {
        self.store
            .config_property(name)?
            .ok_or_else(|| Error::not_found("config property", name))
    }

    pub fn config_properties(&self) -> Result<Vec<ConfigProperty>> {
        self.store.config_properties()
    }

    /// Properties modified at or after `since`, for cache invalidation.
    pub fn stale_config_properties(&self, since: DateTime<Utc>) -> Result<Vec<ConfigProperty>> {
        self.store.stale_config_properties(since)
    }

    pub fn get_download(&self, download_id: &str) -> Result<DownloadContext> {
        self.store
            .download(download_id, Utc::now())?
            .ok_or_else(|| Error::not_found("download", download_id))
    }
}
