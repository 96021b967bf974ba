mod schema;
mod sqlite;
pub mod statements;

pub use schema::{DB_VERSION_PROP, MIGRATIONS, Migration, latest_version};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::log::Message;
use crate::types::*;

/// Name of the system branch every version is appended to.
pub const LATEST_BRANCH: &str = "latest";

/// What applying one message produced. Handed back to the request that
/// published the message.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    None,
    Group(Group),
    Artifact {
        artifact: Artifact,
        version: Option<ArtifactVersion>,
    },
    Version(ArtifactVersion),
    Content {
        content_id: i64,
        /// False when existing content was reused.
        created: bool,
    },
    Branch(ArtifactBranch),
    Rule(Rule),
    RoleMapping(RoleMapping),
    Comment(Comment),
    Download(DownloadContext),
    SequenceValue(i64),
    /// Rows removed or touched by a bulk operation.
    Affected(usize),
}

/// The relational projection.
///
/// Reads go straight to the local projection. Writes only ever arrive through
/// [`Store::apply`], called by the applier in log order, which is what keeps
/// every node's projection identical for the same log prefix.
pub trait Store: Send + Sync {
    /// Brings the schema to the latest version, running each upgrade script
    /// in order.
    fn initialize(&self) -> Result<()>;
    fn schema_version(&self) -> Result<i32>;

    // Log consumption
    /// Applies a message and records `offset + 1` as the partition's next
    /// offset. The offset advances even when the message fails to apply.
    fn apply(&self, partition: u32, offset: u64, message: &Message) -> Result<Applied>;
    /// Advances past a record that could not be decoded.
    fn skip(&self, partition: u32, offset: u64) -> Result<()>;
    fn next_offset(&self, partition: u32) -> Result<u64>;

    // Groups
    fn get_group(&self, group_id: &str) -> Result<Option<Group>>;
    fn list_groups(&self, page: Page) -> Result<Paged<Group>>;

    // Artifacts
    fn get_artifact(&self, group_id: &str, artifact_id: &str) -> Result<Option<Artifact>>;
    fn list_artifacts(&self, group_id: &str, page: Page) -> Result<Paged<Artifact>>;
    fn count_artifacts(&self) -> Result<i64>;

    // Versions
    fn get_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> Result<Option<ArtifactVersion>>;
    fn get_version_by_global_id(&self, global_id: i64) -> Result<Option<ArtifactVersion>>;
    fn list_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        page: Page,
    ) -> Result<Paged<ArtifactVersion>>;
    fn count_versions(&self, group_id: &str, artifact_id: &str) -> Result<i64>;
    fn count_all_versions(&self) -> Result<i64>;
    /// Highest `versionOrder`, optionally ignoring disabled versions.
    fn latest_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        skip_disabled: bool,
    ) -> Result<Option<ArtifactVersion>>;
    fn version_by_content_hash(
        &self,
        group_id: &str,
        artifact_id: &str,
        content_hash: &str,
    ) -> Result<Option<ArtifactVersion>>;
    fn version_by_canonical_hash(
        &self,
        group_id: &str,
        artifact_id: &str,
        canonical_hash: &str,
    ) -> Result<Option<ArtifactVersion>>;

    // Content
    fn get_content(&self, content_id: i64) -> Result<Option<Content>>;
    fn get_content_by_hash(&self, content_hash: &str) -> Result<Option<Content>>;
    fn content_without_canonical_hash(&self, limit: u32) -> Result<Vec<(i64, String)>>;
    /// Artifact type the content is stored under, if any version uses it.
    fn content_artifact_type(&self, content_id: i64) -> Result<Option<ArtifactType>>;
    fn inbound_references(&self, gav: &Gav) -> Result<Vec<ArtifactReference>>;

    // Branches
    fn list_branches(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>>;
    /// Branch entries, tip first.
    fn branch_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        skip_disabled: bool,
        page: Page,
    ) -> Result<Vec<ArtifactBranch>>;
    fn branch_tip(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        skip_disabled: bool,
    ) -> Result<Option<ArtifactBranch>>;
    fn versions_without_branch(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>>;

    // Rules
    fn artifact_rules(&self, group_id: &str, artifact_id: &str) -> Result<Vec<Rule>>;
    fn artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule_type: RuleType,
    ) -> Result<Option<Rule>>;
    fn global_rules(&self) -> Result<Vec<Rule>>;
    fn global_rule(&self, rule_type: RuleType) -> Result<Option<Rule>>;

    // Role mappings
    fn role_mapping(&self, principal_id: &str) -> Result<Option<RoleMapping>>;
    fn list_role_mappings(&self, page: Page) -> Result<Paged<RoleMapping>>;

    // Comments
    fn list_comments(&self, global_id: i64) -> Result<Vec<Comment>>;

    // Config properties
    fn config_property(&self, name: &str) -> Result<Option<ConfigProperty>>;
    fn config_properties(&self) -> Result<Vec<ConfigProperty>>;
    /// Properties modified at or after `since`.
    fn stale_config_properties(&self, since: DateTime<Utc>) -> Result<Vec<ConfigProperty>>;

    // Downloads
    fn download(&self, download_id: &str, now: DateTime<Utc>) -> Result<Option<DownloadContext>>;
}
