//! Message payloads. Each is decoded according to the type named in its
//! key, so none of them carry a type tag of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec::base64_bytes;
use crate::config::CanonicalDedup;
use crate::types::{
    Artifact, ArtifactReference, ArtifactType, Properties, RoleType, Rule, RuleType,
    SequenceName, VersionState,
};

/// Payload of messages whose key says everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceValue {
    pub sequence: SequenceName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSequenceValue {
    pub sequence: SequenceName,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupValue {
    pub group_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub artifacts_type: Option<ArtifactType>,
    #[serde(default)]
    pub properties: Properties,
    pub modified_by: String,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArtifactValue {
    pub artifact: Artifact,
    #[serde(default)]
    pub first_version: Option<VersionValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub group_id: String,
    pub artifact_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactOwnerValue {
    pub group_id: String,
    pub artifact_id: String,
    pub owner: String,
}

/// A fully resolved new version. `global_id` and `content_id` were
/// allocated before the message was published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionValue {
    pub global_id: i64,
    pub group_id: String,
    pub artifact_id: String,
    /// Defaults to the assigned version order when absent.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: VersionState,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub content_id: i64,
    /// Branches besides `latest` that the version is appended to.
    #[serde(default)]
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

/// Absent fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetaDataValue {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub properties: Option<Properties>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStateValue {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub state: VersionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchValue {
    pub group_id: String,
    pub artifact_id: String,
    pub branch_id: String,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchVersionValue {
    pub group_id: String,
    pub artifact_id: String,
    pub branch_id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    pub group_id: String,
    pub artifact_id: String,
    pub branch_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRuleValue {
    pub group_id: String,
    pub artifact_id: String,
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRuleRef {
    pub group_id: String,
    pub artifact_id: String,
    pub rule_type: RuleType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRef {
    pub rule_type: RuleType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentValue {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub comment_id: i64,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEditValue {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub comment_id: i64,
    /// Only the comment's author may edit it.
    pub principal: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub comment_id: i64,
    pub principal: String,
}

/// New content bytes. The content id is assigned when the message is
/// applied, unless the bytes (or, under `Reuse`, their canonical form) are
/// already stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentValue {
    pub content_hash: String,
    #[serde(default)]
    pub canonical_hash: Option<String>,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    #[serde(default)]
    pub references: Vec<ArtifactReference>,
    #[serde(default)]
    pub dedup: CanonicalDedup,
    /// Stamped on the stored row, whether created or reused. Protects the
    /// row from orphan sweeps cut off before this instant.
    pub claimed_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalHashValue {
    pub content_id: i64,
    pub content_hash: String,
    pub canonical_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateValue {
    pub principal_id: String,
    pub role: RoleType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalRef {
    pub principal_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRef {
    pub name: String,
}

/// `now` comes from the submitter so every node expires the same rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeDownloadValue {
    pub download_id: String,
    pub now: DateTime<Utc>,
}

/// Removes unreferenced content not claimed after `claimed_before`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepContentValue {
    pub claimed_before: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireDownloadsValue {
    pub now: DateTime<Utc>,
}
