use std::fmt;

use serde::{Deserialize, Serialize};

use super::values::*;
use crate::error::Result;
use crate::types::{ConfigProperty, DownloadContext, Group, RoleMapping, Rule, SequenceName};

/// Declares the closed set of operations: one `MessageType` tag and one
/// `Message` variant per operation, each wrapping its payload type.
macro_rules! messages {
    ($($variant:ident($payload:ty)),+ $(,)?) => {
        /// Operation tag carried in a message key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum MessageType {
            $($variant,)+
        }

        impl MessageType {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(MessageType::$variant => stringify!($variant),)+
                }
            }
        }

        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($variant($payload),)+
        }

        impl Message {
            #[must_use]
            pub fn message_type(&self) -> MessageType {
                match self {
                    $(Message::$variant(_) => MessageType::$variant,)+
                }
            }

            pub fn encode_value(&self) -> Result<Vec<u8>> {
                match self {
                    $(Message::$variant(value) => Ok(serde_json::to_vec(value)?),)+
                }
            }

            pub fn decode_value(message_type: MessageType, value: &[u8]) -> Result<Self> {
                match message_type {
                    $(MessageType::$variant => Ok(Message::$variant(serde_json::from_slice(value)?)),)+
                }
            }
        }
    };
}

messages! {
    NextSequenceValue(SequenceValue),
    ResetSequence(ResetSequenceValue),

    CreateGroup(Group),
    UpdateGroup(UpdateGroupValue),
    DeleteGroup(GroupRef),

    CreateArtifact(CreateArtifactValue),
    UpdateArtifactOwner(ArtifactOwnerValue),
    DeleteArtifact(ArtifactRef),

    CreateVersion(VersionValue),
    UpdateVersionMetaData(VersionMetaDataValue),
    UpdateVersionState(VersionStateValue),
    DeleteVersion(VersionRef),

    CreateBranch(BranchValue),
    AppendBranchVersion(BranchVersionValue),
    DeleteBranch(BranchRef),
    BackfillBranches(ArtifactRef),

    CreateArtifactRule(ArtifactRuleValue),
    UpdateArtifactRule(ArtifactRuleValue),
    DeleteArtifactRule(ArtifactRuleRef),
    DeleteArtifactRules(ArtifactRef),

    CreateGlobalRule(Rule),
    UpdateGlobalRule(Rule),
    DeleteGlobalRule(RuleRef),
    DeleteGlobalRules(Empty),

    CreateComment(NewCommentValue),
    UpdateComment(CommentEditValue),
    DeleteComment(CommentRef),

    CreateContent(ContentValue),
    UpdateContentCanonicalHash(CanonicalHashValue),
    DeleteOrphanedContent(SweepContentValue),

    CreateRoleMapping(RoleMapping),
    UpdateRoleMapping(RoleUpdateValue),
    DeleteRoleMapping(PrincipalRef),

    SetConfigProperty(ConfigProperty),
    DeleteConfigProperty(ConfigRef),

    CreateDownload(DownloadContext),
    ConsumeDownload(ConsumeDownloadValue),
    DeleteExpiredDownloads(ExpireDownloadsValue),
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SEQUENCES_LANE: &str = "__sequences";
pub const CONTENT_LANE: &str = "__content";
pub const GLOBAL_RULES_LANE: &str = "__global_rules";
pub const ACL_LANE: &str = "__acl";
pub const CONFIG_LANE: &str = "__config";
pub const DOWNLOADS_LANE: &str = "__downloads";

/// The entity a message is about.
///
/// The partition key names the entity; the routing key names the lane that
/// serializes it against every other entity it can touch. Group- and
/// artifact-scoped messages share their group's lane so a group delete is
/// ordered with the artifacts it cascades to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum KeyScope {
    Sequence { name: SequenceName },
    Group { group_id: String },
    Artifact { group_id: String, artifact_id: String },
    Content { content_hash: Option<String> },
    GlobalRules,
    Acl { principal_id: String },
    Config,
    Downloads,
}

impl KeyScope {
    #[must_use]
    pub fn partition_key(&self) -> String {
        match self {
            Self::Sequence { name } => format!("{SEQUENCES_LANE}/{name}"),
            Self::Group { group_id } => group_id.clone(),
            Self::Artifact {
                group_id,
                artifact_id,
            } => format!("{group_id}/{artifact_id}"),
            Self::Content {
                content_hash: Some(hash),
            } => format!("content/{hash}"),
            Self::Content { content_hash: None } => CONTENT_LANE.to_string(),
            Self::GlobalRules => GLOBAL_RULES_LANE.to_string(),
            Self::Acl { principal_id } => format!("acl/{principal_id}"),
            Self::Config => CONFIG_LANE.to_string(),
            Self::Downloads => DOWNLOADS_LANE.to_string(),
        }
    }

    #[must_use]
    pub fn routing_key(&self) -> &str {
        match self {
            Self::Sequence { .. } => SEQUENCES_LANE,
            Self::Group { group_id } | Self::Artifact { group_id, .. } => group_id,
            Self::Content { .. } => CONTENT_LANE,
            Self::GlobalRules => GLOBAL_RULES_LANE,
            Self::Acl { .. } => ACL_LANE,
            Self::Config => CONFIG_LANE,
            Self::Downloads => DOWNLOADS_LANE,
        }
    }
}

fn artifact(group_id: &str, artifact_id: &str) -> KeyScope {
    KeyScope::Artifact {
        group_id: group_id.to_string(),
        artifact_id: artifact_id.to_string(),
    }
}

/// The content id counter belongs to the content lane, which is its only
/// writer.
fn sequence(name: SequenceName) -> KeyScope {
    match name {
        SequenceName::ContentId => KeyScope::Content { content_hash: None },
        name => KeyScope::Sequence { name },
    }
}

fn group(group_id: &str) -> KeyScope {
    KeyScope::Group {
        group_id: group_id.to_string(),
    }
}

impl Message {
    #[must_use]
    pub fn scope(&self) -> KeyScope {
        match self {
            Message::NextSequenceValue(v) => sequence(v.sequence),
            Message::ResetSequence(v) => sequence(v.sequence),

            Message::CreateGroup(v) => group(&v.group_id),
            Message::UpdateGroup(v) => group(&v.group_id),
            Message::DeleteGroup(v) => group(&v.group_id),

            Message::CreateArtifact(v) => artifact(&v.artifact.group_id, &v.artifact.artifact_id),
            Message::UpdateArtifactOwner(v) => artifact(&v.group_id, &v.artifact_id),
            Message::DeleteArtifact(v)
            | Message::BackfillBranches(v)
            | Message::DeleteArtifactRules(v) => artifact(&v.group_id, &v.artifact_id),
            Message::CreateVersion(v) => artifact(&v.group_id, &v.artifact_id),
            Message::UpdateVersionMetaData(v) => artifact(&v.group_id, &v.artifact_id),
            Message::UpdateVersionState(v) => artifact(&v.group_id, &v.artifact_id),
            Message::DeleteVersion(v) => artifact(&v.group_id, &v.artifact_id),
            Message::CreateBranch(v) => artifact(&v.group_id, &v.artifact_id),
            Message::AppendBranchVersion(v) => artifact(&v.group_id, &v.artifact_id),
            Message::DeleteBranch(v) => artifact(&v.group_id, &v.artifact_id),
            Message::CreateArtifactRule(v) | Message::UpdateArtifactRule(v) => {
                artifact(&v.group_id, &v.artifact_id)
            }
            Message::DeleteArtifactRule(v) => artifact(&v.group_id, &v.artifact_id),
            Message::CreateComment(v) => artifact(&v.group_id, &v.artifact_id),
            Message::UpdateComment(v) => artifact(&v.group_id, &v.artifact_id),
            Message::DeleteComment(v) => artifact(&v.group_id, &v.artifact_id),

            Message::CreateGlobalRule(_)
            | Message::UpdateGlobalRule(_)
            | Message::DeleteGlobalRule(_)
            | Message::DeleteGlobalRules(_) => KeyScope::GlobalRules,

            Message::CreateContent(v) => KeyScope::Content {
                content_hash: Some(v.content_hash.clone()),
            },
            Message::UpdateContentCanonicalHash(v) => KeyScope::Content {
                content_hash: Some(v.content_hash.clone()),
            },
            Message::DeleteOrphanedContent(_) => KeyScope::Content { content_hash: None },

            Message::CreateRoleMapping(v) => KeyScope::Acl {
                principal_id: v.principal_id.clone(),
            },
            Message::UpdateRoleMapping(v) => KeyScope::Acl {
                principal_id: v.principal_id.clone(),
            },
            Message::DeleteRoleMapping(v) => KeyScope::Acl {
                principal_id: v.principal_id.clone(),
            },

            Message::SetConfigProperty(_) | Message::DeleteConfigProperty(_) => KeyScope::Config,

            Message::CreateDownload(_)
            | Message::ConsumeDownload(_)
            | Message::DeleteExpiredDownloads(_) => KeyScope::Downloads,
        }
    }

    #[must_use]
    pub fn key(&self) -> MessageKey {
        MessageKey {
            message_type: self.message_type(),
            scope: self.scope(),
        }
    }
}

/// Identifies the operation and the entity it targets. Generic log
/// plumbing only ever looks at the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(flatten)]
    pub scope: KeyScope,
}

impl MessageKey {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[must_use]
    pub fn partition_key(&self) -> String {
        self.scope.partition_key()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{ArtifactType, RuleType};

    fn delete_version() -> Message {
        Message::DeleteVersion(VersionRef {
            group_id: "G".to_string(),
            artifact_id: "A1".to_string(),
            version: "2".to_string(),
        })
    }

    #[test]
    fn test_artifact_messages_partition_by_group_and_artifact() {
        let key = delete_version().key();
        assert_eq!(key.message_type, MessageType::DeleteVersion);
        assert_eq!(key.partition_key(), "G/A1");
        assert_eq!(key.scope.routing_key(), "G");
    }

    #[test]
    fn test_group_messages_share_the_group_lane() {
        let message = Message::DeleteGroup(GroupRef {
            group_id: "G".to_string(),
        });
        assert_eq!(message.scope().partition_key(), "G");
        assert_eq!(message.scope().routing_key(), delete_version().scope().routing_key());
    }

    #[test]
    fn test_system_lanes() {
        let content = Message::CreateContent(ContentValue {
            content_hash: "abc".to_string(),
            canonical_hash: None,
            content: b"x".to_vec(),
            references: Vec::new(),
            dedup: Default::default(),
            claimed_on: Utc::now(),
        });
        assert_eq!(content.scope().partition_key(), "content/abc");
        assert_eq!(content.scope().routing_key(), CONTENT_LANE);

        let rule = Message::DeleteGlobalRule(RuleRef {
            rule_type: RuleType::Validity,
        });
        assert_eq!(rule.scope().routing_key(), GLOBAL_RULES_LANE);

        let sequence = Message::NextSequenceValue(SequenceValue {
            sequence: SequenceName::GlobalId,
        });
        assert_eq!(sequence.scope().partition_key(), "__sequences/globalId");
        assert_eq!(sequence.scope().routing_key(), SEQUENCES_LANE);

        let content_ids = Message::ResetSequence(ResetSequenceValue {
            sequence: SequenceName::ContentId,
            value: 100,
        });
        assert_eq!(content_ids.scope().routing_key(), CONTENT_LANE);
    }

    #[test]
    fn test_key_encoding_is_readable_json() {
        let bytes = delete_version().key().encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "DeleteVersion");
        assert_eq!(json["scope"], "artifact");
        assert_eq!(json["groupId"], "G");
        assert_eq!(json["artifactId"], "A1");
        assert_eq!(MessageKey::decode(&bytes).unwrap(), delete_version().key());
    }

    #[test]
    fn test_value_is_decoded_by_key_type() {
        let message = Message::CreateArtifact(CreateArtifactValue {
            artifact: crate::types::Artifact {
                group_id: "G".to_string(),
                artifact_id: "A1".to_string(),
                artifact_type: ArtifactType::Avro,
                created_by: "alice".to_string(),
                created_on: Utc::now(),
            },
            first_version: None,
        });
        let value = message.encode_value().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&value).unwrap();
        assert!(json.get("type").is_none());

        let decoded = Message::decode_value(MessageType::CreateArtifact, &value).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let value = br#"{"groupId":"G","artifactId":"A","version":"1","addedLater":true}"#;
        let decoded = Message::decode_value(MessageType::DeleteVersion, value).unwrap();
        assert!(matches!(decoded, Message::DeleteVersion(v) if v.version == "1"));
    }

    #[test]
    fn test_unknown_message_type_fails_to_decode() {
        let key = br#"{"type":"TeleportArtifact","scope":"config"}"#;
        assert!(MessageKey::decode(key).is_err());
    }
}
