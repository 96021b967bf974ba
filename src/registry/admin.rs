use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::{Registry, expect_applied, now};
use crate::content::canonical_hash;
use crate::error::Result;
use crate::log::Message;
use crate::log::values::*;
use crate::store::Applied;
use crate::types::*;

impl Registry {
    // Artifact rules

    pub async fn create_artifact_rule(&self, group_id: &str, artifact_id: &str, rule: Rule) -> Result<Rule> {
        let applied = self
            .submit(Message::CreateArtifactRule(ArtifactRuleValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                rule,
            }))
            .await?;
        expect_applied!(applied, Applied::Rule(rule) => rule)
    }

    pub async fn update_artifact_rule(&self, group_id: &str, artifact_id: &str, rule: Rule) -> Result<Rule> {
        let applied = self
            .submit(Message::UpdateArtifactRule(ArtifactRuleValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                rule,
            }))
            .await?;
        expect_applied!(applied, Applied::Rule(rule) => rule)
    }

    pub async fn delete_artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule_type: RuleType,
    ) -> Result<()> {
        self.submit(Message::DeleteArtifactRule(ArtifactRuleRef {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            rule_type,
        }))
        .await?;
        Ok(())
    }

    pub async fn delete_artifact_rules(&self, group_id: &str, artifact_id: &str) -> Result<usize> {
        let applied = self
            .submit(Message::DeleteArtifactRules(ArtifactRef {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Affected(n) => n)
    }

    // Global rules

    pub async fn create_global_rule(&self, rule: Rule) -> Result<Rule> {
        let applied = self.submit(Message::CreateGlobalRule(rule)).await?;
        expect_applied!(applied, Applied::Rule(rule) => rule)
    }

    pub async fn update_global_rule(&self, rule: Rule) -> Result<Rule> {
        let applied = self.submit(Message::UpdateGlobalRule(rule)).await?;
        expect_applied!(applied, Applied::Rule(rule) => rule)
    }

    pub async fn delete_global_rule(&self, rule_type: RuleType) -> Result<()> {
        self.submit(Message::DeleteGlobalRule(RuleRef { rule_type }))
            .await?;
        Ok(())
    }

    pub async fn delete_global_rules(&self) -> Result<usize> {
        let applied = self.submit(Message::DeleteGlobalRules(Empty {})).await?;
        expect_applied!(applied, Applied::Affected(n) => n)
    }

    // Comments

    pub async fn create_comment(
        &self,
        principal: &str,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        value: &str,
    ) -> Result<Comment> {
        let comment_id = self.next_sequence(SequenceName::CommentId).await?;
        let applied = self
            .submit(Message::CreateComment(NewCommentValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: version.to_string(),
                comment_id,
                created_by: principal.to_string(),
                created_on: now(),
                value: value.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Comment(comment) => comment)
    }

    /// Only the comment's author may edit it.
    pub async fn update_comment(
        &self,
        principal: &str,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        comment_id: i64,
        value: &str,
    ) -> Result<Comment> {
        let applied = self
            .submit(Message::UpdateComment(CommentEditValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: version.to_string(),
                comment_id,
                principal: principal.to_string(),
                value: value.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Comment(comment) => comment)
    }

    pub async fn delete_comment(
        &self,
        principal: &str,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        comment_id: i64,
    ) -> Result<()> {
        self.submit(Message::DeleteComment(CommentRef {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            comment_id,
            principal: principal.to_string(),
        }))
        .await?;
        Ok(())
    }

    // Role mappings

    pub async fn create_role_mapping(&self, mapping: RoleMapping) -> Result<RoleMapping> {
        let applied = self.submit(Message::CreateRoleMapping(mapping)).await?;
        expect_applied!(applied, Applied::RoleMapping(mapping) => mapping)
    }

    pub async fn update_role_mapping(&self, principal_id: &str, role: RoleType) -> Result<RoleMapping> {
        let applied = self
            .submit(Message::UpdateRoleMapping(RoleUpdateValue {
                principal_id: principal_id.to_string(),
                role,
            }))
            .await?;
        expect_applied!(applied, Applied::RoleMapping(mapping) => mapping)
    }

    pub async fn delete_role_mapping(&self, principal_id: &str) -> Result<()> {
        self.submit(Message::DeleteRoleMapping(PrincipalRef {
            principal_id: principal_id.to_string(),
        }))
        .await?;
        Ok(())
    }

    // Config properties

    pub async fn set_config_property(&self, name: &str, value: &str) -> Result<ConfigProperty> {
        let property = ConfigProperty {
            name: name.to_string(),
            value: value.to_string(),
            modified_on: now(),
        };
        self.submit(Message::SetConfigProperty(property.clone()))
            .await?;
        Ok(property)
    }

    /// Returns whether a property was removed.
    pub async fn delete_config_property(&self, name: &str) -> Result<bool> {
        let applied = self
            .submit(Message::DeleteConfigProperty(ConfigRef {
                name: name.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Affected(n) => n > 0)
    }

    // Downloads

    /// Registers a single-use download that expires after `ttl`.
    pub async fn create_download(&self, context: &str, ttl: Duration) -> Result<DownloadContext> {
        let applied = self
            .submit(Message::CreateDownload(DownloadContext {
                download_id: Uuid::new_v4().to_string(),
                expires: now() + ttl,
                context: context.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Download(download) => download)
    }

    /// Returns the download and removes it.
    pub async fn consume_download(&self, download_id: &str) -> Result<DownloadContext> {
        let applied = self
            .submit(Message::ConsumeDownload(ConsumeDownloadValue {
                download_id: download_id.to_string(),
                now: now(),
            }))
            .await?;
        expect_applied!(applied, Applied::Download(download) => download)
    }

    pub async fn delete_expired_downloads(&self) -> Result<usize> {
        let applied = self
            .submit(Message::DeleteExpiredDownloads(ExpireDownloadsValue { now: now() }))
            .await?;
        expect_applied!(applied, Applied::Affected(n) => n)
    }

    // Maintenance

    /// Removes content and references that no version uses, sparing content
    /// claimed within the orphan grace period. Scans every version, so run it
    /// off-peak on large registries.
    pub async fn delete_orphaned_content(&self) -> Result<usize> {
        let at = now();
        let claimed_before = Duration::from_std(self.orphan_grace)
            .ok()
            .and_then(|grace| at.checked_sub_signed(grace))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let applied = self
            .submit(Message::DeleteOrphanedContent(SweepContentValue { claimed_before }))
            .await?;
        let removed = expect_applied!(applied, Applied::Affected(n) => n)?;
        info!(removed, %claimed_before, "orphaned content swept");
        Ok(removed)
    }

    /// Computes canonical hashes for up to `limit` content rows stored
    /// without one. Returns the number of rows updated.
    pub async fn backfill_canonical_hashes(&self, limit: u32) -> Result<usize> {
        let mut updated = 0;
        for (content_id, content_hash) in self.store.content_without_canonical_hash(limit)? {
            let Some(artifact_type) = self.store.content_artifact_type(content_id)? else {
                continue;
            };
            let Some(content) = self.store.get_content(content_id)? else {
                continue;
            };
            let canonical = match canonical_hash(artifact_type, &content.content) {
                Ok(canonical) => canonical,
                Err(e) => {
                    warn!(content_id, error = %e, "cannot canonicalize content");
                    continue;
                }
            };
            self.submit(Message::UpdateContentCanonicalHash(CanonicalHashValue {
                content_id,
                content_hash,
                canonical_hash: canonical,
            }))
            .await?;
            updated += 1;
        }
        Ok(updated)
    }
}
