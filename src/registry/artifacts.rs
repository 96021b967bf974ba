use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::dto::*;
use super::{Registry, expect_applied, now};
use crate::content::{canonical_hash, content_hash};
use crate::error::Result;
use crate::log::Message;
use crate::log::values::*;
use crate::store::Applied;
use crate::types::*;

impl Registry {
    // Groups

    pub async fn create_group(&self, principal: &str, request: CreateGroupRequest) -> Result<Group> {
        let at = now();
        let applied = self
            .submit(Message::CreateGroup(Group {
                group_id: request.group_id,
                description: request.description,
                artifacts_type: request.artifacts_type,
                created_by: principal.to_string(),
                created_on: at,
                modified_by: principal.to_string(),
                modified_on: at,
                properties: request.properties,
            }))
            .await?;
        expect_applied!(applied, Applied::Group(group) => group)
    }

    pub async fn update_group(
        &self,
        principal: &str,
        group_id: &str,
        request: UpdateGroupRequest,
    ) -> Result<Group> {
        let applied = self
            .submit(Message::UpdateGroup(UpdateGroupValue {
                group_id: group_id.to_string(),
                description: request.description,
                artifacts_type: request.artifacts_type,
                properties: request.properties,
                modified_by: principal.to_string(),
                modified_on: now(),
            }))
            .await?;
        expect_applied!(applied, Applied::Group(group) => group)
    }

    /// Deletes a group and every artifact in it. Returns the number of
    /// artifacts removed.
    pub async fn delete_group(&self, group_id: &str) -> Result<usize> {
        let applied = self
            .submit(Message::DeleteGroup(GroupRef {
                group_id: group_id.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Affected(n) => n)
    }

    // Artifacts

    /// Creates an artifact, its group if needed, and optionally its first
    /// version, as one message.
    pub async fn create_artifact(
        &self,
        principal: &str,
        request: CreateArtifactRequest,
    ) -> Result<CreatedArtifact> {
        let at = now();
        let first_version = match request.first_version {
            Some(version) => Some(
                self.prepare_version(
                    principal,
                    &request.group_id,
                    &request.artifact_id,
                    request.artifact_type,
                    version,
                )
                .await?,
            ),
            None => None,
        };

        let applied = self
            .submit(Message::CreateArtifact(CreateArtifactValue {
                artifact: Artifact {
                    group_id: request.group_id,
                    artifact_id: request.artifact_id,
                    artifact_type: request.artifact_type,
                    created_by: principal.to_string(),
                    created_on: at,
                },
                first_version,
            }))
            .await?;
        expect_applied!(applied, Applied::Artifact { artifact, version } => CreatedArtifact { artifact, version })
    }

    pub async fn update_artifact_owner(
        &self,
        group_id: &str,
        artifact_id: &str,
        owner: &str,
    ) -> Result<Artifact> {
        let applied = self
            .submit(Message::UpdateArtifactOwner(ArtifactOwnerValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                owner: owner.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Artifact { artifact, .. } => artifact)
    }

    /// Deletes an artifact with all its versions. Content stays until the
    /// next orphan sweep. Returns the number of versions removed.
    pub async fn delete_artifact(&self, group_id: &str, artifact_id: &str) -> Result<usize> {
        let applied = self
            .submit(Message::DeleteArtifact(ArtifactRef {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Affected(n) => n)
    }

    // Versions

    pub async fn create_version(
        &self,
        principal: &str,
        group_id: &str,
        artifact_id: &str,
        request: CreateVersionRequest,
    ) -> Result<ArtifactVersion> {
        let artifact = self.get_artifact(group_id, artifact_id)?;
        let value = self
            .prepare_version(
                principal,
                group_id,
                artifact_id,
                artifact.artifact_type,
                request,
            )
            .await?;
        let applied = self.submit(Message::CreateVersion(value)).await?;
        expect_applied!(applied, Applied::Version(version) => version)
    }

    /// Resolves content and a globalId for a new version, and fills in
    /// metadata the caller left out from the document itself.
    ///
    /// The content claim and the globalId are published before the create
    /// itself. A create that is then rejected still consumes the globalId,
    /// and content it created stays until an orphan sweep past the grace
    /// period removes it.
    async fn prepare_version(
        &self,
        principal: &str,
        group_id: &str,
        artifact_id: &str,
        artifact_type: ArtifactType,
        request: CreateVersionRequest,
    ) -> Result<VersionValue> {
        let content_id = self.resolve_content(artifact_type, request.content).await?;
        let global_id = self.next_sequence(SequenceName::GlobalId).await?;

        let (mut name, mut description) = (request.name, request.description);
        if name.is_none() || description.is_none() {
            if let Some(content) = self.store.get_content(content_id)? {
                let extracted = self.extractors.extract(artifact_type, &content.content);
                name = name.or(extracted.name);
                description = description.or(extracted.description);
            }
        }

        Ok(VersionValue {
            global_id,
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: request.version,
            state: request.state,
            name,
            description,
            labels: request.labels,
            properties: request.properties,
            created_by: principal.to_string(),
            created_on: now(),
            content_id,
            branches: request.branches,
        })
    }

    /// Claims content with these bytes through the log, creating it unless
    /// it is stored. Published even when this node already holds the bytes:
    /// the claim keeps a concurrent orphan sweep from removing them before
    /// the version referencing them is applied.
    async fn resolve_content(&self, artifact_type: ArtifactType, request: ContentRequest) -> Result<i64> {
        let hash = content_hash(&request.content);
        let canonical = match self.store.get_content_by_hash(&hash)? {
            Some(existing) => {
                debug!(content_id = existing.content_id, "claiming stored content");
                existing.canonical_hash
            }
            None => canonical_or_none(artifact_type, &hash, &request.content),
        };
        let applied = self
            .submit(Message::CreateContent(ContentValue {
                content_hash: hash,
                canonical_hash: canonical,
                content: request.content,
                references: request.references,
                dedup: self.dedup,
                claimed_on: now(),
            }))
            .await?;
        expect_applied!(applied, Applied::Content { content_id, .. } => content_id)
    }

    pub async fn update_version_meta_data(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        meta_data: EditableVersionMetaData,
    ) -> Result<ArtifactVersion> {
        let applied = self
            .submit(Message::UpdateVersionMetaData(VersionMetaDataValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: version.to_string(),
                name: meta_data.name,
                description: meta_data.description,
                labels: meta_data.labels,
                properties: meta_data.properties,
            }))
            .await?;
        expect_applied!(applied, Applied::Version(version) => version)
    }

    pub async fn update_version_state(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        state: VersionState,
    ) -> Result<ArtifactVersion> {
        let applied = self
            .submit(Message::UpdateVersionState(VersionStateValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: version.to_string(),
                state,
            }))
            .await?;
        expect_applied!(applied, Applied::Version(version) => version)
    }

    /// Deletes one version. The last version of an artifact cannot be
    /// deleted on its own.
    pub async fn delete_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> Result<ArtifactVersion> {
        let applied = self
            .submit(Message::DeleteVersion(VersionRef {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: version.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Version(version) => version)
    }

    // Branches

    /// Creates a branch holding `versions` in the given order. Returns the
    /// tip entry.
    pub async fn create_branch(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        versions: Vec<String>,
    ) -> Result<ArtifactBranch> {
        let mut seen = BTreeSet::new();
        let versions = versions
            .into_iter()
            .filter(|v| seen.insert(v.clone()))
            .collect();
        let applied = self
            .submit(Message::CreateBranch(BranchValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                branch_id: branch_id.to_string(),
                versions,
            }))
            .await?;
        expect_applied!(applied, Applied::Branch(entry) => entry)
    }

    pub async fn append_branch_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        branch_id: &str,
        version: &str,
    ) -> Result<ArtifactBranch> {
        let applied = self
            .submit(Message::AppendBranchVersion(BranchVersionValue {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                branch_id: branch_id.to_string(),
                version: version.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Branch(entry) => entry)
    }

    pub async fn delete_branch(&self, group_id: &str, artifact_id: &str, branch_id: &str) -> Result<()> {
        self.submit(Message::DeleteBranch(BranchRef {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            branch_id: branch_id.to_string(),
        }))
        .await?;
        Ok(())
    }

    /// Appends every version that is on no branch to `latest`, oldest first.
    pub async fn backfill_branches(&self, group_id: &str, artifact_id: &str) -> Result<usize> {
        let applied = self
            .submit(Message::BackfillBranches(ArtifactRef {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
            }))
            .await?;
        expect_applied!(applied, Applied::Affected(n) => n)
    }
}

/// Content that cannot be canonicalized is still stored, just never
/// deduplicated by canonical form.
fn canonical_or_none(artifact_type: ArtifactType, hash: &str, content: &[u8]) -> Option<String> {
    match canonical_hash(artifact_type, content) {
        Ok(canonical) => Some(canonical),
        Err(e) => {
            warn!(content_hash = %hash, error = %e, "content left without canonical hash");
            None
        }
    }
}
