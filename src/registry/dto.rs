use serde::Deserialize;

use crate::types::{Artifact, ArtifactReference, ArtifactType, ArtifactVersion, Properties, VersionState};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub group_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub artifacts_type: Option<ArtifactType>,
    #[serde(default)]
    pub properties: Properties,
}

/// Replaces the editable fields of a group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub artifacts_type: Option<ArtifactType>,
    #[serde(default)]
    pub properties: Properties,
}

/// Document bytes plus the versions they import.
#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    pub content: Vec<u8>,
    pub references: Vec<ArtifactReference>,
}

impl ContentRequest {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            references: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<ArtifactReference>) -> Self {
        self.references = references;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateVersionRequest {
    /// Defaults to the version's `versionOrder` when absent.
    pub version: Option<String>,
    pub content: ContentRequest,
    /// Extracted from the content when absent.
    pub name: Option<String>,
    pub description: Option<String>,
    pub labels: Vec<String>,
    pub properties: Properties,
    pub state: VersionState,
    /// Branches to append to besides `latest`.
    pub branches: Vec<String>,
}

impl CreateVersionRequest {
    pub fn new(content: ContentRequest) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateArtifactRequest {
    pub group_id: String,
    pub artifact_id: String,
    pub artifact_type: ArtifactType,
    pub first_version: Option<CreateVersionRequest>,
}

/// `None` leaves the current value in place.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableVersionMetaData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub properties: Option<Properties>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedArtifact {
    pub artifact: Artifact,
    pub version: Option<ArtifactVersion>,
}
