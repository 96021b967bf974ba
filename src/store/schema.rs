/// A forward-only DDL script that brings the projection to `version`.
pub struct Migration {
    pub version: i32,
    pub ddl: &'static str,
}

/// Name of the row in the `apicurio` table holding the applied DDL version.
pub const DB_VERSION_PROP: &str = "db_version";

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        ddl: V1_BASE,
    },
    Migration {
        version: 2,
        ddl: V2_REFERENCES_AND_COMMENTS,
    },
    Migration {
        version: 3,
        ddl: V3_BRANCHES,
    },
    Migration {
        version: 4,
        ddl: V4_CONTENT_CLAIMS,
    },
];

#[must_use]
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

const V1_BASE: &str = r#"
-- Schema version marker
CREATE TABLE IF NOT EXISTS apicurio (
    prop_name TEXT NOT NULL PRIMARY KEY,
    prop_value TEXT
);

-- Named counters; part of replicated state
CREATE TABLE IF NOT EXISTS sequences (
    name TEXT NOT NULL PRIMARY KEY,
    value INTEGER NOT NULL
);

-- Next log offset to apply, per partition
CREATE TABLE IF NOT EXISTS log_offsets (
    partition_id INTEGER NOT NULL PRIMARY KEY,
    next_offset INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS globalrules (
    type TEXT NOT NULL PRIMARY KEY,
    configuration TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    groupId TEXT NOT NULL PRIMARY KEY,
    description TEXT,
    artifactsType TEXT,
    createdBy TEXT NOT NULL,
    createdOn TEXT NOT NULL,
    modifiedBy TEXT NOT NULL,
    modifiedOn TEXT NOT NULL,
    properties TEXT
);

CREATE TABLE IF NOT EXISTS artifacts (
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    type TEXT NOT NULL,
    createdBy TEXT NOT NULL,
    createdOn TEXT NOT NULL,
    PRIMARY KEY (groupId, artifactId)
);

CREATE TABLE IF NOT EXISTS rules (
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    type TEXT NOT NULL,
    configuration TEXT NOT NULL,
    PRIMARY KEY (groupId, artifactId, type)
);

-- Content is shared between versions and never cascaded
CREATE TABLE IF NOT EXISTS content (
    contentId INTEGER NOT NULL PRIMARY KEY,
    canonicalHash TEXT,
    contentHash TEXT NOT NULL,
    content BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS versions (
    globalId INTEGER NOT NULL PRIMARY KEY,
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    version TEXT,
    versionOrder INTEGER NOT NULL,
    state TEXT NOT NULL,
    name TEXT,
    description TEXT,
    createdBy TEXT NOT NULL,
    createdOn TEXT NOT NULL,
    contentId INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS labels (
    globalId INTEGER NOT NULL,
    label TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS properties (
    globalId INTEGER NOT NULL,
    pkey TEXT NOT NULL,
    pvalue TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS acls (
    principalId TEXT NOT NULL PRIMARY KEY,
    role TEXT NOT NULL,
    principalName TEXT
);

CREATE TABLE IF NOT EXISTS downloads (
    downloadId TEXT NOT NULL PRIMARY KEY,
    expires INTEGER NOT NULL,
    context TEXT
);

CREATE TABLE IF NOT EXISTS config (
    pname TEXT NOT NULL PRIMARY KEY,
    pvalue TEXT NOT NULL,
    modifiedOn TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS UQ_content_1 ON content(contentHash);
CREATE INDEX IF NOT EXISTS IDX_content_1 ON content(canonicalHash);
CREATE UNIQUE INDEX IF NOT EXISTS UQ_versions_1 ON versions(groupId, artifactId, version);
CREATE UNIQUE INDEX IF NOT EXISTS UQ_versions_2 ON versions(groupId, artifactId, versionOrder);
CREATE INDEX IF NOT EXISTS IDX_versions_1 ON versions(contentId);
CREATE INDEX IF NOT EXISTS IDX_versions_2 ON versions(state);
CREATE INDEX IF NOT EXISTS IDX_labels_1 ON labels(globalId);
CREATE INDEX IF NOT EXISTS IDX_labels_2 ON labels(label);
CREATE INDEX IF NOT EXISTS IDX_properties_1 ON properties(globalId);
CREATE INDEX IF NOT EXISTS IDX_properties_2 ON properties(pkey);
CREATE INDEX IF NOT EXISTS IDX_artifacts_1 ON artifacts(groupId);
CREATE INDEX IF NOT EXISTS IDX_config_1 ON config(modifiedOn);
CREATE INDEX IF NOT EXISTS IDX_downloads_1 ON downloads(expires);
"#;

const V2_REFERENCES_AND_COMMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS artifactreferences (
    contentId INTEGER NOT NULL,
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    version TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (contentId, name)
);

CREATE TABLE IF NOT EXISTS comments (
    commentId INTEGER NOT NULL PRIMARY KEY,
    globalId INTEGER NOT NULL,
    createdBy TEXT NOT NULL,
    createdOn TEXT NOT NULL,
    cvalue TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS IDX_artifactreferences_1 ON artifactreferences(groupId, artifactId, version);
CREATE INDEX IF NOT EXISTS IDX_comments_1 ON comments(globalId);
"#;

const V3_BRANCHES: &str = r#"
CREATE TABLE IF NOT EXISTS artifact_branches (
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    branchId TEXT NOT NULL,
    branchOrder INTEGER NOT NULL,
    version TEXT NOT NULL,
    PRIMARY KEY (groupId, artifactId, branchId, branchOrder)
);

CREATE UNIQUE INDEX IF NOT EXISTS UQ_artifact_branches_1 ON artifact_branches(groupId, artifactId, branchId, version);
CREATE INDEX IF NOT EXISTS IDX_artifact_branches_1 ON artifact_branches(groupId, artifactId, version);
"#;

// Epoch millis of the last CreateContent that resolved to the row
const V4_CONTENT_CLAIMS: &str = r#"
ALTER TABLE content ADD COLUMN claimedOn INTEGER NOT NULL DEFAULT 0;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_contiguous_from_one() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as i32 + 1);
        }
        assert_eq!(latest_version(), MIGRATIONS.len() as i32);
    }
}
