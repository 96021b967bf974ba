//! Every statement the projection runs. Call sites never build SQL.
//!
//! Statements fall into four families: mutations scoped by the full entity
//! key, point lookups, listings ordered by an explicit monotonic column, and
//! existence/count checks.

/// Version rows joined with their artifact's type.
macro_rules! select_versions {
    ($tail:literal) => {
        concat!(
            "SELECT v.globalId, v.groupId, v.artifactId, v.version, v.versionOrder, a.type, v.state, ",
            "v.name, v.description, v.createdBy, v.createdOn, v.contentId ",
            "FROM versions v ",
            "JOIN artifacts a ON v.groupId = a.groupId AND v.artifactId = a.artifactId ",
            $tail
        )
    };
}

macro_rules! select_groups {
    ($tail:literal) => {
        concat!(
            "SELECT g.groupId, g.description, g.artifactsType, g.createdBy, g.createdOn, ",
            "g.modifiedBy, g.modifiedOn, g.properties FROM groups g ",
            $tail
        )
    };
}

macro_rules! select_branches {
    ($tail:literal) => {
        concat!(
            "SELECT ab.groupId, ab.artifactId, ab.branchId, ab.branchOrder, ab.version ",
            "FROM artifact_branches ab ",
            $tail
        )
    };
}

// Schema marker

pub const SELECT_MARKER_TABLE_EXISTS: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'apicurio'";
pub const SELECT_DATABASE_VERSION: &str =
    "SELECT a.prop_value FROM apicurio a WHERE a.prop_name = ?1";
pub const UPSERT_DATABASE_VERSION: &str = "INSERT INTO apicurio (prop_name, prop_value) VALUES (?1, ?2)
     ON CONFLICT(prop_name) DO UPDATE SET prop_value = excluded.prop_value";

// Log offsets

pub const SELECT_NEXT_OFFSET: &str =
    "SELECT o.next_offset FROM log_offsets o WHERE o.partition_id = ?1";
pub const UPSERT_NEXT_OFFSET: &str = "INSERT INTO log_offsets (partition_id, next_offset) VALUES (?1, ?2)
     ON CONFLICT(partition_id) DO UPDATE SET next_offset = excluded.next_offset";

// Sequences

pub const SELECT_CURRENT_SEQUENCE_VALUE: &str = "SELECT s.value FROM sequences s WHERE s.name = ?1";
pub const INSERT_SEQUENCE_VALUE: &str = "INSERT INTO sequences (name, value) VALUES (?1, ?2)";
pub const INCREMENT_SEQUENCE_VALUE: &str =
    "UPDATE sequences SET value = value + 1 WHERE name = ?1";
pub const RAISE_SEQUENCE_VALUE: &str = "INSERT INTO sequences (name, value) VALUES (?1, ?2)
     ON CONFLICT(name) DO UPDATE SET value = MAX(value, excluded.value)";

// Groups

pub const INSERT_GROUP: &str = "INSERT INTO groups (groupId, description, artifactsType, createdBy, createdOn, modifiedBy, modifiedOn, properties)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
pub const UPDATE_GROUP: &str = "UPDATE groups SET description = ?1, artifactsType = ?2, modifiedBy = ?3, modifiedOn = ?4, properties = ?5
     WHERE groupId = ?6";
pub const DELETE_GROUP: &str = "DELETE FROM groups WHERE groupId = ?1";
pub const SELECT_GROUP_BY_ID: &str = select_groups!("WHERE g.groupId = ?1");
pub const SELECT_GROUPS: &str = select_groups!("ORDER BY g.groupId ASC LIMIT ?1 OFFSET ?2");
pub const SELECT_GROUP_COUNT: &str = "SELECT COUNT(g.groupId) FROM groups g";
pub const SELECT_GROUP_COUNT_BY_ID: &str =
    "SELECT COUNT(g.groupId) FROM groups g WHERE g.groupId = ?1";

// Artifacts

pub const INSERT_ARTIFACT: &str = "INSERT INTO artifacts (groupId, artifactId, type, createdBy, createdOn)
     VALUES (?1, ?2, ?3, ?4, ?5)";
pub const UPDATE_ARTIFACT_OWNER: &str =
    "UPDATE artifacts SET createdBy = ?1 WHERE groupId = ?2 AND artifactId = ?3";
pub const DELETE_ARTIFACT: &str = "DELETE FROM artifacts WHERE groupId = ?1 AND artifactId = ?2";
pub const SELECT_ARTIFACT: &str = "SELECT a.groupId, a.artifactId, a.type, a.createdBy, a.createdOn
     FROM artifacts a WHERE a.groupId = ?1 AND a.artifactId = ?2";
pub const SELECT_ARTIFACTS_IN_GROUP: &str = "SELECT a.groupId, a.artifactId, a.type, a.createdBy, a.createdOn
     FROM artifacts a WHERE a.groupId = ?1 ORDER BY a.artifactId ASC LIMIT ?2 OFFSET ?3";
pub const SELECT_ARTIFACT_IDS_IN_GROUP: &str =
    "SELECT a.artifactId FROM artifacts a WHERE a.groupId = ?1 ORDER BY a.artifactId ASC";
pub const SELECT_ARTIFACT_COUNT: &str = "SELECT COUNT(a.artifactId) FROM artifacts a";
pub const SELECT_ARTIFACT_COUNT_IN_GROUP: &str =
    "SELECT COUNT(a.artifactId) FROM artifacts a WHERE a.groupId = ?1";
pub const SELECT_ARTIFACT_COUNT_BY_ID: &str =
    "SELECT COUNT(a.artifactId) FROM artifacts a WHERE a.groupId = ?1 AND a.artifactId = ?2";

// Versions

pub const INSERT_FIRST_VERSION: &str = "INSERT INTO versions (globalId, groupId, artifactId, version, versionOrder, state, name, description, createdBy, createdOn, contentId)
     VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9, ?10)";
// Duplicate versionOrder values are rejected by UQ_versions_2.
pub const INSERT_VERSION: &str = "INSERT INTO versions (globalId, groupId, artifactId, version, versionOrder, state, name, description, createdBy, createdOn, contentId)
     VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(versionOrder), 0) + 1 FROM versions WHERE groupId = ?2 AND artifactId = ?3), ?5, ?6, ?7, ?8, ?9, ?10)";
pub const AUTO_UPDATE_VERSION_FOR_GLOBAL_ID: &str =
    "UPDATE versions SET version = CAST(versionOrder AS TEXT) WHERE globalId = ?1";
pub const UPDATE_VERSION_META_DATA: &str =
    "UPDATE versions SET name = ?1, description = ?2 WHERE globalId = ?3";
pub const UPDATE_VERSION_STATE: &str = "UPDATE versions SET state = ?1 WHERE globalId = ?2";
pub const DELETE_VERSION: &str = "DELETE FROM versions WHERE globalId = ?1";
pub const DELETE_VERSIONS: &str = "DELETE FROM versions WHERE groupId = ?1 AND artifactId = ?2";
pub const SELECT_VERSION_BY_GLOBAL_ID: &str = select_versions!("WHERE v.globalId = ?1");
pub const SELECT_VERSION: &str =
    select_versions!("WHERE v.groupId = ?1 AND v.artifactId = ?2 AND v.version = ?3");
pub const SELECT_VERSIONS: &str = select_versions!(
    "WHERE v.groupId = ?1 AND v.artifactId = ?2 ORDER BY v.versionOrder ASC LIMIT ?3 OFFSET ?4"
);
pub const SELECT_LATEST_VERSION: &str = select_versions!(
    "WHERE v.groupId = ?1 AND v.artifactId = ?2 ORDER BY v.versionOrder DESC LIMIT 1"
);
pub const SELECT_LATEST_VERSION_SKIP_DISABLED: &str = select_versions!(
    "WHERE v.groupId = ?1 AND v.artifactId = ?2 AND v.state != 'DISABLED' ORDER BY v.versionOrder DESC LIMIT 1"
);
pub const SELECT_VERSION_BY_CONTENT_HASH: &str = select_versions!(
    "JOIN content c ON v.contentId = c.contentId WHERE v.groupId = ?1 AND v.artifactId = ?2 AND c.contentHash = ?3 ORDER BY v.globalId DESC LIMIT 1"
);
pub const SELECT_VERSION_BY_CANONICAL_HASH: &str = select_versions!(
    "JOIN content c ON v.contentId = c.contentId WHERE v.groupId = ?1 AND v.artifactId = ?2 AND c.canonicalHash = ?3 ORDER BY v.globalId DESC LIMIT 1"
);
pub const SELECT_VERSION_COUNT: &str =
    "SELECT COUNT(v.globalId) FROM versions v WHERE v.groupId = ?1 AND v.artifactId = ?2";
pub const SELECT_TOTAL_VERSION_COUNT: &str = "SELECT COUNT(v.globalId) FROM versions v";
pub const SELECT_VERSION_LABEL_BY_GLOBAL_ID: &str =
    "SELECT v.version FROM versions v WHERE v.globalId = ?1";
pub const SELECT_GLOBAL_ID_EXISTS: &str =
    "SELECT COUNT(v.globalId) FROM versions v WHERE v.globalId = ?1";

// Labels, properties and comments hang off globalId

pub const INSERT_LABEL: &str = "INSERT INTO labels (globalId, label) VALUES (?1, ?2)";
pub const INSERT_PROPERTY: &str =
    "INSERT INTO properties (globalId, pkey, pvalue) VALUES (?1, ?2, ?3)";
pub const SELECT_LABELS: &str =
    "SELECT l.label FROM labels l WHERE l.globalId = ?1 ORDER BY l.label ASC";
pub const SELECT_PROPERTIES: &str =
    "SELECT p.pkey, p.pvalue FROM properties p WHERE p.globalId = ?1 ORDER BY p.pkey ASC";
pub const DELETE_LABELS_BY_GLOBAL_ID: &str = "DELETE FROM labels WHERE globalId = ?1";
pub const DELETE_PROPERTIES_BY_GLOBAL_ID: &str = "DELETE FROM properties WHERE globalId = ?1";
pub const DELETE_COMMENTS_BY_GLOBAL_ID: &str = "DELETE FROM comments WHERE globalId = ?1";
pub const DELETE_LABELS: &str = "DELETE FROM labels WHERE globalId IN
     (SELECT globalId FROM versions WHERE groupId = ?1 AND artifactId = ?2)";
pub const DELETE_PROPERTIES: &str = "DELETE FROM properties WHERE globalId IN
     (SELECT globalId FROM versions WHERE groupId = ?1 AND artifactId = ?2)";
pub const DELETE_COMMENTS: &str = "DELETE FROM comments WHERE globalId IN
     (SELECT globalId FROM versions WHERE groupId = ?1 AND artifactId = ?2)";

// Content and references

pub const INSERT_CONTENT: &str = "INSERT INTO content (contentId, canonicalHash, contentHash, content, claimedOn)
     VALUES (?1, ?2, ?3, ?4, ?5)";
pub const SELECT_CONTENT_ID_BY_HASH: &str =
    "SELECT c.contentId FROM content c WHERE c.contentHash = ?1";
pub const SELECT_CONTENT_ID_BY_CANONICAL_HASH: &str =
    "SELECT MIN(c.contentId) FROM content c WHERE c.canonicalHash = ?1";
pub const SELECT_CONTENT_BY_ID: &str = "SELECT c.contentId, c.contentHash, c.canonicalHash, c.content
     FROM content c WHERE c.contentId = ?1";
pub const SELECT_CONTENT_BY_HASH: &str = "SELECT c.contentId, c.contentHash, c.canonicalHash, c.content
     FROM content c WHERE c.contentHash = ?1";
pub const SELECT_CONTENT_WITHOUT_CANONICAL_HASH: &str = "SELECT c.contentId, c.contentHash FROM content c
     WHERE c.canonicalHash IS NULL ORDER BY c.contentId ASC LIMIT ?1";
pub const SELECT_CONTENT_ARTIFACT_TYPE: &str = "SELECT a.type FROM versions v
     JOIN artifacts a ON a.groupId = v.groupId AND a.artifactId = v.artifactId
     WHERE v.contentId = ?1 ORDER BY v.globalId ASC LIMIT 1";
pub const UPDATE_CONTENT_CANONICAL_HASH: &str =
    "UPDATE content SET canonicalHash = ?1 WHERE contentId = ?2 AND contentHash = ?3";
pub const UPDATE_CONTENT_CLAIM: &str =
    "UPDATE content SET claimedOn = MAX(claimedOn, ?1) WHERE contentId = ?2";
pub const DELETE_ORPHANED_CONTENT: &str = "DELETE FROM content
     WHERE content.claimedOn <= ?1
       AND NOT EXISTS (SELECT 1 FROM versions v WHERE v.contentId = content.contentId)";
pub const DELETE_ORPHANED_REFERENCES: &str = "DELETE FROM artifactreferences
     WHERE NOT EXISTS (SELECT 1 FROM content c WHERE c.contentId = artifactreferences.contentId)";
pub const INSERT_REFERENCE: &str = "INSERT INTO artifactreferences (contentId, groupId, artifactId, version, name)
     VALUES (?1, ?2, ?3, ?4, ?5)";
pub const SELECT_REFERENCES: &str = "SELECT r.groupId, r.artifactId, r.version, r.name
     FROM artifactreferences r WHERE r.contentId = ?1 ORDER BY r.name ASC";
pub const SELECT_INBOUND_REFERENCES: &str = "SELECT DISTINCT v.groupId, v.artifactId, v.version, r.name
     FROM versions v JOIN artifactreferences r ON v.contentId = r.contentId
     WHERE r.groupId = ?1 AND r.artifactId = ?2 AND r.version = ?3
     ORDER BY v.groupId ASC, v.artifactId ASC, v.versionOrder ASC, r.name ASC";

// Rules

pub const INSERT_ARTIFACT_RULE: &str =
    "INSERT INTO rules (groupId, artifactId, type, configuration) VALUES (?1, ?2, ?3, ?4)";
pub const UPDATE_ARTIFACT_RULE: &str =
    "UPDATE rules SET configuration = ?1 WHERE groupId = ?2 AND artifactId = ?3 AND type = ?4";
pub const DELETE_ARTIFACT_RULE: &str =
    "DELETE FROM rules WHERE groupId = ?1 AND artifactId = ?2 AND type = ?3";
pub const DELETE_ARTIFACT_RULES: &str = "DELETE FROM rules WHERE groupId = ?1 AND artifactId = ?2";
pub const SELECT_ARTIFACT_RULES: &str = "SELECT r.type, r.configuration FROM rules r
     WHERE r.groupId = ?1 AND r.artifactId = ?2 ORDER BY r.type ASC";
pub const SELECT_ARTIFACT_RULE_BY_TYPE: &str = "SELECT r.type, r.configuration FROM rules r
     WHERE r.groupId = ?1 AND r.artifactId = ?2 AND r.type = ?3";
pub const INSERT_GLOBAL_RULE: &str =
    "INSERT INTO globalrules (type, configuration) VALUES (?1, ?2)";
pub const UPDATE_GLOBAL_RULE: &str = "UPDATE globalrules SET configuration = ?1 WHERE type = ?2";
pub const DELETE_GLOBAL_RULE: &str = "DELETE FROM globalrules WHERE type = ?1";
pub const DELETE_GLOBAL_RULES: &str = "DELETE FROM globalrules";
pub const SELECT_GLOBAL_RULES: &str =
    "SELECT r.type, r.configuration FROM globalrules r ORDER BY r.type ASC";
pub const SELECT_GLOBAL_RULE_BY_TYPE: &str =
    "SELECT r.type, r.configuration FROM globalrules r WHERE r.type = ?1";

// Branches

// Duplicate branchOrder values are rejected by the primary key.
pub const INSERT_ARTIFACT_BRANCH: &str = "INSERT INTO artifact_branches (groupId, artifactId, branchId, branchOrder, version)
     SELECT ?1, ?2, ?3, COALESCE(MAX(ab.branchOrder), 0) + 1, ?4 FROM artifact_branches ab
     WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3";
pub const SELECT_ARTIFACT_BRANCH_ENTRY: &str = select_branches!(
    "WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3 AND ab.version = ?4"
);
pub const SELECT_ARTIFACT_BRANCH_IDS: &str = "SELECT DISTINCT ab.branchId FROM artifact_branches ab
     WHERE ab.groupId = ?1 AND ab.artifactId = ?2 ORDER BY ab.branchId ASC";
pub const SELECT_ARTIFACT_BRANCH_ORDERED: &str = select_branches!(
    "WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3 ORDER BY ab.branchOrder DESC LIMIT ?4 OFFSET ?5"
);
pub const SELECT_ARTIFACT_BRANCH_ORDERED_NOT_DISABLED: &str = select_branches!(
    "JOIN versions v ON ab.groupId = v.groupId AND ab.artifactId = v.artifactId AND ab.version = v.version WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3 AND v.state != 'DISABLED' ORDER BY ab.branchOrder DESC LIMIT ?4 OFFSET ?5"
);
pub const SELECT_ARTIFACT_BRANCH_TIP: &str = select_branches!(
    "WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3 ORDER BY ab.branchOrder DESC LIMIT 1"
);
pub const SELECT_ARTIFACT_BRANCH_TIP_NOT_DISABLED: &str = select_branches!(
    "JOIN versions v ON ab.groupId = v.groupId AND ab.artifactId = v.artifactId AND ab.version = v.version WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3 AND v.state != 'DISABLED' ORDER BY ab.branchOrder DESC LIMIT 1"
);
pub const SELECT_ARTIFACT_BRANCH_COUNT: &str = "SELECT COUNT(ab.branchOrder) FROM artifact_branches ab
     WHERE ab.groupId = ?1 AND ab.artifactId = ?2 AND ab.branchId = ?3";
pub const DELETE_ARTIFACT_BRANCH: &str =
    "DELETE FROM artifact_branches WHERE groupId = ?1 AND artifactId = ?2 AND branchId = ?3";
pub const DELETE_ALL_ARTIFACT_BRANCHES_IN_ARTIFACT: &str =
    "DELETE FROM artifact_branches WHERE groupId = ?1 AND artifactId = ?2";
pub const DELETE_VERSION_IN_ARTIFACT_BRANCHES: &str =
    "DELETE FROM artifact_branches WHERE groupId = ?1 AND artifactId = ?2 AND version = ?3";
pub const SELECT_VERSIONS_WITHOUT_ARTIFACT_BRANCH: &str = "SELECT v.version FROM versions v
     LEFT JOIN artifact_branches ab ON v.groupId = ab.groupId AND v.artifactId = ab.artifactId AND v.version = ab.version
     WHERE v.groupId = ?1 AND v.artifactId = ?2 AND ab.branchId IS NULL
     ORDER BY v.versionOrder ASC";

// Role mappings

pub const INSERT_ROLE_MAPPING: &str =
    "INSERT INTO acls (principalId, role, principalName) VALUES (?1, ?2, ?3)";
pub const UPDATE_ROLE_MAPPING: &str = "UPDATE acls SET role = ?1 WHERE principalId = ?2";
pub const DELETE_ROLE_MAPPING: &str = "DELETE FROM acls WHERE principalId = ?1";
pub const SELECT_ROLE_MAPPING_BY_PRINCIPAL: &str =
    "SELECT a.principalId, a.role, a.principalName FROM acls a WHERE a.principalId = ?1";
pub const SELECT_ROLE_MAPPINGS: &str = "SELECT a.principalId, a.role, a.principalName FROM acls a
     ORDER BY a.principalId ASC LIMIT ?1 OFFSET ?2";
pub const SELECT_ROLE_MAPPING_COUNT: &str = "SELECT COUNT(a.principalId) FROM acls a";

// Comments

pub const INSERT_COMMENT: &str = "INSERT INTO comments (commentId, globalId, createdBy, createdOn, cvalue)
     VALUES (?1, ?2, ?3, ?4, ?5)";
pub const SELECT_COMMENTS: &str = "SELECT c.commentId, c.globalId, c.createdBy, c.createdOn, c.cvalue
     FROM comments c WHERE c.globalId = ?1 ORDER BY c.commentId DESC";
pub const SELECT_COMMENT_COUNT_BY_ID: &str =
    "SELECT COUNT(c.commentId) FROM comments c WHERE c.globalId = ?1 AND c.commentId = ?2";
pub const SELECT_COMMENT_BY_ID: &str = "SELECT c.commentId, c.globalId, c.createdBy, c.createdOn, c.cvalue
     FROM comments c WHERE c.commentId = ?1";
pub const UPDATE_COMMENT: &str =
    "UPDATE comments SET cvalue = ?1 WHERE globalId = ?2 AND commentId = ?3 AND createdBy = ?4";
pub const DELETE_COMMENT: &str =
    "DELETE FROM comments WHERE globalId = ?1 AND commentId = ?2 AND createdBy = ?3";

// Config properties

pub const INSERT_CONFIG_PROPERTY: &str =
    "INSERT INTO config (pname, pvalue, modifiedOn) VALUES (?1, ?2, ?3)";
pub const DELETE_CONFIG_PROPERTY: &str = "DELETE FROM config WHERE pname = ?1";
pub const SELECT_CONFIG_PROPERTY_BY_NAME: &str =
    "SELECT c.pname, c.pvalue, c.modifiedOn FROM config c WHERE c.pname = ?1";
pub const SELECT_CONFIG_PROPERTIES: &str =
    "SELECT c.pname, c.pvalue, c.modifiedOn FROM config c ORDER BY c.pname ASC";
pub const SELECT_STALE_CONFIG_PROPERTIES: &str = "SELECT c.pname, c.pvalue, c.modifiedOn FROM config c
     WHERE c.modifiedOn >= ?1 ORDER BY c.pname ASC";

// Downloads

pub const INSERT_DOWNLOAD: &str =
    "INSERT INTO downloads (downloadId, expires, context) VALUES (?1, ?2, ?3)";
pub const SELECT_DOWNLOAD_CONTEXT: &str =
    "SELECT d.downloadId, d.expires, d.context FROM downloads d WHERE d.downloadId = ?1 AND d.expires > ?2";
pub const DELETE_DOWNLOAD: &str = "DELETE FROM downloads WHERE downloadId = ?1";
pub const DELETE_EXPIRED_DOWNLOADS: &str = "DELETE FROM downloads WHERE expires < ?1";
