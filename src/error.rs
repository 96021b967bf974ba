use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not permitted to modify {entity}: {key}")]
    Unauthorized { entity: &'static str, key: String },

    #[error("message {correlation_id} was not applied within {waited_ms}ms")]
    ReplicationTimeout { correlation_id: Uuid, waited_ms: u64 },

    #[error("failed to apply message for {key}: {reason}")]
    ApplyFailure { key: String, reason: String },

    #[error("schema upgrade from version {from} to {to} failed: {reason}")]
    SchemaUpgradeFailure { from: i32, to: i32, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    pub fn unauthorized(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Unauthorized {
            entity,
            key: key.into(),
        }
    }

    /// Stable tag for programmatic handling by callers.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::InvalidState(_) => "InvalidState",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::ReplicationTimeout { .. } => "ReplicationTimeout",
            Self::ApplyFailure { .. } => "ApplyFailure",
            Self::SchemaUpgradeFailure { .. } => "SchemaUpgradeFailure",
            Self::Database(_) => "Database",
            Self::Io(_) => "Io",
            Self::Serialization(_) => "Serialization",
            Self::Config(_) => "Config",
            Self::BadRequest(_) => "BadRequest",
        }
    }

    /// Only replication timeouts and apply failures may succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ReplicationTimeout { .. } | Self::ApplyFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(Error::not_found("artifact", "g/a").kind(), "NotFound");
        assert_eq!(Error::already_exists("rule", "VALIDITY").kind(), "AlreadyExists");
        assert_eq!(Error::unauthorized("comment", "7").kind(), "Unauthorized");
        assert_eq!(
            Error::ReplicationTimeout {
                correlation_id: Uuid::nil(),
                waited_ms: 10
            }
            .kind(),
            "ReplicationTimeout"
        );
    }

    #[test]
    fn test_only_replication_errors_are_retryable() {
        assert!(
            Error::ApplyFailure {
                key: "g/a".to_string(),
                reason: "busy".to_string()
            }
            .is_retryable()
        );
        assert!(
            Error::ReplicationTimeout {
                correlation_id: Uuid::nil(),
                waited_ms: 1
            }
            .is_retryable()
        );
        assert!(!Error::not_found("group", "g").is_retryable());
        assert!(!Error::InvalidState("disabled".to_string()).is_retryable());
    }

    #[test]
    fn test_error_message_carries_keys() {
        let err = Error::already_exists("artifact", "G/A1");
        assert_eq!(err.to_string(), "artifact already exists: G/A1");
    }
}
