use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Defines a closed string-backed enum stored as its `SCREAMING_CASE` name.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::BadRequest(format!(
                        "unknown {}: {other}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }
    };
}

string_enum! {
    /// Format of the schema or API document stored in an artifact.
    ArtifactType {
        Avro => "AVRO",
        Protobuf => "PROTOBUF",
        Json => "JSON",
        OpenApi => "OPENAPI",
        AsyncApi => "ASYNCAPI",
        GraphQl => "GRAPHQL",
        KConnect => "KCONNECT",
        Wsdl => "WSDL",
        Xsd => "XSD",
        Xml => "XML",
    }
}

string_enum! {
    /// Lifecycle state of a single artifact version.
    VersionState {
        Enabled => "ENABLED",
        Deprecated => "DEPRECATED",
        Disabled => "DISABLED",
    }
}

string_enum! {
    RuleType {
        Validity => "VALIDITY",
        Compatibility => "COMPATIBILITY",
        Integrity => "INTEGRITY",
    }
}

string_enum! {
    RoleType {
        ReadOnly => "READ_ONLY",
        Developer => "DEVELOPER",
        Admin => "ADMIN",
    }
}

impl Default for VersionState {
    fn default() -> Self {
        Self::Enabled
    }
}

/// Named monotonic counters persisted in the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceName {
    GlobalId,
    ContentId,
    CommentId,
}

impl SequenceName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GlobalId => "globalId",
            Self::ContentId => "contentId",
            Self::CommentId => "commentId",
        }
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_variant() {
        for ty in ArtifactType::ALL {
            assert_eq!(ArtifactType::parse(ty.as_str()).unwrap(), *ty);
        }
        for state in VersionState::ALL {
            assert_eq!(state.as_str().parse::<VersionState>().unwrap(), *state);
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!(ArtifactType::parse("avro").is_err());
        assert!(matches!(
            RuleType::parse("NOPE"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ArtifactType::OpenApi).unwrap();
        assert_eq!(json, "\"OPENAPI\"");
        let role: RoleType = serde_json::from_str("\"READ_ONLY\"").unwrap();
        assert_eq!(role, RoleType::ReadOnly);
    }
}
