use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::ArtifactType;

/// Produces a form of a document that is insensitive to formatting.
///
/// `family` is mixed into the canonical hash so that two canonicalizers can
/// never produce colliding hashes for different document formats.
pub trait Canonicalizer: Send + Sync {
    fn family(&self) -> &'static str;

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>>;
}

/// JSON and YAML documents: parsed, keys sorted, printed compactly.
struct StructuredCanonicalizer;

/// XML documents: whitespace between elements and around lines removed.
struct XmlCanonicalizer;

/// Anything else: line endings normalized and outer whitespace trimmed.
struct TextCanonicalizer;

static STRUCTURED: StructuredCanonicalizer = StructuredCanonicalizer;
static XML: XmlCanonicalizer = XmlCanonicalizer;
static TEXT: TextCanonicalizer = TextCanonicalizer;

#[must_use]
pub fn canonicalizer_for(artifact_type: ArtifactType) -> &'static dyn Canonicalizer {
    match artifact_type {
        ArtifactType::Avro
        | ArtifactType::Json
        | ArtifactType::OpenApi
        | ArtifactType::AsyncApi
        | ArtifactType::KConnect => &STRUCTURED,
        ArtifactType::Wsdl | ArtifactType::Xsd | ArtifactType::Xml => &XML,
        ArtifactType::Protobuf | ArtifactType::GraphQl => &TEXT,
    }
}

pub fn canonical_hash(artifact_type: ArtifactType, content: &[u8]) -> Result<String> {
    let canonicalizer = canonicalizer_for(artifact_type);
    let canonical = canonicalizer.canonicalize(content)?;

    let mut hasher = Sha256::new();
    hasher.update(canonicalizer.family().as_bytes());
    hasher.update(b":");
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

impl Canonicalizer for StructuredCanonicalizer {
    fn family(&self) -> &'static str {
        "structured"
    }

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>> {
        let value: Value = match serde_json::from_slice(content) {
            Ok(value) => value,
            Err(_) => serde_yaml::from_slice(content).map_err(|e| {
                Error::BadRequest(format!("content is neither JSON nor YAML: {e}"))
            })?,
        };
        Ok(serde_json::to_vec(&sort_keys(value))?)
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

impl Canonicalizer for XmlCanonicalizer {
    fn family(&self) -> &'static str {
        "xml"
    }

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(content)
            .map_err(|e| Error::BadRequest(format!("XML content is not UTF-8: {e}")))?;

        let joined: String = text.lines().map(str::trim).collect::<Vec<_>>().join(" ");

        let mut out = String::with_capacity(joined.len());
        let mut pending_space = false;
        for c in joined.chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space {
                // Whitespace between two elements carries no meaning.
                let last_closed = out.ends_with('>');
                if !(last_closed && c == '<') && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
            }
            out.push(c);
        }
        Ok(out.into_bytes())
    }
}

impl Canonicalizer for TextCanonicalizer {
    fn family(&self) -> &'static str {
        "text"
    }

    fn canonicalize(&self, content: &[u8]) -> Result<Vec<u8>> {
        let text = String::from_utf8_lossy(content);
        let normalized = text.replace("\r\n", "\n");
        Ok(normalized.trim().as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_key_order_and_whitespace_do_not_matter() {
        let a = br#"{"type": "record", "name": "User", "fields": []}"#;
        let b = b"{\r\n  \"name\" : \"User\",\r\n  \"fields\": [],\r\n  \"type\":\"record\"\r\n}";
        assert_eq!(
            canonical_hash(ArtifactType::Avro, a).unwrap(),
            canonical_hash(ArtifactType::Avro, b).unwrap()
        );
    }

    #[test]
    fn test_yaml_and_json_openapi_are_equivalent() {
        let json = br#"{"openapi": "3.0.2", "info": {"title": "Pets", "version": "1"}}"#;
        let yaml = b"openapi: 3.0.2\ninfo:\n  title: Pets\n  version: '1'\n";
        assert_eq!(
            canonical_hash(ArtifactType::OpenApi, json).unwrap(),
            canonical_hash(ArtifactType::OpenApi, yaml).unwrap()
        );
    }

    #[test]
    fn test_semantic_change_changes_hash() {
        let a = br#"{"type": "string"}"#;
        let b = br#"{"type": "int"}"#;
        assert_ne!(
            canonical_hash(ArtifactType::Json, a).unwrap(),
            canonical_hash(ArtifactType::Json, b).unwrap()
        );
    }

    #[test]
    fn test_xml_whitespace_between_elements_is_ignored() {
        let a = b"<schema>\r\n  <element name=\"a\"/>\r\n</schema>";
        let b = b"<schema><element   name=\"a\"/></schema>";
        assert_eq!(
            XmlCanonicalizer.canonicalize(a).unwrap(),
            XmlCanonicalizer.canonicalize(b).unwrap()
        );
    }

    #[test]
    fn test_families_do_not_collide() {
        let content = b"syntax = \"proto3\";";
        let text = canonical_hash(ArtifactType::Protobuf, content).unwrap();
        let xml = canonical_hash(ArtifactType::Xml, content).unwrap();
        assert_ne!(text, xml);
    }

    #[test]
    fn test_invalid_structured_content_is_rejected() {
        let result = canonical_hash(ArtifactType::Json, b"{not json: [");
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
