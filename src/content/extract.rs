use std::collections::HashMap;

use serde_json::Value;

use crate::types::ArtifactType;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetaData {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ExtractedMetaData {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Pulls a display name and description out of a document.
///
/// Extractors never fail: content they cannot understand yields `None`.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, content: &[u8]) -> Option<ExtractedMetaData>;
}

/// Extractors keyed by artifact type. A type without an extractor simply
/// gets no derived metadata.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<ArtifactType, Box<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in extractors for the JSON/YAML and WSDL formats.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ArtifactType::Avro, Box::new(AvroExtractor));
        registry.register(ArtifactType::Json, Box::new(JsonSchemaExtractor));
        registry.register(ArtifactType::OpenApi, Box::new(ApiInfoExtractor));
        registry.register(ArtifactType::AsyncApi, Box::new(ApiInfoExtractor));
        registry.register(ArtifactType::Wsdl, Box::new(WsdlExtractor));
        registry
    }

    pub fn register(&mut self, artifact_type: ArtifactType, extractor: Box<dyn ContentExtractor>) {
        self.extractors.insert(artifact_type, extractor);
    }

    #[must_use]
    pub fn extract(&self, artifact_type: ArtifactType, content: &[u8]) -> ExtractedMetaData {
        self.extractors
            .get(&artifact_type)
            .and_then(|extractor| extractor.extract(content))
            .unwrap_or_default()
    }
}

fn parse_structured(content: &[u8]) -> Option<Value> {
    serde_json::from_slice(content)
        .ok()
        .or_else(|| serde_yaml::from_slice(content).ok())
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    current
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty(meta: ExtractedMetaData) -> Option<ExtractedMetaData> {
    if meta.is_empty() { None } else { Some(meta) }
}

struct AvroExtractor;

impl ContentExtractor for AvroExtractor {
    fn extract(&self, content: &[u8]) -> Option<ExtractedMetaData> {
        let schema = parse_structured(content)?;
        non_empty(ExtractedMetaData {
            name: string_at(&schema, &["name"]),
            description: string_at(&schema, &["doc"]),
        })
    }
}

struct JsonSchemaExtractor;

impl ContentExtractor for JsonSchemaExtractor {
    fn extract(&self, content: &[u8]) -> Option<ExtractedMetaData> {
        let schema = parse_structured(content)?;
        non_empty(ExtractedMetaData {
            name: string_at(&schema, &["title"]),
            description: string_at(&schema, &["description"]),
        })
    }
}

/// OpenAPI and AsyncAPI share the `info.title` / `info.description` layout.
struct ApiInfoExtractor;

impl ContentExtractor for ApiInfoExtractor {
    fn extract(&self, content: &[u8]) -> Option<ExtractedMetaData> {
        let document = parse_structured(content)?;
        non_empty(ExtractedMetaData {
            name: string_at(&document, &["info", "title"]),
            description: string_at(&document, &["info", "description"]),
        })
    }
}

struct WsdlExtractor;

impl ContentExtractor for WsdlExtractor {
    fn extract(&self, content: &[u8]) -> Option<ExtractedMetaData> {
        let text = std::str::from_utf8(content).ok()?;
        let start = text.find("<definitions").or_else(|| text.find(":definitions"))?;
        let tag_end = text[start..].find('>')? + start;
        let tag = &text[start..tag_end];

        let attr_start = tag.find("name=\"")? + "name=\"".len();
        let attr_len = tag[attr_start..].find('"')?;
        let name = tag[attr_start..attr_start + attr_len].trim();

        non_empty(ExtractedMetaData {
            name: (!name.is_empty()).then(|| name.to_string()),
            description: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avro_name_and_doc() {
        let registry = ExtractorRegistry::with_defaults();
        let meta = registry.extract(
            ArtifactType::Avro,
            br#"{"type": "record", "name": "Person", "doc": "A person", "fields": []}"#,
        );
        assert_eq!(meta.name.as_deref(), Some("Person"));
        assert_eq!(meta.description.as_deref(), Some("A person"));
    }

    #[test]
    fn test_openapi_yaml_info() {
        let registry = ExtractorRegistry::with_defaults();
        let meta = registry.extract(
            ArtifactType::OpenApi,
            b"openapi: 3.0.2\ninfo:\n  title: Pet Store\n  description: Pets for sale\n  version: 1.0.0\n",
        );
        assert_eq!(meta.name.as_deref(), Some("Pet Store"));
        assert_eq!(meta.description.as_deref(), Some("Pets for sale"));
    }

    #[test]
    fn test_wsdl_definitions_name() {
        let registry = ExtractorRegistry::with_defaults();
        let meta = registry.extract(
            ArtifactType::Wsdl,
            b"<?xml version=\"1.0\"?>\r\n<definitions name=\"StockQuote\"\r\n targetNamespace=\"http://example.com/stockquote.wsdl\">\r\n</definitions>",
        );
        assert_eq!(meta.name.as_deref(), Some("StockQuote"));
        assert_eq!(meta.description, None);
    }

    #[test]
    fn test_missing_extractor_or_bad_content_yields_blank() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(
            registry.extract(ArtifactType::Protobuf, b"syntax = \"proto3\";"),
            ExtractedMetaData::default()
        );
        assert_eq!(
            registry.extract(ArtifactType::Json, b"\x00\x01 not a document ["),
            ExtractedMetaData::default()
        );
    }
}
