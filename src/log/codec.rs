/// Serializes byte fields as standard base64 strings inside JSON records.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        #[serde(with = "super::base64_bytes")]
        data: Vec<u8>,
    }

    #[test]
    fn test_bytes_are_base64_strings() {
        let json = serde_json::to_string(&Blob {
            data: b"hi\x00".to_vec(),
        })
        .unwrap();
        assert_eq!(json, r#"{"data":"aGkA"}"#);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result = serde_json::from_str::<Blob>(r#"{"data":"***"}"#);
        assert!(result.is_err());
    }
}
