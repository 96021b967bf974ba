//! Content addressing: exact-byte hashes, canonical hashes and metadata
//! extraction for stored documents.

mod canonical;
mod extract;

pub use canonical::{Canonicalizer, canonical_hash, canonicalizer_for};
pub use extract::{ContentExtractor, ExtractedMetaData, ExtractorRegistry};

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the raw bytes.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[must_use]
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64
        && hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b"123"),
            "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3"
        );
    }

    #[test]
    fn test_is_valid_hash() {
        assert!(is_valid_hash(&content_hash(b"anything")));
        assert!(!is_valid_hash("short"));
        assert!(!is_valid_hash(
            "A665A45920422F9D417E4867EFDC4FB8A04A1F3FFF1FA07E998E86F7F7A27AE3"
        ));
    }
}
