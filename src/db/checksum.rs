//! Checksum calculation for sync payload deduplication.

use sha2::{Digest, Sha256};

/// Calculate SHA-256 checksum of a normalized upstream payload.
///
/// The sync processor uses this to detect that a game's upstream history is
/// unchanged since the last sync and skip the ingest entirely.
///
/// # Arguments
/// * `content` - JSON string content of the payload
///
/// # Returns
/// Hexadecimal string representation of the SHA-256 hash.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"price": 9.99}"#;
        let checksum1 = calculate_checksum(content);
        let checksum2 = calculate_checksum(content);
        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_different_content_different_checksum() {
        let content1 = r#"{"price": 9.99}"#;
        let content2 = r#"{"price": 4.99}"#;
        let checksum1 = calculate_checksum(content1);
        let checksum2 = calculate_checksum(content2);
        assert_ne!(checksum1, checksum2);
    }
}
