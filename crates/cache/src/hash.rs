use sha2::{Digest, Sha256};

/// Short, stable content hash used as a cache key for user messages and
/// error snippets. Not a security boundary — just de-duplication.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_hashes_to_same_value() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
    }

    #[test]
    fn different_text_hashes_differ() {
        assert_ne!(content_hash("hello"), content_hash("world"));
    }
}
