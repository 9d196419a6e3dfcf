use sha2::{Digest, Sha256};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Key used to recognise a statement file that was already imported.
pub fn content_hash(data: &[u8]) -> String {
    to_hex(&sha256_bytes(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_vector() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn same_statement_same_key() {
        let a = content_hash(b"<OFX><STMTTRN>");
        assert_eq!(a, content_hash(b"<OFX><STMTTRN>"));
        assert_ne!(a, content_hash(b"<OFX><STMTTRN> "));
        assert_eq!(a.len(), 64);
    }
}
