use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Id length used for normalized rows.
pub const NORMALIZED_ID_LEN: usize = 16;

const FIELD_SEPARATOR: char = '\u{1f}';

/// Full lowercase hex SHA-256 of `payload`.
pub fn content_id(payload: &str) -> String {
    hex_digest(Sha256::digest(payload.as_bytes()).as_slice())
}

/// `content_id` truncated to `len` hex characters (at most 64).
pub fn short_id(payload: &str, len: usize) -> String {
    let mut id = content_id(payload);
    id.truncate(len);
    id
}

/// Hash of several fields joined by a unit separator, truncated to `len`.
///
/// The separator keeps `["ab", "c"]` and `["a", "bc"]` apart.
pub fn composite_id(fields: &[&str], len: usize) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(FIELD_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(field.as_bytes());
    }
    let mut id = hex_digest(hasher.finalize().as_slice());
    id.truncate(len);
    id
}

fn hex_digest(digest: &[u8]) -> String {
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
