//! Deterministic, content-addressed chunk identity.
//!
//! A point id is the SHA-1 of `"{source}::p{page}::c{index}::{prefix}"`,
//! where `prefix` is the first 120 characters of the chunk text and an
//! absent page renders as `None`. Re-ingesting identical content yields the
//! same id, so an upsert overwrites instead of duplicating; identical text
//! at another position or source yields a different id.

use sha1::{Digest, Sha1};
use std::fmt;
use uuid::Uuid;

/// Number of leading chunk characters folded into the id.
pub const ID_TEXT_PREFIX_CHARS: usize = 120;

/// A stable SHA-1 point identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointId([u8; 20]);

impl PointId {
    /// Lowercase 40-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// UUID built from the first 16 digest bytes.
    ///
    /// Stores that only accept UUID or integer ids (Qdrant) use this form.
    /// It is as deterministic as the hex form.
    pub fn to_uuid(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.0[..16]);
        Uuid::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Derive the stable id of a chunk.
pub fn stable_id(
    source: &str,
    page_number: Option<u32>,
    chunk_index: usize,
    chunk_text: &str,
) -> PointId {
    let page = match page_number {
        Some(n) => n.to_string(),
        None => "None".to_string(),
    };
    let prefix: String = chunk_text.chars().take(ID_TEXT_PREFIX_CHARS).collect();
    let key = format!("{}::p{}::c{}::{}", source, page, chunk_index, prefix);

    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    PointId(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_sha1_of_compound_key() {
        let id = stable_id("/app/docs/a.txt", None, 0, "hello");
        let mut hasher = Sha1::new();
        hasher.update(b"/app/docs/a.txt::pNone::c0::hello");
        assert_eq!(id.to_hex(), hex::encode(hasher.finalize()));
        assert_eq!(id.to_hex().len(), 40);
    }

    #[test]
    fn test_page_number_rendered() {
        let id = stable_id("/d/r.pdf", Some(3), 1, "body");
        let mut hasher = Sha1::new();
        hasher.update(b"/d/r.pdf::p3::c1::body");
        assert_eq!(id.to_hex(), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_deterministic() {
        let a = stable_id("/d/a.txt", Some(1), 2, "same text");
        let b = stable_id("/d/a.txt", Some(1), 2, "same text");
        assert_eq!(a, b);
        assert_eq!(a.to_uuid(), b.to_uuid());
    }

    #[test]
    fn test_position_and_source_change_id() {
        let base = stable_id("/d/a.txt", None, 0, "same text");
        assert_ne!(base, stable_id("/d/a.txt", None, 1, "same text"));
        assert_ne!(base, stable_id("/d/b.txt", None, 0, "same text"));
        assert_ne!(base, stable_id("/d/a.txt", Some(1), 0, "same text"));
    }

    #[test]
    fn test_only_prefix_participates() {
        let head = "h".repeat(ID_TEXT_PREFIX_CHARS);
        let a = stable_id("/d/a.txt", None, 0, &format!("{}tail one", head));
        let b = stable_id("/d/a.txt", None, 0, &format!("{}tail two", head));
        assert_eq!(a, b);
    }

    #[test]
    fn test_uuid_uses_digest_prefix() {
        let id = stable_id("/d/a.txt", None, 0, "x");
        assert_eq!(&id.to_uuid().as_bytes()[..], &id.as_bytes()[..16]);
    }
}
