use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::values::normalize_name;

/// Stable identifier for an ad name, insensitive to case, accents and
/// spacing: `"H_" + sha1(normalize_name(name))`.
pub fn ad_id_from_name(ad_name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(normalize_name(ad_name).as_bytes());
    format!("H_{}", hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file's full content. Only used to detect re-imports.
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Parts of a performance row that identify it within a client's set.
#[derive(Debug, Clone, Copy)]
pub struct RecordKey<'a> {
    pub day: &'a str,
    pub campaign_name: &'a str,
    pub ad_set_name: &'a str,
    pub ad_name: &'a str,
    pub age: &'a str,
    pub gender: &'a str,
}

/// Derived `uniqueId` for a performance row. The same logical row from two
/// different files yields the same id.
pub fn make_record_id(key: RecordKey<'_>) -> String {
    let s = format!(
        "{}|{}|{}|{}|{}|{}",
        key.day.trim(),
        normalize_name(key.campaign_name),
        normalize_name(key.ad_set_name),
        normalize_name(key.ad_name),
        normalize_name(key.age),
        normalize_name(key.gender),
    );

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let hash = hasher.finalize();

    format!("PR-{}", hex::encode(&hash[..12]))
}
