//! Namespace-prefixed key encoding for the single shared key-value keyspace.
//!
//! Every persisted key starts with a one-byte namespace prefix followed by
//! `:` (see the data model's namespace table). Timestamps are encoded as
//! 20-digit zero-padded decimals so that lexicographic key order equals
//! chronological order, which makes a prefix scan a time-ordered iterator.

use rand::Rng;

/// Journal records (`l:`).
pub const NS_JOURNAL: u8 = b'l';
/// Content blobs (`c:`).
pub const NS_CONTENT: u8 = b'c';
/// Reference descriptors (`r:`).
pub const NS_REF: u8 = b'r';
/// Version records (`m:`).
pub const NS_VERSION: u8 = b'm';
/// Latest-hash change-detection entries (`h:`).
pub const NS_HASH: u8 = b'h';
/// Chunk manifests (`k:`).
pub const NS_MANIFEST: u8 = b'k';
/// Schema byte (`s:`).
pub const NS_SCHEMA: u8 = b's';

const TS_WIDTH: usize = 20;
const RAND_SUFFIX_LEN: usize = 8;

/// Zero-pads a nanosecond timestamp to `TS_WIDTH` decimal digits.
///
/// `timestamp` is expected to be non-negative (nanoseconds since the Unix
/// epoch); a negative value is clamped to zero so key ordering never panics.
pub fn encode_timestamp(timestamp: i64) -> String {
    format!("{:0width$}", timestamp.max(0), width = TS_WIDTH)
}

fn random_hex_suffix() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; RAND_SUFFIX_LEN / 2] = rng.gen();
    hex_encode(&bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn with_prefix(ns: u8, suffix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + suffix.len());
    key.push(ns);
    key.push(b':');
    key.extend_from_slice(suffix.as_bytes());
    key
}

/// Builds a fresh `l:<ts>:<rand>` journal key. Two records appended in the
/// same nanosecond get distinct keys via the random suffix, and sort by
/// that suffix when their timestamps tie.
pub fn journal_key(timestamp_ns: i64) -> Vec<u8> {
    let suffix = format!("{}:{}", encode_timestamp(timestamp_ns), random_hex_suffix());
    with_prefix(NS_JOURNAL, &suffix)
}

/// Prefix for scanning all journal records in chronological order.
pub fn journal_scan_prefix() -> Vec<u8> {
    vec![NS_JOURNAL, b':']
}

/// Builds a `c:<content-id>` key for a stored blob.
pub fn content_key(content_id: &str) -> Vec<u8> {
    with_prefix(NS_CONTENT, content_id)
}

/// Prefix for scanning all stored blobs (used by garbage collection).
pub fn content_scan_prefix() -> Vec<u8> {
    vec![NS_CONTENT, b':']
}

/// Extracts the content-id suffix from a `c:` key produced by [`content_key`].
pub fn content_id_from_key(key: &[u8]) -> Option<String> {
    strip_prefix(key, NS_CONTENT).map(|s| s.to_string())
}

/// Builds an `r:<content-id>` key for a reference descriptor.
pub fn ref_key(content_id: &str) -> Vec<u8> {
    with_prefix(NS_REF, content_id)
}

/// Prefix for scanning every reference descriptor.
pub fn ref_scan_prefix() -> Vec<u8> {
    vec![NS_REF, b':']
}

/// Builds an `m:<path>:<ts>` version-record key.
pub fn version_key(path: &str, timestamp_ns: i64) -> Vec<u8> {
    let suffix = format!("{}:{}", path, encode_timestamp(timestamp_ns));
    with_prefix(NS_VERSION, &suffix)
}

/// Prefix for scanning every version record belonging to one path, in
/// chronological order.
pub fn version_scan_prefix(path: &str) -> Vec<u8> {
    let suffix = format!("{}:", path);
    with_prefix(NS_VERSION, &suffix)
}

/// Prefix for scanning every version record across every path.
pub fn version_scan_all_prefix() -> Vec<u8> {
    vec![NS_VERSION, b':']
}

/// Recovers `(path, timestamp_ns)` from an `m:` key produced by
/// [`version_key`]. The timestamp occupies a fixed-width suffix so paths
/// containing `:` are still parsed correctly.
pub fn parse_version_key(key: &[u8]) -> Option<(String, i64)> {
    let rest = strip_prefix(key, NS_VERSION)?;
    if rest.len() < TS_WIDTH + 1 {
        return None;
    }
    let split = rest.len() - TS_WIDTH - 1;
    let (path, ts_part) = rest.split_at(split);
    let ts_str = &ts_part[1..]; // drop the ':' separator
    let ts: i64 = ts_str.parse().ok()?;
    Some((path.to_string(), ts))
}

/// Builds an `h:<path>` latest-content-hash key.
pub fn hash_key(path: &str) -> Vec<u8> {
    with_prefix(NS_HASH, path)
}

/// Builds a `k:<path>` chunk-manifest key.
pub fn manifest_key(path: &str) -> Vec<u8> {
    with_prefix(NS_MANIFEST, path)
}

/// The single `s:schema` key.
pub fn schema_key() -> Vec<u8> {
    with_prefix(NS_SCHEMA, "schema")
}

fn strip_prefix(key: &[u8], ns: u8) -> Option<&str> {
    if key.len() < 2 || key[0] != ns || key[1] != b':' {
        return None;
    }
    std::str::from_utf8(&key[2..]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding_preserves_order() {
        let a = encode_timestamp(5);
        let b = encode_timestamp(123_456_789);
        assert!(a < b);
        assert_eq!(a.len(), TS_WIDTH);
    }

    #[test]
    fn version_key_roundtrips() {
        let key = version_key("dir/file.txt", 42);
        let (path, ts) = parse_version_key(&key).unwrap();
        assert_eq!(path, "dir/file.txt");
        assert_eq!(ts, 42);
    }

    #[test]
    fn version_key_with_colon_in_path_roundtrips() {
        let key = version_key("weird:name.txt", 7);
        let (path, ts) = parse_version_key(&key).unwrap();
        assert_eq!(path, "weird:name.txt");
        assert_eq!(ts, 7);
    }

    #[test]
    fn journal_keys_for_same_timestamp_are_distinct() {
        let a = journal_key(100);
        let b = journal_key(100);
        assert_ne!(a, b);
        assert!(a.starts_with(&journal_scan_prefix()));
    }

    #[test]
    fn content_key_roundtrips_id() {
        let key = content_key("abc123");
        assert_eq!(content_id_from_key(&key).as_deref(), Some("abc123"));
    }
}
