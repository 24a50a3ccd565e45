//! Content-addressed store with reference counting and garbage collection
//! (component C).
//!
//! Blobs are immutable once written; reference descriptors are the only
//! mutable CAS state. `put`/`add_reference`/`remove_reference` are made
//! atomic per digest with a small sharded lock table — see
//! `TransactionManager::commit_locks` in the durability layer this was
//! modeled on for the same per-key lock shape.

use dashmap::DashMap;
use flightrec_core::error::{Error, Result};
use flightrec_core::key::{content_id_from_key, content_key, content_scan_prefix, ref_key};
use flightrec_core::types::{HashAlgorithm, RefDescriptor};
use parking_lot::Mutex;
use tracing::debug;

use crate::codec;
use crate::digest;
use crate::engine::{Batch, Durability, Engine};

/// A snapshot of CAS-wide counters, exposed so the facade and external
/// metrics collection can observe store health without reaching into
/// internals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CasStats {
    /// Number of distinct blobs currently stored.
    pub objects: u64,
    /// Sum of on-disk (post-compression) bytes across all blobs.
    pub total_stored_bytes: u64,
    /// Sum of reference counts across all descriptors.
    pub total_refs: u64,
    /// Number of distinct referencing paths across all descriptors.
    pub unique_paths: u64,
    /// Number of blobs with no live reference descriptor (GC candidates).
    pub unreferenced: u64,
}

/// Content-addressed store over a shared [`Engine`].
pub struct ContentStore {
    engine: Engine,
    algorithm: HashAlgorithm,
    digest_locks: DashMap<String, Mutex<()>>,
}

impl ContentStore {
    pub fn new(engine: Engine, algorithm: HashAlgorithm) -> Self {
        ContentStore {
            engine,
            algorithm,
            digest_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, digest: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<()>> {
        self.digest_locks
            .entry(digest.to_string())
            .or_insert_with(|| Mutex::new(()));
        self.digest_locks.get(digest).expect("just inserted")
    }

    /// Stores `data`, computing its content-id under the store's configured
    /// hash algorithm. Returns `stored_bytes = 0` when the blob already
    /// existed.
    pub fn put(&self, data: &[u8]) -> Result<(String, usize)> {
        let id = digest::digest(data, self.algorithm);
        self.put_with_digest(id, data)
    }

    /// Stores `data` under a digest the caller already computed (the
    /// chunker's rolling hash, for example). The digest is trusted, never
    /// recomputed.
    pub fn put_chunk(&self, hash: &str, data: &[u8]) -> Result<(String, usize)> {
        self.put_with_digest(hash.to_string(), data)
    }

    fn put_with_digest(&self, id: String, data: &[u8]) -> Result<(String, usize)> {
        let lock = self.lock_for(&id);
        let _guard = lock.lock();

        let key = content_key(&id);
        if self.engine.contains(&key)? {
            return Ok((id, 0));
        }

        let compressed = codec::compress(data);
        let stored_bytes = compressed.len();
        let mut batch = Batch::new();
        batch.put(&key, &compressed);
        self.engine.apply_batch(batch, Durability::Sync)?;
        debug!(content_id = %id, stored_bytes, "cas: wrote new blob");
        Ok((id, stored_bytes))
    }

    /// Fetches and decompresses the blob for `digest`, then recomputes its
    /// content-id and compares it to the key it was fetched under. Content
    /// addressing makes this check cheap and it is what actually catches a
    /// blob overwritten in place (the Merkle tree above this only covers the
    /// ordered content-id list, not the bytes each id names).
    pub fn get(&self, digest_str: &str) -> Result<Vec<u8>> {
        let key = content_key(digest_str);
        let stored = self
            .engine
            .get(&key)?
            .ok_or_else(|| Error::NotFound(format!("content blob {digest_str}")))?;
        let data = codec::decompress(&stored)?;

        let actual = digest::digest(&data, self.algorithm);
        if actual != digest_str {
            return Err(Error::IntegrityFailed(format!(
                "content blob {digest_str} does not match its own digest (got {actual})"
            )));
        }
        Ok(data)
    }

    pub fn has(&self, digest: &str) -> Result<bool> {
        self.engine.contains(content_key(digest))
    }

    /// Idempotent for a given `(digest, path)` pair: a repeated call with
    /// the same path does not bump the count again.
    pub fn add_reference(&self, digest: &str, path: &str) -> Result<()> {
        let lock = self.lock_for(digest);
        let _guard = lock.lock();

        let key = ref_key(digest);
        let mut desc = self.load_ref(&key)?.unwrap_or_default();
        if desc.referers.insert(path.to_string()) {
            desc.count = desc.referers.len() as u32;
            self.store_ref(&key, &desc)?;
        }
        Ok(())
    }

    /// Idempotent for a missing `(digest, path)` pair. Deletes the
    /// descriptor entirely once its last referer is removed; the blob
    /// itself is left for [`garbage_collect`](Self::garbage_collect).
    pub fn remove_reference(&self, digest: &str, path: &str) -> Result<()> {
        let lock = self.lock_for(digest);
        let _guard = lock.lock();

        let key = ref_key(digest);
        let Some(mut desc) = self.load_ref(&key)? else {
            return Ok(());
        };
        if desc.referers.remove(path) {
            if desc.referers.is_empty() {
                self.engine.remove(&key)?;
            } else {
                desc.count = desc.referers.len() as u32;
                self.store_ref(&key, &desc)?;
            }
        }
        Ok(())
    }

    pub fn ref_count(&self, digest: &str) -> Result<u32> {
        Ok(self.load_ref(&ref_key(digest))?.map(|d| d.count).unwrap_or(0))
    }

    fn load_ref(&self, key: &[u8]) -> Result<Option<RefDescriptor>> {
        match self.engine.get(key)? {
            Some(bytes) => Ok(Some(RefDescriptor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store_ref(&self, key: &[u8], desc: &RefDescriptor) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(key, desc.encode()?);
        self.engine.apply_batch(batch, Durability::Sync)
    }

    /// Deletes every blob under `c:` whose reference descriptor is missing
    /// or has a zero count. Never removes a blob with a positive-count
    /// descriptor.
    pub fn garbage_collect(&self) -> Result<u64> {
        let mut candidates = Vec::new();
        for entry in self.engine.scan_prefix(content_scan_prefix()) {
            let (key, _) = entry?;
            if let Some(id) = content_id_from_key(&key) {
                candidates.push(id);
            }
        }

        let mut deleted = 0u64;
        for id in candidates {
            if self.ref_count(&id)? == 0 {
                self.engine.remove(content_key(&id))?;
                deleted += 1;
            }
        }
        debug!(deleted, "cas: garbage collection complete");
        Ok(deleted)
    }

    /// Summarises the store's current footprint.
    pub fn stats(&self) -> Result<CasStats> {
        let mut objects = 0u64;
        let mut total_stored_bytes = 0u64;
        let mut unreferenced = 0u64;

        for entry in self.engine.scan_prefix(content_scan_prefix()) {
            let (key, value) = entry?;
            objects += 1;
            total_stored_bytes += value.len() as u64;
            if let Some(id) = content_id_from_key(&key) {
                if self.ref_count(&id)? == 0 {
                    unreferenced += 1;
                }
            }
        }

        let mut total_refs = 0u64;
        let mut unique_paths = std::collections::HashSet::new();
        for entry in self.engine.scan_prefix(flightrec_core::key::ref_scan_prefix()) {
            let (_, value) = entry?;
            let desc = RefDescriptor::decode(&value)?;
            total_refs += desc.count as u64;
            unique_paths.extend(desc.referers);
        }

        Ok(CasStats {
            objects,
            total_stored_bytes,
            total_refs,
            unique_paths: unique_paths.len() as u64,
            unreferenced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContentStore {
        ContentStore::new(Engine::open_temporary().unwrap(), HashAlgorithm::Blake3)
    }

    #[test]
    fn put_is_idempotent() {
        let cas = store();
        let (d1, n1) = cas.put(b"hello world").unwrap();
        let (d2, n2) = cas.put(b"hello world").unwrap();
        assert_eq!(d1, d2);
        assert!(n1 > 0);
        assert_eq!(n2, 0);
    }

    #[test]
    fn get_roundtrips_through_compression() {
        let cas = store();
        let (id, _) = cas.put(b"round trip me").unwrap();
        assert_eq!(cas.get(&id).unwrap(), b"round trip me");
    }

    #[test]
    fn missing_digest_is_not_found() {
        let cas = store();
        assert!(cas.get("deadbeef").is_err());
        assert!(!cas.has("deadbeef").unwrap());
    }

    #[test]
    fn reference_counting_tracks_distinct_paths() {
        let cas = store();
        let (id, _) = cas.put(b"shared content").unwrap();
        cas.add_reference(&id, "a.txt").unwrap();
        cas.add_reference(&id, "b.txt").unwrap();
        cas.add_reference(&id, "a.txt").unwrap(); // idempotent
        assert_eq!(cas.ref_count(&id).unwrap(), 2);

        cas.remove_reference(&id, "a.txt").unwrap();
        assert_eq!(cas.ref_count(&id).unwrap(), 1);

        cas.remove_reference(&id, "a.txt").unwrap(); // idempotent
        assert_eq!(cas.ref_count(&id).unwrap(), 1);

        cas.remove_reference(&id, "b.txt").unwrap();
        assert_eq!(cas.ref_count(&id).unwrap(), 0);
    }

    #[test]
    fn gc_removes_only_unreferenced_blobs() {
        let cas = store();
        let (kept, _) = cas.put(b"kept").unwrap();
        let (gone, _) = cas.put(b"gone").unwrap();
        cas.add_reference(&kept, "kept.txt").unwrap();

        let deleted = cas.garbage_collect().unwrap();
        assert_eq!(deleted, 1);
        assert!(cas.has(&kept).unwrap());
        assert!(!cas.has(&gone).unwrap());
    }

    #[test]
    fn stats_reflect_objects_and_refs() {
        let cas = store();
        let (id, _) = cas.put(b"payload").unwrap();
        cas.add_reference(&id, "x").unwrap();
        cas.add_reference(&id, "y").unwrap();

        let stats = cas.stats().unwrap();
        assert_eq!(stats.objects, 1);
        assert_eq!(stats.total_refs, 2);
        assert_eq!(stats.unique_paths, 2);
        assert_eq!(stats.unreferenced, 0);
    }
}
