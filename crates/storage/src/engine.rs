//! Binding to the external key-value engine (component A).
//!
//! `Engine` is the only place in the workspace that imports `sled` by name;
//! every other crate depends on this narrow surface (get/scan_prefix/
//! apply_batch/remove/flush) so the underlying engine could be swapped for
//! any other ordered, batch-capable, sync/no-sync-durable store without
//! touching the rest of the workspace.

use flightrec_core::error::Result;
use std::path::Path;

/// Durability hint for a batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Flush (fsync) before returning. Used for CAS writes and metadata
    /// commits, where losing the write would corrupt the version graph.
    Sync,
    /// Buffered; flushed on the engine's own interval. Used for the ingest
    /// journal so producers never pay fsync latency.
    NoSync,
}

/// A batch of put/delete operations applied atomically.
#[derive(Debug, Default)]
pub struct Batch {
    inner: sled::Batch,
}

impl Batch {
    pub fn new() -> Self {
        Batch {
            inner: sled::Batch::default(),
        }
    }

    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.inner.insert(key.as_ref(), value.as_ref());
    }

    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        self.inner.remove(key.as_ref());
    }
}

/// Thin wrapper around a `sled::Db` exposing only the operations the rest
/// of the recorder needs: point get, prefix scan, atomic batch apply (with
/// a sync/no-sync hint), point delete, and an explicit flush.
#[derive(Clone)]
pub struct Engine {
    db: sled::Db,
}

impl Engine {
    /// Opens (or creates) the engine at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Engine { db })
    }

    /// In-memory engine, used by tests that don't need a data directory.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Engine { db })
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_ref())?.map(|v| v.to_vec()))
    }

    pub fn contains(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.db.contains_key(key.as_ref())?)
    }

    pub fn remove(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.db.remove(key.as_ref())?;
        Ok(())
    }

    /// Iterates all `(key, value)` pairs whose key starts with `prefix`, in
    /// key order (chronological order for timestamp-prefixed namespaces).
    pub fn scan_prefix(&self, prefix: impl AsRef<[u8]>) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {
        self.db
            .scan_prefix(prefix.as_ref())
            .map(|res| res.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(Into::into))
    }

    /// Applies `batch` atomically, honoring `durability`.
    pub fn apply_batch(&self, batch: Batch, durability: Durability) -> Result<()> {
        self.db.apply_batch(batch.inner)?;
        if durability == Durability::Sync {
            self.db.flush()?;
        }
        Ok(())
    }

    /// Forces a sync regardless of how prior writes were durability-hinted.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let engine = Engine::open_temporary().unwrap();
        let mut batch = Batch::new();
        batch.put(b"c:deadbeef", b"hello");
        engine.apply_batch(batch, Durability::Sync).unwrap();
        assert_eq!(engine.get(b"c:deadbeef").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn scan_prefix_is_ordered() {
        let engine = Engine::open_temporary().unwrap();
        let mut batch = Batch::new();
        batch.put(b"m:a:00000000000000000002", b"v2");
        batch.put(b"m:a:00000000000000000001", b"v1");
        engine.apply_batch(batch, Durability::NoSync).unwrap();

        let keys: Vec<_> = engine
            .scan_prefix(b"m:a:")
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(keys, vec![b"v1".to_vec(), b"v2".to_vec()]);
    }

    #[test]
    fn remove_deletes_key() {
        let engine = Engine::open_temporary().unwrap();
        let mut batch = Batch::new();
        batch.put(b"r:x", b"1");
        engine.apply_batch(batch, Durability::Sync).unwrap();
        engine.remove(b"r:x").unwrap();
        assert_eq!(engine.get(b"r:x").unwrap(), None);
    }
}
