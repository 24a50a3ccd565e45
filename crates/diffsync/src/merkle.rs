//! Merkle builder/verifier (component F).
//!
//! Leaves are hashed over the textual content-id representation of each
//! CAS digest, not the underlying blob bytes — verification never has to
//! touch CAS, only the ordered CID list already stored in a version record.

use flightrec_core::error::{Error, Result};
use flightrec_core::types::HashAlgorithm;
use flightrec_storage::digest::digest;

/// A built Merkle tree: the original leaf CIDs plus every level of internal
/// node hashes up to the root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    algorithm: HashAlgorithm,
    leaves: Vec<String>,
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Builds a tree from an ordered list of content-ids. `cids` must be
    /// non-empty.
    pub fn build(cids: &[String], algorithm: HashAlgorithm) -> Result<Self> {
        if cids.is_empty() {
            return Err(Error::Corrupt(
                "cannot build a merkle tree from an empty cid list".into(),
            ));
        }

        let leaf_level: Vec<String> = cids.iter().map(|c| digest(c.as_bytes(), algorithm)).collect();
        let levels = build_levels(leaf_level, algorithm);

        Ok(MerkleTree {
            algorithm,
            leaves: cids.to_vec(),
            levels,
        })
    }

    /// The top hash of the tree.
    pub fn root(&self) -> &str {
        self.levels
            .last()
            .and_then(|level| level.first())
            .expect("build() always produces at least one level")
    }

    /// Recomputes the tree from its stored leaves and checks every internal
    /// node still matches — detects any tampering with the tree structure
    /// itself (as opposed to the underlying blobs, which `verify_integrity`
    /// covers from a fresh CID list).
    pub fn verify_tree(&self) -> bool {
        let leaf_level: Vec<String> = self.leaves.iter().map(|c| digest(c.as_bytes(), self.algorithm)).collect();
        let recomputed = build_levels(leaf_level, self.algorithm);
        recomputed == self.levels
    }

    /// True iff `cid` is one of the tree's original leaves and the tree is
    /// internally consistent.
    pub fn verify_content(&self, cid: &str) -> bool {
        self.verify_tree() && self.leaves.iter().any(|l| l == cid)
    }

    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }
}

/// Rebuilds a tree from `cids` and checks its root equals `expected_root`.
/// This is the check the version graph runs before handing reconstructed
/// bytes back to a caller.
pub fn verify_integrity(cids: &[String], expected_root: &str, algorithm: HashAlgorithm) -> Result<()> {
    let tree = MerkleTree::build(cids, algorithm)?;
    if !tree.verify_tree() {
        return Err(Error::IntegrityFailed("merkle tree is internally inconsistent".into()));
    }
    if tree.root() != expected_root {
        return Err(Error::IntegrityFailed(format!(
            "merkle root mismatch: expected {expected_root}, computed {}",
            tree.root()
        )));
    }
    Ok(())
}

fn combine(left: &str, right: &str, algorithm: HashAlgorithm) -> String {
    let mut buf = Vec::with_capacity(left.len() + right.len());
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    digest(&buf, algorithm)
}

fn build_levels(leaf_level: Vec<String>, algorithm: HashAlgorithm) -> Vec<Vec<String>> {
    let mut levels = vec![leaf_level];
    while levels.last().unwrap().len() > 1 {
        let prev = levels.last().unwrap();
        let mut next = Vec::with_capacity(prev.len().div_ceil(2));
        let mut i = 0;
        while i < prev.len() {
            if i + 1 < prev.len() {
                next.push(combine(&prev[i], &prev[i + 1], algorithm));
            } else {
                // Odd one out is promoted unchanged rather than
                // self-combined, so a single-leaf tree's root is just that
                // leaf's hash.
                next.push(prev[i].clone());
            }
            i += 2;
        }
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("cid-{i}")).collect()
    }

    #[test]
    fn empty_cid_list_is_rejected() {
        assert!(MerkleTree::build(&[], HashAlgorithm::Blake3).is_err());
    }

    #[test]
    fn single_leaf_root_is_its_own_hash() {
        let tree = MerkleTree::build(&cids(1), HashAlgorithm::Blake3).unwrap();
        assert_eq!(tree.root(), digest(b"cid-0", HashAlgorithm::Blake3));
    }

    #[test]
    fn same_cids_produce_same_root() {
        let a = MerkleTree::build(&cids(7), HashAlgorithm::Blake3).unwrap();
        let b = MerkleTree::build(&cids(7), HashAlgorithm::Blake3).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn different_order_produces_different_root() {
        let mut reordered = cids(5);
        reordered.swap(0, 1);
        let a = MerkleTree::build(&cids(5), HashAlgorithm::Blake3).unwrap();
        let b = MerkleTree::build(&reordered, HashAlgorithm::Blake3).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn verify_tree_detects_leaf_tampering() {
        let mut tree = MerkleTree::build(&cids(4), HashAlgorithm::Blake3).unwrap();
        assert!(tree.verify_tree());
        tree.leaves[1] = "tampered".into();
        assert!(!tree.verify_tree());
    }

    #[test]
    fn verify_content_finds_member_leaf_only() {
        let tree = MerkleTree::build(&cids(4), HashAlgorithm::Blake3).unwrap();
        assert!(tree.verify_content("cid-2"));
        assert!(!tree.verify_content("cid-99"));
    }

    #[test]
    fn verify_integrity_matches_expected_root() {
        let list = cids(6);
        let tree = MerkleTree::build(&list, HashAlgorithm::Blake3).unwrap();
        let root = tree.root().to_string();
        assert!(verify_integrity(&list, &root, HashAlgorithm::Blake3).is_ok());
    }

    #[test]
    fn flipping_a_chunk_changes_the_root_and_fails_verification() {
        let list = cids(6);
        let tree = MerkleTree::build(&list, HashAlgorithm::Blake3).unwrap();
        let root = tree.root().to_string();

        let mut tampered = list.clone();
        tampered[3] = "cid-3-flipped".into();
        assert!(verify_integrity(&tampered, &root, HashAlgorithm::Blake3).is_err());
    }
}
