//! Binary-diff engine (component D).
//!
//! Two named variants are exposed at the interface ([`DiffAlgorithm`]); only
//! [`DiffAlgorithm::Bytewise`] is implemented. [`DiffAlgorithm::Myers`]
//! returns `Unsupported` and is rejected at configuration time (see
//! `flightrec_core::config`), so it never reaches this module in practice.
//!
//! `Bytewise` is a greedy copy/insert delta: a rolling window index over
//! `old` lets `compute_diff` find the longest matching run at each position
//! of `new` and emit a `Copy` referencing `old`, falling back to literal
//! `Insert` runs where nothing matches. This is the same shape as an rsync
//! delta, simplified to run entirely in memory over two byte slices.

use flightrec_core::error::{Error, Result};
use flightrec_core::types::DiffAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Length of the rolling window used to seed match candidates. Chosen small
/// enough that short files still produce useful matches.
const WINDOW: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum PatchOp {
    /// Copy `len` bytes from `old` starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// Insert these literal bytes.
    Insert { bytes: Vec<u8> },
}

/// Computes a patch that turns `old` into `new` using `algorithm`.
///
/// The one special case is an empty `old`: the patch is `new` verbatim (the
/// "whole-file snapshot patch"). Everything else, including an empty `new`,
/// goes through the op-encoded form, so an empty patch byte string only ever
/// means "old and new are both empty" — never "no-op" — which keeps
/// `apply_patch(old, compute_diff(old, new)) == new` true for every input,
/// including `new = b""`.
pub fn compute_diff(old: &[u8], new: &[u8], algorithm: DiffAlgorithm) -> Result<Vec<u8>> {
    match algorithm {
        DiffAlgorithm::Myers => Err(Error::Unsupported("Myers diff algorithm".into())),
        DiffAlgorithm::Bytewise => Ok(compute_diff_bytewise(old, new)),
    }
}

fn compute_diff_bytewise(old: &[u8], new: &[u8]) -> Vec<u8> {
    if old.is_empty() {
        return new.to_vec();
    }

    let ops = greedy_ops(old, new);
    bincode::serialize(&ops).expect("patch ops always encode")
}

/// Applies `patch` (as produced by [`compute_diff`]) to `old`, reproducing
/// `new`. An empty `old` treats `patch` as the literal snapshot bytes.
/// Otherwise `patch` is always op-encoded, even when it reproduces an empty
/// `new` (bincode's length prefix means a real op list is never literally
/// empty), so a genuinely empty byte string here is malformed rather than a
/// meaningful no-op.
pub fn apply_patch(old: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    if old.is_empty() {
        return Ok(patch.to_vec());
    }

    let ops: Vec<PatchOp> = bincode::deserialize(patch)
        .map_err(|e| Error::Corrupt(format!("malformed patch: {e}")))?;

    let mut out = Vec::new();
    for op in ops {
        match op {
            PatchOp::Copy { offset, len } => {
                let start = offset as usize;
                let end = start + len as usize;
                let slice = old
                    .get(start..end)
                    .ok_or_else(|| Error::Corrupt("patch copy range out of bounds".into()))?;
                out.extend_from_slice(slice);
            }
            PatchOp::Insert { bytes } => out.extend_from_slice(&bytes),
        }
    }
    Ok(out)
}

/// Indexes every `WINDOW`-byte run of `old` by its bytes, then walks `new`
/// greedily: at each position, if a window matches, extend the match as far
/// as possible and emit a `Copy`; otherwise accumulate an `Insert` run.
fn greedy_ops(old: &[u8], new: &[u8]) -> Vec<PatchOp> {
    let mut index: HashMap<&[u8], u32> = HashMap::new();
    if old.len() >= WINDOW {
        for i in 0..=(old.len() - WINDOW) {
            // Keep the earliest occurrence so repeated runs still match
            // something stable; later positions are reachable via
            // extension once a match starts.
            index.entry(&old[i..i + WINDOW]).or_insert(i as u32);
        }
    }

    let mut ops = Vec::new();
    let mut pending_insert: Vec<u8> = Vec::new();
    let mut j = 0usize;

    while j < new.len() {
        let window_fits = j + WINDOW <= new.len();
        let candidate = window_fits.then(|| index.get(&new[j..j + WINDOW])).flatten();

        if let Some(&old_start) = candidate {
            flush_insert(&mut ops, &mut pending_insert);

            let old_start = old_start as usize;
            let mut len = WINDOW;
            while old_start + len < old.len()
                && j + len < new.len()
                && old[old_start + len] == new[j + len]
            {
                len += 1;
            }
            ops.push(PatchOp::Copy {
                offset: old_start as u64,
                len: len as u64,
            });
            j += len;
        } else {
            pending_insert.push(new[j]);
            j += 1;
        }
    }
    flush_insert(&mut ops, &mut pending_insert);
    ops
}

fn flush_insert(ops: &mut Vec<PatchOp>, pending: &mut Vec<u8>) {
    if !pending.is_empty() {
        ops.push(PatchOp::Insert {
            bytes: std::mem::take(pending),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(old: &[u8], new: &[u8]) {
        let patch = compute_diff(old, new, DiffAlgorithm::Bytewise).unwrap();
        let restored = apply_patch(old, &patch).unwrap();
        assert_eq!(restored, new);
    }

    #[test]
    fn empty_old_yields_new_verbatim() {
        let patch = compute_diff(b"", b"brand new content", DiffAlgorithm::Bytewise).unwrap();
        assert_eq!(patch, b"brand new content");
        assert_eq!(apply_patch(b"", &patch).unwrap(), b"brand new content");
    }

    #[test]
    fn emptying_a_nonempty_file_roundtrips_to_empty() {
        roundtrip(b"some old content", b"");
    }

    #[test]
    fn malformed_patch_is_rejected_rather_than_treated_as_no_op() {
        let old = b"unchanged content".to_vec();
        assert!(apply_patch(&old, &[]).is_err());
    }

    #[test]
    fn appended_byte_roundtrips() {
        roundtrip(b"aaaaaaaaaa", b"aaaaaaaaaaa");
    }

    #[test]
    fn unrelated_content_roundtrips() {
        roundtrip(b"the quick brown fox", b"a completely different sentence entirely");
    }

    #[test]
    fn small_inputs_below_window_roundtrip() {
        roundtrip(b"ab", b"abc");
    }

    #[test]
    fn myers_is_unsupported() {
        assert!(compute_diff(b"a", b"b", DiffAlgorithm::Myers).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_roundtrip(old in proptest::collection::vec(proptest::num::u8::ANY, 0..200),
                           new in proptest::collection::vec(proptest::num::u8::ANY, 0..200)) {
            let patch = compute_diff(&old, &new, DiffAlgorithm::Bytewise).unwrap();
            let restored = apply_patch(&old, &patch).unwrap();
            proptest::prop_assert_eq!(restored, new);
        }
    }
}
