//! Path canonicalisation for the capture callback (`observe`).
//!
//! Paths crossing the external interface arrive as absolute paths from the
//! watcher/probe; everything persisted internally is relative to the
//! watched root, using `/`-separated UTF-8 strings regardless of platform
//! so that keys sort and compare consistently.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Rewrites `absolute_path` as a string relative to `watch_root`, rejecting
/// anything outside of it with `OutOfScope`.
pub fn relativize(watch_root: &Path, absolute_path: &Path) -> Result<String> {
    let rel = absolute_path.strip_prefix(watch_root).map_err(|_| {
        Error::OutOfScope(format!(
            "{} is not under watched root {}",
            absolute_path.display(),
            watch_root.display()
        ))
    })?;

    if rel.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(Error::OutOfScope(format!(
            "{} escapes the watched root",
            absolute_path.display()
        )));
    }

    let normalized = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        return Err(Error::OutOfScope("empty relative path".into()));
    }

    Ok(normalized)
}

/// Joins a relative path produced by [`relativize`] back onto an output
/// directory, used by export.
pub fn rejoin(out_dir: &Path, relative: &str) -> PathBuf {
    let mut p = out_dir.to_path_buf();
    for part in relative.split('/') {
        p.push(part);
    }
    p
}
