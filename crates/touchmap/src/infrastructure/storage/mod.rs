//! File-backed stores for the configuration and the HUD layout.
//!
//! Both stores hold their snapshot as `RwLock<Arc<_>>`.  Readers clone the
//! `Arc` under a read lock that is held for a pointer copy only; reloads
//! build the new snapshot first and swap it in under the write lock.

use std::path::{Path, PathBuf};

pub mod config;
pub mod layout;

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
