//! Layout store: owns the current [`LayoutSnapshot`].
//!
//! The layout path comes from the configuration (`system.json_path`) and is
//! resolved against the configuration file's directory.  A reload builds
//! the complete new snapshot before taking the write lock, so readers either
//! see the old zone map or the new one, never a mix.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use touchmap_core::{ConfigSnapshot, LayoutError, LayoutSnapshot};

use super::resolve_relative;
use crate::application::reload::{LayoutSource, SourceError};

pub struct LayoutStore {
    base_dir: PathBuf,
    snapshot: RwLock<Arc<LayoutSnapshot>>,
}

impl LayoutStore {
    /// Loads the layout named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Io`] if the file cannot be read and any
    /// parsing or marker error from [`LayoutSnapshot::from_json`].
    pub fn load(config: &ConfigSnapshot, base_dir: impl Into<PathBuf>) -> Result<Self, LayoutError> {
        let base_dir = base_dir.into();
        let snapshot = read_layout(config, &base_dir)?;
        Ok(Self {
            base_dir,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn current(&self) -> Arc<LayoutSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Rebuilds the layout for `config` and swaps it in.
    ///
    /// # Errors
    ///
    /// Same as [`LayoutStore::load`].  The previous snapshot stays current.
    pub fn reload(&self, config: &ConfigSnapshot) -> Result<Arc<LayoutSnapshot>, LayoutError> {
        let snapshot = Arc::new(read_layout(config, &self.base_dir)?);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}

impl LayoutSource for LayoutStore {
    fn current(&self) -> Arc<LayoutSnapshot> {
        LayoutStore::current(self)
    }

    fn reload(&self, config: &ConfigSnapshot) -> Result<Arc<LayoutSnapshot>, SourceError> {
        Ok(LayoutStore::reload(self, config)?)
    }
}

fn read_layout(config: &ConfigSnapshot, base_dir: &Path) -> Result<LayoutSnapshot, LayoutError> {
    let path = resolve_relative(base_dir, &config.system.json_path);
    let text = std::fs::read_to_string(&path).map_err(|source| LayoutError::Io {
        path: path.clone(),
        source,
    })?;
    let snapshot = LayoutSnapshot::from_json(&text, config.device_res())?;
    info!(
        "layout {} loaded: {} zones, joystick radius {:.0}px, leash {:.0}px",
        path.display(),
        snapshot.len(),
        snapshot.inner_radius_px(),
        snapshot.outer_radius_px()
    );
    Ok(snapshot)
}
