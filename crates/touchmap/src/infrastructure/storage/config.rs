//! TOML-based configuration store.
//!
//! The file lives at a fixed path (`./config.toml` unless `--config` says
//! otherwise).  On first run the file does not exist yet; the store writes
//! the default configuration there so the player has something to edit.
//!
//! ```toml
//! [system]
//! json_path = "layout.json"
//! device_res = [2400, 1080]
//! device_dpi = 160.0
//!
//! [mouse]
//! sensitivity = 1.0
//! invert_y = false
//!
//! [joystick]
//! deadzone = 0.2
//! hysteresis = 5.0
//! ```
//!
//! Every field has a serde default, so a partial file loads fine.  A file
//! that fails to parse or validate is rejected as a whole: at startup that
//! is fatal, on reload the previous snapshot stays current.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use touchmap_core::{ConfigSnapshot, InvalidConfig};

use crate::application::reload::{ConfigSource, SourceError};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The default config could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is outside its allowed range.
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

struct Loaded {
    snapshot: ConfigSnapshot,
    table: toml::Table,
}

pub struct ConfigStore {
    path: PathBuf,
    snapshot: RwLock<Arc<ConfigSnapshot>>,
    table: RwLock<Arc<toml::Table>>,
}

impl ConfigStore {
    /// Loads `path`, writing the default configuration there first if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system failures other than "not
    /// found", [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let loaded = match std::fs::read_to_string(&path) {
            Ok(text) => parse(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let snapshot = ConfigSnapshot::default();
                let text = toml::to_string_pretty(&snapshot)?;
                write_file(&path, &text)?;
                info!("no config found; wrote defaults to {}", path.display());
                parse(&text)?
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(loaded.snapshot)),
            table: RwLock::new(Arc::new(loaded.table)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative paths inside the config resolve against.
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn current(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Re-reads the file and swaps in the new snapshot.  Derived joystick
    /// values carry over until the next layout load replaces them.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigStore::load_or_create`], except that a missing file
    /// is an error.  The previous snapshot stays current on error.
    pub fn reload(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut loaded = parse(&text)?;

        let previous = self.current();
        loaded.snapshot.joystick.mouse_wheel_radius = previous.joystick.mouse_wheel_radius;
        loaded.snapshot.joystick.sprint_distance = previous.joystick.sprint_distance;

        let snapshot = Arc::new(loaded.snapshot);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(loaded.table);
        info!("config reloaded from {}", self.path.display());
        Ok(snapshot)
    }

    /// Reads a single value by dotted key (`"mouse.sensitivity"`), falling
    /// back to `default` when the key is absent or has the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let table = Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner));
        let mut parts = key.split('.');
        let Some(first) = parts.next() else {
            return default;
        };
        let mut value = match table.get(first) {
            Some(value) => value,
            None => return default,
        };
        for part in parts {
            value = match value.get(part) {
                Some(next) => next,
                None => return default,
            };
        }
        value.clone().try_into().unwrap_or(default)
    }

    /// Writes the joystick radii derived from the layout into the in-memory
    /// snapshot.  The file on disk is not touched.
    pub fn set_derived(&self, mouse_wheel_radius: f64, sprint_distance: f64) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        next.joystick.mouse_wheel_radius = mouse_wheel_radius;
        next.joystick.sprint_distance = sprint_distance;
        *guard = Arc::new(next);
    }
}

impl ConfigSource for ConfigStore {
    fn current(&self) -> Arc<ConfigSnapshot> {
        ConfigStore::current(self)
    }

    fn reload(&self) -> Result<Arc<ConfigSnapshot>, SourceError> {
        Ok(ConfigStore::reload(self)?)
    }

    fn set_derived(&self, mouse_wheel_radius: f64, sprint_distance: f64) {
        ConfigStore::set_derived(self, mouse_wheel_radius, sprint_distance);
    }
}

fn parse(text: &str) -> Result<Loaded, ConfigError> {
    let snapshot: ConfigSnapshot = toml::from_str(text)?;
    snapshot.validate()?;
    let table: toml::Table = toml::from_str(text)?;
    Ok(Loaded { snapshot, table })
}

fn write_file(path: &Path, text: &str) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
