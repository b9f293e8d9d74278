//! Host-supplied path resolution.
//!
//! The tracker never decides where documentation lives; the host hands it a
//! base directory and a configuration-file path, and every version root is
//! derived from those. Keeping the derivation in one place guarantees that a
//! record's `absolute_path` can always be recomputed from its `location`.

use std::path::{Path, PathBuf};

/// Resolves relative version locations and the watched config file against
/// the host's base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    base_dir: PathBuf,
    config_file: PathBuf,
}

impl PathResolver {
    /// Create a resolver rooted at `base_dir`.
    ///
    /// A relative `config_file` is resolved against `base_dir`; an absolute
    /// one is kept as given.
    pub fn new(base_dir: impl Into<PathBuf>, config_file: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let config_file = config_file.into();
        let config_file = if config_file.is_absolute() {
            config_file
        } else {
            base_dir.join(config_file)
        };
        Self {
            base_dir,
            config_file,
        }
    }

    /// The base directory all version locations are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute root directory for a version's configured location.
    pub fn version_root(&self, location: &str) -> PathBuf {
        self.base_dir.join(location)
    }

    /// Absolute path of the configuration file the watch session tracks.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}
