//! Version registry: the owned collection of tracked zone+version records.
//!
//! Every record binds a `(zone_slug, no)` identity to a root directory.
//! The registry is the single source of truth for which directories matter:
//! the tree builder walks its roots and the event normalizer resolves raw
//! paths against it. Records keep their registration slot across updates so
//! query order is stable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resolver::PathResolver;

/// One tracked documentation version.
///
/// `absolute_path` is always derived from `location` through the resolver
/// and recomputed whenever `location` changes; it is never stored stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub zone_slug: String,
    pub no: String,
    pub location: String,
    pub absolute_path: PathBuf,
    /// True once the version's root has been walked successfully. Never
    /// reset automatically, not even when a re-add moves `location`.
    pub scanned: bool,
}

impl Version {
    /// Identity check: versions are identified by `(zone_slug, no)`.
    pub fn is(&self, zone_slug: &str, no: &str) -> bool {
        self.zone_slug == zone_slug && self.no == no
    }
}

/// Input shape for registering a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpec {
    pub no: String,
    pub location: String,
}

impl VersionSpec {
    pub fn new(no: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            no: no.into(),
            location: location.into(),
        }
    }
}

/// Outcome of a removal, reported so the caller can decide whether the
/// physical directory should stop being watched.
#[derive(Debug, Clone)]
pub struct RemovedVersion {
    pub version: Version,
    /// True when another surviving record resolves to the same
    /// `absolute_path`. Unwatching the path would break that record.
    pub shared_location: bool,
}

/// Owned, ordered collection of [`Version`] records.
#[derive(Debug)]
pub struct VersionRegistry {
    resolver: PathResolver,
    versions: Vec<Version>,
}

impl VersionRegistry {
    /// Create an empty registry resolving locations through `resolver`.
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            versions: Vec::new(),
        }
    }

    /// Register a version, or merge into the existing record with the same
    /// `(zone_slug, no)` identity.
    ///
    /// Validates that `no` and `location` are non-empty. On merge the
    /// record keeps its slot in registration order and its `scanned` flag;
    /// `location` is overwritten and `absolute_path` recomputed. Returns a
    /// clone of the stored record.
    pub fn add(&mut self, zone_slug: &str, spec: VersionSpec) -> Result<Version> {
        if spec.no.is_empty() {
            return Err(Error::InvalidVersion {
                zone: zone_slug.to_string(),
                field: "no",
            });
        }
        if spec.location.is_empty() {
            return Err(Error::InvalidVersion {
                zone: zone_slug.to_string(),
                field: "location",
            });
        }

        let absolute_path = self.resolver.version_root(&spec.location);

        if let Some(existing) = self
            .versions
            .iter_mut()
            .find(|v| v.is(zone_slug, &spec.no))
        {
            tracing::debug!(
                "[registry] updating existing version {} in zone '{zone_slug}'",
                spec.no
            );
            existing.location = spec.location;
            existing.absolute_path = absolute_path;
            return Ok(existing.clone());
        }

        tracing::debug!("[registry] adding version {} to zone '{zone_slug}'", spec.no);
        let version = Version {
            zone_slug: zone_slug.to_string(),
            no: spec.no,
            location: spec.location,
            absolute_path,
            scanned: false,
        };
        self.versions.push(version.clone());
        Ok(version)
    }

    /// Remove the record with the given identity.
    ///
    /// Absent records are a no-op (`None`). The returned
    /// [`RemovedVersion::shared_location`] tells the caller whether any
    /// *other* surviving record still resolves to the removed record's
    /// root.
    pub fn remove(&mut self, zone_slug: &str, no: &str) -> Option<RemovedVersion> {
        let idx = self.versions.iter().position(|v| v.is(zone_slug, no))?;
        let version = self.versions.remove(idx);
        let shared_location = self
            .versions
            .iter()
            .any(|v| v.absolute_path == version.absolute_path);

        tracing::debug!(
            "[registry] removed version {no} from zone '{zone_slug}' (shared location: {shared_location})"
        );
        Some(RemovedVersion {
            version,
            shared_location,
        })
    }

    /// Look up a record by `(zone_slug, no)` identity.
    pub fn find_by_identity(&self, zone_slug: &str, no: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.is(zone_slug, no))
    }

    /// Every record whose root directory *is* `path`, in registration
    /// order. Aliased directories across zones all match; they are never
    /// collapsed to one.
    pub fn find_all_by_absolute_path(&self, path: &Path) -> Vec<Version> {
        self.versions
            .iter()
            .filter(|v| v.absolute_path == path)
            .cloned()
            .collect()
    }

    /// Every record whose root directory is a strict ancestor of `path`,
    /// in registration order.
    ///
    /// Containment is component-wise, so `docs/master` does not contain
    /// `docs/masternew/intro.md`, and a path equal to the root itself does
    /// not match.
    pub fn find_all_containing(&self, path: &Path) -> Vec<Version> {
        self.versions
            .iter()
            .filter(|v| path.starts_with(&v.absolute_path) && path != v.absolute_path)
            .cloned()
            .collect()
    }

    /// Snapshot of all records in registration order.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Absolute root directories to watch, de-duplicated in first-seen
    /// order. The config file is not part of this set; the session adds it.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for version in &self.versions {
            if !roots.contains(&version.absolute_path) {
                roots.push(version.absolute_path.clone());
            }
        }
        roots
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Flag a version as walked. No-op if the record was removed in the
    /// meantime.
    pub(crate) fn mark_scanned(&mut self, zone_slug: &str, no: &str) {
        if let Some(version) = self.versions.iter_mut().find(|v| v.is(zone_slug, no)) {
            version.scanned = true;
        }
    }
}
