//! Turns raw filesystem events into version-scoped domain events.
//!
//! The normalizer owns the decision table of the event pipeline, evaluated
//! strictly in order:
//!
//! 1. config-file path: short-circuits everything, whatever the kind
//! 2. backend errors and the ready signal: passed through untouched
//! 3. ignore predicate: only add/change/unlink/unlinkDir survive, and the
//!    three file kinds must also pass the markdown eligibility test
//! 4. unlinkDir: exact root matches become version removals, everything
//!    else passes through as a low-level signal
//! 5. unlink: resolved against containing versions
//! 6. add/change: resolved against containing versions, then parsed
//!
//! Failures (untracked path, parse error) are returned as `Err` and the
//! session decides how to surface them; removal side-effects come back in
//! [`Normalized::unwatch`] so the session can shrink the backend's watch
//! set.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Settings;
use crate::document::DocumentParser;
use crate::error::{Error, Result};
use crate::registry::VersionRegistry;
use crate::resolver::PathResolver;
use crate::watcher::event::{Event, FsEventKind, RawEvent};

/// A normalized event plus the paths the session should stop watching
/// because the versions rooted there are gone.
#[derive(Debug)]
pub struct Normalized {
    pub event: Event,
    pub unwatch: Vec<PathBuf>,
}

impl Normalized {
    fn event(event: Event) -> Self {
        Self {
            event,
            unwatch: Vec::new(),
        }
    }
}

/// Classifies raw watch events and resolves them against the registry.
pub struct EventNormalizer {
    registry: Arc<RwLock<VersionRegistry>>,
    settings: Arc<Settings>,
    resolver: PathResolver,
    parser: Arc<dyn DocumentParser>,
}

impl EventNormalizer {
    pub fn new(
        registry: Arc<RwLock<VersionRegistry>>,
        settings: Arc<Settings>,
        resolver: PathResolver,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            registry,
            settings,
            resolver,
            parser,
        }
    }

    /// Run one raw event through the decision table.
    ///
    /// `Ok(None)` means the event was ignored. `Err` means normalization
    /// failed for this single event; the stream is expected to continue.
    pub async fn normalize(&self, raw: RawEvent) -> Result<Option<Normalized>> {
        match raw {
            RawEvent::Fs { kind, path } => {
                tracing::debug!("[watcher] {} {}", kind.as_str(), path.display());

                if path == self.resolver.config_file() {
                    return Ok(Some(Normalized::event(Event::Config { kind, path })));
                }

                match kind {
                    // Never ignored on the basis of extension; a version
                    // root rarely looks like a markdown file.
                    FsEventKind::UnlinkDir => Ok(Some(self.dir_removed(path))),
                    FsEventKind::Unlink if self.settings.is_eligible(&path) => {
                        self.doc_removed(path).map(|e| Some(Normalized::event(e)))
                    }
                    FsEventKind::Add | FsEventKind::Change
                        if self.settings.is_eligible(&path) =>
                    {
                        self.doc_upserted(kind, path)
                            .await
                            .map(|e| Some(Normalized::event(e)))
                    }
                    // addDir, plus file events for ineligible paths.
                    _ => Ok(None),
                }
            }
            RawEvent::Ready => Ok(Some(Normalized::event(Event::Ready))),
            RawEvent::Error(e) => Ok(Some(Normalized::event(Event::Error(e)))),
        }
    }

    /// A directory disappeared. If it was the exact root of one or more
    /// versions, those versions are removed from the registry; otherwise
    /// the event passes through untouched.
    ///
    /// The check is deliberately exact-match, not containment: a removed
    /// directory that merely sits above tracked roots must not unwatch
    /// unrelated versions.
    fn dir_removed(&self, path: PathBuf) -> Normalized {
        let mut registry = self.registry.write();
        let matches = registry.find_all_by_absolute_path(&path);
        if matches.is_empty() {
            return Normalized::event(Event::DirRemoved { path });
        }

        let mut versions = Vec::with_capacity(matches.len());
        let mut unwatch = Vec::new();
        for version in matches {
            if let Some(removal) = registry.remove(&version.zone_slug, &version.no) {
                if !removal.shared_location && !unwatch.contains(&removal.version.absolute_path) {
                    unwatch.push(removal.version.absolute_path.clone());
                }
                versions.push(removal.version);
            }
        }

        tracing::debug!(
            "[watcher] version root removed: {} ({} versions)",
            path.display(),
            versions.len()
        );
        Normalized {
            event: Event::VersionsRemoved { versions },
            unwatch,
        }
    }

    /// An eligible file disappeared under some tracked root.
    fn doc_removed(&self, path: PathBuf) -> Result<Event> {
        let versions = self.registry.read().find_all_containing(&path);
        let Some(first) = versions.first() else {
            return Err(Error::UntrackedPath { path });
        };

        let base_name = match path.strip_prefix(&first.absolute_path) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        };
        Ok(Event::DocRemoved {
            versions,
            base_name,
        })
    }

    /// An eligible file appeared or changed; parse it against the first
    /// matching version's root. Versions sharing a file share an identical
    /// root, so the choice of first is immaterial.
    async fn doc_upserted(&self, kind: FsEventKind, path: PathBuf) -> Result<Event> {
        let (versions, root) = {
            let registry = self.registry.read();
            let versions = registry.find_all_containing(&path);
            let Some(first) = versions.first() else {
                return Err(Error::UntrackedPath { path });
            };
            let root = first.absolute_path.clone();
            (versions, root)
        };

        let doc = self
            .parser
            .parse(&path, &root)
            .await
            .map_err(|source| Error::Parse {
                path: path.clone(),
                source,
            })?;

        Ok(match kind {
            FsEventKind::Add => Event::DocAdded { versions, doc },
            _ => Event::DocChanged { versions, doc },
        })
    }
}
