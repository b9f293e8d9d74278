//! The host-facing facade.
//!
//! A [`Client`] ties the pieces together: it owns the registry, builds
//! content trees on demand, and runs at most one live watch session whose
//! events land in the host's [`EventSink`]. Version mutations made while a
//! session is active keep the watched set in sync automatically.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::document::DocumentParser;
use crate::error::Result;
use crate::registry::{RemovedVersion, Version, VersionRegistry, VersionSpec};
use crate::resolver::PathResolver;
use crate::tree::{TreeBuilder, VersionFiles, VersionTree};
use crate::watcher::{
    EventNormalizer, EventSink, NotifyBackend, RawEvent, SessionHandle, WatchBackend, WatchSession,
};

/// Tracks documentation versions rooted under one base directory and keeps
/// their content trees synchronized with the filesystem.
pub struct Client {
    resolver: PathResolver,
    settings: Arc<Settings>,
    parser: Arc<dyn DocumentParser>,
    registry: Arc<RwLock<VersionRegistry>>,
    tree: TreeBuilder,
    session: SessionHandle,
    watch_task: Option<JoinHandle<Result<()>>>,
}

impl Client {
    /// Create a client with default [`Settings`].
    ///
    /// `base_dir` anchors every version location; a relative `config_file`
    /// is resolved against it.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self::with_settings(base_dir, config_file, parser, Settings::default())
    }

    pub fn with_settings(
        base_dir: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
        parser: Arc<dyn DocumentParser>,
        settings: Settings,
    ) -> Self {
        let resolver = PathResolver::new(base_dir, config_file);
        let settings = Arc::new(settings);
        let registry = Arc::new(RwLock::new(VersionRegistry::new(resolver.clone())));
        let tree = TreeBuilder::new(
            Arc::clone(&registry),
            Arc::clone(&settings),
            Arc::clone(&parser),
        );
        Self {
            resolver,
            settings,
            parser,
            registry,
            tree,
            session: SessionHandle::new(),
            watch_task: None,
        }
    }

    /// Register a version (or merge into an existing record with the same
    /// identity). While a watch session is active the version's root joins
    /// the watched set; a root that cannot be watched is logged and
    /// skipped, since it may simply not exist yet.
    pub fn add_version(&self, zone_slug: &str, spec: VersionSpec) -> Result<Version> {
        let version = self.registry.write().add(zone_slug, spec)?;
        if self.session.is_active() {
            if let Err(e) = self.session.watch(&version.absolute_path) {
                tracing::warn!(
                    "[watcher] failed to watch {}: {e}",
                    version.absolute_path.display()
                );
            }
        }
        Ok(version)
    }

    /// Merge new fields into an existing version, registering it if absent.
    /// Identical to [`Client::add_version`]; the name matches how hosts
    /// read config updates.
    pub fn update_version(&self, zone_slug: &str, spec: VersionSpec) -> Result<Version> {
        self.add_version(zone_slug, spec)
    }

    /// Drop a version from the registry. The root leaves the watched set
    /// only when no surviving version still resolves to it.
    pub fn remove_version(&self, zone_slug: &str, no: &str) -> Option<RemovedVersion> {
        let removed = self.registry.write().remove(zone_slug, no)?;
        if !removed.shared_location && self.session.is_active() {
            if let Err(e) = self.session.unwatch(&removed.version.absolute_path) {
                tracing::warn!(
                    "[watcher] failed to unwatch {}: {e}",
                    removed.version.absolute_path.display()
                );
            }
        }
        Some(removed)
    }

    /// Snapshot of every tracked version, in registration order.
    pub fn versions(&self) -> Vec<Version> {
        self.registry.read().versions().to_vec()
    }

    /// Per-version eligible file lists. See [`TreeBuilder::files_tree`].
    pub async fn files_tree(&self) -> Result<Vec<VersionFiles>> {
        self.tree.files_tree().await
    }

    /// Per-version parsed document trees. See [`TreeBuilder::tree`].
    pub async fn tree(&self) -> Result<Vec<VersionTree>> {
        self.tree.tree().await
    }

    /// Trees for versions added since the last walk. See
    /// [`TreeBuilder::refresh`].
    pub async fn refresh(&self) -> Result<Vec<VersionTree>> {
        self.tree.refresh().await
    }

    /// Begin live synchronization: watch the config file and every version
    /// root, delivering normalized events to `sink` in arrival order.
    ///
    /// Idempotent while a session is active. After [`Client::stop_watching`]
    /// a fresh session is started. Must be called from within a Tokio
    /// runtime; the delivery loop runs as a spawned task.
    pub fn start_watching<S>(&mut self, sink: S) -> Result<()>
    where
        S: EventSink + 'static,
    {
        if self.session.is_active() {
            return Ok(());
        }
        let mut paths = vec![self.resolver.config_file().to_path_buf()];
        paths.extend(self.registry.read().roots());
        let (backend, events) =
            NotifyBackend::start(&paths, self.settings.watch_channel_capacity)?;
        self.start_session(Box::new(backend), events, sink)
    }

    /// [`Client::start_watching`] with a caller-supplied backend, for
    /// driving the pipeline from a scripted event source.
    pub fn start_watching_with_backend<S>(
        &mut self,
        mut backend: Box<dyn WatchBackend>,
        events: mpsc::Receiver<RawEvent>,
        sink: S,
    ) -> Result<()>
    where
        S: EventSink + 'static,
    {
        if self.session.is_active() {
            backend.close();
            return Ok(());
        }
        self.start_session(backend, events, sink)
    }

    fn start_session<S>(
        &mut self,
        backend: Box<dyn WatchBackend>,
        events: mpsc::Receiver<RawEvent>,
        sink: S,
    ) -> Result<()>
    where
        S: EventSink + 'static,
    {
        if self.session.is_closed() {
            self.session = SessionHandle::new();
        }
        let normalizer = EventNormalizer::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.settings),
            self.resolver.clone(),
            Arc::clone(&self.parser),
        );
        let session = WatchSession::start(&self.session, normalizer, backend, events)?;
        self.watch_task = Some(tokio::spawn(session.run(sink)));
        tracing::info!("[watcher] live synchronization started");
        Ok(())
    }

    /// Close the live session and wait for the delivery loop to finish.
    ///
    /// Returns the loop's terminal error, if it had one (a sink that failed
    /// while handling an error event).
    pub async fn stop_watching(&mut self) -> Result<()> {
        self.session.close();
        if let Some(task) = self.watch_task.take() {
            match task.await {
                Ok(result) => result?,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }
        Ok(())
    }

    /// Whether a live session is currently active.
    pub fn is_watching(&self) -> bool {
        self.session.is_active()
    }

    /// Handle to the current session, usable from other tasks to watch,
    /// unwatch, or close.
    pub fn session_handle(&self) -> SessionHandle {
        self.session.clone()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session.close();
    }
}
