//! Raw and normalized event types.
//!
//! The backend contract is the small `(kind, path)` vocabulary in
//! [`RawEvent`]; everything a consumer sees is the tagged [`Event`] union,
//! one payload shape per variant. [`Event::name`] exposes the wire-style
//! names (`add:doc`, `unlink:version`, ...) for hosts that log or relay
//! events by name.

use std::path::PathBuf;

use crate::document::Document;
use crate::error::Error;
use crate::registry::Version;

/// Kind of a raw filesystem event, as reported by the watch backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// A file appeared.
    Add,
    /// A file's contents changed.
    Change,
    /// A file disappeared.
    Unlink,
    /// A directory appeared.
    AddDir,
    /// A directory disappeared.
    UnlinkDir,
}

impl FsEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsEventKind::Add => "add",
            FsEventKind::Change => "change",
            FsEventKind::Unlink => "unlink",
            FsEventKind::AddDir => "addDir",
            FsEventKind::UnlinkDir => "unlinkDir",
        }
    }
}

/// What the watch backend feeds into the delivery loop.
#[derive(Debug)]
pub enum RawEvent {
    /// A filesystem change at `path`.
    Fs { kind: FsEventKind, path: PathBuf },
    /// The backend finished registering its initial paths.
    Ready,
    /// The backend itself failed; passed through to the consumer.
    Error(Error),
}

/// A normalized, version-scoped domain event.
#[derive(Debug)]
pub enum Event {
    /// The watched configuration file changed in some way. Config events
    /// short-circuit normalization: no eligibility or version resolution
    /// applies to them.
    Config { kind: FsEventKind, path: PathBuf },

    /// An eligible file appeared under the given versions' shared root.
    DocAdded { versions: Vec<Version>, doc: Document },

    /// An eligible file changed under the given versions' shared root.
    DocChanged { versions: Vec<Version>, doc: Document },

    /// An eligible file disappeared. `base_name` is relative to the first
    /// matching version's root.
    DocRemoved {
        versions: Vec<Version>,
        base_name: String,
    },

    /// A directory that was the exact root of these versions disappeared;
    /// the records have already been dropped from the registry.
    VersionsRemoved { versions: Vec<Version> },

    /// An untracked directory disappeared somewhere under a watched tree.
    /// Passed through as a low-level signal.
    DirRemoved { path: PathBuf },

    /// Initial backend scan finished.
    Ready,

    /// A per-event failure: untracked path, parse error, backend error, or
    /// a sink failure being redelivered. The stream continues after it.
    Error(Error),
}

impl Event {
    /// Wire-style event name, matching the names documentation hosts key
    /// their handlers on.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Config { kind, .. } => match kind {
                FsEventKind::Add => "add:config",
                FsEventKind::Change => "change:config",
                FsEventKind::Unlink => "unlink:config",
                FsEventKind::AddDir => "addDir:config",
                FsEventKind::UnlinkDir => "unlinkDir:config",
            },
            Event::DocAdded { .. } => "add:doc",
            Event::DocChanged { .. } => "change:doc",
            Event::DocRemoved { .. } => "unlink:doc",
            Event::VersionsRemoved { .. } => "unlink:version",
            Event::DirRemoved { .. } => "unlinkDir",
            Event::Ready => "ready",
            Event::Error(_) => "error",
        }
    }
}
