//! Low-level watch backends.
//!
//! [`WatchBackend`] is the seam between the session and whatever actually
//! observes the filesystem. The production implementation wraps
//! `notify::RecommendedWatcher` and bridges its callback thread into a
//! tokio channel; tests substitute a recording fake and feed the channel
//! by hand.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::watcher::event::{FsEventKind, RawEvent};

/// Dynamic control over a running watch: add a path, drop a path, stop.
///
/// Implementations emit their events through the channel handed out at
/// construction; closing must end that stream so the delivery loop can
/// finish.
pub trait WatchBackend: Send {
    fn watch(&mut self, path: &Path) -> Result<()>;
    fn unwatch(&mut self, path: &Path) -> Result<()>;
    fn close(&mut self);
}

/// `notify`-backed watch over a set of version roots plus the config file.
pub struct NotifyBackend {
    /// Dropping the watcher deregisters the OS watch and closes the event
    /// channel, so `close` just takes it.
    watcher: Option<notify::RecommendedWatcher>,
}

impl NotifyBackend {
    /// Start watching `paths` recursively.
    ///
    /// Returns the backend plus the receiving end of the raw event stream.
    /// Paths that cannot be watched (typically: not yet created) are
    /// logged and skipped rather than failing the whole session. A
    /// [`RawEvent::Ready`] is queued once registration is done.
    pub fn start(paths: &[PathBuf], capacity: usize) -> Result<(Self, mpsc::Receiver<RawEvent>)> {
        let (tx, rx) = mpsc::channel(capacity);

        let event_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                for raw in classify(res) {
                    let _ = event_tx.blocking_send(raw);
                }
            })?;

        for path in paths {
            match watcher.watch(path, RecursiveMode::Recursive) {
                Ok(()) => tracing::debug!("[watcher] watching {}", path.display()),
                Err(e) => {
                    tracing::warn!("[watcher] failed to watch {}: {e}", path.display());
                }
            }
        }

        // The channel is empty at this point, so this cannot fail on
        // capacity; a send after close is impossible because we still hold
        // the receiver.
        let _ = tx.try_send(RawEvent::Ready);

        Ok((
            Self {
                watcher: Some(watcher),
            },
            rx,
        ))
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<()> {
        match &mut self.watcher {
            Some(watcher) => {
                watcher.watch(path, RecursiveMode::Recursive)?;
                Ok(())
            }
            None => Err(Error::SessionClosed),
        }
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        match &mut self.watcher {
            Some(watcher) => {
                watcher.unwatch(path)?;
                Ok(())
            }
            None => Err(Error::SessionClosed),
        }
    }

    fn close(&mut self) {
        // Dropping the watcher drops the callback and with it the last
        // sender clone; the delivery loop sees the channel end.
        self.watcher = None;
    }
}

/// Map one notify event onto the raw vocabulary.
///
/// Notify reports renames as `Modify(Name(..))`; the two endpoints become
/// an unlink and an add. Metadata-only changes and access events carry no
/// content signal and are dropped here, before normalization.
fn classify(res: notify::Result<notify::Event>) -> Vec<RawEvent> {
    let event = match res {
        Ok(event) => event,
        Err(e) => return vec![RawEvent::Error(e.into())],
    };

    let kind = match event.kind {
        EventKind::Create(CreateKind::Folder) => FsEventKind::AddDir,
        EventKind::Create(_) => FsEventKind::Add,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut out = Vec::new();
            if let Some(from) = paths.next() {
                out.push(RawEvent::Fs {
                    kind: FsEventKind::Unlink,
                    path: from,
                });
            }
            if let Some(to) = paths.next() {
                out.push(RawEvent::Fs {
                    kind: FsEventKind::Add,
                    path: to,
                });
            }
            return out;
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FsEventKind::Unlink,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FsEventKind::Add,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => FsEventKind::Change,
        EventKind::Remove(RemoveKind::Folder) => FsEventKind::UnlinkDir,
        EventKind::Remove(_) => FsEventKind::Unlink,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| RawEvent::Fs { kind, path })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;

    fn fs_event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    fn classified_kind(kind: EventKind) -> FsEventKind {
        let raws = classify(Ok(fs_event(kind, "/site/docs/intro.md")));
        assert_eq!(raws.len(), 1);
        match &raws[0] {
            RawEvent::Fs { kind, .. } => *kind,
            other => panic!("expected fs event, got {other:?}"),
        }
    }

    #[test]
    fn test_create_splits_on_folder_kind() {
        assert_eq!(
            classified_kind(EventKind::Create(CreateKind::File)),
            FsEventKind::Add
        );
        assert_eq!(
            classified_kind(EventKind::Create(CreateKind::Any)),
            FsEventKind::Add
        );
        assert_eq!(
            classified_kind(EventKind::Create(CreateKind::Folder)),
            FsEventKind::AddDir
        );
    }

    #[test]
    fn test_remove_splits_on_folder_kind() {
        assert_eq!(
            classified_kind(EventKind::Remove(RemoveKind::File)),
            FsEventKind::Unlink
        );
        assert_eq!(
            classified_kind(EventKind::Remove(RemoveKind::Any)),
            FsEventKind::Unlink
        );
        assert_eq!(
            classified_kind(EventKind::Remove(RemoveKind::Folder)),
            FsEventKind::UnlinkDir
        );
    }

    #[test]
    fn test_data_modification_maps_to_change() {
        assert_eq!(
            classified_kind(EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            FsEventKind::Change
        );
        assert_eq!(
            classified_kind(EventKind::Modify(ModifyKind::Any)),
            FsEventKind::Change
        );
    }

    #[test]
    fn test_rename_endpoints_become_unlink_and_add() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/site/docs/old.md"))
            .add_path(PathBuf::from("/site/docs/new.md"));

        let raws = classify(Ok(event));
        assert_eq!(raws.len(), 2);
        assert!(matches!(
            &raws[0],
            RawEvent::Fs {
                kind: FsEventKind::Unlink,
                path,
            } if path.ends_with("old.md")
        ));
        assert!(matches!(
            &raws[1],
            RawEvent::Fs {
                kind: FsEventKind::Add,
                path,
            } if path.ends_with("new.md")
        ));
    }

    #[test]
    fn test_noise_kinds_are_dropped() {
        use notify::event::{AccessKind, MetadataKind};

        let access = classify(Ok(fs_event(
            EventKind::Access(AccessKind::Read),
            "/site/docs/intro.md",
        )));
        assert!(access.is_empty());

        let metadata = classify(Ok(fs_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            "/site/docs/intro.md",
        )));
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_backend_errors_pass_through() {
        let raws = classify(Err(notify::Error::generic("inotify limit reached")));
        assert_eq!(raws.len(), 1);
        assert!(matches!(&raws[0], RawEvent::Error(_)));
    }

    #[test]
    fn test_multi_path_events_fan_out() {
        let event = notify::Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/site/docs/a.md"))
            .add_path(PathBuf::from("/site/docs/b.md"));

        let raws = classify(Ok(event));
        assert_eq!(raws.len(), 2);
    }
}
