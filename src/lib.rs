pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod tree;
pub mod watcher;

pub use client::Client;
pub use config::Settings;
pub use document::{Document, DocumentParser};
pub use error::{Error, Result};
pub use registry::{RemovedVersion, Version, VersionRegistry, VersionSpec};
pub use resolver::PathResolver;
pub use tree::{TreeBuilder, VersionFiles, VersionTree};
pub use watcher::{
    Event, EventNormalizer, EventSink, FsEventKind, NotifyBackend, RawEvent, SessionHandle,
    WatchBackend, WatchSession,
};
