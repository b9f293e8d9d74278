//! Filesystem watching for tracked documentation versions.
//!
//! The pipeline has three stages:
//!
//! ```text
//! NotifyBackend          EventNormalizer            WatchSession::run
//!   raw notify events -->  decision table        -->  ordered delivery
//!   (RawEvent)             (version resolution)      (EventSink)
//! ```
//!
//! The backend is a trait so the pipeline can be driven by a scripted
//! event source in tests; [`SessionHandle`] is the shared control surface
//! for growing, shrinking, and closing the watched set.

mod backend;
pub mod event;
mod normalizer;
mod session;

pub use backend::{NotifyBackend, WatchBackend};
pub use event::{Event, FsEventKind, RawEvent};
pub use normalizer::{EventNormalizer, Normalized};
pub use session::{EventSink, SessionHandle, WatchSession};
