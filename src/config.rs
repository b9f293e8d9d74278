//! Configuration for the version tracker.
//!
//! Settings are plain data with serde defaults; hosts that keep their own
//! config files can deserialize a `[docsync]` section straight into
//! [`Settings`]. Nothing here reads the filesystem.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable knobs shared by the tree builder and the event pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// File extensions treated as markdown sources, without the leading dot.
    #[serde(default = "default_markdown_extensions")]
    pub markdown_extensions: Vec<String>,

    /// Capacity of the channel bridging the watch backend into the
    /// delivery loop.
    #[serde(default = "default_watch_channel_capacity")]
    pub watch_channel_capacity: usize,
}

// Default value functions
fn default_markdown_extensions() -> Vec<String> {
    vec![
        "md".to_string(),
        "markdown".to_string(),
        "mkd".to_string(),
        "mkdown".to_string(),
    ]
}

fn default_watch_channel_capacity() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            markdown_extensions: default_markdown_extensions(),
            watch_channel_capacity: default_watch_channel_capacity(),
        }
    }
}

impl Settings {
    /// Whether the path carries one of the configured markdown extensions.
    pub fn is_markdown(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.markdown_extensions.iter().any(|m| m == ext))
    }

    /// The eligibility test applied to files found by walks and to file
    /// events: markdown extension, and the leaf filename itself must not
    /// start with an underscore. Underscore-prefixed *directories* do not
    /// disqualify the files nested under them.
    pub fn is_eligible(&self, path: &Path) -> bool {
        if !self.is_markdown(path) {
            return false;
        }
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| !name.starts_with('_'))
    }
}
