//! The external markdown parser seam.
//!
//! Parsing markdown is not this crate's business: the host supplies a
//! [`DocumentParser`] and the tracker only ever sees the resulting
//! [`Document`]. Parse failures propagate unchanged through the
//! [`Error::Parse`](crate::Error::Parse) wrapper.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A parsed markdown document. Immutable once produced.
///
/// `base_name` is the file's path relative to its version root, which is
/// what rendered-output pipelines key on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub base_name: String,
    pub file_path: PathBuf,
}

impl Document {
    /// Derive the document identity fields from a file path and the version
    /// root it was found under. Falls back to the bare filename when the
    /// path is not actually under `root`.
    pub fn from_paths(path: &Path, root: &Path) -> Self {
        let base_name = match path.strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        Self {
            base_name,
            file_path: path.to_path_buf(),
        }
    }
}

/// Capability that turns an eligible markdown file into a [`Document`].
///
/// `root` is the absolute root of the version the file belongs to, so
/// implementations can compute root-relative names and resolve intra-doc
/// links. Errors are the implementation's own (`anyhow`), propagated
/// without retry.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, path: &Path, root: &Path) -> anyhow::Result<Document>;
}
