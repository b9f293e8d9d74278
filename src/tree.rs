//! Builds per-version content trees from the registry's roots.
//!
//! The tree is rebuilt wholesale on every call rather than maintained
//! incrementally; live maintenance is the watch pipeline's job. Versions
//! are built concurrently and joined fail-fast, so one missing root or
//! broken file aborts the whole aggregate instead of returning partial
//! results.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::RwLock;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::document::{Document, DocumentParser};
use crate::error::{Error, Result};
use crate::registry::{Version, VersionRegistry};

/// One version's eligible file paths, in filesystem walk order.
#[derive(Debug, Clone, Serialize)]
pub struct VersionFiles {
    pub version: Version,
    pub files: Vec<PathBuf>,
}

/// One version's parsed documents, in filesystem walk order.
#[derive(Debug, Clone, Serialize)]
pub struct VersionTree {
    pub version: Version,
    pub docs: Vec<Document>,
}

/// Walks version roots and parses their eligible files.
#[derive(Clone)]
pub struct TreeBuilder {
    registry: Arc<RwLock<VersionRegistry>>,
    settings: Arc<Settings>,
    parser: Arc<dyn DocumentParser>,
}

impl TreeBuilder {
    pub fn new(
        registry: Arc<RwLock<VersionRegistry>>,
        settings: Arc<Settings>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            registry,
            settings,
            parser,
        }
    }

    /// Eligible files under one version's root.
    ///
    /// Fails if the root directory is missing, naming the version and its
    /// configured location. On success the version is marked scanned.
    pub fn files_for(&self, version: &Version) -> Result<Vec<PathBuf>> {
        if !version.absolute_path.is_dir() {
            return Err(Error::MissingRoot {
                no: version.no.clone(),
                location: version.location.clone(),
                path: version.absolute_path.clone(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&version.absolute_path) {
            let entry = entry.map_err(|source| Error::Walk {
                path: version.absolute_path.clone(),
                source,
            })?;
            if entry.file_type().is_file() && self.settings.is_eligible(entry.path()) {
                files.push(entry.into_path());
            }
        }

        tracing::debug!(
            "[tree] walked {}: {} eligible files",
            version.absolute_path.display(),
            files.len()
        );
        self.registry
            .write()
            .mark_scanned(&version.zone_slug, &version.no);
        Ok(files)
    }

    /// Walk and parse one version. Parse failures carry the file path and
    /// abort the version.
    pub async fn tree_for(&self, version: &Version) -> Result<VersionTree> {
        let files = self.files_for(version)?;
        let mut docs = Vec::with_capacity(files.len());
        for path in files {
            let doc = self
                .parser
                .parse(&path, &version.absolute_path)
                .await
                .map_err(|source| Error::Parse { path, source })?;
            docs.push(doc);
        }
        Ok(VersionTree {
            version: version.clone(),
            docs,
        })
    }

    /// Eligible file lists for every registered version, in registration
    /// order. The first failing version aborts the aggregate.
    pub async fn files_tree(&self) -> Result<Vec<VersionFiles>> {
        let versions = self.snapshot();
        try_join_all(versions.into_iter().map(|version| async move {
            let files = self.files_for(&version)?;
            Ok(VersionFiles { version, files })
        }))
        .await
    }

    /// Parsed trees for every registered version, in registration order.
    pub async fn tree(&self) -> Result<Vec<VersionTree>> {
        let versions = self.snapshot();
        try_join_all(
            versions
                .into_iter()
                .map(|version| async move { self.tree_for(&version).await }),
        )
        .await
    }

    /// Parsed trees for versions that have never been walked, in
    /// registration order. Versions registered while a watch session is
    /// already live get their initial tree through this.
    pub async fn refresh(&self) -> Result<Vec<VersionTree>> {
        let versions: Vec<Version> = self
            .snapshot()
            .into_iter()
            .filter(|version| !version.scanned)
            .collect();
        try_join_all(
            versions
                .into_iter()
                .map(|version| async move { self.tree_for(&version).await }),
        )
        .await
    }

    fn snapshot(&self) -> Vec<Version> {
        self.registry.read().versions().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VersionSpec;
    use crate::resolver::PathResolver;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct StubParser;

    #[async_trait]
    impl DocumentParser for StubParser {
        async fn parse(&self, path: &Path, root: &Path) -> anyhow::Result<Document> {
            Ok(Document::from_paths(path, root))
        }
    }

    struct FailingParser;

    #[async_trait]
    impl DocumentParser for FailingParser {
        async fn parse(&self, _path: &Path, _root: &Path) -> anyhow::Result<Document> {
            Err(anyhow::anyhow!("unterminated code fence"))
        }
    }

    fn write_file(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "# heading\n").unwrap();
    }

    fn builder_with_parser(
        base: &TempDir,
        versions: &[(&str, &str, &str)],
        parser: Arc<dyn DocumentParser>,
    ) -> (TreeBuilder, Arc<RwLock<VersionRegistry>>) {
        let mut registry = VersionRegistry::new(PathResolver::new(base.path(), "dimer.json"));
        for (zone, no, location) in versions {
            registry.add(zone, VersionSpec::new(*no, *location)).unwrap();
        }
        let registry = Arc::new(RwLock::new(registry));
        let builder = TreeBuilder::new(
            Arc::clone(&registry),
            Arc::new(Settings::default()),
            parser,
        );
        (builder, registry)
    }

    fn builder(
        base: &TempDir,
        versions: &[(&str, &str, &str)],
    ) -> (TreeBuilder, Arc<RwLock<VersionRegistry>>) {
        builder_with_parser(base, versions, Arc::new(StubParser))
    }

    fn base_names(tree: &VersionTree) -> Vec<&str> {
        let mut names: Vec<&str> = tree.docs.iter().map(|d| d.base_name.as_str()).collect();
        names.sort_unstable();
        names
    }

    #[tokio::test]
    async fn test_files_for_collects_only_eligible_files() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("docs/master");
        write_file(&root.join("intro.md"));
        write_file(&root.join("guide.markdown"));
        write_file(&root.join("notes.txt"));
        write_file(&root.join("_hidden.md"));
        write_file(&root.join("_draft/inner.md"));
        write_file(&root.join("sub/deep.mkdown"));

        let (builder, registry) = builder(&base, &[("guides", "1.0.0", "docs/master")]);
        let version = registry.read().versions()[0].clone();

        let mut files = builder.files_for(&version).unwrap();
        files.sort_unstable();

        assert_eq!(
            files,
            vec![
                root.join("_draft/inner.md"),
                root.join("guide.markdown"),
                root.join("intro.md"),
                root.join("sub/deep.mkdown"),
            ],
            "underscore directories do not exclude nested files; \
             underscore filenames and foreign extensions do"
        );
        assert!(
            registry.read().versions()[0].scanned,
            "successful walk marks the version scanned"
        );
    }

    #[tokio::test]
    async fn test_ineligible_files_never_affect_the_files_tree() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("docs/master");
        write_file(&root.join("intro.md"));

        let (builder, _registry) = builder(&base, &[("guides", "1.0.0", "docs/master")]);
        let before = builder.files_tree().await.unwrap();

        write_file(&root.join("notes.txt"));
        write_file(&root.join("_scratch.md"));
        let with_noise = builder.files_tree().await.unwrap();
        assert_eq!(with_noise[0].files, before[0].files);

        fs::remove_file(root.join("notes.txt")).unwrap();
        fs::remove_file(root.join("_scratch.md")).unwrap();
        let after = builder.files_tree().await.unwrap();
        assert_eq!(after[0].files, before[0].files);
    }

    #[tokio::test]
    async fn test_missing_root_fails_naming_version_and_location() {
        let base = TempDir::new().unwrap();
        let (builder, _registry) = builder(&base, &[("guides", "1.0.0", "docs/1.0.0")]);

        let err = builder.tree().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1.0.0"), "message: {message}");
        assert!(message.contains("docs/1.0.0"), "message: {message}");
    }

    #[tokio::test]
    async fn test_files_tree_keeps_registration_order() {
        let base = TempDir::new().unwrap();
        write_file(&base.path().join("docs/master/intro.md"));
        write_file(&base.path().join("docs/legacy/old.md"));
        write_file(&base.path().join("docs/legacy/older.md"));

        let (builder, _registry) = builder(
            &base,
            &[
                ("guides", "2.0.0", "docs/master"),
                ("guides", "1.0.0", "docs/legacy"),
            ],
        );

        let trees = builder.files_tree().await.unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].version.no, "2.0.0");
        assert_eq!(trees[0].files.len(), 1);
        assert_eq!(trees[1].version.no, "1.0.0");
        assert_eq!(trees[1].files.len(), 2);
    }

    #[tokio::test]
    async fn test_tree_parses_every_eligible_file() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("docs/master");
        write_file(&root.join("intro.md"));
        write_file(&root.join("guides/install.md"));

        let (builder, _registry) = builder(&base, &[("guides", "1.0.0", "docs/master")]);

        let trees = builder.tree().await.unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(base_names(&trees[0]), ["guides/install.md", "intro.md"]);
    }

    #[tokio::test]
    async fn test_one_missing_root_fails_the_whole_aggregate() {
        let base = TempDir::new().unwrap();
        write_file(&base.path().join("docs/master/intro.md"));

        let (builder, _registry) = builder(
            &base,
            &[
                ("guides", "1.0.0", "docs/master"),
                ("guides", "2.0.0", "docs/unreleased"),
            ],
        );

        let err = builder.tree().await.unwrap_err();
        assert!(matches!(err, Error::MissingRoot { .. }));
    }

    #[tokio::test]
    async fn test_parse_failure_fails_the_aggregate_with_the_file_path() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("docs/master");
        write_file(&root.join("broken.md"));

        let (builder, _registry) = builder_with_parser(
            &base,
            &[("guides", "1.0.0", "docs/master")],
            Arc::new(FailingParser),
        );

        let err = builder.tree().await.unwrap_err();
        match err {
            Error::Parse { path, source } => {
                assert_eq!(path, root.join("broken.md"));
                assert!(source.to_string().contains("unterminated code fence"));
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_builds_only_unscanned_versions() {
        let base = TempDir::new().unwrap();
        write_file(&base.path().join("docs/master/intro.md"));
        write_file(&base.path().join("docs/next/preview.md"));

        let (builder, registry) = builder(&base, &[("guides", "1.0.0", "docs/master")]);
        builder.tree().await.unwrap();

        registry
            .write()
            .add("guides", VersionSpec::new("2.0.0", "docs/next"))
            .unwrap();

        let trees = builder.refresh().await.unwrap();
        assert_eq!(trees.len(), 1, "already-scanned versions are skipped");
        assert_eq!(trees[0].version.no, "2.0.0");
        assert_eq!(base_names(&trees[0]), ["preview.md"]);

        assert!(
            builder.refresh().await.unwrap().is_empty(),
            "a second refresh has nothing left to build"
        );
    }
}
