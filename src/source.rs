//! Note discovery and reading. The builder consumes a [NoteSource]
//! collaborator so test suites can feed it in-memory fixtures; [FsSource]
//! is the filesystem implementation used in production.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use walkdir::{DirEntry, WalkDir};

use crate::error::MnemaError;

/// Listing and reading of note documents.
///
/// Paths are the engine's canonical form: `/`-separated, rooted at the
/// source's base directory with a leading `/`, extension included. Path
/// stability is what makes note ids stable, so implementations must return
/// the same path for the same document on every build.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// Every markdown document under the source, in canonical form.
    async fn list(&self) -> Result<Vec<String>, MnemaError>;

    /// Full text of one document.
    async fn read(&self, path: &str) -> Result<String, MnemaError>;

    /// `(created, last_modified)` for one document.
    async fn timestamps(&self, path: &str) -> Result<(SystemTime, SystemTime), MnemaError>;
}

/// [NoteSource] over a directory tree. Hidden directories are skipped and
/// only `.md` files are surfaced.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn canonical(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in relative.components() {
            out.push('/');
            out.push_str(component.as_os_str().to_str()?);
        }
        Some(out)
    }

    fn on_disk(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl NoteSource for FsSource {
    async fn list(&self) -> Result<Vec<String>, MnemaError> {
        fn is_hidden(entry: &DirEntry) -> bool {
            entry
                .file_name()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
        }
        let mut paths: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !is_hidden(e) || e.path() == self.root)
            .filter_map(|e| e.ok().map(|e| e.into_path()))
            .filter(|p| p.is_file() && p.extension().map(|ext| ext == "md").unwrap_or(false))
            .filter_map(|p| self.canonical(&p))
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn read(&self, path: &str) -> Result<String, MnemaError> {
        Ok(tokio::fs::read_to_string(self.on_disk(path)).await?)
    }

    async fn timestamps(&self, path: &str) -> Result<(SystemTime, SystemTime), MnemaError> {
        let meta = tokio::fs::metadata(self.on_disk(path)).await?;
        let modified = meta.modified()?;
        // Some filesystems do not record a birth time; fall back to the
        // modification time so `created <= last_modified` still holds.
        let created = meta.created().unwrap_or(modified);
        Ok((created, modified))
    }
}
