//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;

use mnema_core::{
    history::{RevisionInfo, RevisionLog},
    source::NoteSource,
    MnemaError,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times - subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// Captures formatted log output so a test can assert on emitted warnings.
/// Install with `tracing::subscriber::set_default(capture.subscriber())` and
/// keep the guard alive across the calls under observation.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish()
    }

    pub fn lines_containing(&self, needle: &str) -> usize {
        let bytes = self.buffer.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// In-memory [NoteSource] fixture: canonical path -> document text. All
/// documents share fixed timestamps unless overridden per path.
#[allow(dead_code)]
pub struct MemorySource {
    documents: HashMap<String, String>,
    timestamps: HashMap<String, (SystemTime, SystemTime)>,
}

#[allow(dead_code)]
impl MemorySource {
    pub fn new(documents: &[(&str, &str)]) -> Self {
        MemorySource {
            documents: documents
                .iter()
                .map(|(path, text)| (path.to_string(), text.to_string()))
                .collect(),
            timestamps: HashMap::new(),
        }
    }

    pub fn with_timestamps(mut self, path: &str, created: SystemTime, modified: SystemTime) -> Self {
        self.timestamps.insert(path.to_string(), (created, modified));
        self
    }

    pub fn remove(&mut self, path: &str) {
        self.documents.remove(path);
    }

    pub fn insert(&mut self, path: &str, text: &str) {
        self.documents.insert(path.to_string(), text.to_string());
    }
}

#[async_trait]
impl NoteSource for MemorySource {
    async fn list(&self) -> Result<Vec<String>, MnemaError> {
        let mut paths: Vec<String> = self.documents.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    async fn read(&self, path: &str) -> Result<String, MnemaError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| MnemaError::NotFound(format!("no document at '{path}'")))
    }

    async fn timestamps(&self, path: &str) -> Result<(SystemTime, SystemTime), MnemaError> {
        Ok(self
            .timestamps
            .get(path)
            .copied()
            .unwrap_or((at(0), at(0))))
    }
}

/// Scripted [RevisionLog] fixture: canonical path -> newest-first log
/// entries, plus `(path, key)` -> historical content. Counts `content_at`
/// calls so caching behavior is observable.
#[allow(dead_code)]
pub struct ScriptedLog {
    logs: HashMap<String, Vec<RevisionInfo>>,
    contents: HashMap<(String, String), String>,
    pub fetches: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedLog {
    pub fn new() -> Self {
        ScriptedLog {
            logs: HashMap::new(),
            contents: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn log(mut self, path: &str, entries: Vec<RevisionInfo>) -> Self {
        self.logs.insert(path.to_string(), entries);
        self
    }

    pub fn content(mut self, path: &str, key: &str, text: &str) -> Self {
        self.contents
            .insert((path.to_string(), key.to_string()), text.to_string());
        self
    }
}

#[allow(dead_code)]
pub fn revision(key: &str, secs: u64) -> RevisionInfo {
    RevisionInfo {
        key: key.to_string(),
        timestamp: Some(at(secs)),
        author: Some("ada".to_string()),
    }
}

#[async_trait]
impl RevisionLog for ScriptedLog {
    async fn revisions(&self, path: &str) -> Result<Option<Vec<RevisionInfo>>, MnemaError> {
        Ok(self.logs.get(path).cloned())
    }

    async fn content_at(&self, path: &str, key: &str) -> Result<String, MnemaError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.contents
            .get(&(path.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| MnemaError::History(format!("no content for '{path}' at '{key}'")))
    }
}
