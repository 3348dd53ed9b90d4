//! Revision-history reconciliation. The engine never talks to a VCS
//! directly; a [RevisionLog] collaborator supplies per-path logs and
//! historical content, and this module folds them into each [Note].

use std::time::SystemTime;

use async_trait::async_trait;

use crate::{error::MnemaError, note::Note};

/// One entry of a revision log, newest first. `key` is an opaque revision
/// identifier understood by the collaborator (a commit hash, typically).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionInfo {
    pub key: String,
    pub timestamp: Option<SystemTime>,
    pub author: Option<String>,
}

/// Supplies revision logs and historical content for note paths.
///
/// `revisions` returns `Ok(None)` when the path is not a trackable resource
/// (outside the repository, never committed). `content_at` fetches the text
/// of one revision by key.
#[async_trait]
pub trait RevisionLog: Send + Sync {
    async fn revisions(&self, path: &str) -> Result<Option<Vec<RevisionInfo>>, MnemaError>;
    async fn content_at(&self, path: &str, key: &str) -> Result<String, MnemaError>;
}

/// Fold a freshly fetched log into a note.
///
/// The newest entry describes the current file contents, so it is dropped
/// from the stored history on the first reconciliation. On later builds the
/// head is compared against the front of the stored list and prepended when
/// it is new, so an unchanged log leaves the note untouched.
pub fn reconcile(note: &mut Note, log: Option<Vec<RevisionInfo>>, fs_modified: SystemTime) {
    let Some(entries) = log else {
        tracing::warn!("Note '{}' has no revision log; history disabled", note.path);
        return;
    };
    let mut entries = entries.into_iter();
    let head = entries.next();

    match note.revisions.take() {
        None => {
            // First reconciliation: the head's timestamp, when the log
            // carries one, is a better modification time than the
            // filesystem's.
            note.last_modified = head
                .as_ref()
                .and_then(|h| h.timestamp)
                .unwrap_or(fs_modified);
            note.revisions = Some(entries.map(RevisionInfo::into_revision).collect());
        }
        Some(mut stored) => {
            note.last_modified = fs_modified;
            if let Some(head) = head {
                let is_new = stored.first().map(|r| r.key != head.key).unwrap_or(true);
                if is_new {
                    stored.insert(0, head.into_revision());
                }
            }
            note.revisions = Some(stored);
        }
    }
}

impl RevisionInfo {
    fn into_revision(self) -> crate::note::Revision {
        crate::note::Revision {
            key: self.key,
            timestamp: self.timestamp,
            author: self.author,
        }
    }
}
