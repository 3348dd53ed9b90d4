//! The note data model.

use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::noteid::NoteId;

/// Key/value map parsed from a note's optional leading metadata block.
pub type NoteMetadata = BTreeMap<String, serde_json::Value>;

/// A structured study prompt extracted from note text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Prompt {
    Qa { question: String, answer: String },
    /// `content` retains the original deletion markers for display, independent
    /// of the stripped rendered text.
    Cloze { content: String },
}

/// A historical snapshot of a note, identified by a revision key.
///
/// Revisions are ordered newest-first. Historical content is not stored here;
/// it is fetched lazily through [crate::builder::GraphSnapshot::revision_content]
/// and cached by the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub key: String,
    pub timestamp: Option<SystemTime>,
    pub author: Option<String>,
}

/// A single source document plus its derived graph, prompt, and ranking data.
///
/// Owned exclusively by the graph store; other components work with ids and
/// references so derived state can never diverge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub path: String,
    pub url: String,
    /// Filename-derived by default, overridden by a `title` metadata entry.
    pub title: String,
    pub metadata: NoteMetadata,
    /// Rendered body, prompts removed.
    pub content: String,
    /// `None` means extraction was not attempted, `Some(vec![])` means it ran
    /// and found nothing.
    pub prompts: Option<Vec<Prompt>>,
    /// Targets this note links to, insertion order = first-seen, re-sorted by
    /// rank after a full build.
    pub link_ids: Vec<NoteId>,
    /// Notes linking to this note.
    pub backlink_ids: Vec<NoteId>,
    pub rank: f64,
    pub created: SystemTime,
    pub last_modified: SystemTime,
    /// Present only when revision history is enabled, newest-first.
    pub revisions: Option<Vec<Revision>>,
}

impl Note {
    /// Empty note record seeded at discovery time, before any content parse.
    pub fn placeholder(
        id: NoteId,
        path: String,
        url: String,
        title: String,
        created: SystemTime,
        last_modified: SystemTime,
    ) -> Self {
        Note {
            id,
            path,
            url,
            title,
            metadata: NoteMetadata::new(),
            content: String::new(),
            prompts: None,
            link_ids: Vec::new(),
            backlink_ids: Vec::new(),
            rank: 0.0,
            created,
            last_modified,
            revisions: None,
        }
    }
}
