//! The graph store: canonical note map plus the id↔path, id↔title, and
//! id↔url indices, with the link/backlink consistency invariant.

use std::{collections::HashMap, time::SystemTime};

use crate::{
    error::MnemaError,
    links::{normalize_title, LinkTarget, TitleIndex},
    note::{Note, NoteMetadata, Prompt},
    noteid::{note_id, NoteId},
};

/// Per-note result of the parse pipeline, applied to the store by the
/// single-writer drain.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub id: NoteId,
    pub content: String,
    pub prompts: Option<Vec<Prompt>>,
    pub link_ids: Vec<NoteId>,
    pub metadata: NoteMetadata,
}

/// Owns every [Note] and all indices. Other components receive ids and
/// references, never copies that can diverge.
#[derive(Debug, Default, Clone)]
pub struct GraphStore {
    notes: HashMap<NoteId, Note>,
    path_index: HashMap<String, NoteId>,
    title_index: TitleIndex,
    url_index: HashMap<String, NoteId>,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore::default()
    }

    /// Seed an empty note record for a discovered file, before any content is
    /// parsed. Hash collisions between distinct paths are surfaced as a fatal
    /// configuration fault, never silently merged.
    pub fn create_placeholder(
        &mut self,
        path: &str,
        url: &str,
        title: &str,
        created: SystemTime,
        last_modified: SystemTime,
    ) -> Result<NoteId, MnemaError> {
        let id = note_id(path, 0);
        self.insert_placeholder(id, path, url, title, created, last_modified)
    }

    fn insert_placeholder(
        &mut self,
        id: NoteId,
        path: &str,
        url: &str,
        title: &str,
        created: SystemTime,
        last_modified: SystemTime,
    ) -> Result<NoteId, MnemaError> {
        if let Some(existing) = self.notes.get(&id) {
            if existing.path != path {
                tracing::warn!(
                    "Id collision: '{}' and '{}' both hash to {id}",
                    existing.path,
                    path
                );
                return Err(MnemaError::Config(format!(
                    "non-unique note id {id} for paths '{}' and '{path}'",
                    existing.path
                )));
            }
            return Err(MnemaError::Internal(format!(
                "placeholder already exists for '{path}'"
            )));
        }
        self.notes.insert(
            id,
            Note::placeholder(
                id,
                path.to_string(),
                url.to_string(),
                title.to_string(),
                created,
                last_modified,
            ),
        );
        self.path_index.insert(path.to_string(), id);
        self.url_index.insert(url.to_string(), id);
        self.index_title(id, title);
        Ok(id)
    }

    /// Update a note's effective title, atomically swapping the title-index
    /// entry: the stale mapping is removed before the new one is installed.
    pub fn set_title(&mut self, id: NoteId, title: &str) -> Result<(), MnemaError> {
        let note = self
            .notes
            .get_mut(&id)
            .ok_or_else(|| MnemaError::Internal(format!("set_title on unknown note {id}")))?;
        if note.title == title {
            return Ok(());
        }
        let stale = normalize_title(&note.title);
        note.title = title.to_string();
        if self.title_index.get(&stale) == Some(&id) {
            self.title_index.remove(&stale);
        }
        self.index_title(id, title);
        Ok(())
    }

    fn index_title(&mut self, id: NoteId, title: &str) {
        let normalized = normalize_title(title);
        if let Some(other) = self.title_index.get(&normalized) {
            if *other != id {
                let other_path = self
                    .notes
                    .get(other)
                    .map(|n| n.path.clone())
                    .unwrap_or_default();
                let path = self
                    .notes
                    .get(&id)
                    .map(|n| n.path.clone())
                    .unwrap_or_default();
                tracing::warn!(
                    "Duplicate title '{title}': '{other_path}' and '{path}'; links will resolve to the latter"
                );
            }
        }
        self.title_index.insert(normalized, id);
    }

    /// Replace a note's derived fields with a fresh parse result. A metadata
    /// `title` string overrides the effective title (and its index mapping).
    pub fn apply_parse_result(&mut self, outcome: ParseOutcome) -> Result<(), MnemaError> {
        let override_title = outcome
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let note = self.notes.get_mut(&outcome.id).ok_or_else(|| {
            MnemaError::Internal(format!("parse result for unknown note {}", outcome.id))
        })?;
        note.content = outcome.content;
        note.prompts = outcome.prompts;
        note.link_ids = outcome.link_ids;
        note.metadata = outcome.metadata;
        if let Some(title) = override_title {
            self.set_title(outcome.id, &title)?;
        }
        Ok(())
    }

    /// Idempotent ordered append of `source` to `target`'s backlinks. A no-op
    /// for unknown targets (the target may have been retracted by the time
    /// the mutation drains).
    pub fn add_backlink(&mut self, target: NoteId, source: NoteId) {
        match self.notes.get_mut(&target) {
            Some(note) => {
                if !note.backlink_ids.contains(&source) {
                    note.backlink_ids.push(source);
                }
            }
            None => tracing::debug!("backlink target {target} unknown, skipping"),
        }
    }

    /// Drop every link and backlink edge. Run at the start of a parse phase:
    /// every surviving note is re-parsed, so the drain re-derives the full
    /// edge set and stale edges from the previous build must not linger. A
    /// note whose re-parse fails ends up linkless, which keeps the graph
    /// bidirectionally consistent.
    pub fn clear_edges(&mut self) {
        for note in self.notes.values_mut() {
            note.link_ids.clear();
            note.backlink_ids.clear();
        }
    }

    /// Retract a note and every edge referencing it. Used when a file
    /// disappears between builds.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let removed = self.notes.remove(&id)?;
        self.path_index.retain(|_, v| *v != id);
        self.url_index.retain(|_, v| *v != id);
        self.title_index.retain(|_, v| *v != id);
        for note in self.notes.values_mut() {
            note.link_ids.retain(|other| *other != id);
            note.backlink_ids.retain(|other| *other != id);
        }
        Some(removed)
    }

    /// Post-build invariant: `B ∈ A.link_ids ⇔ A ∈ B.backlink_ids`. Any
    /// violation is an internal-consistency fault, not a user-facing warning.
    pub fn verify_bidirectional(&self) -> Result<(), MnemaError> {
        for note in self.notes.values() {
            for target in &note.link_ids {
                let ok = self
                    .notes
                    .get(target)
                    .map(|t| t.backlink_ids.contains(&note.id))
                    .unwrap_or(false);
                if !ok {
                    return Err(MnemaError::Internal(format!(
                        "link {} -> {target} has no matching backlink",
                        note.id
                    )));
                }
            }
            for source in &note.backlink_ids {
                let ok = self
                    .notes
                    .get(source)
                    .map(|s| s.link_ids.contains(&note.id))
                    .unwrap_or(false);
                if !ok {
                    return Err(MnemaError::Internal(format!(
                        "backlink {} <- {source} has no matching link",
                        note.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.get_mut(&id)
    }

    pub fn note_by_path(&self, path: &str) -> Option<&Note> {
        self.path_index.get(path).and_then(|id| self.notes.get(id))
    }

    pub fn id_for_path(&self, path: &str) -> Option<NoteId> {
        self.path_index.get(path).copied()
    }

    pub fn notes(&self) -> &HashMap<NoteId, Note> {
        &self.notes
    }

    pub(crate) fn notes_mut(&mut self) -> &mut HashMap<NoteId, Note> {
        &mut self.notes
    }

    pub fn title_index(&self) -> &TitleIndex {
        &self.title_index
    }

    pub fn url_index(&self) -> &HashMap<String, NoteId> {
        &self.url_index
    }

    /// The per-target slices handed to the link render policy.
    pub fn link_targets(&self) -> HashMap<NoteId, LinkTarget> {
        self.notes
            .iter()
            .map(|(id, note)| {
                (
                    *id,
                    LinkTarget {
                        id: *id,
                        title: note.title.clone(),
                        url: note.url.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn placeholder(store: &mut GraphStore, path: &str, title: &str) -> NoteId {
        let url = path.trim_end_matches(".md").to_string();
        store
            .create_placeholder(path, &url, title, now(), now())
            .unwrap()
    }

    #[test]
    fn add_backlink_is_idempotent() {
        let mut store = GraphStore::new();
        let a = placeholder(&mut store, "/a.md", "a");
        let b = placeholder(&mut store, "/b.md", "b");
        store.add_backlink(b, a);
        store.add_backlink(b, a);
        assert_eq!(store.note(b).unwrap().backlink_ids, vec![a]);
    }

    #[test]
    fn duplicate_placeholder_is_internal_fault() {
        let mut store = GraphStore::new();
        placeholder(&mut store, "/a.md", "a");
        let err = store
            .create_placeholder("/a.md", "/a", "a", now(), now())
            .unwrap_err();
        assert!(matches!(err, MnemaError::Internal(_)));
    }

    #[test]
    fn id_collision_is_fatal_config_fault() {
        let mut store = GraphStore::new();
        let id = placeholder(&mut store, "/a.md", "a");
        // Two distinct paths hashing to the same id cannot practically be
        // constructed, so the collision path is exercised directly.
        let err = store
            .insert_placeholder(id, "/other.md", "/other", "other", now(), now())
            .unwrap_err();
        assert!(matches!(err, MnemaError::Config(_)));
    }

    #[test]
    fn title_override_swaps_index_atomically() {
        let mut store = GraphStore::new();
        let a = placeholder(&mut store, "/a.md", "a");
        let outcome = ParseOutcome {
            id: a,
            content: String::new(),
            prompts: None,
            link_ids: vec![],
            metadata: {
                let mut m = NoteMetadata::new();
                m.insert("title".to_string(), serde_json::json!("Custom"));
                m
            },
        };
        store.apply_parse_result(outcome).unwrap();
        assert_eq!(store.title_index().get("custom"), Some(&a));
        assert!(store.title_index().get("a").is_none());
        assert_eq!(store.note(a).unwrap().title, "Custom");
    }

    #[test]
    fn clear_edges_resets_every_note() {
        let mut store = GraphStore::new();
        let a = placeholder(&mut store, "/a.md", "a");
        let b = placeholder(&mut store, "/b.md", "b");
        store.note_mut(a).unwrap().link_ids.push(b);
        store.add_backlink(b, a);
        store.clear_edges();
        assert!(store.note(a).unwrap().link_ids.is_empty());
        assert!(store.note(b).unwrap().backlink_ids.is_empty());
        store.verify_bidirectional().unwrap();
    }

    #[test]
    fn remove_note_retracts_all_edges() {
        let mut store = GraphStore::new();
        let a = placeholder(&mut store, "/a.md", "a");
        let b = placeholder(&mut store, "/b.md", "b");
        store.note_mut(a).unwrap().link_ids.push(b);
        store.add_backlink(b, a);
        store.remove_note(b);
        assert!(store.note(b).is_none());
        assert!(store.note(a).unwrap().link_ids.is_empty());
        assert!(store.title_index().get("b").is_none());
        store.verify_bidirectional().unwrap();
    }

    #[test]
    fn bidirectional_violation_detected() {
        let mut store = GraphStore::new();
        let a = placeholder(&mut store, "/a.md", "a");
        let b = placeholder(&mut store, "/b.md", "b");
        store.note_mut(a).unwrap().link_ids.push(b);
        assert!(matches!(
            store.verify_bidirectional(),
            Err(MnemaError::Internal(_))
        ));
        store.add_backlink(b, a);
        store.verify_bidirectional().unwrap();
    }

    #[test]
    fn self_links_are_symmetric() {
        let mut store = GraphStore::new();
        let a = placeholder(&mut store, "/a.md", "a");
        store.note_mut(a).unwrap().link_ids.push(a);
        store.add_backlink(a, a);
        store.verify_bidirectional().unwrap();
        assert_eq!(store.note(a).unwrap().backlink_ids, vec![a]);
    }
}
