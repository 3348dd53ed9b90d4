//! Build orchestration. [GraphBuilder] drives the four build phases over a
//! [NoteSource]: sequential discovery, concurrent per-note parsing drained
//! through a single writer, a verify/rank barrier, and concurrent revision
//! reconciliation. The result is an immutable [GraphSnapshot].

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinSet};

use crate::{
    codec::{parse_document, probe_metadata, render_html},
    config::{BuildConfig, LinkRenderPolicy},
    error::MnemaError,
    history::{reconcile, RevisionLog},
    links::{resolve_links, LinkTarget, TitleIndex},
    note::Note,
    noteid::NoteId,
    prompts,
    rank::rank_notes,
    source::NoteSource,
    store::{GraphStore, ParseOutcome},
};

/// Derive a note's url from its canonical path: the `.md` suffix is dropped
/// and a trailing `/index` collapses into the parent directory.
fn url_for(path: &str) -> String {
    let mut url = path.strip_suffix(".md").unwrap_or(path).to_string();
    if let Some(parent) = url.strip_suffix("/index") {
        url = parent.to_string();
    }
    if url.is_empty() {
        url.push('/');
    }
    url
}

/// Provisional title: the last non-empty url segment.
fn title_for(url: &str) -> String {
    url.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("index")
        .to_string()
}

/// Parse one note's text against the frozen indices. Runs inside a parse
/// task, so it touches no shared mutable state.
fn process_note(
    id: NoteId,
    path: &str,
    text: &str,
    titles: &TitleIndex,
    targets: &HashMap<NoteId, LinkTarget>,
    policy: &LinkRenderPolicy,
    with_prompts: bool,
) -> Result<ParseOutcome, MnemaError> {
    let (mut tree, metadata) = parse_document(text)?;
    let link_ids = resolve_links(&mut tree, titles, targets, policy, path, None);
    let prompts = with_prompts.then(|| prompts::extract_prompts(&mut tree, path));
    let content = render_html(&tree)?;
    Ok(ParseOutcome {
        id,
        content,
        prompts,
        link_ids,
        metadata,
    })
}

/// Builds [GraphSnapshot]s from a [NoteSource]. The builder keeps its store
/// across builds, so calling [GraphBuilder::build] again reconciles against
/// the previous state: vanished files are retracted and revision histories
/// pick up where they left off.
pub struct GraphBuilder {
    config: BuildConfig,
    store: GraphStore,
}

impl GraphBuilder {
    pub fn new(config: BuildConfig) -> Self {
        GraphBuilder {
            config,
            store: GraphStore::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub async fn build(
        &mut self,
        source: Arc<dyn NoteSource>,
        revision_log: Option<Arc<dyn RevisionLog>>,
    ) -> Result<GraphSnapshot, MnemaError> {
        let documents = self.discover(source.as_ref()).await?;
        tracing::info!("building graph over {} notes", documents.len());

        self.parse_all(documents).await?;

        self.store.verify_bidirectional()?;
        rank_notes(&mut self.store);
        for note in self.store.notes().values() {
            if note.backlink_ids.is_empty() {
                tracing::debug!("Note '{}' has no backlinks", note.path);
            }
        }

        if self.config.revision_history {
            if let Some(log) = &revision_log {
                self.reconcile_all(log).await?;
            }
        }

        Ok(GraphSnapshot::new(&self.store, revision_log))
    }

    /// Discovery phase. Reads every listed file, seeds placeholders so the
    /// title and target indices are complete before any parse task starts,
    /// and retracts notes whose files have vanished since the last build.
    /// A file that was listed but cannot be read fails the whole build.
    async fn discover(
        &mut self,
        source: &dyn NoteSource,
    ) -> Result<Vec<(NoteId, String, String)>, MnemaError> {
        let mut paths = source.list().await?;
        if let Some(dir) = &self.config.directory {
            let prefix = format!("/{}/", dir.trim_matches('/'));
            paths.retain(|p| p.starts_with(&prefix));
        }

        let mut documents = Vec::with_capacity(paths.len());
        let mut seen = HashSet::with_capacity(paths.len());
        for path in paths {
            let text = source.read(&path).await?;
            let (created, modified) = source.timestamps(&path).await?;
            let url = url_for(&path);
            let mut title = title_for(&url);
            if let Some(probed) = probe_metadata(&text).get("title").and_then(|v| v.as_str()) {
                title = probed.to_string();
            }
            let id = match self.store.id_for_path(&path) {
                Some(id) => {
                    self.store.set_title(id, &title)?;
                    if let Some(note) = self.store.note_mut(id) {
                        note.created = created;
                        note.last_modified = modified;
                    }
                    id
                }
                None => self
                    .store
                    .create_placeholder(&path, &url, &title, created, modified)?,
            };
            seen.insert(id);
            documents.push((id, path, text));
        }

        let stale: Vec<NoteId> = self
            .store
            .notes()
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(removed) = self.store.remove_note(id) {
                tracing::info!("Note '{}' vanished, retracting it", removed.path);
            }
        }
        Ok(documents)
    }

    /// Parse phase. One task per note against frozen indices; outcomes and
    /// their backlink edges drain through this single writer, so cross-note
    /// mutation is serialized without locking the store.
    async fn parse_all(&mut self, documents: Vec<(NoteId, String, String)>) -> Result<(), MnemaError> {
        let titles = Arc::new(self.store.title_index().clone());
        let targets = Arc::new(self.store.link_targets());
        let with_prompts = self.config.extract_prompts;
        // Every note is re-parsed, so the drain below rebuilds the complete
        // edge set; links and backlinks surviving from an earlier build would
        // be stale.
        self.store.clear_edges();

        let (tx, mut rx) = mpsc::unbounded_channel::<ParseOutcome>();
        let mut tasks = JoinSet::new();
        for (id, path, text) in documents {
            let titles = Arc::clone(&titles);
            let targets = Arc::clone(&targets);
            let policy = Arc::clone(&self.config.link_render_policy);
            let tx = tx.clone();
            tasks.spawn(async move {
                match process_note(id, &path, &text, &titles, &targets, &policy, with_prompts) {
                    Ok(outcome) => {
                        if tx.send(outcome).is_err() {
                            tracing::warn!("outcome channel closed before '{path}' drained");
                        }
                    }
                    Err(err) => tracing::warn!("Failed to process note '{path}': {err}"),
                }
            });
        }
        drop(tx);

        while let Some(outcome) = rx.recv().await {
            let source_id = outcome.id;
            let link_ids = outcome.link_ids.clone();
            self.store.apply_parse_result(outcome)?;
            for target in link_ids {
                self.store.add_backlink(target, source_id);
            }
        }
        while let Some(joined) = tasks.join_next().await {
            joined?;
        }
        Ok(())
    }

    /// Reconciliation phase. Log fetches run concurrently; results fold into
    /// the store serially. A collaborator failure degrades that note only.
    async fn reconcile_all(&mut self, log: &Arc<dyn RevisionLog>) -> Result<(), MnemaError> {
        let mut tasks = JoinSet::new();
        for (id, note) in self.store.notes() {
            let id = *id;
            let path = note.path.clone();
            let log = Arc::clone(log);
            tasks.spawn(async move {
                let fetched = log.revisions(&path).await;
                (id, path, fetched)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let (id, path, fetched) = joined?;
            match fetched {
                Ok(entries) => {
                    if let Some(note) = self.store.note_mut(id) {
                        let fs_modified = note.last_modified;
                        reconcile(note, entries, fs_modified);
                    }
                }
                Err(err) => {
                    tracing::warn!("Revision history unavailable for '{path}': {err}");
                }
            }
        }
        Ok(())
    }
}

/// The immutable result of a build: every note with its derived graph data,
/// rank ordering, and a lazy cache for historical content.
#[derive(Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    notes: HashMap<NoteId, Note>,
    /// Note ids in descending rank order, path as tiebreak.
    order: Vec<NoteId>,
    url_index: HashMap<String, NoteId>,
    #[serde(skip)]
    revision_log: Option<Arc<dyn RevisionLog>>,
    #[serde(skip)]
    content_cache: Arc<Mutex<HashMap<(NoteId, String), String>>>,
}

impl GraphSnapshot {
    fn new(store: &GraphStore, revision_log: Option<Arc<dyn RevisionLog>>) -> Self {
        let notes = store.notes().clone();
        let mut order: Vec<NoteId> = notes.keys().copied().collect();
        order.sort_by(|a, b| {
            notes[b]
                .rank
                .total_cmp(&notes[a].rank)
                .then_with(|| notes[a].path.cmp(&notes[b].path))
        });
        GraphSnapshot {
            notes,
            order,
            url_index: store.url_index().clone(),
            revision_log,
            content_cache: Arc::default(),
        }
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    pub fn note_by_url(&self, url: &str) -> Option<&Note> {
        self.url_index.get(url).and_then(|id| self.notes.get(id))
    }

    /// All notes, highest rank first.
    pub fn notes_by_rank(&self) -> impl Iterator<Item = &Note> {
        self.order.iter().filter_map(|id| self.notes.get(id))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Raw text of one historical revision, fetched through the attached
    /// [RevisionLog] on first access and cached thereafter. The key must
    /// appear in the note's reconciled revision list.
    pub async fn revision_content(&self, id: NoteId, key: &str) -> Result<String, MnemaError> {
        let note = self
            .notes
            .get(&id)
            .ok_or_else(|| MnemaError::NotFound(format!("unknown note {id}")))?;
        let known = note
            .revisions
            .as_ref()
            .map(|revisions| revisions.iter().any(|r| r.key == key))
            .unwrap_or(false);
        if !known {
            return Err(MnemaError::NotFound(format!(
                "note '{}' has no revision '{key}'",
                note.path
            )));
        }

        let cache_key = (id, key.to_string());
        if let Some(cached) = self.content_cache.lock().get(&cache_key) {
            return Ok(cached.clone());
        }
        let log = self.revision_log.as_ref().ok_or_else(|| {
            MnemaError::History("snapshot was built without a revision log".to_string())
        })?;
        let content = log.content_at(&note.path, key).await?;
        self.content_cache
            .lock()
            .insert(cache_key, content.clone());
        Ok(content)
    }
}

impl fmt::Debug for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSnapshot")
            .field("notes", &self.notes.len())
            .field("order", &self.order)
            .field("has_revision_log", &self.revision_log.is_some())
            .finish()
    }
}
