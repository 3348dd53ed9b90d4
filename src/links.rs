//! Wiki-link resolution against the title index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::LinkRenderPolicy,
    noteid::NoteId,
    tree::{DocNode, DocTree, NodeIx, Resolution},
};

/// The slice of a note the render policy may see: identity plus the fields a
/// directive can carry. Policies never receive mutable graph state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub id: NoteId,
    pub title: String,
    pub url: String,
}

/// Mapping from normalized title to note id.
pub type TitleIndex = HashMap<String, NoteId>;

/// Title normalization used by the index and by lookups: trim and case-fold.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Resolve every wiki-link token in the tree.
///
/// Resolved tokens are annotated with the target id and a render directive
/// from `policy`; their ids are returned in first-seen document order,
/// deduplicated. Unresolvable tokens are marked dead, get the policy's dead
/// directive, emit exactly one warning naming the source note (and revision
/// key when resolving historical content), and are excluded from the result.
pub fn resolve_links(
    tree: &mut DocTree,
    titles: &TitleIndex,
    targets: &HashMap<NoteId, LinkTarget>,
    policy: &LinkRenderPolicy,
    note_path: &str,
    revision: Option<&str>,
) -> Vec<NoteId> {
    let mut link_ids: Vec<NoteId> = Vec::new();
    let indices: Vec<NodeIx> = tree.node_indices().collect();
    for ix in indices {
        let (target, alias) = match tree.node(ix) {
            DocNode::WikiLink { target, alias, .. } => (target.clone(), alias.clone()),
            _ => continue,
        };
        match titles.get(&normalize_title(&target)) {
            Some(id) => {
                let directive = (policy)(&target, alias.as_deref(), targets.get(id));
                if let DocNode::WikiLink {
                    resolution,
                    directive: slot,
                    ..
                } = tree.node_mut(ix)
                {
                    *resolution = Resolution::Resolved(*id);
                    *slot = Some(directive);
                }
                if !link_ids.contains(id) {
                    link_ids.push(*id);
                }
            }
            None => {
                match revision {
                    Some(revision) => tracing::warn!(
                        "Note '{note_path}' (revision {revision}) has a broken link: [[{target}]]"
                    ),
                    None => {
                        tracing::warn!("Note '{note_path}' has a broken link: [[{target}]]")
                    }
                }
                let directive = (policy)(&target, alias.as_deref(), None);
                if let DocNode::WikiLink {
                    resolution,
                    directive: slot,
                    ..
                } = tree.node_mut(ix)
                {
                    *resolution = Resolution::Dead;
                    *slot = Some(directive);
                }
            }
        }
    }
    link_ids
}
