//! Build configuration and the link render policy seam.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::links::LinkTarget;

/// Markup directive produced for a wiki-link token.
///
/// The core never renders beyond this structure; escaping and sanitization
/// policy belong to the transport layer consuming the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDirective {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub content: Option<String>,
}

/// Pure policy function mapping `(title, alias, resolved target)` to a
/// [RenderDirective]. It receives `None` for dead links and must not touch
/// mutable graph state, which keeps resolution deterministic and testable.
pub type LinkRenderPolicy =
    Arc<dyn Fn(&str, Option<&str>, Option<&LinkTarget>) -> RenderDirective + Send + Sync>;

/// Default policy: anchor-style directives.
///
/// Resolved links carry the target id and url; dead links carry a
/// distinguishing class and a placeholder href. The alias, when present,
/// controls display text only.
pub fn anchor_render_policy(
    title: &str,
    alias: Option<&str>,
    target: Option<&LinkTarget>,
) -> RenderDirective {
    let content = alias.unwrap_or(title).to_string();
    let mut attributes = BTreeMap::new();
    match target {
        Some(target) => {
            attributes.insert("class".to_string(), "wiki-link".to_string());
            attributes.insert("data-id".to_string(), target.id.to_string());
            attributes.insert("href".to_string(), target.url.clone());
        }
        None => {
            attributes.insert("class".to_string(), "wiki-link broken".to_string());
            attributes.insert("href".to_string(), "#".to_string());
        }
    }
    RenderDirective {
        tag: "a".to_string(),
        attributes,
        content: Some(content),
    }
}

/// Options recognized by [crate::builder::GraphBuilder].
#[derive(Clone)]
pub struct BuildConfig {
    /// Subpath filter relative to the source root. `None` means the whole root.
    pub directory: Option<String>,
    /// Reconcile per-note revision history via the [crate::history::RevisionLog]
    /// collaborator. Disabled by default since it lengthens builds.
    pub revision_history: bool,
    /// Extract question/answer and cloze-deletion prompts from note bodies.
    /// When disabled, notes carry `prompts: None` ("not attempted"), never an
    /// empty list.
    pub extract_prompts: bool,
    /// Render policy for wiki-link tokens.
    pub link_render_policy: LinkRenderPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            directory: None,
            revision_history: false,
            extract_prompts: false,
            link_render_policy: Arc::new(anchor_render_policy),
        }
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("directory", &self.directory)
            .field("revision_history", &self.revision_history)
            .field("extract_prompts", &self.extract_prompts)
            .field("link_render_policy", &"<fn>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noteid::NoteId;

    #[test]
    fn anchor_policy_resolved() {
        let target = LinkTarget {
            id: NoteId(42),
            title: "Welcome".to_string(),
            url: "/welcome".to_string(),
        };
        let directive = anchor_render_policy("Welcome", None, Some(&target));
        assert_eq!(directive.tag, "a");
        assert_eq!(directive.attributes.get("data-id").map(String::as_str), Some("42"));
        assert_eq!(directive.attributes.get("href").map(String::as_str), Some("/welcome"));
        assert_eq!(directive.content.as_deref(), Some("Welcome"));
    }

    #[test]
    fn anchor_policy_dead_and_alias() {
        let directive = anchor_render_policy("Missing", Some("shown"), None);
        assert!(directive.attributes.get("data-id").is_none());
        assert_eq!(directive.attributes.get("href").map(String::as_str), Some("#"));
        assert_eq!(
            directive.attributes.get("class").map(String::as_str),
            Some("wiki-link broken")
        );
        assert_eq!(directive.content.as_deref(), Some("shown"));
    }
}
