//! Mutable document tree.
//!
//! The tree is an arena of nodes addressed by index; membership is a child
//! index list rather than live object links, so "removal" is filtering a
//! parent's child list. That keeps removal order-independent and leaves no
//! dangling references: detached nodes simply become unreachable.

use pulldown_cmark::Event as MdEvent;

use crate::{config::RenderDirective, noteid::NoteId};

/// Handle of a node inside a [DocTree] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIx(pub(crate) usize);

/// Link-resolution state annotated onto a wiki-link node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Resolved(NoteId),
    Dead,
}

#[derive(Debug, Clone)]
pub enum DocNode {
    /// Raw text of the leading metadata block. Detached from the root list by
    /// the codec once parsed.
    Metadata(String),
    Paragraph {
        children: Vec<NodeIx>,
    },
    /// A run of inline content, kept as normalized markdown text.
    Text(String),
    WikiLink {
        target: String,
        /// Controls display text only, never resolution.
        alias: Option<String>,
        resolution: Resolution,
        directive: Option<RenderDirective>,
    },
    /// An opaque non-paragraph top-level block (heading, list, code fence, …)
    /// kept as its original event run, with any wiki-link spans lifted out
    /// into arena nodes so they still resolve and render.
    Block(Vec<BlockPiece>),
}

/// One segment of an opaque block: either a run of raw markdown events or a
/// reference to a lifted wiki-link node.
#[derive(Debug, Clone)]
pub enum BlockPiece {
    Events(Vec<MdEvent<'static>>),
    Link(NodeIx),
}

#[derive(Debug, Default, Clone)]
pub struct DocTree {
    nodes: Vec<DocNode>,
    root: Vec<NodeIx>,
}

impl DocTree {
    pub fn new() -> Self {
        DocTree::default()
    }

    /// Allocate a node in the arena without attaching it anywhere.
    pub fn alloc(&mut self, node: DocNode) -> NodeIx {
        let ix = NodeIx(self.nodes.len());
        self.nodes.push(node);
        ix
    }

    /// Allocate a node and append it to the root block list.
    pub fn push_root(&mut self, node: DocNode) -> NodeIx {
        let ix = self.alloc(node);
        self.root.push(ix);
        ix
    }

    pub fn node(&self, ix: NodeIx) -> &DocNode {
        &self.nodes[ix.0]
    }

    pub fn node_mut(&mut self, ix: NodeIx) -> &mut DocNode {
        &mut self.nodes[ix.0]
    }

    /// Top-level blocks in document order.
    pub fn root(&self) -> &[NodeIx] {
        &self.root
    }

    /// Every arena handle in allocation order. Wiki-link nodes are allocated
    /// when their closing token is seen, so filtering this for links yields
    /// strict document order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIx> {
        (0..self.nodes.len()).map(NodeIx)
    }

    /// The top-level node immediately following `ix`, if any.
    pub fn next_root_sibling(&self, ix: NodeIx) -> Option<NodeIx> {
        let pos = self.root.iter().position(|r| *r == ix)?;
        self.root.get(pos + 1).copied()
    }

    /// Detach one top-level node by identity.
    pub fn remove_root(&mut self, ix: NodeIx) {
        self.root.retain(|r| *r != ix);
    }

    /// Detach a set of top-level nodes by identity, in one pass. The order of
    /// `marked` does not matter.
    pub fn remove_root_set(&mut self, marked: &[NodeIx]) {
        self.root.retain(|r| !marked.contains(r));
    }

    /// Substitute `new` for `old` in the root list, keeping document position.
    pub fn replace_root(&mut self, old: NodeIx, new: NodeIx) {
        if let Some(slot) = self.root.iter_mut().find(|r| **r == old) {
            *slot = new;
        }
    }

    /// Child handles of a paragraph node, or `None` for any other kind.
    pub fn paragraph_children(&self, ix: NodeIx) -> Option<&[NodeIx]> {
        match self.node(ix) {
            DocNode::Paragraph { children } => Some(children),
            _ => None,
        }
    }

    /// The text content beginning a paragraph: its first child, when that
    /// child is a text run.
    pub fn leading_text(&self, ix: NodeIx) -> Option<&str> {
        let first = *self.paragraph_children(ix)?.first()?;
        match self.node(first) {
            DocNode::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Serialize a paragraph back to normalized markdown text. Wiki links are
    /// written in token form so the serialization round-trips.
    pub fn paragraph_markdown(&self, ix: NodeIx) -> String {
        let Some(children) = self.paragraph_children(ix) else {
            return String::new();
        };
        let mut out = String::new();
        for child in children {
            match self.node(*child) {
                DocNode::Text(text) => out.push_str(text),
                DocNode::WikiLink { target, alias, .. } => {
                    out.push_str(&wikilink_markdown(target, alias.as_deref()));
                }
                _ => {}
            }
        }
        out.trim_end().to_string()
    }
}

/// Token form of a wiki link.
pub fn wikilink_markdown(target: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("[[{target}|{alias}]]"),
        None => format!("[[{target}]]"),
    }
}
