//! Markdown parsing into the document tree, and rendering back out.
//!
//! Parsing is a single pass over the pulldown-cmark event stream with no
//! I/O. Top-level paragraphs are decomposed into text runs and wiki-link
//! nodes so the resolver and prompt extractor can work on them; every other
//! block is carried as an opaque event run (with wiki-link spans lifted out)
//! and replayed verbatim at render time.

use pulldown_cmark::{
    html, CowStr, Event as MdEvent, LinkType, Options, Parser as MdParser, Tag as MdTag,
    TagEnd as MdTagEnd,
};
use pulldown_cmark_to_cmark::cmark;
use std::mem::take;

use crate::{
    config::RenderDirective,
    error::MnemaError,
    note::NoteMetadata,
    tree::{wikilink_markdown, BlockPiece, DocNode, DocTree, NodeIx, Resolution},
};

pub fn md_options() -> Options {
    let mut md_options = Options::empty();
    // Enabled explicitly instead of Options::all() for better reproduceability.
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options.insert(Options::ENABLE_WIKILINKS);
    md_options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    md_options
}

/// Accumulates the events between a wiki-link's start and end tags.
#[derive(Debug, Clone)]
struct WikiAccumulator {
    dest: String,
    aliased: bool,
    inner: String,
}

impl WikiAccumulator {
    fn new(event: &MdEvent<'_>) -> Option<WikiAccumulator> {
        match event {
            MdEvent::Start(MdTag::Link {
                link_type: LinkType::WikiLink { has_pothole },
                dest_url,
                ..
            }) => Some(WikiAccumulator {
                dest: dest_url.to_string(),
                aliased: *has_pothole,
                inner: String::new(),
            }),
            _ => None,
        }
    }

    /// Returns whether event is the closing [MdTagEnd::Link].
    fn push(&mut self, event: &MdEvent<'_>) -> bool {
        match event {
            MdEvent::End(MdTagEnd::Link) => true,
            MdEvent::Text(text) | MdEvent::Code(text) => {
                self.inner.push_str(text);
                false
            }
            _ => false,
        }
    }

    fn into_node(self) -> DocNode {
        // With an alias (`[[target|alias]]`) the destination is the target and
        // the inner text is display-only. Without one the inner text is the
        // raw target as written, preferred over the destination because the
        // parser may normalize the latter.
        let (target, alias) = if self.aliased {
            (self.dest, Some(self.inner))
        } else if self.inner.is_empty() {
            (self.dest, None)
        } else {
            (self.inner, None)
        };
        DocNode::WikiLink {
            target,
            alias,
            resolution: Resolution::Unresolved,
            directive: None,
        }
    }
}

enum Mode {
    Top,
    Meta {
        buf: String,
    },
    Para {
        children: Vec<NodeIx>,
        run: Vec<MdEvent<'static>>,
    },
    Block {
        pieces: Vec<BlockPiece>,
        run: Vec<MdEvent<'static>>,
        depth: usize,
    },
}

/// Parse raw markdown into a [DocTree] plus the metadata map from the leading
/// YAML block (empty when absent or malformed). The metadata node is detached
/// from the tree before the result is returned.
pub fn parse_document(text: &str) -> Result<(DocTree, NoteMetadata), MnemaError> {
    let mut tree = DocTree::new();
    let mut mode = Mode::Top;
    let mut wiki: Option<WikiAccumulator> = None;

    for event in MdParser::new_ext(text, md_options()) {
        let event = event.into_static();

        // Wiki-link accumulation runs the same way inside paragraphs and
        // opaque blocks.
        if let Some(accumulator) = wiki.as_mut() {
            if accumulator.push(&event) {
                if let Some(accumulator) = wiki.take() {
                    let ix = tree.alloc(accumulator.into_node());
                    match &mut mode {
                        Mode::Para { children, .. } => children.push(ix),
                        Mode::Block { pieces, .. } => pieces.push(BlockPiece::Link(ix)),
                        _ => {}
                    }
                }
            }
            continue;
        }
        if matches!(mode, Mode::Para { .. } | Mode::Block { .. }) {
            if let Some(accumulator) = WikiAccumulator::new(&event) {
                match &mut mode {
                    Mode::Para { children, run } => {
                        if !run.is_empty() {
                            let text_run = inline_to_text(&take(run))?;
                            children.push(tree.alloc(DocNode::Text(text_run)));
                        }
                    }
                    Mode::Block { pieces, run, .. } => {
                        if !run.is_empty() {
                            pieces.push(BlockPiece::Events(take(run)));
                        }
                    }
                    _ => {}
                }
                wiki = Some(accumulator);
                continue;
            }
        }

        mode = match mode {
            Mode::Top => match event {
                MdEvent::Start(MdTag::MetadataBlock(_)) => Mode::Meta { buf: String::new() },
                MdEvent::Start(MdTag::Paragraph) => Mode::Para {
                    children: Vec::new(),
                    run: Vec::new(),
                },
                MdEvent::Start(_) => Mode::Block {
                    pieces: Vec::new(),
                    run: vec![event],
                    depth: 1,
                },
                // Standalone top-level event, e.g. a thematic break.
                other => {
                    tree.push_root(DocNode::Block(vec![BlockPiece::Events(vec![other])]));
                    Mode::Top
                }
            },
            Mode::Meta { mut buf } => match event {
                MdEvent::Text(text) => {
                    buf.push_str(&text);
                    Mode::Meta { buf }
                }
                MdEvent::End(MdTagEnd::MetadataBlock(_)) => {
                    tree.push_root(DocNode::Metadata(buf));
                    Mode::Top
                }
                _ => Mode::Meta { buf },
            },
            Mode::Para { mut children, mut run } => match event {
                MdEvent::End(MdTagEnd::Paragraph) => {
                    if !run.is_empty() {
                        children.push(tree.alloc(DocNode::Text(inline_to_text(&run)?)));
                    }
                    tree.push_root(DocNode::Paragraph { children });
                    Mode::Top
                }
                other => {
                    run.push(other);
                    Mode::Para { children, run }
                }
            },
            Mode::Block {
                mut pieces,
                mut run,
                mut depth,
            } => {
                match &event {
                    MdEvent::Start(_) => depth += 1,
                    MdEvent::End(_) => depth -= 1,
                    _ => {}
                }
                run.push(event);
                if depth == 0 {
                    pieces.push(BlockPiece::Events(run));
                    tree.push_root(DocNode::Block(pieces));
                    Mode::Top
                } else {
                    Mode::Block { pieces, run, depth }
                }
            }
        };
    }

    // Detach the metadata block before any further processing.
    let mut metadata = NoteMetadata::new();
    let meta_ix = tree.root().iter().copied().find(|ix| {
        matches!(tree.node(*ix), DocNode::Metadata(_))
    });
    if let Some(ix) = meta_ix {
        if let DocNode::Metadata(yaml) = tree.node(ix) {
            metadata = parse_metadata_text(yaml);
        }
        tree.remove_root(ix);
    }
    Ok((tree, metadata))
}

/// Parse only the leading metadata block out of raw text, without building a
/// tree. Used at discovery time to seed title overrides before any full parse
/// runs.
pub fn probe_metadata(text: &str) -> NoteMetadata {
    let mut parser = MdParser::new_ext(text, md_options());
    match parser.next() {
        Some(MdEvent::Start(MdTag::MetadataBlock(_))) => {
            let mut buf = String::new();
            for event in parser.by_ref() {
                match event {
                    MdEvent::Text(text) => buf.push_str(&text),
                    MdEvent::End(MdTagEnd::MetadataBlock(_)) => break,
                    _ => {}
                }
            }
            parse_metadata_text(&buf)
        }
        _ => NoteMetadata::new(),
    }
}

fn parse_metadata_text(yaml: &str) -> NoteMetadata {
    if yaml.trim().is_empty() {
        return NoteMetadata::new();
    }
    match serde_yaml::from_str::<NoteMetadata>(yaml) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("Malformed metadata block ignored: {e}");
            NoteMetadata::new()
        }
    }
}

/// Serialize a run of inline events back to normalized markdown text.
fn inline_to_text(events: &[MdEvent<'static>]) -> Result<String, MnemaError> {
    let mut buf = String::new();
    cmark(events.iter(), &mut buf)?;
    Ok(buf)
}

/// Render the (possibly mutated) tree to HTML. Wiki links render via their
/// attached directive; links that were never resolved fall back to their
/// token form as plain text.
pub fn render_html(tree: &DocTree) -> Result<String, MnemaError> {
    let mut out = String::new();
    for ix in tree.root() {
        match tree.node(*ix) {
            DocNode::Block(pieces) => {
                let mut events: Vec<MdEvent<'static>> = Vec::new();
                for piece in pieces {
                    match piece {
                        BlockPiece::Events(run) => events.extend(run.iter().cloned()),
                        BlockPiece::Link(link_ix) => events.push(link_event(tree, *link_ix)),
                    }
                }
                html::write_html_fmt(&mut out, events.into_iter())?;
            }
            DocNode::Paragraph { children } => {
                let mut events: Vec<MdEvent<'static>> = vec![MdEvent::Start(MdTag::Paragraph)];
                for child in children {
                    match tree.node(*child) {
                        DocNode::Text(text) => events.extend(inline_events(text)),
                        DocNode::WikiLink { .. } => events.push(link_event(tree, *child)),
                        _ => {}
                    }
                }
                events.push(MdEvent::End(MdTagEnd::Paragraph));
                html::write_html_fmt(&mut out, events.into_iter())?;
            }
            DocNode::Metadata(_) | DocNode::Text(_) | DocNode::WikiLink { .. } => {}
        }
    }
    Ok(out)
}

fn link_event(tree: &DocTree, ix: NodeIx) -> MdEvent<'static> {
    if let DocNode::WikiLink {
        target,
        alias,
        directive,
        ..
    } = tree.node(ix)
    {
        match directive {
            Some(directive) => MdEvent::InlineHtml(CowStr::from(directive_html(directive))),
            None => MdEvent::Text(CowStr::from(wikilink_markdown(target, alias.as_deref()))),
        }
    } else {
        MdEvent::Text(CowStr::from(String::new()))
    }
}

/// Expand a render directive into markup. Escaping here is the minimum for
/// well-formedness; sanitization policy belongs to the transport layer.
pub fn directive_html(directive: &RenderDirective) -> String {
    let mut html = format!("<{}", directive.tag);
    for (key, value) in &directive.attributes {
        html.push_str(&format!(" {key}=\"{}\"", escape_attribute(value)));
    }
    html.push('>');
    if let Some(content) = &directive.content {
        html.push_str(&escape_text(content));
    }
    html.push_str(&format!("</{}>", directive.tag));
    html
}

fn escape_text(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(raw: &str) -> String {
    escape_text(raw).replace('"', "&quot;")
}

/// Re-parse a normalized inline text run into events, dropping the paragraph
/// wrapper the parser adds.
fn inline_events(text: &str) -> Vec<MdEvent<'static>> {
    let mut events: Vec<MdEvent<'static>> = MdParser::new_ext(text, md_options())
        .map(|e| e.into_static())
        .collect();
    if matches!(events.first(), Some(MdEvent::Start(MdTag::Paragraph))) {
        events.remove(0);
    }
    if matches!(events.last(), Some(MdEvent::End(MdTagEnd::Paragraph))) {
        events.pop();
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_decomposes_into_text_and_links() {
        let (tree, _) = parse_document("see [[Other Note|that one]] for details").unwrap();
        assert_eq!(tree.root().len(), 1);
        let para = tree.root()[0];
        assert_eq!(
            tree.paragraph_markdown(para),
            "see [[Other Note|that one]] for details"
        );
        let children = tree.paragraph_children(para).unwrap();
        assert_eq!(children.len(), 3);
        match tree.node(children[1]) {
            DocNode::WikiLink { target, alias, .. } => {
                assert_eq!(target, "Other Note");
                assert_eq!(alias.as_deref(), Some("that one"));
            }
            other => panic!("expected wiki link, got {other:?}"),
        }
    }

    #[test]
    fn plain_wikilink_has_no_alias() {
        let (tree, _) = parse_document("[[Welcome]]").unwrap();
        let para = tree.root()[0];
        let children = tree.paragraph_children(para).unwrap();
        match tree.node(children[0]) {
            DocNode::WikiLink { target, alias, .. } => {
                assert_eq!(target, "Welcome");
                assert!(alias.is_none());
            }
            other => panic!("expected wiki link, got {other:?}"),
        }
    }

    #[test]
    fn metadata_block_is_parsed_and_detached() {
        let text = "---\ntitle: Custom Title\ntags:\n  - a\n  - b\n---\n\nBody.\n";
        let (tree, metadata) = parse_document(text).unwrap();
        assert_eq!(
            metadata.get("title").and_then(|v| v.as_str()),
            Some("Custom Title")
        );
        // The metadata node must not remain reachable from the root.
        assert!(tree
            .root()
            .iter()
            .all(|ix| !matches!(tree.node(*ix), DocNode::Metadata(_))));
    }

    #[test]
    fn probe_metadata_matches_full_parse() {
        let text = "---\ntitle: Probed\n---\n\nBody [[Link]].\n";
        let probed = probe_metadata(text);
        let (_, parsed) = parse_document(text).unwrap();
        assert_eq!(probed, parsed);
        assert!(probe_metadata("No metadata here.").is_empty());
    }

    #[test]
    fn malformed_metadata_degrades_to_empty() {
        let text = "---\n[ this is not yaml\n---\n\nBody.\n";
        let (_, metadata) = parse_document(text).unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn soft_breaks_survive_serialization() {
        let (tree, _) = parse_document("Q. What is 2+2?\nA. 4").unwrap();
        let para = tree.root()[0];
        assert_eq!(tree.paragraph_markdown(para), "Q. What is 2+2?\nA. 4");
    }

    #[test]
    fn non_paragraph_blocks_render_verbatim() {
        let (tree, _) = parse_document("# Heading\n\n- one\n- two\n").unwrap();
        let html = render_html(&tree).unwrap();
        assert!(html.contains("<h1>Heading</h1>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn unresolved_link_renders_as_token_text() {
        let (tree, _) = parse_document("see [[Nowhere]]").unwrap();
        let html = render_html(&tree).unwrap();
        assert!(html.contains("[[Nowhere]]"));
    }

    #[test]
    fn wikilink_inside_list_is_lifted() {
        let (tree, _) = parse_document("- item [[Target]]\n").unwrap();
        let links: Vec<NodeIx> = tree
            .node_indices()
            .filter(|ix| matches!(tree.node(*ix), DocNode::WikiLink { .. }))
            .collect();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn directive_html_escapes() {
        let mut attributes = std::collections::BTreeMap::new();
        attributes.insert("href".to_string(), "/a?x=\"1\"".to_string());
        let directive = RenderDirective {
            tag: "a".to_string(),
            attributes,
            content: Some("a < b".to_string()),
        };
        assert_eq!(
            directive_html(&directive),
            "<a href=\"/a?x=&quot;1&quot;\">a &lt; b</a>"
        );
    }
}
