//! Document codecs: raw text in, [crate::tree::DocTree] out, and rendered
//! output back from a (possibly mutated) tree.

pub mod md;

pub use md::{md_options, parse_document, probe_metadata, render_html};
