//! # mnema-core
//!
//! A Rust library for turning a directory of wiki-linked markdown notes into
//! a ranked, queryable knowledge graph with spaced-repetition prompts.
//!
//! The name "mnema" comes from the Greek μνήμη - memory.
//!
//! ## Overview
//!
//! mnema-core parses every markdown note under a source directory, resolves
//! `[[wiki links]]` between notes by title, and produces an immutable
//! [`builder::GraphSnapshot`]: per note, its rendered HTML content, extracted
//! study prompts, bidirectional link/backlink lists ordered by PageRank, and
//! (optionally) its revision history.
//!
//! ### Key Features
//!
//! - **Stable identifiers**: every note gets a 53-bit id derived from its
//!   path, stable across builds and safe to hand to JavaScript consumers
//! - **Wiki-link resolution**: `[[Title]]` and `[[Title|alias]]` links
//!   resolved case-insensitively against note titles, with a pluggable
//!   render policy for resolved and dead links
//! - **Bidirectional edges**: links and backlinks are kept consistent by
//!   construction and verified after every build
//! - **Study prompts**: `Q. `/`A. ` question-answer pairs and `C. ` cloze
//!   deletions extracted from note text in document order
//! - **PageRank ordering**: link and backlink lists and the snapshot's note
//!   listing are ordered by note importance
//! - **Revision history**: an async [`history::RevisionLog`] collaborator
//!   supplies per-note logs; historical content is fetched lazily and cached
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mnema_core::{builder::GraphBuilder, config::BuildConfig, source::FsSource};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), mnema_core::MnemaError> {
//!     let config = BuildConfig {
//!         extract_prompts: true,
//!         ..BuildConfig::default()
//!     };
//!     let mut builder = GraphBuilder::new(config);
//!     let source = Arc::new(FsSource::new("./notes"));
//!
//!     let snapshot = builder.build(source, None).await?;
//!
//!     for note in snapshot.notes_by_rank() {
//!         println!("{} ({} backlinks)", note.title, note.backlink_ids.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Guide
//!
//! Start with [`builder::GraphBuilder`] for building graphs, then explore
//! [`note::Note`] for the per-note data model. [`source::NoteSource`] and
//! [`history::RevisionLog`] are the two collaborator traits a host
//! environment implements; [`config::BuildConfig`] selects features and the
//! link render policy.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod links;
pub mod note;
pub mod noteid;
pub mod prompts;
pub mod rank;
pub mod source;
pub mod store;
pub mod tree;

pub use error::*;
