//! Edit-history persistence: versioned documents in, canonical stacks in a
//! relational store, current-schema documents out.
//!
//! # Examples
//!
//! Import a schema 2 document into an in-memory store:
//! ```
//! use edithist::{
//!     config::HistoryConfig,
//!     document::Document,
//!     migrate::priority::BuiltinPriorities,
//!     persist::{sqlite::SqliteHistoryStore, StackStore},
//!     pipeline::import_document,
//! };
//!
//! let mut doc = Document::new();
//! doc.set_text("Xmp.develop.schema_version", "2");
//! doc.set_text("Xmp.develop.history_end", "1");
//! doc.set_text("Xmp.develop.history[1]/operation", "exposure");
//! doc.set_text("Xmp.develop.history[1]/modversion", "1");
//! doc.set_text("Xmp.develop.history[1]/enabled", "1");
//! doc.set_text("Xmp.develop.history[1]/params", "deadbeef");
//!
//! let mut store = SqliteHistoryStore::open_in_memory().expect("open sqlite");
//! import_document(&mut store, 1, &doc, &BuiltinPriorities, &HistoryConfig::default())
//!     .expect("import");
//! let stack = store.load_stack(1).expect("load").expect("stored");
//! assert_eq!(stack.entries[0].params, vec![0xde, 0xad, 0xbe, 0xef]);
//! ```
#![deny(missing_docs)]

/// Text encoding of opaque blobs.
pub mod codec;
/// Import and export settings.
pub mod config;
/// Key/value document model and versioned array reader.
pub mod document;
/// Canonical document writer.
pub mod export;
/// Schema upgrade, order-key resolution, and mask flattening.
pub mod migrate;
/// Schema-dispatching document parser.
pub mod parse;
/// Store abstraction and SQLite implementation.
pub mod persist;
/// End-to-end import and export.
pub mod pipeline;
/// History and mask records.
pub mod stack;
/// Shared primitive types and constants.
pub mod types;
