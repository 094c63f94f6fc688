#![warn(missing_docs)]
//! Pageflow Core - Headless Paginated Rich-Text Engine
//!
//! # Overview
//!
//! `pageflow-core` keeps a rich-text document as an ordered list of fixed-height pages, each
//! holding an ordered list of blocks (paragraphs, headings, list items and manual page-break
//! sentinels). It does not render anything. The host supplies a [`HeightOracle`] that measures
//! blocks, and the engine decides which page every block belongs on.
//!
//! # Core Features
//!
//! - **Page Flow**: overflow moves trailing blocks forward, freed space pulls blocks back, empty
//!   pages are pruned, and manual page breaks always end their page
//! - **Inline Formats**: character-level bold/italic/underline/strikethrough over canonical runs
//! - **Surface Sync**: reconcile a raw structure reported by an editing surface into the canonical
//!   tree, with a structural delta
//! - **State Tracking**: version number and change notifications
//! - **Debounced Saving**: snapshots are written after a quiescence window; failures are retried
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Editor Session (state + save scheduling)   │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Commands            │  Surface Sync        │  ← Mutations
//! ├─────────────────────────────────────────────┤
//! │  Flow Engine  ←  Height Oracle              │  ← Pagination
//! ├─────────────────────────────────────────────┤
//! │  Block Tree (pages, blocks, index)          │  ← Canonical Model
//! ├─────────────────────────────────────────────┤
//! │  Rich Text (format runs, markup)            │  ← Inline Content
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Instant;
//! use pageflow_core::{
//!     Block, Command, Document, EditEvent, EditorSession, EngineConfig, MemoryStore, OracleError,
//!     BlockMetrics,
//! };
//!
//! // Every block is as tall as its text is long.
//! let oracle = |block: &Block| Ok::<_, OracleError>(BlockMetrics::new(block.text_len() as f32));
//!
//! let first = Block::paragraph("aaaaaaaa");
//! let id = first.id.clone();
//! let document = Document::from_blocks("Notes", vec![first, Block::paragraph("bbbbbbbb")]);
//! let config = EngineConfig::default().with_budget(10.0);
//!
//! let mut session = EditorSession::new(document, config, oracle);
//! assert_eq!(session.document().pages.len(), 2);
//!
//! // Shrinking the first block lets the second one flow back.
//! session.handle(
//!     EditEvent::command(Command::DeleteRange { block: id, start: 0, end: 7 }),
//!     Instant::now(),
//! );
//! assert_eq!(session.document().pages.len(), 1);
//!
//! let mut store = MemoryStore::new();
//! session.flush_save(Instant::now(), &mut store);
//! assert_eq!(store.len(), 1);
//! ```
//!
//! # Module Description
//!
//! - [`format`] - Format runs and range operations
//! - [`markup`] - Inline markup serialization
//! - [`block`] - Blocks and block metadata
//! - [`tree`] - Pages, documents and the block index
//! - [`oracle`] - Block measurement
//! - [`flow`] - Page flow engine
//! - [`sync`] - Surface reconciliation
//! - [`commands`] - Command interface
//! - [`state`] - Editing session and change notifications
//! - [`snapshot`] / [`persist`] - Stored shape, stores and save scheduling

pub mod block;
pub mod commands;
pub mod config;
pub mod delta;
pub mod error;
pub mod flow;
pub mod format;
pub mod markup;
pub mod oracle;
pub mod persist;
pub mod selection;
pub mod snapshot;
pub mod state;
pub mod sync;
pub mod tree;

pub use block::{Alignment, Block, BlockId, BlockKind, BlockMetadata, MAX_HEADING_LEVEL};
pub use commands::{Command, CommandExecutor, CommandResult, check_range};
pub use config::{EngineConfig, PageFormat, RescanPolicy};
pub use delta::{DocumentDelta, StructuralChange};
pub use error::{EditError, Error, OracleError, PersistError};
pub use flow::{FlowEngine, FlowReport};
pub use format::{FormatMode, FormatRun, FormatSet, InlineFormat, RichText};
pub use oracle::{BlockMetrics, HeightOracle, TextMetricsOracle};
pub use persist::{DocumentStore, DocumentSummary, MemoryStore, SaveScheduler, SaveStatus};
pub use selection::{Selection, SelectionDirection};
pub use snapshot::{PersistedBlock, PersistedDocument, PersistedPage};
pub use state::{
    EditEvent, EditorSession, SessionCallback, SessionChange, SessionChangeKind, SessionOutcome,
};
pub use sync::{RawBlock, RawDocument, RawPage, Reconciliation, Synchronizer};
pub use tree::{BlockIndex, BlockLocation, Document, Page};
