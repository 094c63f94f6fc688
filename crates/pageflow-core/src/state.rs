//! Editing session.
//!
//! [`EditorSession`] is the single owner of the canonical document while the editor is open. Each
//! [`EditEvent`] runs synchronously to completion:
//!
//! 1. reconcile the tree against the surface's raw snapshot (if any)
//! 2. apply the command (if any)
//! 3. run the flow engine, compacting from the edited page
//! 4. bump the version, notify subscribers and hand the snapshot to the save scheduler
//!
//! Nothing in this path returns an error to the caller. Commands that cannot apply are dropped
//! and reported in the [`SessionOutcome`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use pageflow_core::{Block, Command, EditEvent, EditorSession, EngineConfig, Document, TextMetricsOracle};
//!
//! let block = Block::paragraph("Hello");
//! let id = block.id.clone();
//! let document = Document::from_blocks("Notes", vec![block]);
//! let mut session = EditorSession::new(document, EngineConfig::default(), TextMetricsOracle::default());
//!
//! session.subscribe(|change| {
//!     println!("version {} -> {}", change.old_version, change.new_version);
//! });
//!
//! let outcome = session.handle(
//!     EditEvent::command(Command::InsertText { block: id, offset: 5, text: ", world".into() }),
//!     Instant::now(),
//! );
//! assert!(outcome.modified);
//! assert_eq!(session.version(), 1);
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::block::BlockId;
use crate::commands::{Command, CommandExecutor, CommandResult};
use crate::config::EngineConfig;
use crate::delta::DocumentDelta;
use crate::error::{EditError, PersistError};
use crate::flow::{FlowEngine, FlowReport};
use crate::format::FormatSet;
use crate::oracle::{HeightOracle, TextMetricsOracle};
use crate::persist::{DocumentStore, SaveScheduler, SaveStatus};
use crate::selection::Selection;
use crate::snapshot::PersistedDocument;
use crate::sync::{RawDocument, Synchronizer};
use crate::tree::Document;

/// One signal from the editing surface.
#[derive(Debug, Clone, Default)]
pub struct EditEvent {
    /// Raw structure to reconcile before the command.
    pub raw: Option<RawDocument>,
    /// Mutation to apply.
    pub command: Option<Command>,
    /// Selection reported by the surface, applied before the command.
    pub selection: Option<Selection>,
}

impl EditEvent {
    /// An event carrying only a command.
    pub fn command(command: Command) -> Self {
        Self {
            command: Some(command),
            ..Self::default()
        }
    }

    /// An event carrying only a raw snapshot.
    pub fn sync(raw: RawDocument) -> Self {
        Self {
            raw: Some(raw),
            ..Self::default()
        }
    }

    /// An event carrying only a selection change.
    pub fn select(selection: Selection) -> Self {
        Self {
            selection: Some(selection),
            ..Self::default()
        }
    }

    /// Attach a raw snapshot.
    pub fn with_raw(mut self, raw: RawDocument) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Attach a selection.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// What a single [`EditorSession::handle`] call did.
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    /// Structural changes found while reconciling.
    pub delta: DocumentDelta,
    /// Result of the command, if one ran.
    pub result: Option<CommandResult>,
    /// Why the command was dropped, if it was.
    pub dropped: Option<EditError>,
    /// Flow pass summary, if the tree changed.
    pub report: Option<FlowReport>,
    /// Whether the document changed.
    pub modified: bool,
    /// Session version after the event.
    pub version: u64,
}

/// Session change type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChangeKind {
    /// The document tree changed.
    DocumentModified,
    /// Only the selection moved.
    SelectionChanged,
}

/// Session change record
#[derive(Debug, Clone)]
pub struct SessionChange {
    /// Change type.
    pub kind: SessionChangeKind,
    /// Version before the change.
    pub old_version: u64,
    /// Version after the change.
    pub new_version: u64,
    /// Flow pass summary for document changes.
    pub report: Option<FlowReport>,
    /// Structural delta found by reconciliation, if any.
    pub delta: Option<Arc<DocumentDelta>>,
}

/// Session change callback function type
pub type SessionCallback = Box<dyn FnMut(&SessionChange) + Send>;

/// Owns the canonical document and runs the edit pipeline.
pub struct EditorSession<O = TextMetricsOracle> {
    executor: CommandExecutor,
    engine: FlowEngine,
    oracle: O,
    sync: Synchronizer,
    selection: Option<Selection>,
    version: u64,
    callbacks: Vec<SessionCallback>,
    scheduler: SaveScheduler,
    last_report: Option<FlowReport>,
}

impl<O: HeightOracle> EditorSession<O> {
    /// Open a session. The document is paginated immediately; that initial pass is not an edit.
    pub fn new(mut document: Document, config: EngineConfig, oracle: O) -> Self {
        let engine = FlowEngine::new(config);
        let report = engine.reflow_all(&mut document, &oracle);
        let scheduler = SaveScheduler::new(engine.config().save_debounce());
        let selection = first_caret(&document, 0);
        Self {
            sync: Synchronizer::new(&document),
            executor: CommandExecutor::new(document),
            engine,
            oracle,
            selection,
            version: 0,
            callbacks: Vec::new(),
            scheduler,
            last_report: Some(report),
        }
    }

    /// Load `id` from `store` and open a session on it.
    pub fn open<S>(store: &S, id: &str, config: EngineConfig, oracle: O) -> Result<Self, PersistError>
    where
        S: DocumentStore + ?Sized,
    {
        let document = store.get(id)?.into_document();
        Ok(Self::new(document, config, oracle))
    }

    /// Process one edit event.
    pub fn handle(&mut self, event: EditEvent, now: Instant) -> SessionOutcome {
        let mut outcome = SessionOutcome::default();
        let selection_before = self.selection.clone();
        let mut seed: Option<usize> = None;

        if let Some(raw) = event.raw {
            let layout_before = page_layout(self.executor.document());
            let delta = self.sync.reconcile(self.executor.document_mut(), &raw);
            if !delta.is_empty() {
                outcome.modified = true;
                seed = delta.first_page;
            } else if page_layout(self.executor.document()) != layout_before {
                outcome.modified = true;
            }
            outcome.delta = delta;
        }

        if let Some(selection) = event.selection {
            self.selection = Some(selection);
        }

        if let Some(command) = event.command {
            match self.executor.execute(command) {
                Ok(result) => {
                    if result.is_change() {
                        outcome.modified = true;
                        if let Some(loc) = self.executor.last_location() {
                            seed = Some(seed.map_or(loc.page, |s| s.min(loc.page)));
                        }
                    }
                    if let CommandResult::Caret(caret) = &result {
                        self.selection = Some(caret.clone());
                    }
                    outcome.result = Some(result);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "dropping edit command");
                    outcome.dropped = Some(err);
                }
            }
        }

        if outcome.modified {
            let document = self.executor.document_mut();
            let report = self
                .engine
                .reflow(document, &self.oracle, seed.unwrap_or(0));
            document.touch();
            self.sync.refresh(self.executor.document());
            self.scheduler.note_edit(now, self.executor.document());
            self.last_report = Some(report);
            outcome.report = Some(report);
        }

        self.repair_selection(seed.unwrap_or(0));

        if outcome.modified {
            let delta = (!outcome.delta.is_empty()).then(|| Arc::new(outcome.delta.clone()));
            self.mark_modified(SessionChangeKind::DocumentModified, outcome.report, delta);
        } else if self.selection != selection_before {
            self.mark_modified(SessionChangeKind::SelectionChanged, None, None);
        }

        outcome.version = self.version;
        outcome
    }

    /// Keep the selection on an existing block, inside its text.
    fn repair_selection(&mut self, page_hint: usize) {
        let document = self.executor.document();
        self.selection = match self.selection.take() {
            Some(selection) => match document.block(&selection.block) {
                Some(block) => Some(selection.clamped_to(&block.content)),
                None => first_caret(document, page_hint),
            },
            None => None,
        };
    }

    fn mark_modified(
        &mut self,
        kind: SessionChangeKind,
        report: Option<FlowReport>,
        delta: Option<Arc<DocumentDelta>>,
    ) {
        let old_version = self.version;
        self.version += 1;
        let change = SessionChange {
            kind,
            old_version,
            new_version: self.version,
            report,
            delta,
        };
        for callback in &mut self.callbacks {
            callback(&change);
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&SessionChange) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Borrow the canonical document.
    pub fn document(&self) -> &Document {
        self.executor.document()
    }

    /// An owned copy of the current document.
    pub fn snapshot(&self) -> Document {
        self.executor.document().clone()
    }

    /// The persisted form of the current document.
    pub fn persisted(&self) -> PersistedDocument {
        PersistedDocument::from(self.executor.document())
    }

    /// The current selection.
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Current version (incremented on every change).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Check whether anything changed since `version`.
    pub fn has_changed_since(&self, version: u64) -> bool {
        self.version > version
    }

    /// Summary of the latest flow pass.
    pub fn last_report(&self) -> Option<FlowReport> {
        self.last_report
    }

    /// Active engine configuration.
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Persistence state.
    pub fn save_status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    /// The save scheduler.
    pub fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    /// Formats active across the current selection.
    pub fn active_formats(&self) -> FormatSet {
        self.selection
            .as_ref()
            .and_then(|sel| {
                let block = self.executor.document().block(&sel.block)?;
                Some(block.content.active_formats(sel.range()))
            })
            .unwrap_or(FormatSet::EMPTY)
    }

    /// Save if the quiescence window has elapsed. Failures only change [`Self::save_status`].
    pub fn poll_save<S>(&mut self, now: Instant, store: &mut S) -> Option<Result<(), PersistError>>
    where
        S: DocumentStore + ?Sized,
    {
        self.scheduler.poll(now, store)
    }

    /// Save any pending snapshot now.
    pub fn flush_save<S>(&mut self, now: Instant, store: &mut S) -> Option<Result<(), PersistError>>
    where
        S: DocumentStore + ?Sized,
    {
        self.scheduler.flush(now, store)
    }
}

/// Block ids per page, for detecting pure page reassignment.
fn page_layout(document: &Document) -> Vec<Vec<BlockId>> {
    document
        .pages
        .iter()
        .map(|page| page.blocks.iter().map(|b| b.id.clone()).collect())
        .collect()
}

fn first_caret(document: &Document, page_hint: usize) -> Option<Selection> {
    let on_page = document
        .pages
        .get(page_hint)
        .and_then(|page| page.blocks.iter().find(|b| !b.is_page_break()));
    on_page
        .or_else(|| document.blocks().filter(|b| !b.is_page_break()).last())
        .map(|block| Selection::caret(block.id.clone(), 0))
}
