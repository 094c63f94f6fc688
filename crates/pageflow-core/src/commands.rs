//! Command Interface Layer
//!
//! Every mutation an edit signal can request is a [`Command`] addressed by block id and char
//! offsets. [`CommandExecutor`] owns the canonical [`Document`] and applies commands to it; page
//! assignment is left to the flow engine, which runs after each command.
//!
//! # Example
//!
//! ```rust
//! use pageflow_core::{Block, Command, CommandExecutor, Document};
//!
//! let block = Block::paragraph("Hello world");
//! let id = block.id.clone();
//! let mut executor = CommandExecutor::new(Document::from_blocks("Notes", vec![block]));
//!
//! executor
//!     .execute(Command::InsertPageBreak { block: id, offset: 6 })
//!     .unwrap();
//!
//! assert_eq!(executor.document().block_count(), 3);
//! ```

use std::ops::Range;

use crate::block::{Alignment, Block, BlockId, BlockKind};
use crate::error::EditError;
use crate::format::{FormatMode, InlineFormat};
use crate::markup;
use crate::selection::Selection;
use crate::tree::{BlockLocation, Document};

/// A mutation of the block tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The surface changed a block's text or markup.
    ReplaceContent {
        /// Target block.
        block: BlockId,
        /// New inline markup.
        content: String,
    },
    /// Insert plain text, inheriting the formats at the caret.
    InsertText {
        /// Target block.
        block: BlockId,
        /// Char offset.
        offset: usize,
        /// Text to insert.
        text: String,
    },
    /// Delete a character range.
    DeleteRange {
        /// Target block.
        block: BlockId,
        /// Inclusive start char offset.
        start: usize,
        /// Exclusive end char offset.
        end: usize,
    },
    /// Split a block in two (Enter).
    SplitBlock {
        /// Target block.
        block: BlockId,
        /// Char offset of the split.
        offset: usize,
    },
    /// Insert a manual page break at a caret.
    InsertPageBreak {
        /// Target block.
        block: BlockId,
        /// Char offset of the caret.
        offset: usize,
    },
    /// Toggle an inline format over a selection.
    ToggleFormat {
        /// Selected range.
        selection: Selection,
        /// Format to toggle.
        format: InlineFormat,
    },
    /// Add or remove an inline format over a selection.
    ApplyFormat {
        /// Selected range.
        selection: Selection,
        /// Format to change.
        format: InlineFormat,
        /// Add or remove.
        mode: FormatMode,
    },
    /// Convert a block to another kind, dropping its inline formatting.
    SetBlockKind {
        /// Target block.
        block: BlockId,
        /// New kind.
        kind: BlockKind,
        /// Heading level when converting to a heading.
        heading_level: Option<u8>,
    },
    /// Change a block's alignment.
    SetAlignment {
        /// Target block.
        block: BlockId,
        /// New alignment; `None` resets to the default.
        alignment: Option<Alignment>,
    },
    /// Join a block onto the previous one (Backspace at offset 0).
    MergeWithPrevious {
        /// Target block.
        block: BlockId,
    },
    /// Delete a block.
    RemoveBlock {
        /// Target block.
        block: BlockId,
    },
}

impl Command {
    /// The block the command addresses.
    pub fn target(&self) -> &BlockId {
        match self {
            Self::ToggleFormat { selection, .. } | Self::ApplyFormat { selection, .. } => {
                &selection.block
            }
            Self::ReplaceContent { block, .. }
            | Self::InsertText { block, .. }
            | Self::DeleteRange { block, .. }
            | Self::SplitBlock { block, .. }
            | Self::InsertPageBreak { block, .. }
            | Self::SetBlockKind { block, .. }
            | Self::SetAlignment { block, .. }
            | Self::MergeWithPrevious { block }
            | Self::RemoveBlock { block } => block,
        }
    }
}

/// Command execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The tree changed; the caret can stay where it is.
    Success,
    /// The tree changed and the caret belongs at the given position.
    Caret(Selection),
    /// A format command ran with `mode`; `changed` is false if every character already matched.
    Formatted {
        /// Mode that was applied.
        mode: FormatMode,
        /// Whether any character changed.
        changed: bool,
    },
    /// Nothing changed.
    Unchanged,
}

impl CommandResult {
    /// Check whether the document changed.
    pub fn is_change(&self) -> bool {
        match self {
            Self::Success | Self::Caret(_) => true,
            Self::Formatted { changed, .. } => *changed,
            Self::Unchanged => false,
        }
    }
}

/// Validate `start..end` against a block of `len` chars.
pub fn check_range(start: usize, end: usize, len: usize) -> Result<Range<usize>, EditError> {
    if start <= end && end <= len {
        Ok(start..end)
    } else {
        Err(EditError::InvalidRange { start, end, len })
    }
}

fn resolve_range(start: usize, end: usize, len: usize) -> Range<usize> {
    check_range(start, end, len).unwrap_or_else(|err| {
        tracing::trace!(%err, "clamping edit range");
        let (lo, hi) = (start.min(end), start.max(end));
        lo.min(len)..hi.min(len)
    })
}

/// Applies [`Command`]s to a [`Document`].
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    document: Document,
    /// Location of the most recently edited block, after the edit.
    last_location: Option<BlockLocation>,
}

impl CommandExecutor {
    /// Create an executor owning `document`.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            last_location: None,
        }
    }

    /// The document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for structural rewrites (synchronization, flow).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Consume the executor and return the document.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Where the last successful command left its block.
    pub fn last_location(&self) -> Option<BlockLocation> {
        self.last_location
    }

    /// Execute one command.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult, EditError> {
        let target = command.target().clone();
        let loc = self
            .document
            .locate(&target)
            .ok_or_else(|| EditError::MissingBlock(target.clone()))?;
        self.last_location = Some(loc);

        match command {
            Command::ReplaceContent { content, .. } => self.replace_content(loc, &content),
            Command::InsertText { offset, text, .. } => self.insert_text(loc, offset, &text),
            Command::DeleteRange { start, end, .. } => self.delete_range(loc, start, end),
            Command::SplitBlock { offset, .. } => self.split_block(loc, offset),
            Command::InsertPageBreak { offset, .. } => self.insert_page_break(loc, offset),
            Command::ToggleFormat { selection, format } => {
                let block = self.editable(loc)?;
                let selected = selection.range();
                let range = resolve_range(selected.start, selected.end, block.text_len());
                if range.is_empty() {
                    return Ok(CommandResult::Unchanged);
                }
                let mode = block.content.toggle_format(range, format);
                Ok(CommandResult::Formatted {
                    mode,
                    changed: true,
                })
            }
            Command::ApplyFormat {
                selection,
                format,
                mode,
            } => {
                let block = self.editable(loc)?;
                let selected = selection.range();
                let range = resolve_range(selected.start, selected.end, block.text_len());
                let changed = block.content.apply_format(range, format, mode);
                Ok(CommandResult::Formatted { mode, changed })
            }
            Command::SetBlockKind {
                kind,
                heading_level,
                ..
            } => {
                let block = self.editable(loc)?;
                let level = match kind {
                    BlockKind::Heading => Some(heading_level.unwrap_or(1)),
                    _ => None,
                };
                if block.kind == kind && block.heading_level() == level {
                    return Ok(CommandResult::Unchanged);
                }
                block.convert_kind(kind, heading_level);
                Ok(CommandResult::Success)
            }
            Command::SetAlignment { alignment, .. } => {
                let block = self.editable(loc)?;
                if block.metadata.alignment == alignment {
                    return Ok(CommandResult::Unchanged);
                }
                block.metadata.alignment = alignment;
                Ok(CommandResult::Success)
            }
            Command::MergeWithPrevious { .. } => self.merge_with_previous(loc),
            Command::RemoveBlock { .. } => {
                self.document.remove_at(loc);
                self.last_location = self.document.previous_location(loc).or(Some(loc));
                Ok(CommandResult::Success)
            }
        }
    }

    /// Execute commands in order, stopping at the first error.
    pub fn execute_batch(
        &mut self,
        commands: Vec<Command>,
    ) -> Result<Vec<CommandResult>, EditError> {
        commands
            .into_iter()
            .map(|command| self.execute(command))
            .collect()
    }

    fn block_mut(&mut self, loc: BlockLocation) -> &mut Block {
        &mut self.document.pages[loc.page].blocks[loc.index]
    }

    fn editable(&mut self, loc: BlockLocation) -> Result<&mut Block, EditError> {
        let block = self.block_mut(loc);
        if block.is_page_break() {
            return Err(EditError::NotEditable(block.id.clone()));
        }
        Ok(block)
    }

    fn replace_content(
        &mut self,
        loc: BlockLocation,
        content: &str,
    ) -> Result<CommandResult, EditError> {
        let block = self.editable(loc)?;
        let parsed = markup::parse(content);
        if parsed == block.content {
            return Ok(CommandResult::Unchanged);
        }
        block.content = parsed;
        Ok(CommandResult::Success)
    }

    fn insert_text(
        &mut self,
        loc: BlockLocation,
        offset: usize,
        text: &str,
    ) -> Result<CommandResult, EditError> {
        let block = self.editable(loc)?;
        if text.is_empty() {
            return Ok(CommandResult::Unchanged);
        }
        let offset = resolve_range(offset, offset, block.text_len()).start;
        block.content.insert_text(offset, text, None);
        let caret = offset + text.chars().count();
        Ok(CommandResult::Caret(Selection::caret(block.id.clone(), caret)))
    }

    fn delete_range(
        &mut self,
        loc: BlockLocation,
        start: usize,
        end: usize,
    ) -> Result<CommandResult, EditError> {
        let block = self.editable(loc)?;
        let range = resolve_range(start, end, block.text_len());
        if !block.content.delete_range(range.clone()) {
            return Ok(CommandResult::Unchanged);
        }
        Ok(CommandResult::Caret(Selection::caret(block.id.clone(), range.start)))
    }

    fn split_block(&mut self, loc: BlockLocation, offset: usize) -> Result<CommandResult, EditError> {
        let block = self.editable(loc)?;
        let offset = resolve_range(offset, offset, block.text_len()).start;
        let right = block.content.split_off(offset);
        let next = block.continuation(right);
        let caret = Selection::caret(next.id.clone(), 0);
        self.document.insert_after(loc, [next]);
        self.last_location = Some(BlockLocation::new(loc.page, loc.index + 1));
        Ok(CommandResult::Caret(caret))
    }

    fn insert_page_break(
        &mut self,
        loc: BlockLocation,
        offset: usize,
    ) -> Result<CommandResult, EditError> {
        let block = self.editable(loc)?;
        let offset = resolve_range(offset, offset, block.text_len()).start;

        if offset == 0 {
            if self.document.previous_location(loc).is_none() {
                tracing::debug!(?loc, "ignoring page break before the first block");
                return Ok(CommandResult::Unchanged);
            }
            self.document.pages[loc.page]
                .blocks
                .insert(loc.index, Block::page_break());
            self.last_location = Some(BlockLocation::new(loc.page, loc.index + 1));
            return Ok(CommandResult::Success);
        }

        let block = self.block_mut(loc);
        let right = block.content.split_off(offset);
        let next = block.continuation(right);
        let caret = Selection::caret(next.id.clone(), 0);
        self.document.insert_after(loc, [Block::page_break(), next]);
        self.last_location = Some(BlockLocation::new(loc.page, loc.index + 2));
        Ok(CommandResult::Caret(caret))
    }

    fn merge_with_previous(&mut self, loc: BlockLocation) -> Result<CommandResult, EditError> {
        let Some(prev_loc) = self.document.previous_location(loc) else {
            return Ok(CommandResult::Unchanged);
        };

        if self.block_mut(prev_loc).is_page_break() {
            let id = self.block_mut(loc).id.clone();
            self.document.remove_at(prev_loc);
            self.last_location = self.document.locate(&id);
            return Ok(CommandResult::Success);
        }

        // A sentinel has no text, so merging it just removes it.
        let Some(removed) = self.document.remove_at(loc) else {
            return Ok(CommandResult::Unchanged);
        };
        let prev = self.block_mut(prev_loc);
        let caret = Selection::caret(prev.id.clone(), prev.text_len());
        prev.content.append(removed.content);
        self.last_location = Some(prev_loc);
        Ok(CommandResult::Caret(caret))
    }
}
