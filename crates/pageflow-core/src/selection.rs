//! Explicit selection value.
//!
//! A selection lives inside one block and is expressed in character offsets. `start` is the
//! anchor and `end` the active end, so a backward selection has `start > end`.

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

use crate::block::BlockId;
use crate::format::RichText;

/// Selection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionDirection {
    /// Anchor before the active end.
    Forward,
    /// Anchor after the active end.
    Backward,
}

/// A caret or range inside a single block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Block holding the selection.
    pub block: BlockId,
    /// Anchor offset (chars).
    pub start: usize,
    /// Active offset (chars).
    pub end: usize,
}

impl Selection {
    /// Create a selection.
    pub fn new(block: BlockId, start: usize, end: usize) -> Self {
        Self { block, start, end }
    }

    /// A collapsed selection at `offset`.
    pub fn caret(block: BlockId, offset: usize) -> Self {
        Self::new(block, offset, offset)
    }

    /// Check whether the selection is a caret.
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Direction of the selection.
    pub fn direction(&self) -> SelectionDirection {
        if self.start <= self.end {
            SelectionDirection::Forward
        } else {
            SelectionDirection::Backward
        }
    }

    /// The selected range with `start <= end`.
    pub fn range(&self) -> Range<usize> {
        self.start.min(self.end)..self.start.max(self.end)
    }

    /// Clamp both ends to `content` and snap them down to grapheme boundaries, so the caret
    /// never sits inside a combined character.
    pub fn clamped_to(&self, content: &RichText) -> Self {
        let text = content.plain_text();
        let boundaries = grapheme_boundaries(&text);
        let snap = |offset: usize| {
            let idx = boundaries.partition_point(|&b| b <= offset);
            boundaries[idx.saturating_sub(1)]
        };
        Self::new(self.block.clone(), snap(self.start), snap(self.end))
    }
}

/// Char offsets of every grapheme boundary in `text`, including 0 and the end.
fn grapheme_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries = vec![0];
    let mut offset = 0;
    for grapheme in text.graphemes(true) {
        offset += grapheme.chars().count();
        boundaries.push(offset);
    }
    boundaries
}
