//! Content blocks.
//!
//! A block is a paragraph, heading or list item holding [`RichText`], or a page-break sentinel.
//! Sentinels are zero-height, carry no text and never merge with neighbours.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::RichText;

/// Block identifier, unique within a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Structural block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Body text.
    #[default]
    Paragraph,
    /// Section heading; see [`BlockMetadata::heading_level`].
    Heading,
    /// List item.
    List,
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Flush left.
    Left,
    /// Centered.
    Center,
    /// Flush right.
    Right,
    /// Justified.
    Justify,
}

/// Highest supported heading level.
pub const MAX_HEADING_LEVEL: u8 = 6;

/// Block-level attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    /// Alignment, if set explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    /// Heading level `1..=6`; only meaningful for headings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    /// Marks a page-break sentinel.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_page_break: bool,
}

/// A single content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Stable identity; survives moves between pages.
    pub id: BlockId,
    /// Structural type.
    pub kind: BlockKind,
    /// Formatted text (always empty for sentinels).
    pub content: RichText,
    /// Block-level attributes.
    pub metadata: BlockMetadata,
}

impl Block {
    /// Create a block of `kind` with a fresh id.
    pub fn new(kind: BlockKind, content: RichText) -> Self {
        Self::with_id(BlockId::generate(), kind, content)
    }

    /// Create a block with an explicit id.
    pub fn with_id(id: BlockId, kind: BlockKind, content: RichText) -> Self {
        let mut metadata = BlockMetadata::default();
        if kind == BlockKind::Heading {
            metadata.heading_level = Some(1);
        }
        Self {
            id,
            kind,
            content,
            metadata,
        }
    }

    /// Unformatted paragraph with a fresh id.
    pub fn paragraph(text: &str) -> Self {
        Self::new(BlockKind::Paragraph, RichText::plain(text))
    }

    /// Heading of `level` with a fresh id.
    pub fn heading(text: &str, level: u8) -> Self {
        let mut block = Self::new(BlockKind::Heading, RichText::plain(text));
        block.metadata.heading_level = Some(level.clamp(1, MAX_HEADING_LEVEL));
        block
    }

    /// A page-break sentinel with a fresh id.
    pub fn page_break() -> Self {
        let mut block = Self::new(BlockKind::Paragraph, RichText::new());
        block.metadata.is_page_break = true;
        block
    }

    /// Check whether this block is a page-break sentinel.
    pub fn is_page_break(&self) -> bool {
        self.metadata.is_page_break
    }

    /// Check whether this is a content block holding no text.
    pub fn is_blank(&self) -> bool {
        !self.is_page_break() && self.content.is_empty()
    }

    /// Length of the text in characters.
    pub fn text_len(&self) -> usize {
        self.content.len()
    }

    /// Plain text of the block.
    pub fn plain_text(&self) -> String {
        self.content.plain_text()
    }

    /// Heading level, defaulting to 1 for headings and `None` otherwise.
    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            BlockKind::Heading => Some(self.metadata.heading_level.unwrap_or(1)),
            _ => None,
        }
    }

    /// Convert to `kind`, keeping only the plain text and the alignment.
    ///
    /// Conversion is deliberately lossy: inline formatting is discarded.
    pub fn convert_kind(&mut self, kind: BlockKind, heading_level: Option<u8>) {
        let text = self.content.plain_text();
        self.content = RichText::plain(&text);
        self.kind = kind;
        self.metadata.heading_level = match kind {
            BlockKind::Heading => Some(heading_level.unwrap_or(1).clamp(1, MAX_HEADING_LEVEL)),
            _ => None,
        };
    }

    /// A new empty block continuing this one after a split.
    ///
    /// Headings continue as paragraphs; list items continue the list.
    pub(crate) fn continuation(&self, content: RichText) -> Self {
        let kind = match self.kind {
            BlockKind::Heading => BlockKind::Paragraph,
            other => other,
        };
        let mut block = Self::new(kind, content);
        block.metadata.alignment = self.metadata.alignment;
        block
    }
}
