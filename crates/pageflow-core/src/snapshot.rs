//! Persisted document shape.
//!
//! The JSON layout stored by a [`DocumentStore`](crate::persist::DocumentStore):
//!
//! ```json
//! {
//!   "id": "…", "title": "…", "createdAt": 0, "updatedAt": 0,
//!   "pages": [{ "number": 1, "blocks": [
//!     { "id": "…", "type": "paragraph", "content": "<b>hi</b>", "metadata": {} }
//!   ]}]
//! }
//! ```
//!
//! `content` is inline markup (see [`crate::markup`]).

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId, BlockKind, BlockMetadata};
use crate::error::PersistError;
use crate::format::RichText;
use crate::markup;
use crate::tree::{Document, Page};

/// A stored block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBlock {
    /// Block id.
    pub id: String,
    /// Block kind.
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Inline markup.
    #[serde(default)]
    pub content: String,
    /// Block-level attributes.
    #[serde(default)]
    pub metadata: BlockMetadata,
}

/// A stored page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPage {
    /// 1-based page number.
    pub number: usize,
    /// Blocks in order.
    #[serde(default)]
    pub blocks: Vec<PersistedBlock>,
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocument {
    /// Document id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Pages in order.
    pub pages: Vec<PersistedPage>,
    /// Creation time, epoch ms UTC.
    pub created_at: i64,
    /// Last modification time, epoch ms UTC.
    pub updated_at: i64,
}

impl PersistedDocument {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rebuild the canonical tree. Sentinel text is dropped and empty documents get a paragraph.
    pub fn into_document(self) -> Document {
        let pages = self
            .pages
            .into_iter()
            .map(|page| {
                let blocks = page.blocks.into_iter().map(restore_block).collect();
                Page::new(page.number, blocks)
            })
            .collect();
        let mut document = Document {
            id: self.id,
            title: self.title,
            pages,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        document.ensure_content();
        document
    }
}

fn restore_block(stored: PersistedBlock) -> Block {
    let content = if stored.metadata.is_page_break {
        RichText::new()
    } else {
        markup::parse(&stored.content)
    };
    let mut block = Block::with_id(BlockId::new(stored.id), stored.kind, content);
    block.metadata.alignment = stored.metadata.alignment;
    block.metadata.is_page_break = stored.metadata.is_page_break;
    if stored.kind == BlockKind::Heading && !block.is_page_break() {
        block.metadata.heading_level = Some(stored.metadata.heading_level.unwrap_or(1));
    } else {
        block.metadata.heading_level = None;
    }
    block
}

impl From<&Document> for PersistedDocument {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            title: document.title.clone(),
            pages: document
                .pages
                .iter()
                .map(|page| PersistedPage {
                    number: page.number,
                    blocks: page
                        .blocks
                        .iter()
                        .map(|block| PersistedBlock {
                            id: block.id.to_string(),
                            kind: block.kind,
                            content: markup::serialize(&block.content),
                            metadata: block.metadata,
                        })
                        .collect(),
                })
                .collect(),
            created_at: document.created_at,
            updated_at: document.updated_at,
        }
    }
}
