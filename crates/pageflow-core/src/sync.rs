//! Reconciling the canonical tree with the editing surface.
//!
//! The surface owns the live editable structure and reports it as a [`RawDocument`]. Before each
//! flow pass the canonical [`Document`] is rebuilt from that snapshot: the snapshot decides which
//! blocks exist and in what order, while the canonical tree supplies the baseline the
//! [`DocumentDelta`] is expressed against.
//!
//! Surface artifacts are repaired on the way in:
//! - blocks without an id, or repeating an id seen earlier in the snapshot, get a fresh id
//! - blocks without a kind take the kind of the preceding content block (or become paragraphs)
//! - page-break sentinels lose any text

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::block::{Block, BlockId, BlockKind, BlockMetadata};
use crate::delta::{DocumentDelta, StructuralChange};
use crate::markup;
use crate::tree::{BlockIndex, Document, Page};

/// A block as reported by the editing surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    /// Surface id, if the surface kept one.
    #[serde(default)]
    pub id: Option<String>,
    /// Block kind; `None` for degenerate containers.
    #[serde(default, rename = "type")]
    pub kind: Option<BlockKind>,
    /// Inline markup.
    #[serde(default)]
    pub content: String,
    /// Block-level attributes.
    #[serde(default)]
    pub metadata: BlockMetadata,
}

impl RawBlock {
    /// A raw block mirroring a canonical one.
    pub fn from_block(block: &Block) -> Self {
        Self {
            id: Some(block.id.to_string()),
            kind: Some(block.kind),
            content: markup::serialize(&block.content),
            metadata: block.metadata,
        }
    }
}

/// A page as reported by the editing surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPage {
    /// Blocks in order.
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

/// The surface's full structural snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDocument {
    /// Pages in order.
    #[serde(default)]
    pub pages: Vec<RawPage>,
}

impl RawDocument {
    /// A raw snapshot mirroring `document` exactly.
    pub fn from_document(document: &Document) -> Self {
        Self {
            pages: document
                .pages
                .iter()
                .map(|page| RawPage {
                    blocks: page.blocks.iter().map(RawBlock::from_block).collect(),
                })
                .collect(),
        }
    }

    /// Flat iterator over every raw block.
    pub fn blocks(&self) -> impl Iterator<Item = &RawBlock> {
        self.pages.iter().flat_map(|page| page.blocks.iter())
    }
}

/// Result of [`diff`]: the rebuilt pages and the delta that leads to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Pages built from the snapshot.
    pub pages: Vec<Page>,
    /// Changes relative to the canonical tree.
    pub delta: DocumentDelta,
}

/// Compute the tree described by `raw` and its delta against `document`.
///
/// Pure: `document` is not modified.
pub fn diff(document: &Document, raw: &RawDocument) -> Reconciliation {
    let mut old: HashMap<&BlockId, (usize, usize, &Block)> = HashMap::new();
    let mut flat = 0usize;
    for (page_idx, page) in document.pages.iter().enumerate() {
        for block in &page.blocks {
            old.insert(&block.id, (flat, page_idx, block));
            flat += 1;
        }
    }

    let mut delta = DocumentDelta::default();
    let mut seen: HashSet<BlockId> = HashSet::new();
    let mut retained: Vec<(BlockId, usize, usize, usize)> = Vec::new();
    let mut pages = Vec::with_capacity(raw.pages.len());
    let mut previous_content: Option<(BlockKind, Option<u8>)> = None;
    let mut new_flat = 0usize;

    for (page_idx, raw_page) in raw.pages.iter().enumerate() {
        let mut blocks = Vec::with_capacity(raw_page.blocks.len());
        for (index, raw_block) in raw_page.blocks.iter().enumerate() {
            let reported = raw_block
                .id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(BlockId::new)
                .filter(|id| !seen.contains(id));
            let fresh = reported.is_none();
            let id = reported.unwrap_or_else(BlockId::generate);
            seen.insert(id.clone());

            let block = build_block(id.clone(), raw_block, previous_content, &mut delta, page_idx);
            if !block.is_page_break() {
                previous_content = Some((block.kind, block.metadata.heading_level));
            }

            match old.get(&id).filter(|_| !fresh) {
                Some(&(old_flat, _, previous)) => {
                    retained.push((id.clone(), old_flat, new_flat, page_idx));
                    if previous.kind != block.kind {
                        delta.push(
                            StructuralChange::Retyped {
                                id: id.clone(),
                                from: previous.kind,
                                to: block.kind,
                            },
                            page_idx,
                        );
                    } else if previous.content != block.content
                        || previous.metadata != block.metadata
                    {
                        delta.push(StructuralChange::ContentChanged { id: id.clone() }, page_idx);
                    }
                }
                None => delta.push(
                    StructuralChange::Inserted {
                        id: id.clone(),
                        page: page_idx,
                        index,
                    },
                    page_idx,
                ),
            }

            blocks.push(block);
            new_flat += 1;
        }
        pages.push(Page::new(page_idx + 1, blocks));
    }

    let order: Vec<usize> = retained.iter().map(|(_, old_flat, _, _)| *old_flat).collect();
    let stable = longest_increasing_subsequence(&order);
    for (pos, (id, from, to, page_idx)) in retained.iter().enumerate() {
        if !stable.contains(&pos) {
            delta.push(
                StructuralChange::Reordered {
                    id: id.clone(),
                    from: *from,
                    to: *to,
                },
                *page_idx,
            );
        }
    }

    for page in &document.pages {
        for block in &page.blocks {
            if !seen.contains(&block.id) {
                let (_, page_idx, _) = old[&block.id];
                delta.push(
                    StructuralChange::Removed {
                        id: block.id.clone(),
                    },
                    page_idx,
                );
            }
        }
    }

    if pages.is_empty() {
        pages.push(Page::new(1, Vec::new()));
    }

    Reconciliation { pages, delta }
}

fn build_block(
    id: BlockId,
    raw: &RawBlock,
    previous_content: Option<(BlockKind, Option<u8>)>,
    delta: &mut DocumentDelta,
    page_idx: usize,
) -> Block {
    let mut metadata = raw.metadata;

    if metadata.is_page_break {
        if !raw.content.is_empty() {
            tracing::trace!(%id, "dropping text reported on a page break");
        }
        let mut block = Block::with_id(id, BlockKind::Paragraph, Default::default());
        block.metadata = BlockMetadata {
            heading_level: None,
            ..metadata
        };
        return block;
    }

    let kind = match raw.kind {
        Some(kind) => kind,
        None => {
            let (kind, level) = previous_content.unwrap_or_default();
            if kind == BlockKind::Heading && metadata.heading_level.is_none() {
                metadata.heading_level = level;
            }
            tracing::debug!(%id, ?kind, "normalizing block without a kind");
            delta.push(
                StructuralChange::Normalized {
                    id: id.clone(),
                    kind,
                },
                page_idx,
            );
            kind
        }
    };

    let mut block = Block::with_id(id, kind, markup::parse(&raw.content));
    block.metadata.alignment = metadata.alignment;
    if kind == BlockKind::Heading {
        block.metadata.heading_level = Some(metadata.heading_level.unwrap_or(1));
    }
    block
}

/// Positions (into `values`) of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(values: &[usize]) -> HashSet<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut parent: Vec<Option<usize>> = vec![None; values.len()];

    for (pos, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&t| values[t] < value);
        if slot > 0 {
            parent[pos] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(pos);
        } else {
            tails[slot] = pos;
        }
    }

    let mut stable = HashSet::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(pos) = cursor {
        stable.insert(pos);
        cursor = parent[pos];
    }
    stable
}

/// Applies raw snapshots to a document and keeps a lookup index current.
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    index: BlockIndex,
}

impl Synchronizer {
    /// Create a synchronizer with an index over `document`.
    pub fn new(document: &Document) -> Self {
        Self {
            index: document.index(),
        }
    }

    /// The page → block index as of the last reconciliation.
    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    /// Rebuild the index after the tree changed through another path.
    pub fn refresh(&mut self, document: &Document) {
        self.index = document.index();
    }

    /// Replace the structure of `document` with `raw` and return what changed.
    pub fn reconcile(&mut self, document: &mut Document, raw: &RawDocument) -> DocumentDelta {
        let Reconciliation { pages, delta } = diff(document, raw);
        document.pages = pages;
        document.ensure_content();
        self.index = document.index();
        if !delta.is_empty() {
            tracing::debug!(
                changes = delta.len(),
                first_page = ?delta.first_page,
                "reconciled surface snapshot"
            );
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lis_picks_longest_run() {
        let stable = longest_increasing_subsequence(&[0, 3, 1, 2, 4]);
        let mut positions: Vec<_> = stable.into_iter().collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 2, 3, 4]);
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn test_build_block_strips_sentinel_text() {
        let raw = RawBlock {
            id: None,
            kind: Some(BlockKind::Heading),
            content: "stray".into(),
            metadata: BlockMetadata {
                is_page_break: true,
                heading_level: Some(2),
                ..Default::default()
            },
        };
        let mut delta = DocumentDelta::default();
        let block = build_block(BlockId::new("pb"), &raw, None, &mut delta, 0);
        assert!(block.is_page_break());
        assert!(block.content.is_empty());
        assert_eq!(block.metadata.heading_level, None);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_unchanged_snapshot_has_empty_delta() {
        let doc = Document::from_blocks("t", vec![Block::paragraph("a"), Block::heading("b", 2)]);
        let raw = RawDocument::from_document(&doc);
        let result = diff(&doc, &raw);
        assert!(result.delta.is_empty());
        assert_eq!(result.pages, doc.pages);
    }
}
