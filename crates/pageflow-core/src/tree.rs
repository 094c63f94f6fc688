//! The canonical block/page tree.
//!
//! A [`Document`] is an ordered list of [`Page`]s, each an ordered list of [`Block`]s. Page
//! assignment is owned by the flow engine; everything else addresses blocks by [`BlockId`]
//! through [`Document::locate`] or a prebuilt [`BlockIndex`].

use std::collections::HashMap;

use crate::block::{Block, BlockId};

/// Current UTC time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A fixed-size page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    /// 1-based page number, recomputed by [`Document::renumber`].
    pub number: usize,
    /// Blocks in document order, page-break sentinels included.
    pub blocks: Vec<Block>,
}

impl Page {
    /// Create a page holding `blocks`.
    pub fn new(number: usize, blocks: Vec<Block>) -> Self {
        Self { number, blocks }
    }

    /// Check whether any block is a page-break sentinel.
    pub fn has_page_break(&self) -> bool {
        self.blocks.iter().any(Block::is_page_break)
    }

    /// Number of non-sentinel blocks.
    pub fn content_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_page_break()).count()
    }

    /// Check whether any content block holds text.
    pub fn has_text(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| !b.is_page_break() && !b.content.is_empty())
    }
}

/// Zero-based position of a block in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockLocation {
    /// Page index.
    pub page: usize,
    /// Index within the page.
    pub index: usize,
}

impl BlockLocation {
    /// Create a location.
    pub fn new(page: usize, index: usize) -> Self {
        Self { page, index }
    }
}

/// Page → block lookup table, rebuilt whenever the structure changes.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    locations: HashMap<BlockId, BlockLocation>,
}

impl BlockIndex {
    /// Build an index over `pages`.
    pub fn build(pages: &[Page]) -> Self {
        let mut locations = HashMap::new();
        for (page_idx, page) in pages.iter().enumerate() {
            for (idx, block) in page.blocks.iter().enumerate() {
                locations.insert(block.id.clone(), BlockLocation::new(page_idx, idx));
            }
        }
        Self { locations }
    }

    /// Look up a block.
    pub fn get(&self, id: &BlockId) -> Option<BlockLocation> {
        self.locations.get(id).copied()
    }

    /// Check whether the block exists.
    pub fn contains(&self, id: &BlockId) -> bool {
        self.locations.contains_key(id)
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Check whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// A paginated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Pages; never empty.
    pub pages: Vec<Page>,
    /// Creation time, epoch ms UTC.
    pub created_at: i64,
    /// Last modification time, epoch ms UTC.
    pub updated_at: i64,
}

impl Document {
    /// Create a document holding a single empty paragraph.
    pub fn new(title: impl Into<String>) -> Self {
        Self::from_blocks(title, vec![Block::paragraph("")])
    }

    /// Create a document with every block on the first page. Run the flow engine to paginate.
    pub fn from_blocks(title: impl Into<String>, blocks: Vec<Block>) -> Self {
        let now = now_millis();
        let mut document = Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            pages: vec![Page::new(1, blocks)],
            created_at: now,
            updated_at: now,
        };
        document.ensure_content();
        document
    }

    /// Recompute page numbers as `1..=N`.
    pub fn renumber(&mut self) {
        for (idx, page) in self.pages.iter_mut().enumerate() {
            page.number = idx + 1;
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }

    /// Guarantee at least one page and at least one content block.
    pub fn ensure_content(&mut self) {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        if self.pages.iter().all(|p| p.content_block_count() == 0) {
            if let Some(last) = self.pages.last_mut() {
                last.blocks.push(Block::paragraph(""));
            }
        }
        self.renumber();
    }

    /// Iterate all blocks in document order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    /// Total number of blocks, sentinels included.
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }

    /// Number of non-sentinel blocks.
    pub fn content_block_count(&self) -> usize {
        self.pages.iter().map(Page::content_block_count).sum()
    }

    /// Build a lookup index.
    pub fn index(&self) -> BlockIndex {
        BlockIndex::build(&self.pages)
    }

    /// Find a block by id.
    pub fn locate(&self, id: &BlockId) -> Option<BlockLocation> {
        self.pages.iter().enumerate().find_map(|(page_idx, page)| {
            page.blocks
                .iter()
                .position(|b| &b.id == id)
                .map(|idx| BlockLocation::new(page_idx, idx))
        })
    }

    /// Borrow a block by id.
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        let loc = self.locate(id)?;
        self.block_at(loc)
    }

    /// Mutably borrow a block by id.
    pub fn block_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        let loc = self.locate(id)?;
        self.pages.get_mut(loc.page)?.blocks.get_mut(loc.index)
    }

    /// Borrow the block at `loc`.
    pub fn block_at(&self, loc: BlockLocation) -> Option<&Block> {
        self.pages.get(loc.page)?.blocks.get(loc.index)
    }

    /// Location of the block preceding `loc` in document order, crossing page boundaries.
    pub fn previous_location(&self, loc: BlockLocation) -> Option<BlockLocation> {
        if loc.index > 0 {
            return Some(BlockLocation::new(loc.page, loc.index - 1));
        }
        (0..loc.page).rev().find_map(|page_idx| {
            let len = self.pages[page_idx].blocks.len();
            (len > 0).then(|| BlockLocation::new(page_idx, len - 1))
        })
    }

    /// Location of the block following `loc` in document order, crossing page boundaries.
    pub fn next_location(&self, loc: BlockLocation) -> Option<BlockLocation> {
        let page = self.pages.get(loc.page)?;
        if loc.index + 1 < page.blocks.len() {
            return Some(BlockLocation::new(loc.page, loc.index + 1));
        }
        (loc.page + 1..self.pages.len())
            .find(|&page_idx| !self.pages[page_idx].blocks.is_empty())
            .map(|page_idx| BlockLocation::new(page_idx, 0))
    }

    /// Insert `blocks` directly after `loc`, on the same page.
    pub fn insert_after(&mut self, loc: BlockLocation, blocks: impl IntoIterator<Item = Block>) {
        if let Some(page) = self.pages.get_mut(loc.page) {
            let at = (loc.index + 1).min(page.blocks.len());
            let tail = page.blocks.split_off(at);
            page.blocks.extend(blocks);
            page.blocks.extend(tail);
        }
    }

    /// Remove the block at `loc`.
    pub fn remove_at(&mut self, loc: BlockLocation) -> Option<Block> {
        let page = self.pages.get_mut(loc.page)?;
        (loc.index < page.blocks.len()).then(|| page.blocks.remove(loc.index))
    }
}
