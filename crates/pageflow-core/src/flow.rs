//! Page flow engine.
//!
//! A pass turns any block/page tree into one where every page fits the page budget, every manual
//! page break ends its page, and no page except the last is empty. It runs in four steps:
//!
//! 1. **Hoist**: page-break sentinels at the head of a page (other than the first) move to the
//!    end of the previous page, where they mark the same boundary.
//! 2. **Forward overflow**: each page's trailing run moves to the head of the next page when the
//!    page exceeds the budget, or when a page break has content after it. The run starts at the
//!    first block that crosses the budget (or right after the break). At least one content block
//!    always stays behind, and sentinels at the split point stay with the page they end.
//! 3. **Reverse compaction**: starting at the edited page, pages without a break greedily pull
//!    leading blocks from the next page while they still fit. Pulling a page break ends the scan.
//! 4. **Pruning**: non-last pages with no text are removed, renumbering the rest.
//!
//! Heights are always summed from the top of a page in block order, so overflow and compaction
//! agree exactly on what fits and a second pass over a stable tree is a no-op.

use std::collections::{BTreeSet, HashMap};

use crate::block::{Block, BlockId};
use crate::config::{EngineConfig, RescanPolicy};
use crate::error::OracleError;
use crate::oracle::HeightOracle;
use crate::tree::{Document, Page};

/// Summary of one flow pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowReport {
    /// Blocks moved to a following page.
    pub forward_moves: usize,
    /// Blocks pulled back onto an earlier page.
    pub pulled_blocks: usize,
    /// Pages appended to hold overflow.
    pub pages_created: usize,
    /// Pages removed (emptied by compaction, or pruned).
    pub pages_pruned: usize,
    /// Pages left unbalanced because a block could not be measured.
    pub skipped_pages: usize,
}

impl FlowReport {
    /// Check whether the pass changed page assignment at all.
    pub fn is_noop(&self) -> bool {
        self.forward_moves == 0
            && self.pulled_blocks == 0
            && self.pages_created == 0
            && self.pages_pruned == 0
    }
}

/// Per-pass memo of outer heights, keyed by block id.
///
/// Content never changes during a pass, so the id is a sufficient key.
struct HeightCache<'a, O: HeightOracle + ?Sized> {
    oracle: &'a O,
    heights: HashMap<BlockId, f32>,
}

impl<'a, O: HeightOracle + ?Sized> HeightCache<'a, O> {
    fn new(oracle: &'a O) -> Self {
        Self {
            oracle,
            heights: HashMap::new(),
        }
    }

    fn height(&mut self, block: &Block) -> Result<f32, OracleError> {
        if block.is_page_break() {
            return Ok(0.0);
        }
        if let Some(height) = self.heights.get(&block.id) {
            return Ok(*height);
        }
        let height = self.oracle.measure(block)?.outer_height().max(0.0);
        self.heights.insert(block.id.clone(), height);
        Ok(height)
    }

    fn page_height(&mut self, page: &Page) -> Result<f32, OracleError> {
        let mut total = 0.0;
        for block in &page.blocks {
            total += self.height(block)?;
        }
        Ok(total)
    }
}

/// Enforces the page budget over a [`Document`].
#[derive(Debug, Clone, Default)]
pub struct FlowEngine {
    config: EngineConfig,
}

impl FlowEngine {
    /// Create an engine.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The page budget.
    pub fn budget(&self) -> f32 {
        self.config.page_budget()
    }

    /// Total content height of `page`, sentinels excluded.
    pub fn page_height<O>(&self, page: &Page, oracle: &O) -> Result<f32, OracleError>
    where
        O: HeightOracle + ?Sized,
    {
        HeightCache::new(oracle).page_height(page)
    }

    /// Paginate the whole document, compacting from the first page.
    pub fn reflow_all<O>(&self, document: &mut Document, oracle: &O) -> FlowReport
    where
        O: HeightOracle + ?Sized,
    {
        self.reflow(document, oracle, 0)
    }

    /// Run a full pass. Compaction starts at `seed_page`, the page holding the latest edit.
    pub fn reflow<O>(&self, document: &mut Document, oracle: &O, seed_page: usize) -> FlowReport
    where
        O: HeightOracle + ?Sized,
    {
        let mut cache = HeightCache::new(oracle);
        let mut report = FlowReport::default();

        document.ensure_content();
        hoist_leading_breaks(&mut document.pages);

        let mut skipped = BTreeSet::new();
        self.forward(&mut document.pages, &mut cache, &mut report, &mut skipped);

        let mut seed = seed_page;
        loop {
            self.compact(&mut document.pages, &mut cache, &mut report, seed);
            match prune(&mut document.pages) {
                (0, _) => break,
                (removed, lowest) => {
                    report.pages_pruned += removed;
                    seed = seed.min(lowest.saturating_sub(1));
                }
            }
        }

        report.skipped_pages += skipped.len();
        document.ensure_content();
        document.renumber();

        tracing::debug!(
            pages = document.pages.len(),
            forward_moves = report.forward_moves,
            pulled_blocks = report.pulled_blocks,
            pages_created = report.pages_created,
            pages_pruned = report.pages_pruned,
            skipped_pages = report.skipped_pages,
            "flow pass complete"
        );
        report
    }

    fn forward<O: HeightOracle + ?Sized>(
        &self,
        pages: &mut Vec<Page>,
        cache: &mut HeightCache<'_, O>,
        report: &mut FlowReport,
        skipped: &mut BTreeSet<usize>,
    ) {
        let budget = self.budget();
        let mut moves = 0usize;
        let mut page_idx = 0usize;

        while page_idx < pages.len() {
            let split = match forward_split(&pages[page_idx], budget, cache) {
                Ok(split) => split,
                Err(err) => {
                    tracing::warn!(page = page_idx + 1, error = %err, "skipping unmeasurable page");
                    skipped.insert(page_idx);
                    page_idx += 1;
                    continue;
                }
            };
            let Some(split) = split else {
                page_idx += 1;
                continue;
            };

            let tail = pages[page_idx].blocks.split_off(split);
            tracing::trace!(
                from = page_idx + 1,
                blocks = tail.len(),
                "moving overflow to next page"
            );
            report.forward_moves += tail.len();
            if page_idx + 1 == pages.len() {
                pages.push(Page::default());
                report.pages_created += 1;
            }
            let next = &mut pages[page_idx + 1].blocks;
            let rest = std::mem::replace(next, tail);
            next.extend(rest);

            moves += 1;
            if moves >= self.config.max_iterations {
                tracing::warn!(
                    moves,
                    limit = self.config.max_iterations,
                    "flow pass hit the iteration limit"
                );
                break;
            }

            page_idx = match self.config.rescan {
                RescanPolicy::FromStart => 0,
                RescanPolicy::FromMovedPage => page_idx + 1,
            };
        }
    }

    fn compact<O: HeightOracle + ?Sized>(
        &self,
        pages: &mut Vec<Page>,
        cache: &mut HeightCache<'_, O>,
        report: &mut FlowReport,
        seed: usize,
    ) {
        let budget = self.budget();
        let mut page_idx = seed.min(pages.len().saturating_sub(1));

        while page_idx + 1 < pages.len() {
            if pages[page_idx].has_page_break() {
                page_idx += 1;
                continue;
            }
            let mut total = match cache.page_height(&pages[page_idx]) {
                Ok(total) => total,
                Err(err) => {
                    tracing::warn!(page = page_idx + 1, error = %err, "skipping unmeasurable page");
                    report.skipped_pages += 1;
                    page_idx += 1;
                    continue;
                }
            };

            let next = &pages[page_idx + 1].blocks;
            let mut take = 0usize;
            let mut hit_break = false;
            while take < next.len() {
                let block = &next[take];
                if block.is_page_break() {
                    hit_break = true;
                    take += next[take..]
                        .iter()
                        .take_while(|b| b.is_page_break())
                        .count();
                    break;
                }
                let height = match cache.height(block) {
                    Ok(height) => height,
                    Err(err) => {
                        tracing::warn!(page = page_idx + 2, error = %err, "stopping compaction at unmeasurable block");
                        report.skipped_pages += 1;
                        break;
                    }
                };
                if total + height > budget {
                    break;
                }
                total += height;
                take += 1;
            }

            if take > 0 {
                let pulled: Vec<Block> = pages[page_idx + 1].blocks.drain(..take).collect();
                tracing::trace!(into = page_idx + 1, blocks = pulled.len(), "pulling blocks back");
                report.pulled_blocks += pulled.len();
                pages[page_idx].blocks.extend(pulled);
            }

            let emptied = pages[page_idx + 1].blocks.is_empty();
            if emptied && page_idx + 2 < pages.len() {
                pages.remove(page_idx + 1);
                report.pages_pruned += 1;
                if !hit_break {
                    continue;
                }
            }
            page_idx += 1;
        }
    }
}

/// Index at which `page` should be split, or `None` if it can stay as is.
fn forward_split<O: HeightOracle + ?Sized>(
    page: &Page,
    budget: f32,
    cache: &mut HeightCache<'_, O>,
) -> Result<Option<usize>, OracleError> {
    let blocks = &page.blocks;
    let len = blocks.len();

    let mut split = len;
    let mut total = 0.0;
    for (idx, block) in blocks.iter().enumerate() {
        total += cache.height(block)?;
        if total > budget {
            split = idx;
            break;
        }
    }
    if let Some(forced) = forced_break_split(blocks) {
        split = split.min(forced);
    }
    if split >= len {
        return Ok(None);
    }

    if !blocks[..split].iter().any(|b| !b.is_page_break()) {
        match blocks.iter().position(|b| !b.is_page_break()) {
            Some(first_content) => split = first_content + 1,
            None => return Ok(None),
        }
    }
    while split < len && blocks[split].is_page_break() {
        split += 1;
    }

    Ok((split < len).then_some(split))
}

/// First index after a run of sentinels that has content both before and after it.
fn forced_break_split(blocks: &[Block]) -> Option<usize> {
    let first_content = blocks.iter().position(|b| !b.is_page_break())?;
    let break_idx = first_content
        + blocks[first_content..]
            .iter()
            .position(Block::is_page_break)?;
    let after = break_idx
        + blocks[break_idx..]
            .iter()
            .take_while(|b| b.is_page_break())
            .count();
    (after < blocks.len()).then_some(after)
}

/// Move sentinels at the head of every page but the first to the end of the previous page.
fn hoist_leading_breaks(pages: &mut [Page]) {
    for idx in 1..pages.len() {
        let count = pages[idx]
            .blocks
            .iter()
            .take_while(|b| b.is_page_break())
            .count();
        if count == 0 {
            continue;
        }
        let moved: Vec<Block> = pages[idx].blocks.drain(..count).collect();
        pages[idx - 1].blocks.extend(moved);
    }
}

/// Remove non-last pages without text, and a trailing page without content blocks.
///
/// Returns the number of removed pages and the lowest removed index.
fn prune(pages: &mut Vec<Page>) -> (usize, usize) {
    let before = pages.len();
    let last = before.saturating_sub(1);
    let mut lowest = usize::MAX;

    let mut idx = 0usize;
    pages.retain(|page| {
        let keep = idx == last || page.has_text();
        if !keep {
            lowest = lowest.min(idx);
        }
        idx += 1;
        keep
    });

    if pages.len() > 1
        && let Some(page) = pages.last()
        && page.content_block_count() == 0
    {
        lowest = lowest.min(before - 1);
        pages.pop();
    }

    (before - pages.len(), lowest)
}
