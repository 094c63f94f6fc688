//! Block height measurement.
//!
//! The flow engine never lays text out itself. It asks a [`HeightOracle`] for each block's
//! rendered height, which in a real host is the rendering surface. [`TextMetricsOracle`] is a
//! headless stand-in that estimates heights on a fixed cell grid:
//!
//! - cell widths follow UAX #11 (`unicode-width`), so CJK takes two cells
//! - wrapping happens at whitespace, falling back to grapheme boundaries for long words
//! - hard line breaks (`\n`) always start a new visual line

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::block::{Block, BlockKind};
use crate::error::OracleError;

/// Measured vertical extent of a block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockMetrics {
    /// Content height.
    pub height: f32,
    /// Space above the block.
    pub margin_top: f32,
    /// Space below the block.
    pub margin_bottom: f32,
}

impl BlockMetrics {
    /// Metrics without margins.
    pub fn new(height: f32) -> Self {
        Self {
            height,
            margin_top: 0.0,
            margin_bottom: 0.0,
        }
    }

    /// Set both margins.
    pub fn with_margins(mut self, top: f32, bottom: f32) -> Self {
        self.margin_top = top;
        self.margin_bottom = bottom;
        self
    }

    /// Height including margins; this is what counts against the page budget.
    pub fn outer_height(&self) -> f32 {
        self.height + self.margin_top + self.margin_bottom
    }
}

/// Source of rendered block heights.
///
/// Measurements may be expensive; the flow engine memoizes them for the duration of one pass.
/// Page-break sentinels are never measured.
pub trait HeightOracle {
    /// Measure `block`.
    fn measure(&self, block: &Block) -> Result<BlockMetrics, OracleError>;
}

impl<F> HeightOracle for F
where
    F: Fn(&Block) -> Result<BlockMetrics, OracleError>,
{
    fn measure(&self, block: &Block) -> Result<BlockMetrics, OracleError> {
        self(block)
    }
}

/// Grid-based height estimate for headless use.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMetricsOracle {
    /// Available columns per line.
    pub columns: usize,
    /// Height of one body text line.
    pub line_height: f32,
    /// Space below every block.
    pub block_spacing: f32,
    /// Cells reserved for the list bullet.
    pub list_indent: usize,
}

impl Default for TextMetricsOracle {
    fn default() -> Self {
        Self {
            columns: 80,
            line_height: 24.0,
            block_spacing: 8.0,
            list_indent: 4,
        }
    }
}

impl TextMetricsOracle {
    /// Create an oracle for a grid of `columns` cells and `line_height` px lines.
    pub fn new(columns: usize, line_height: f32) -> Self {
        Self {
            columns,
            line_height,
            ..Self::default()
        }
    }

    /// Number of visual lines `text` occupies at `columns` cells.
    pub fn visual_lines(text: &str, columns: usize) -> usize {
        text.split('\n')
            .map(|line| wrap_points(line, columns).len() + 1)
            .sum()
    }

    fn scale(level: u8) -> f32 {
        match level {
            1 => 2.0,
            2 => 1.5,
            3 => 1.25,
            _ => 1.0,
        }
    }
}

impl HeightOracle for TextMetricsOracle {
    fn measure(&self, block: &Block) -> Result<BlockMetrics, OracleError> {
        if block.is_page_break() {
            return Ok(BlockMetrics::default());
        }

        let (scale, indent) = match block.kind {
            BlockKind::Paragraph => (1.0, 0),
            BlockKind::Heading => (Self::scale(block.heading_level().unwrap_or(1)), 0),
            BlockKind::List => (1.0, self.list_indent),
        };
        // Larger type fits fewer characters per line.
        let columns = ((self.columns.saturating_sub(indent)) as f32 / scale).floor() as usize;
        if columns == 0 {
            return Err(OracleError::Unavailable {
                block: block.id.clone(),
                reason: format!("no room for text in {} columns", self.columns),
            });
        }

        let lines = Self::visual_lines(&block.plain_text(), columns);
        let height = lines as f32 * self.line_height * scale;
        let top = match block.kind {
            BlockKind::Heading => self.block_spacing,
            _ => 0.0,
        };
        Ok(BlockMetrics::new(height).with_margins(top, self.block_spacing))
    }
}

/// Grapheme indices at which a soft wrap starts a new visual line.
fn wrap_points(line: &str, columns: usize) -> Vec<usize> {
    let mut points = Vec::new();
    let mut segment_start = 0usize;
    let mut segment_start_x = 0usize;
    let mut last_break: Option<(usize, usize)> = None;
    let mut x = 0usize;

    for (index, grapheme) in line.graphemes(true).enumerate() {
        let width = grapheme.width();

        while x - segment_start_x + width > columns {
            if let Some((break_index, break_x)) = last_break
                && break_index > segment_start
            {
                points.push(break_index);
                segment_start = break_index;
                segment_start_x = break_x;
                last_break = None;
                continue;
            }
            if index > segment_start {
                points.push(index);
                segment_start = index;
                segment_start_x = x;
                last_break = None;
            }
            break;
        }

        x += width;
        if grapheme.chars().all(char::is_whitespace) {
            last_break = Some((index + 1, x));
        }
    }

    points
}
