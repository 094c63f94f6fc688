//! Inline formatting ranges.
//!
//! A block's text is stored as a sorted list of [`FormatRun`]s. Each run is a non-empty span of
//! characters sharing one [`FormatSet`]; adjacent runs never share the same set (canonical form).
//!
//! Range operations work directly on run boundaries: the runs that straddle `start` / `end` are
//! split ("fractured") so the range lines up with run boundaries, the runs inside are updated,
//! and a single left-to-right pass merges equal neighbours again. A prefix table of run end
//! offsets keeps boundary lookup at O(log n) without materializing per-character nodes.
//!
//! All offsets are character offsets (Unicode scalar values) from the start of the block.

use std::ops::Range;

/// One of the four inline format toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InlineFormat {
    /// Bold weight.
    Bold,
    /// Italic style.
    Italic,
    /// Underline decoration.
    Underline,
    /// Strikethrough decoration.
    Strikethrough,
}

impl InlineFormat {
    /// Every inline format, in canonical nesting order (outermost first).
    pub const ALL: [InlineFormat; 4] = [
        InlineFormat::Bold,
        InlineFormat::Italic,
        InlineFormat::Underline,
        InlineFormat::Strikethrough,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of [`InlineFormat`]s. Comparison is order independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatSet(u8);

impl FormatSet {
    /// The empty set (plain text).
    pub const EMPTY: Self = Self(0);
    /// All four formats.
    pub const ALL: Self = Self(0b1111);

    /// Create an empty set.
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Create a set holding a single format.
    pub const fn of(format: InlineFormat) -> Self {
        Self(format.bit())
    }

    /// Check whether `format` is in the set.
    pub const fn contains(self, format: InlineFormat) -> bool {
        self.0 & format.bit() != 0
    }

    /// Check whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of formats in the set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Return a copy with `format` added.
    pub const fn with(self, format: InlineFormat) -> Self {
        Self(self.0 | format.bit())
    }

    /// Return a copy with `format` removed.
    pub const fn without(self, format: InlineFormat) -> Self {
        Self(self.0 & !format.bit())
    }

    /// Add `format` in place.
    pub fn insert(&mut self, format: InlineFormat) {
        *self = self.with(format);
    }

    /// Remove `format` in place.
    pub fn remove(&mut self, format: InlineFormat) {
        *self = self.without(format);
    }

    /// Set union.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set intersection.
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Iterate the formats in canonical nesting order.
    pub fn iter(self) -> impl Iterator<Item = InlineFormat> {
        InlineFormat::ALL
            .into_iter()
            .filter(move |format| self.contains(*format))
    }
}

impl FromIterator<InlineFormat> for FormatSet {
    fn from_iter<I: IntoIterator<Item = InlineFormat>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// Whether a range operation adds or removes a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// Every character in the range gains the format.
    Add,
    /// Every character in the range loses the format.
    Remove,
}

/// A contiguous span of text sharing one format set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRun {
    /// Run text (never empty inside a canonical [`RichText`]).
    pub text: String,
    /// Formats active on every character of the run.
    pub formats: FormatSet,
}

impl FormatRun {
    /// Create a run.
    pub fn new(text: impl Into<String>, formats: FormatSet) -> Self {
        Self {
            text: text.into(),
            formats,
        }
    }

    /// Create an unformatted run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, FormatSet::EMPTY)
    }

    /// Length of the run in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Formatted text of a single block, always in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    runs: Vec<FormatRun>,
    /// `run_ends[i]` is the exclusive char offset where `runs[i]` ends.
    run_ends: Vec<usize>,
}

impl RichText {
    /// Create empty text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create unformatted text.
    pub fn plain(text: &str) -> Self {
        Self::from_runs([FormatRun::plain(text)])
    }

    /// Build from arbitrary runs; empty runs are dropped and equal neighbours merged.
    pub fn from_runs<I>(runs: I) -> Self
    where
        I: IntoIterator<Item = FormatRun>,
    {
        let mut text = Self {
            runs: runs.into_iter().collect(),
            run_ends: Vec::new(),
        };
        text.canonicalize();
        text
    }

    /// The canonical run list.
    pub fn runs(&self) -> &[FormatRun] {
        &self.runs
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.run_ends.last().copied().unwrap_or(0)
    }

    /// Check whether there is no text.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Concatenated text without formatting.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Check the canonical-form invariant (no empty runs, no equal neighbours).
    pub fn is_canonical(&self) -> bool {
        self.runs.iter().all(|run| !run.text.is_empty())
            && self
                .runs
                .windows(2)
                .all(|pair| pair[0].formats != pair[1].formats)
    }

    /// Clamp `range` to `0..len`, swapping reversed bounds.
    pub fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        let len = self.len();
        let (start, end) = if range.start <= range.end {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };
        let clamped = start.min(len)..end.min(len);
        if clamped != range {
            tracing::trace!(?range, ?clamped, len, "clamped format range");
        }
        clamped
    }

    /// Formats shared by every character of `range`.
    ///
    /// A format counts as active only if all intersected characters carry it. For a collapsed
    /// range the formats of the character left of the caret are reported (right of it at
    /// offset 0).
    pub fn active_formats(&self, range: Range<usize>) -> FormatSet {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return self.formats_at_caret(range.start);
        }

        let Some((first, _)) = self.locate(range.start) else {
            return FormatSet::EMPTY;
        };

        let mut active = FormatSet::ALL;
        for (idx, run) in self.runs.iter().enumerate().skip(first) {
            if self.run_start(idx) >= range.end {
                break;
            }
            active = active.intersection(run.formats);
        }
        active
    }

    /// Formats newly typed text at `offset` inherits.
    pub fn formats_at_caret(&self, offset: usize) -> FormatSet {
        if self.runs.is_empty() {
            return FormatSet::EMPTY;
        }
        let offset = offset.min(self.len());
        let lookup = offset.saturating_sub(1);
        self.locate(lookup)
            .map(|(idx, _)| self.runs[idx].formats)
            .unwrap_or(FormatSet::EMPTY)
    }

    /// Add or remove `format` on every character in `range`.
    ///
    /// Returns `true` if any character changed.
    pub fn apply_format(
        &mut self,
        range: Range<usize>,
        format: InlineFormat,
        mode: FormatMode,
    ) -> bool {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return false;
        }

        let first = self.fracture(range.start);
        let last = self.fracture(range.end);

        let mut changed = false;
        for run in &mut self.runs[first..last] {
            let before = run.formats;
            match mode {
                FormatMode::Add => run.formats.insert(format),
                FormatMode::Remove => run.formats.remove(format),
            }
            changed |= run.formats != before;
        }

        self.canonicalize();
        changed
    }

    /// Remove `format` from `range` if the whole range carries it, otherwise add it.
    ///
    /// Returns the mode that was applied.
    pub fn toggle_format(&mut self, range: Range<usize>, format: InlineFormat) -> FormatMode {
        let mode = if self.active_formats(range.clone()).contains(format) {
            FormatMode::Remove
        } else {
            FormatMode::Add
        };
        self.apply_format(range, format, mode);
        mode
    }

    /// Insert `text` at `offset`.
    ///
    /// Without explicit `formats` the text inherits [`RichText::formats_at_caret`].
    pub fn insert_text(&mut self, offset: usize, text: &str, formats: Option<FormatSet>) {
        if text.is_empty() {
            return;
        }
        let offset = offset.min(self.len());
        let formats = formats.unwrap_or_else(|| self.formats_at_caret(offset));
        let idx = self.fracture(offset);
        self.runs.insert(idx, FormatRun::new(text, formats));
        self.canonicalize();
    }

    /// Delete the characters in `range`. Returns `true` if anything was removed.
    pub fn delete_range(&mut self, range: Range<usize>) -> bool {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return false;
        }
        let first = self.fracture(range.start);
        let last = self.fracture(range.end);
        self.runs.drain(first..last);
        self.canonicalize();
        true
    }

    /// Split at `offset`, keeping `0..offset` and returning `offset..len`.
    ///
    /// Per-character formatting is preserved on both sides.
    pub fn split_off(&mut self, offset: usize) -> RichText {
        let offset = offset.min(self.len());
        let idx = self.fracture(offset);
        let right = self.runs.split_off(idx);
        self.canonicalize();
        RichText::from_runs(right)
    }

    /// Append `other`, merging the seam if the formats match.
    pub fn append(&mut self, other: RichText) {
        self.runs.extend(other.runs);
        self.canonicalize();
    }

    /// Copy of the characters in `range`.
    pub fn slice(&self, range: Range<usize>) -> RichText {
        let range = self.clamp_range(range);
        let mut copy = self.clone();
        copy.split_off(range.end);
        copy.split_off(range.start)
    }

    fn run_start(&self, idx: usize) -> usize {
        if idx == 0 { 0 } else { self.run_ends[idx - 1] }
    }

    /// Find the run containing the character at `offset` and the offset within that run.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let idx = self.run_ends.partition_point(|&end| end <= offset);
        if idx >= self.runs.len() {
            return None;
        }
        Some((idx, offset - self.run_start(idx)))
    }

    /// Make `offset` a run boundary and return the index of the run starting there.
    ///
    /// Never merges; callers canonicalize once they are done.
    fn fracture(&mut self, offset: usize) -> usize {
        if offset == 0 {
            return 0;
        }
        let Some((idx, within)) = self.locate(offset) else {
            return self.runs.len();
        };
        if within == 0 {
            return idx;
        }

        let run = &mut self.runs[idx];
        let byte = byte_offset(&run.text, within);
        let right = FormatRun::new(run.text.split_off(byte), run.formats);
        self.runs.insert(idx + 1, right);
        self.run_ends.insert(idx, 0);
        self.rebuild_run_ends_from(idx);
        idx + 1
    }

    fn canonicalize(&mut self) {
        let mut merged: Vec<FormatRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.formats == run.formats => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
        self.rebuild_run_ends_from(0);
    }

    fn rebuild_run_ends_from(&mut self, start_idx: usize) {
        self.run_ends.resize(self.runs.len(), 0);
        let mut end = self.run_start(start_idx.min(self.runs.len()));
        for (idx, run) in self.runs.iter().enumerate().skip(start_idx) {
            end += run.char_len();
            self.run_ends[idx] = end;
        }
    }
}

impl From<&str> for RichText {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: FormatSet = FormatSet::of(InlineFormat::Bold);
    const I: FormatSet = FormatSet::of(InlineFormat::Italic);

    fn text(runs: &[(&str, FormatSet)]) -> RichText {
        RichText::from_runs(runs.iter().map(|(t, f)| FormatRun::new(*t, *f)))
    }

    #[test]
    fn test_format_set_is_order_independent() {
        let a = FormatSet::of(InlineFormat::Bold).with(InlineFormat::Underline);
        let b: FormatSet = [InlineFormat::Underline, InlineFormat::Bold]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            vec![InlineFormat::Bold, InlineFormat::Underline]
        );
    }

    #[test]
    fn test_from_runs_canonicalizes() {
        let t = text(&[("ab", B), ("", I), ("cd", B), ("ef", FormatSet::EMPTY)]);
        assert_eq!(t.runs().len(), 2);
        assert_eq!(t.runs()[0], FormatRun::new("abcd", B));
        assert_eq!(t.len(), 6);
        assert!(t.is_canonical());
    }

    #[test]
    fn test_fracture_does_not_merge() {
        let mut t = RichText::plain("hello");
        assert_eq!(t.fracture(2), 1);
        assert_eq!(t.runs.len(), 2);
        assert_eq!(t.run_ends, vec![2, 5]);
        assert_eq!(t.fracture(2), 1);
        assert_eq!(t.fracture(5), 2);
        assert_eq!(t.fracture(0), 0);
    }

    #[test]
    fn test_apply_then_remove_restores_runs() {
        let original = text(&[("abc", FormatSet::EMPTY), ("def", I), ("gh", FormatSet::EMPTY)]);
        let mut t = original.clone();

        assert!(t.apply_format(2..5, InlineFormat::Bold, FormatMode::Add));
        assert_eq!(
            t.runs(),
            &[
                FormatRun::plain("ab"),
                FormatRun::new("c", B),
                FormatRun::new("de", B.union(I)),
                FormatRun::new("f", I),
                FormatRun::plain("gh"),
            ]
        );

        assert!(t.apply_format(2..5, InlineFormat::Bold, FormatMode::Remove));
        assert_eq!(t, original);
    }

    #[test]
    fn test_remove_to_empty_set_keeps_text() {
        let mut t = text(&[("bold", B)]);
        t.apply_format(0..4, InlineFormat::Bold, FormatMode::Remove);
        assert_eq!(t.runs(), &[FormatRun::plain("bold")]);
    }

    #[test]
    fn test_apply_is_noop_when_already_present() {
        let mut t = text(&[("ab", FormatSet::EMPTY), ("cd", B)]);
        assert!(!t.apply_format(2..4, InlineFormat::Bold, FormatMode::Add));
        assert_eq!(t.runs().len(), 2);
    }

    #[test]
    fn test_active_formats_requires_all_characters() {
        let t = text(&[("ab", B), ("cd", B.union(I)), ("ef", I)]);
        assert_eq!(t.active_formats(0..4), B);
        assert_eq!(t.active_formats(2..4), B.union(I));
        assert_eq!(t.active_formats(1..5), FormatSet::EMPTY);
        assert_eq!(t.active_formats(3..6), I);
    }

    #[test]
    fn test_active_formats_for_caret() {
        let t = text(&[("ab", B), ("cd", I)]);
        assert_eq!(t.active_formats(0..0), B);
        assert_eq!(t.active_formats(2..2), B);
        assert_eq!(t.active_formats(3..3), I);
        assert_eq!(RichText::new().active_formats(0..0), FormatSet::EMPTY);
    }

    #[test]
    fn test_toggle_format() {
        let mut t = text(&[("ab", B), ("cd", FormatSet::EMPTY)]);
        assert_eq!(t.toggle_format(0..4, InlineFormat::Bold), FormatMode::Add);
        assert_eq!(t.runs(), &[FormatRun::new("abcd", B)]);
        assert_eq!(t.toggle_format(1..3, InlineFormat::Bold), FormatMode::Remove);
        assert_eq!(
            t.runs(),
            &[
                FormatRun::new("a", B),
                FormatRun::plain("bc"),
                FormatRun::new("d", B)
            ]
        );
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let mut t = RichText::plain("abc");
        assert!(t.apply_format(1..99, InlineFormat::Italic, FormatMode::Add));
        assert_eq!(t.runs(), &[FormatRun::plain("a"), FormatRun::new("bc", I)]);
        assert!(!t.apply_format(10..20, InlineFormat::Italic, FormatMode::Add));
        assert_eq!(t.clamp_range(3..1), 1..3);
    }

    #[test]
    fn test_insert_inherits_left_formats() {
        let mut t = text(&[("ab", B), ("cd", I)]);
        t.insert_text(2, "X", None);
        assert_eq!(t.plain_text(), "abXcd");
        assert_eq!(t.runs()[0], FormatRun::new("abX", B));

        t.insert_text(0, "Y", Some(FormatSet::EMPTY));
        assert_eq!(t.runs()[0], FormatRun::plain("Y"));
        assert!(t.is_canonical());
    }

    #[test]
    fn test_delete_range_merges_seam() {
        let mut t = text(&[("ab", B), ("cd", I), ("ef", B)]);
        assert!(t.delete_range(2..4));
        assert_eq!(t.runs(), &[FormatRun::new("abef", B)]);
        assert!(!t.delete_range(3..3));
    }

    #[test]
    fn test_split_off_preserves_formatting() {
        let mut t = text(&[("hello ", FormatSet::EMPTY), ("world!", B)]);
        let right = t.split_off(8);
        assert_eq!(t.runs(), &[FormatRun::plain("hello "), FormatRun::new("wo", B)]);
        assert_eq!(right.runs(), &[FormatRun::new("rld!", B)]);

        t.append(right);
        assert_eq!(t.runs(), &[FormatRun::plain("hello "), FormatRun::new("world!", B)]);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let mut t = RichText::plain("héllo👋x");
        t.apply_format(1..6, InlineFormat::Bold, FormatMode::Add);
        assert_eq!(
            t.runs(),
            &[
                FormatRun::plain("h"),
                FormatRun::new("éllo👋", B),
                FormatRun::plain("x"),
            ]
        );
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn test_slice() {
        let t = text(&[("ab", B), ("cd", I)]);
        assert_eq!(
            t.slice(1..3).runs(),
            &[FormatRun::new("b", B), FormatRun::new("c", I)]
        );
    }
}
