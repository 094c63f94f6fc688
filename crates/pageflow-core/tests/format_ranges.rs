//! Inline format range behaviour, including the markup round trip.

use pageflow_core::markup;
use pageflow_core::{FormatMode, FormatRun, FormatSet, InlineFormat, RichText};
use pretty_assertions::assert_eq;

fn runs(text: &RichText) -> Vec<(String, Vec<InlineFormat>)> {
    text.runs()
        .iter()
        .map(|run| (run.text.clone(), run.formats.iter().collect()))
        .collect()
}

#[test]
fn test_bold_middle_then_unbold_restores_plain_run() {
    let mut text = RichText::plain("Hello world");

    assert!(text.apply_format(3..8, InlineFormat::Bold, FormatMode::Add));
    assert_eq!(
        runs(&text),
        vec![
            ("Hel".to_string(), vec![]),
            ("lo wo".to_string(), vec![InlineFormat::Bold]),
            ("rld".to_string(), vec![]),
        ]
    );

    assert!(text.apply_format(3..8, InlineFormat::Bold, FormatMode::Remove));
    assert_eq!(runs(&text), vec![("Hello world".to_string(), vec![])]);
    assert!(text.is_canonical());
}

#[test]
fn test_toggle_mixed_range_adds_first() {
    let mut text = RichText::plain("abcdef");
    text.apply_format(0..2, InlineFormat::Italic, FormatMode::Add);

    assert_eq!(text.toggle_format(0..4, InlineFormat::Italic), FormatMode::Add);
    assert!(text.active_formats(0..4).contains(InlineFormat::Italic));

    assert_eq!(
        text.toggle_format(0..4, InlineFormat::Italic),
        FormatMode::Remove
    );
    assert_eq!(text.active_formats(0..6), FormatSet::EMPTY);
}

#[test]
fn test_formats_stack_independently() {
    let mut text = RichText::plain("abcdef");
    text.apply_format(0..4, InlineFormat::Bold, FormatMode::Add);
    text.apply_format(2..6, InlineFormat::Underline, FormatMode::Add);

    assert_eq!(
        text.active_formats(2..4),
        FormatSet::of(InlineFormat::Bold).with(InlineFormat::Underline)
    );
    assert_eq!(text.active_formats(0..6), FormatSet::EMPTY);
    assert_eq!(text.runs().len(), 3);
}

#[test]
fn test_active_formats_at_caret_reads_left_character() {
    let text = RichText::from_runs([
        FormatRun::new("ab", FormatSet::of(InlineFormat::Bold)),
        FormatRun::plain("cd"),
    ]);
    assert_eq!(text.active_formats(2..2), FormatSet::of(InlineFormat::Bold));
    assert_eq!(text.active_formats(3..3), FormatSet::EMPTY);
    assert_eq!(text.active_formats(0..0), FormatSet::of(InlineFormat::Bold));
}

#[test]
fn test_out_of_range_requests_are_clamped() {
    let mut text = RichText::plain("abc");
    assert!(text.apply_format(1..99, InlineFormat::Strikethrough, FormatMode::Add));
    assert_eq!(
        text.active_formats(1..3),
        FormatSet::of(InlineFormat::Strikethrough)
    );
    assert!(!text.apply_format(5..9, InlineFormat::Bold, FormatMode::Add));
    assert!(!text.apply_format(2..2, InlineFormat::Bold, FormatMode::Add));
}

#[test]
fn test_typing_inherits_caret_formats() {
    let mut text = RichText::plain("ab");
    text.apply_format(0..2, InlineFormat::Bold, FormatMode::Add);
    text.insert_text(2, "c", None);
    text.insert_text(0, "_", Some(FormatSet::EMPTY));

    assert_eq!(
        runs(&text),
        vec![
            ("_".to_string(), vec![]),
            ("abc".to_string(), vec![InlineFormat::Bold]),
        ]
    );
}

#[test]
fn test_delete_across_runs_merges_neighbours() {
    let mut text = RichText::plain("aaXbb");
    text.apply_format(2..3, InlineFormat::Italic, FormatMode::Add);
    assert!(text.delete_range(2..3));
    assert_eq!(runs(&text), vec![("aabb".to_string(), vec![])]);
}

#[test]
fn test_multibyte_offsets_are_chars() {
    let mut text = RichText::plain("héllo wörld");
    text.apply_format(1..4, InlineFormat::Bold, FormatMode::Add);
    assert_eq!(text.runs()[1].text, "éll");
    assert_eq!(text.len(), 11);
}

#[test]
fn test_markup_round_trip_preserves_runs() {
    let mut text = RichText::plain("a <b> & c");
    text.apply_format(0..3, InlineFormat::Bold, FormatMode::Add);
    text.apply_format(2..6, InlineFormat::Underline, FormatMode::Add);

    let encoded = markup::serialize(&text);
    assert_eq!(markup::parse(&encoded), text);
}

#[test]
fn test_markup_parses_nested_and_unknown_tags() {
    let text = markup::parse("<b>bold <i>both</i></b><span>plain</span><br>x");
    assert_eq!(text.plain_text(), "bold bothplain\nx");
    assert_eq!(text.active_formats(0..5), FormatSet::of(InlineFormat::Bold));
    assert_eq!(
        text.active_formats(5..9),
        FormatSet::of(InlineFormat::Bold).with(InlineFormat::Italic)
    );
    assert_eq!(text.active_formats(9..14), FormatSet::EMPTY);
}
