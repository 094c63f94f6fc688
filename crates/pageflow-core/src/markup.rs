//! Inline markup codec for persisted block content.
//!
//! Runs serialize as escaped text wrapped in `<b>`, `<i>`, `<u>`, `<s>` tags, outermost bold,
//! one tag group per run. Parsing is total: unknown tags are dropped, stray `<` stays text, and
//! unclosed tags run to the end of the content.
//!
//! Markup coming from an editing surface is often messier than what [`serialize`] produces
//! (`<strong>` inside `<b>`, overlapping `<b>..<i>..</b>..</i>`). Every character gets the union
//! of all tags open over it, and each close tag only closes its own kind.

use regex::Regex;
use std::sync::LazyLock;

use crate::format::{FormatRun, FormatSet, InlineFormat, RichText};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)([a-z][a-z0-9]*)\b[^<>]*?(/?)>|&(amp|lt|gt|quot|apos|#39|nbsp);")
        .expect("markup token pattern is valid")
});

fn tag_name(format: InlineFormat) -> &'static str {
    match format {
        InlineFormat::Bold => "b",
        InlineFormat::Italic => "i",
        InlineFormat::Underline => "u",
        InlineFormat::Strikethrough => "s",
    }
}

fn format_for_tag(name: &str) -> Option<InlineFormat> {
    match name.to_ascii_lowercase().as_str() {
        "b" | "strong" => Some(InlineFormat::Bold),
        "i" | "em" => Some(InlineFormat::Italic),
        "u" | "ins" => Some(InlineFormat::Underline),
        "s" | "strike" | "del" => Some(InlineFormat::Strikethrough),
        _ => None,
    }
}

fn decode_entity(name: &str) -> char {
    match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "nbsp" => '\u{a0}',
        _ => '\'',
    }
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Serialize runs to inline markup.
pub fn serialize(text: &RichText) -> String {
    let mut out = String::new();
    for run in text.runs() {
        for format in run.formats.iter() {
            out.push('<');
            out.push_str(tag_name(format));
            out.push('>');
        }
        escape_into(&mut out, &run.text);
        let formats: Vec<InlineFormat> = run.formats.iter().collect();
        for format in formats.into_iter().rev() {
            out.push_str("</");
            out.push_str(tag_name(format));
            out.push('>');
        }
    }
    out
}

/// Parse inline markup into canonical runs.
pub fn parse(input: &str) -> RichText {
    let mut depth = [0u32; InlineFormat::ALL.len()];
    let mut active = FormatSet::EMPTY;
    let mut runs = Vec::new();
    let mut pending = String::new();
    let mut last = 0;

    for caps in TOKEN.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        pending.push_str(&input[last..whole.start()]);
        last = whole.end();

        if let Some(entity) = caps.get(4) {
            pending.push(decode_entity(&entity.as_str().to_ascii_lowercase()));
            continue;
        }

        let name = caps.get(2).map_or("", |m| m.as_str());
        if name.eq_ignore_ascii_case("br") {
            pending.push('\n');
            continue;
        }
        let Some(format) = format_for_tag(name) else {
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
        if self_closing {
            continue;
        }

        let slot = &mut depth[format as usize];
        if closing {
            *slot = slot.saturating_sub(1);
        } else {
            *slot += 1;
        }

        let next: FormatSet = InlineFormat::ALL
            .into_iter()
            .filter(|f| depth[*f as usize] > 0)
            .collect();
        if next != active {
            runs.push(FormatRun::new(std::mem::take(&mut pending), active));
            active = next;
        }
    }

    pending.push_str(&input[last..]);
    runs.push(FormatRun::new(pending, active));
    RichText::from_runs(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatMode;

    const B: FormatSet = FormatSet::of(InlineFormat::Bold);
    const I: FormatSet = FormatSet::of(InlineFormat::Italic);

    #[test]
    fn test_serialize_nests_in_fixed_order() {
        let text = RichText::from_runs([
            FormatRun::plain("a"),
            FormatRun::new("b", I.with(InlineFormat::Bold)),
            FormatRun::new("c", FormatSet::of(InlineFormat::Strikethrough)),
        ]);
        assert_eq!(serialize(&text), "a<b><i>b</i></b><s>c</s>");
    }

    #[test]
    fn test_round_trip() {
        let mut text = RichText::plain("x < y & \"z\"");
        text.apply_format(2..7, InlineFormat::Underline, FormatMode::Add);
        text.apply_format(4..9, InlineFormat::Bold, FormatMode::Add);
        let encoded = serialize(&text);
        assert_eq!(parse(&encoded), text);
        assert_eq!(serialize(&parse(&encoded)), encoded);
    }

    #[test]
    fn test_overlapping_tags_union() {
        let text = parse("<b>ab<i>cd</b>ef</i>");
        assert_eq!(
            text.runs(),
            &[
                FormatRun::new("ab", B),
                FormatRun::new("cd", B.union(I)),
                FormatRun::new("ef", I),
            ]
        );
    }

    #[test]
    fn test_redundant_nesting_and_aliases() {
        let text = parse("<b>a<strong>b</strong>c</b>d");
        assert_eq!(text.runs(), &[FormatRun::new("abc", B), FormatRun::plain("d")]);
    }

    #[test]
    fn test_unknown_tags_dropped_and_stray_lt_kept() {
        let text = parse(r#"<span style="color:red">a < b</span><br>c"#);
        assert_eq!(text.runs(), &[FormatRun::plain("a < b\nc")]);
    }

    #[test]
    fn test_entities_and_unclosed_tags() {
        let text = parse("&lt;tag&gt; <EM>open&#39;s");
        assert_eq!(
            text.runs(),
            &[FormatRun::plain("<tag> "), FormatRun::new("open's", I)]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("<b></b>").is_empty());
        assert_eq!(serialize(&RichText::new()), "");
    }
}
