//! Page flow scenarios
//!
//! Heights come from a length oracle (one unit per character) unless a test says otherwise, so
//! page contents can be read straight off the block texts.

use pageflow_core::{
    Block, BlockMetrics, Command, CommandExecutor, Document, EngineConfig, FlowEngine,
    FormatMode, FormatSet, InlineFormat, OracleError, RescanPolicy, Selection,
};
use pretty_assertions::assert_eq;
use rand::Rng;

fn len_oracle(block: &Block) -> Result<BlockMetrics, OracleError> {
    Ok(BlockMetrics::new(block.text_len() as f32))
}

fn engine(budget: f32) -> FlowEngine {
    FlowEngine::new(EngineConfig::default().with_budget(budget))
}

fn para(text: &str) -> Block {
    Block::paragraph(text)
}

/// Page contents as plain text, `|` for page breaks.
fn layout(doc: &Document) -> Vec<Vec<String>> {
    doc.pages
        .iter()
        .map(|page| {
            page.blocks
                .iter()
                .map(|b| {
                    if b.is_page_break() {
                        "|".to_string()
                    } else {
                        b.plain_text()
                    }
                })
                .collect()
        })
        .collect()
}

fn assert_invariants(doc: &Document, engine: &FlowEngine) {
    let budget = engine.budget();
    for (idx, page) in doc.pages.iter().enumerate() {
        assert_eq!(page.number, idx + 1, "pages are numbered contiguously");
        if page.content_block_count() > 1 {
            let height = engine.page_height(page, &len_oracle).unwrap();
            assert!(height <= budget, "page {} is {height} tall", idx + 1);
        }
        // Sentinels ahead of the first content block on page 1 mark no boundary.
        let first_content = page
            .blocks
            .iter()
            .position(|b| !b.is_page_break())
            .unwrap_or(page.blocks.len());
        if let Some(pos) = page.blocks[first_content..]
            .iter()
            .position(|b| b.is_page_break())
        {
            assert!(
                page.blocks[first_content + pos..]
                    .iter()
                    .all(|b| b.is_page_break()),
                "content after a page break on page {}",
                idx + 1
            );
        }
        if idx + 1 < doc.pages.len() {
            assert!(page.has_text(), "page {} is empty but not last", idx + 1);
        }
    }
}

#[test]
fn test_overflow_moves_minimal_trailing_run() {
    let blocks: Vec<Block> = (0..10)
        .map(|i| {
            let mut b = para(&format!("block {i}"));
            b.id = format!("b{i}").as_str().into();
            b
        })
        .collect();
    let mut doc = Document::from_blocks("t", blocks);
    let oracle = |_: &Block| Ok::<_, OracleError>(BlockMetrics::new(100.0));

    let report = engine(931.0).reflow_all(&mut doc, &oracle);

    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.pages[0].blocks.len(), 9);
    assert_eq!(doc.pages[1].blocks.len(), 1);
    assert_eq!(doc.pages[1].blocks[0].id.as_str(), "b9");
    assert_eq!(report.forward_moves, 1);
    assert_eq!(report.pages_created, 1);
}

#[test]
fn test_page_break_mid_block_splits_at_caret() {
    let block = para("Hello world!");
    let id = block.id.clone();
    let mut executor = CommandExecutor::new(Document::from_blocks("t", vec![block]));
    executor
        .execute(Command::ApplyFormat {
            selection: Selection::new(id.clone(), 4, 8),
            format: InlineFormat::Bold,
            mode: FormatMode::Add,
        })
        .unwrap();
    executor
        .execute(Command::InsertPageBreak { block: id.clone(), offset: 6 })
        .unwrap();

    let mut doc = executor.into_document();
    engine(931.0).reflow_all(&mut doc, &len_oracle);

    assert_eq!(
        layout(&doc),
        vec![vec!["Hello ".to_string(), "|".to_string()], vec!["world!".to_string()]]
    );
    assert_eq!(doc.pages[0].blocks[0].id, id);

    let bold = FormatSet::of(InlineFormat::Bold);
    let left = &doc.pages[0].blocks[0].content;
    let right = &doc.pages[1].blocks[0].content;
    assert_eq!(left.active_formats(4..6), bold);
    assert_eq!(left.active_formats(0..4), FormatSet::EMPTY);
    assert_eq!(right.active_formats(0..2), bold);
    assert_eq!(right.active_formats(2..6), FormatSet::EMPTY);
}

#[test]
fn test_delete_pulls_following_page_and_prunes() {
    let blocks = vec![para("aaaaaa"), para("bbbbbb"), para("cccccc"), para("dddddd")];
    let b_id = blocks[1].id.clone();
    let mut doc = Document::from_blocks("t", blocks);
    let engine = engine(10.0);
    engine.reflow_all(&mut doc, &len_oracle);
    assert_eq!(doc.pages.len(), 4);

    let mut executor = CommandExecutor::new(doc);
    executor
        .execute(Command::DeleteRange { block: b_id, start: 0, end: 4 })
        .unwrap();
    let seed = executor.last_location().unwrap().page;
    assert_eq!(seed, 1);

    let mut doc = executor.into_document();
    let report = engine.reflow(&mut doc, &len_oracle, seed);

    assert_eq!(
        layout(&doc),
        vec![
            vec!["aaaaaa".to_string()],
            vec!["bb".to_string(), "cccccc".to_string()],
            vec!["dddddd".to_string()],
        ]
    );
    assert_eq!(report.pulled_blocks, 1);
    assert_eq!(report.pages_pruned, 1);
    assert_invariants(&doc, &engine);
}

#[test]
fn test_reflow_is_idempotent() {
    let mut doc = Document::from_blocks(
        "t",
        vec![
            para("aaaa"),
            para("bbbbbbb"),
            Block::page_break(),
            para("cc"),
            para("dddddddddddd"),
            para("e"),
        ],
    );
    let engine = engine(10.0);
    engine.reflow_all(&mut doc, &len_oracle);
    let first = doc.clone();

    let report = engine.reflow_all(&mut doc, &len_oracle);

    assert!(report.is_noop());
    assert_eq!(doc, first);
}

#[test]
fn test_page_break_is_never_crossed_backward() {
    let mut doc = Document::from_blocks(
        "t",
        vec![para("a"), Block::page_break(), para("b"), para("c")],
    );
    let engine = engine(100.0);
    engine.reflow_all(&mut doc, &len_oracle);
    assert_eq!(
        layout(&doc),
        vec![
            vec!["a".to_string(), "|".to_string()],
            vec!["b".to_string(), "c".to_string()],
        ]
    );

    // Plenty of room on page 1, still nothing may come back.
    let report = engine.reflow(&mut doc, &len_oracle, 0);
    assert_eq!(report.pulled_blocks, 0);
    assert_eq!(doc.pages[1].blocks[0].plain_text(), "b");
}

#[test]
fn test_leading_page_break_on_first_page_is_inert() {
    let block = para("Title");
    let id = block.id.clone();
    let mut executor = CommandExecutor::new(Document::from_blocks("t", vec![block]));
    let result = executor
        .execute(Command::InsertPageBreak { block: id, offset: 0 })
        .unwrap();
    assert!(!result.is_change());
    assert_eq!(executor.document().block_count(), 1);
}

#[test]
fn test_oversized_block_stays_alone() {
    let mut doc = Document::from_blocks("t", vec![para(&"x".repeat(40)), para("y")]);
    let engine = engine(10.0);
    engine.reflow_all(&mut doc, &len_oracle);
    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.pages[0].blocks.len(), 1);
    assert_eq!(doc.pages[1].blocks[0].plain_text(), "y");
}

#[test]
fn test_unmeasurable_page_is_skipped() {
    let mut doc = Document::from_blocks("t", vec![para("aaaa"), para("broken"), para("cccc")]);
    let oracle = |block: &Block| {
        if block.plain_text() == "broken" {
            Err(OracleError::Unavailable {
                block: block.id.clone(),
                reason: "not mounted".into(),
            })
        } else {
            len_oracle(block)
        }
    };
    let report = engine(5.0).reflow_all(&mut doc, &oracle);
    assert!(report.skipped_pages > 0);
    assert_eq!(doc.block_count(), 3);
}

#[test]
fn test_rescan_policies_agree() {
    let texts = ["aaaaaaa", "bb", "cccccc", "ddd", "eeeeeeeee", "f", "gggg"];
    let build = || Document::from_blocks("t", texts.iter().map(|t| para(t)).collect());

    let mut from_start = build();
    let mut from_moved = build();
    FlowEngine::new(
        EngineConfig::default()
            .with_budget(10.0)
            .with_rescan(RescanPolicy::FromStart),
    )
    .reflow_all(&mut from_start, &len_oracle);
    FlowEngine::new(
        EngineConfig::default()
            .with_budget(10.0)
            .with_rescan(RescanPolicy::FromMovedPage),
    )
    .reflow_all(&mut from_moved, &len_oracle);

    assert_eq!(layout(&from_start), layout(&from_moved));
}

#[test]
fn test_random_edits_keep_invariants() {
    let mut rng = rand::thread_rng();
    let engine = engine(20.0);

    for _ in 0..20 {
        let blocks: Vec<Block> = (0..rng.gen_range(1..30))
            .map(|_| {
                if rng.gen_bool(0.1) {
                    Block::page_break()
                } else {
                    para(&"x".repeat(rng.gen_range(0..15)))
                }
            })
            .collect();
        let mut doc = Document::from_blocks("t", blocks);
        engine.reflow_all(&mut doc, &len_oracle);
        assert_invariants(&doc, &engine);

        let mut executor = CommandExecutor::new(doc);
        for _ in 0..15 {
            let ids: Vec<_> = executor
                .document()
                .blocks()
                .filter(|b| !b.is_page_break())
                .map(|b| (b.id.clone(), b.text_len()))
                .collect();
            let (id, len) = ids[rng.gen_range(0..ids.len())].clone();
            let command = match rng.gen_range(0..4) {
                0 => Command::InsertText {
                    block: id,
                    offset: rng.gen_range(0..=len),
                    text: "y".repeat(rng.gen_range(1..8)),
                },
                1 => Command::DeleteRange {
                    block: id,
                    start: 0,
                    end: rng.gen_range(0..=len),
                },
                2 => Command::SplitBlock {
                    block: id,
                    offset: rng.gen_range(0..=len),
                },
                _ => Command::InsertPageBreak {
                    block: id,
                    offset: rng.gen_range(0..=len),
                },
            };
            executor.execute(command).unwrap();
            let seed = executor.last_location().map_or(0, |loc| loc.page);
            let doc = executor.document_mut();
            engine.reflow(doc, &len_oracle, seed);
            assert_invariants(executor.document(), &engine);

            let settled = executor.document().clone();
            let doc = executor.document_mut();
            engine.reflow(doc, &len_oracle, seed);
            assert_eq!(executor.document(), &settled);
        }
    }
}
