//! Tests for [`BatchSizer`] — greedy cost/size-bounded partitioning.

use ferryman::{BatchSizer, BatchSizerConfig, sizer::estimated_cost};

fn items(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn flatten(batches: &[ferryman::Batch]) -> Vec<String> {
    batches.iter().flat_map(|b| b.items.clone()).collect()
}

#[test]
fn six_items_min_two_max_three_splits_evenly() {
    let sizer = BatchSizer::new(
        BatchSizerConfig::new()
            .min_batch_size(2)
            .max_batch_size(3)
            .target_cost_ceiling(1_000_000),
    );
    let input = items(&["a", "b", "c", "d", "e", "f"]);
    let batches = sizer.split(&input);

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].items, items(&["a", "b", "c"]));
    assert_eq!(batches[1].items, items(&["d", "e", "f"]));
    assert_eq!(batches[0].offset, 0);
    assert_eq!(batches[1].offset, 3);
}

#[test]
fn concatenation_reproduces_input_order() {
    let sizer = BatchSizer::new(
        BatchSizerConfig::new()
            .min_batch_size(2)
            .max_batch_size(5)
            .target_cost_ceiling(40),
    );
    let input: Vec<String> = (0..53).map(|i| format!("item number {i}")).collect();
    let batches = sizer.split(&input);

    assert_eq!(flatten(&batches), input);
}

#[test]
fn all_batches_within_size_bounds_except_final() {
    let sizer = BatchSizer::new(
        BatchSizerConfig::new()
            .min_batch_size(3)
            .max_batch_size(4)
            .target_cost_ceiling(1_000_000),
    );
    let input: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    let batches = sizer.split(&input);

    for (i, batch) in batches.iter().enumerate() {
        assert!(batch.len() <= 4, "batch {i} exceeds max");
        if i + 1 < batches.len() {
            assert!(batch.len() >= 3, "non-final batch {i} undersized");
        }
    }
    assert_eq!(flatten(&batches), input);
}

#[test]
fn cost_ceiling_closes_batches() {
    // Each item costs 25 units; ceiling 60 fits two per batch.
    let long = "x".repeat(100);
    let sizer = BatchSizer::new(
        BatchSizerConfig::new()
            .min_batch_size(1)
            .max_batch_size(10)
            .target_cost_ceiling(60),
    );
    let input = vec![long.clone(), long.clone(), long.clone(), long.clone()];
    let batches = sizer.split(&input);

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[0].estimated_cost(), 50);
}

#[test]
fn undersized_batch_keeps_growing_past_cost_ceiling() {
    // One oversized item blows the ceiling, but min_batch_size forces the
    // batch to keep accumulating until it has three items.
    let sizer = BatchSizer::new(
        BatchSizerConfig::new()
            .min_batch_size(3)
            .max_batch_size(10)
            .target_cost_ceiling(10),
    );
    let input = items(&[&"y".repeat(200), "a", "b", "c", "d"]);
    let batches = sizer.split(&input);

    assert!(batches[0].len() >= 3);
    assert_eq!(flatten(&batches), input);
}

#[test]
fn final_batch_may_be_undersized() {
    let sizer = BatchSizer::new(
        BatchSizerConfig::new()
            .min_batch_size(2)
            .max_batch_size(3)
            .target_cost_ceiling(1_000_000),
    );
    let batches = sizer.split(&items(&["a", "b", "c", "d"]));

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 1);
}

#[test]
fn empty_input_yields_no_batches() {
    let sizer = BatchSizer::new(BatchSizerConfig::default());
    assert!(sizer.split(&[]).is_empty());
}

#[test]
fn single_item_yields_single_batch() {
    let sizer = BatchSizer::new(BatchSizerConfig::default());
    let batches = sizer.split(&items(&["only"]));
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].offset, 0);
}

#[test]
fn batch_carries_configured_budget_and_priority() {
    let sizer = BatchSizer::new(BatchSizerConfig::new().retry_budget(2).priority(7));
    let batches = sizer.split(&items(&["a"]));
    assert_eq!(batches[0].max_attempts, 2);
    assert_eq!(batches[0].priority, 7);
}

#[test]
fn cost_proxy_is_character_derived() {
    assert_eq!(estimated_cost("abcdefgh"), 2);
    assert!(estimated_cost(&"z".repeat(3000 * 4)) >= 3000);
}
