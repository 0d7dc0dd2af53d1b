use super::*;
use crate::kernel::services::ports::ResultKind;
use std::sync::Arc;

fn item(name: &str) -> ResultItem {
    ResultItem::new(ResultKind::Class, name)
}

#[test]
fn test_flush_returns_sorted_batch() {
    let aggregator = ResultAggregator::new();
    aggregator.add_result(item("c.C"));
    aggregator.add_result(item("a.A"));
    aggregator.add_result(item("b.B"));

    let batch = aggregator.flush().unwrap();
    let names: Vec<&str> = batch.iter().map(|i| i.qualified_name.as_str()).collect();
    assert_eq!(names, vec!["a.A", "b.B", "c.C"]);
    assert_eq!(aggregator.added(), 3);
    assert_eq!(aggregator.flushed(), 3);
}

#[test]
fn test_flush_is_idempotent() {
    let aggregator = ResultAggregator::new();
    aggregator.add_result(item("a.A"));
    assert!(aggregator.flush().is_some());
    assert!(aggregator.flush().is_none());
    assert_eq!(aggregator.pending_len(), 0);
    assert_eq!(aggregator.flushed(), 1);
}

#[test]
fn test_batches_only_sort_within_themselves() {
    let aggregator = ResultAggregator::new();
    aggregator.add_result(item("z.Z"));
    let first = aggregator.flush().unwrap();
    aggregator.add_result(item("a.A"));
    let second = aggregator.flush().unwrap();

    assert_eq!(first[0].qualified_name, "z.Z");
    assert_eq!(second[0].qualified_name, "a.A");
}

#[test]
fn test_clear_drops_pending_and_counters() {
    let aggregator = ResultAggregator::new();
    aggregator.add_result(item("a.A"));
    aggregator.add_result(item("b.B"));
    aggregator.clear();
    assert!(aggregator.flush().is_none());
    assert_eq!(aggregator.added(), 0);
    assert_eq!(aggregator.flushed(), 0);
}

#[test]
fn test_concurrent_add_and_flush_deliver_each_item_once() {
    let aggregator = Arc::new(ResultAggregator::new());
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let aggregator = Arc::clone(&aggregator);
            std::thread::spawn(move || {
                for i in 0..250 {
                    aggregator.add_result(item(&format!("p{p}.C{i:03}")));
                }
            })
        })
        .collect();

    let mut delivered = Vec::new();
    while producers.iter().any(|h| !h.is_finished()) {
        if let Some(batch) = aggregator.flush() {
            delivered.extend(batch);
        }
    }
    for handle in producers {
        handle.join().unwrap();
    }
    if let Some(batch) = aggregator.flush() {
        delivered.extend(batch);
    }

    assert_eq!(delivered.len(), 1000);
    delivered.sort();
    delivered.dedup();
    assert_eq!(delivered.len(), 1000);
}
