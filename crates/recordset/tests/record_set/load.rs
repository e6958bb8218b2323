//! Single, ranged, and paged loads against a scripted proxy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use recordset::error::{ConfigError, LoadError, ProxyError, ProxyErrorKind};
use recordset::proxy::{Batch, MemoryProxy, ResultSet};
use recordset::reactive::SetEvent;
use recordset::record_set::{LoadOptions, RecordSet, RecordSetOptions};
use recordset::types::AddOptions;

use super::support::{
    ids, item_schema, item_set, names, paged_rows, proxied_set, record_events, MockProxy,
};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn loaded_events(events: &[SetEvent]) -> usize {
    names(events).iter().filter(|n| **n == "load").count()
}

// ============================================================================
// Single loads
// ============================================================================

#[tokio::test]
async fn load_replaces_contents_and_records_total() {
    let proxy = MockProxy::new();
    proxy.on_read(|_| {
        Ok(ResultSet::new(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})])
            .with_total_count(40))
    });
    let set = proxied_set(proxy.clone(), None);
    set.add([json!({"id": 99})], AddOptions::default()).unwrap();
    let log = record_events(&set);
    let completed = counter();

    let batch = set
        .load(LoadOptions {
            on_complete: Some({
                let completed = Arc::clone(&completed);
                Arc::new(move |_: &RecordSet, _: &Batch| {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
            }),
            ..Default::default()
        })
        .unwrap()
        .await
        .unwrap();

    assert!(batch.was_successful());
    assert_eq!(ids(&set), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(set.total_count(), Some(40));
    assert!(!set.is_loading());
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(loaded_events(&log.lock()), 1);
    assert_eq!(proxy.reads().len(), 1);
}

#[tokio::test]
async fn replacing_load_queues_previous_records_for_removal() {
    let proxy = MockProxy::new();
    proxy.on_read(|_| Ok(ResultSet::new(vec![json!({"id": 1})])));
    let set = proxied_set(proxy, None);
    set.add([json!({"id": 99})], AddOptions::default()).unwrap();

    set.load(LoadOptions::default()).unwrap().await.unwrap();

    let pending = set.removed_records();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].get("id"), Some(json!(99)));
}

#[tokio::test]
async fn accumulating_load_appends() {
    let proxy = MockProxy::new();
    proxy.on_read(|_| Ok(ResultSet::new(vec![json!({"id": 2})])));
    let set = proxied_set(proxy, None);
    set.add([json!({"id": 1})], AddOptions::default()).unwrap();

    set.load(LoadOptions::accumulate()).unwrap().await.unwrap();

    assert_eq!(ids(&set), vec![json!(1), json!(2)]);
    assert!(set.removed_records().is_empty());
}

#[tokio::test]
async fn load_without_total_keeps_previous_total() {
    let proxy = MockProxy::new();
    let calls = counter();
    {
        let calls = Arc::clone(&calls);
        proxy.on_read(move |_| {
            let rs = ResultSet::new(vec![json!({"id": 1})]);
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(rs.with_total_count(12))
            } else {
                Ok(rs)
            }
        });
    }
    let set = proxied_set(proxy, None);

    set.load(LoadOptions::default()).unwrap().await.unwrap();
    set.load(LoadOptions::default()).unwrap().await.unwrap();

    assert_eq!(set.total_count(), Some(12));
}

#[tokio::test]
async fn params_reach_the_proxy() {
    let proxy = Arc::new(
        MemoryProxy::new().with_records([
            json!({"id": 1, "kind": "a"}),
            json!({"id": 2, "kind": "b"}),
            json!({"id": 3, "kind": "a"}),
        ]),
    );
    let set = proxied_set(proxy, None);
    let mut options = LoadOptions::default();
    options.params.insert("kind".into(), json!("a"));

    set.load(options).unwrap().await.unwrap();

    assert_eq!(ids(&set), vec![json!(1), json!(3)]);
    assert_eq!(set.total_count(), Some(2));
}

#[tokio::test]
async fn schema_proxy_is_used_when_set_has_none() {
    let proxy = Arc::new(MemoryProxy::new().with_records([json!({"id": 1})]));
    let schema = recordset::RecordSchema::builder("item").proxy(proxy).build();
    let set = RecordSet::with_schema(schema);

    set.load(LoadOptions::default()).unwrap().await.unwrap();

    assert_eq!(set.count(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failed_load_rejects_and_still_completes() {
    let proxy = MockProxy::new();
    proxy.on_read(|_| Err(ProxyError::new("backend down")));
    let set = proxied_set(proxy, None);
    set.add([json!({"id": 1})], AddOptions::default()).unwrap();
    let log = record_events(&set);
    let (errors, completed) = (counter(), counter());

    let err = set
        .load(LoadOptions {
            on_error: Some({
                let errors = Arc::clone(&errors);
                Arc::new(move |_: &RecordSet, _: &LoadError| {
                    errors.fetch_add(1, Ordering::SeqCst);
                })
            }),
            on_complete: Some({
                let completed = Arc::clone(&completed);
                Arc::new(move |_: &RecordSet, _: &Batch| {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
            }),
            ..Default::default()
        })
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(err.source.message, "backend down");
    assert!(err.batch.has_exception());
    assert!(!set.is_loading());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(loaded_events(&log.lock()), 1);
    assert_eq!(ids(&set), vec![json!(1)], "failed load leaves contents alone");
}

#[tokio::test]
async fn one_failed_page_fails_the_whole_range() {
    let proxy = MockProxy::new();
    proxy.on_read(|op| match op.page {
        Some(2) => Err(ProxyError::new("page 2 lost")),
        _ => paged_rows(30)(op),
    });
    let set = proxied_set(proxy, Some(10));

    let err = set
        .load_page_range(1, 3, LoadOptions::default())
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(err.total, 3);
    assert_eq!(err.failed, 1);
    assert!(set.is_empty());
    assert!(!set.is_loading());
}

#[tokio::test]
async fn malformed_row_fails_load_without_partial_apply() {
    let proxy = MockProxy::new();
    proxy.on_read(|_| Ok(ResultSet::new(vec![json!({"id": 1}), json!("junk")])));
    let set = proxied_set(proxy, None);

    let err = set.load(LoadOptions::default()).unwrap().await.unwrap_err();

    assert_eq!(err.source.kind, ProxyErrorKind::Permanent);
    assert!(set.is_empty());
}

#[tokio::test]
async fn success_callback_sees_loaded_records() {
    let proxy = MockProxy::new();
    proxy.on_read(|_| Ok(ResultSet::new(vec![json!({"id": 1})])));
    let set = proxied_set(proxy, None);
    let seen = counter();

    set.load(LoadOptions {
        on_success: Some({
            let seen = Arc::clone(&seen);
            Arc::new(move |set: &RecordSet, batch: &Batch| {
                assert!(batch.was_successful());
                seen.store(set.count(), Ordering::SeqCst);
            })
        }),
        ..Default::default()
    })
    .unwrap()
    .await
    .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn paged_load_range_requests_covering_pages() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(100));
    let set = proxied_set(proxy.clone(), Some(10));

    set.load_range(15, 24, LoadOptions::default())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(proxy.read_pages(), vec![2, 3]);
    let expected: Vec<Value> = (11..=30).map(|i| json!(i)).collect();
    assert_eq!(ids(&set), expected);
}

#[tokio::test]
async fn unpaged_load_range_issues_start_and_limit() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(100));
    let set = proxied_set(proxy.clone(), None);

    set.load_range(5, 9, LoadOptions::default())
        .unwrap()
        .await
        .unwrap();

    let reads = proxy.reads();
    assert_eq!(reads.len(), 1);
    assert_eq!((reads[0].start, reads[0].limit), (Some(5), Some(4)));
    assert_eq!(reads[0].page, None);
}

#[tokio::test]
async fn load_with_page_size_loads_first_page() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(25));
    let set = proxied_set(proxy.clone(), Some(10));

    set.load(LoadOptions::default()).unwrap().await.unwrap();

    assert_eq!(proxy.read_pages(), vec![1]);
    assert_eq!(set.count(), 10);
    assert_eq!(set.total_count(), Some(25));
}

#[tokio::test]
async fn pages_accumulate_by_default() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(25));
    let set = proxied_set(proxy, Some(10));

    set.load_page(1, LoadOptions::default()).unwrap().await.unwrap();
    set.load_page(2, LoadOptions::default()).unwrap().await.unwrap();

    assert_eq!(set.count(), 20);
    assert!(set.has_range(0, 19));
    assert!(!set.has_range(0, 20));
}

#[tokio::test]
async fn clear_on_page_load_replaces_each_page() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(25));
    let set = RecordSet::new(RecordSetOptions {
        schema: Some(item_schema()),
        proxy: Some(proxy),
        page_size: Some(10),
        clear_on_page_load: true,
        ..Default::default()
    })
    .unwrap();

    set.load_page(1, LoadOptions::default()).unwrap().await.unwrap();
    set.load_page(3, LoadOptions::default()).unwrap().await.unwrap();

    let expected: Vec<Value> = (21..=25).map(|i| json!(i)).collect();
    assert_eq!(ids(&set), expected);
}

#[tokio::test]
async fn page_results_apply_in_page_order_whatever_the_arrival_order() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(30));
    proxy.delay_reads(|op| match op.page {
        Some(1) => Duration::from_millis(40),
        Some(2) => Duration::from_millis(20),
        _ => Duration::from_millis(1),
    });
    let set = proxied_set(proxy, Some(10));
    let log = record_events(&set);

    set.load_page_range(1, 3, LoadOptions::default())
        .unwrap()
        .await
        .unwrap();

    let expected: Vec<Value> = (1..=30).map(|i| json!(i)).collect();
    assert_eq!(ids(&set), expected);
    let addsets = names(&log.lock())
        .into_iter()
        .filter(|n| *n == "addset")
        .count();
    assert_eq!(addsets, 1, "one logical load applies through one add");
}

#[tokio::test]
async fn total_count_comes_from_first_operation() {
    let proxy = MockProxy::new();
    proxy.on_read(|op| {
        let total = if op.page == Some(1) { 50 } else { 999 };
        Ok(ResultSet::new(vec![json!({"id": op.page})]).with_total_count(total))
    });
    let set = proxied_set(proxy, Some(10));

    set.load_page_range(1, 2, LoadOptions::default())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(set.total_count(), Some(50));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn is_loading_while_requests_are_in_flight() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(5));
    proxy.delay_reads(|_| Duration::from_millis(20));
    let set = proxied_set(proxy, None);

    let pending = set.load(LoadOptions::default()).unwrap();
    assert!(set.is_loading());

    pending.await.unwrap();
    assert!(!set.is_loading());
}

#[tokio::test]
async fn overlapping_loads_keep_loading_until_both_settle() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(30));
    proxy.delay_reads(|op| match op.page {
        Some(1) => Duration::from_millis(5),
        _ => Duration::from_millis(40),
    });
    let set = proxied_set(proxy, Some(10));

    let first = set.load_page(1, LoadOptions::default()).unwrap();
    let second = set.load_page(2, LoadOptions::default()).unwrap();

    first.await.unwrap();
    assert!(set.is_loading(), "second load still in flight");
    second.await.unwrap();
    assert!(!set.is_loading());
    assert_eq!(set.count(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replacing_loads_leave_one_result_set() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(50));
    let set = proxied_set(proxy, None);
    // Slow removal listener widens the window between clearing and refilling.
    set.on(|e| {
        if let SetEvent::RemovedBatch(_) = e {
            std::thread::sleep(Duration::from_millis(2));
        }
    });
    set.load(LoadOptions::default()).unwrap().await.unwrap();

    for round in 0..20 {
        let a = set.load(LoadOptions::default()).unwrap();
        let b = set.load(LoadOptions::default()).unwrap();
        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(set.count(), 50, "round {round} kept both result sets");
    }
}

#[tokio::test]
async fn dropped_pending_still_applies_results() {
    let proxy = MockProxy::new();
    proxy.on_read(paged_rows(3));
    let set = proxied_set(proxy, None);

    drop(set.load(LoadOptions::default()).unwrap());
    for _ in 0..50 {
        if !set.is_loading() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert!(!set.is_loading());
    assert_eq!(set.count(), 3);
}

// ============================================================================
// Configuration errors
// ============================================================================

#[tokio::test]
async fn load_without_proxy_is_rejected_up_front() {
    let set = item_set();
    let err = set.load(LoadOptions::default()).unwrap_err();
    assert_eq!(err, ConfigError::MissingProxy);
    assert!(!set.is_loading());
}

#[tokio::test]
async fn load_without_schema_or_factory_is_rejected() {
    let set = RecordSet::new(RecordSetOptions {
        proxy: Some(MockProxy::new()),
        ..Default::default()
    })
    .unwrap();
    let err = set.load(LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingSchema(_)));
}

#[tokio::test]
async fn page_range_needs_page_size() {
    let set = proxied_set(MockProxy::new(), None);
    let err = set
        .load_page_range(1, 2, LoadOptions::default())
        .unwrap_err();
    assert_eq!(err, ConfigError::MissingPageSize);
}

#[tokio::test]
async fn invalid_pages_are_rejected() {
    let proxy = MockProxy::new();
    let set = proxied_set(proxy.clone(), Some(10));

    assert!(matches!(
        set.load_page(0, LoadOptions::default()).unwrap_err(),
        ConfigError::InvalidPage { .. }
    ));
    assert_eq!(
        set.load_page_range(3, 2, LoadOptions::default()).unwrap_err(),
        ConfigError::InvalidPage { start: 3, end: 2 }
    );
    assert!(proxy.reads().is_empty());
}

#[tokio::test]
async fn page_range_past_addressable_rows_is_rejected() {
    let proxy = MockProxy::new();
    let set = proxied_set(proxy.clone(), Some(10));

    let err = set
        .load_page_range(1, usize::MAX, LoadOptions::default())
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::InvalidPage {
            start: 1,
            end: usize::MAX
        }
    );
    assert!(proxy.reads().is_empty());
    assert!(!set.is_loading());
}

#[test]
fn load_outside_runtime_is_rejected() {
    let set = proxied_set(MockProxy::new(), None);
    let err = set.load(LoadOptions::default()).unwrap_err();
    assert_eq!(err, ConfigError::NoRuntime);
    assert!(!set.is_loading());
}
