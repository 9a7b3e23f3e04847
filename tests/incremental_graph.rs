//! Incremental graph behaviour across runs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use stencil_forge::graph::{CancellationToken, Cancelled, IncrementalGraph};

#[test]
fn test_cancelled_mid_stage_resumes_cleanly() {
    let armed = Arc::new(AtomicBool::new(true));
    let trigger = Arc::clone(&armed);

    let mut graph = IncrementalGraph::new();
    let numbers = graph.source::<i32>();
    let tripled = graph.try_map(numbers.values(), move |n: &i32, cancel: &CancellationToken| {
        if *n == 2 && trigger.swap(false, Ordering::SeqCst) {
            cancel.cancel();
        }
        cancel.check()?;
        Ok(n * 3)
    });
    let all = graph.collect(tripled);
    let out = graph.output(all);
    graph.set_source(&numbers, vec![1, 2, 3]);

    let first = CancellationToken::new();
    assert_eq!(graph.run(&first), Err(Cancelled));
    assert!(!armed.load(Ordering::SeqCst));
    assert_eq!(graph.take_output(&out), None);
    assert_eq!(graph.stats(&tripled).computations, 0);

    graph.run(&CancellationToken::new()).unwrap();
    assert_eq!(graph.take_output(&out), Some(vec![3, 6, 9]));
    assert_eq!(graph.stats(&tripled).computations, 3);

    graph.set_source(&numbers, vec![1, 2, 4]);
    graph.run(&CancellationToken::none()).unwrap();
    assert_eq!(graph.take_output(&out), Some(vec![3, 6, 12]));
    assert_eq!(graph.stats(&tripled).computations, 4);
}

#[test]
fn test_equal_snapshot_does_no_work() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut graph = IncrementalGraph::new();
    let names = graph.source::<String>();
    let greeted = graph.map(names.values(), move |name: &String| {
        counter.fetch_add(1, Ordering::SeqCst);
        format!("hello {}", name)
    });
    let all = graph.collect(greeted);
    let out = graph.output(all);

    graph.set_source(&names, vec!["ada".to_string(), "grace".to_string()]);
    graph.run(&CancellationToken::none()).unwrap();
    assert!(graph.take_output(&out).is_some());

    // A freshly built but equal snapshot.
    graph.set_source(&names, vec!["ada".to_string(), "grace".to_string()]);
    let summary = graph.run(&CancellationToken::none()).unwrap();
    assert_eq!(summary.evaluated, 0);
    assert_eq!(graph.take_output(&out), None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_reordered_elements_reuse_cached_results() {
    let mut graph = IncrementalGraph::new();
    let numbers = graph.source::<u32>();
    let labels = graph.map(numbers.values(), |n: &u32| format!("#{}", n));
    let all = graph.collect(labels);
    let out = graph.output(all);

    graph.set_source(&numbers, vec![1, 2, 3]);
    graph.run(&CancellationToken::none()).unwrap();
    graph.take_output(&out);

    graph.set_source(&numbers, vec![3, 1, 2]);
    graph.run(&CancellationToken::none()).unwrap();
    assert_eq!(
        graph.take_output(&out),
        Some(vec!["#3".to_string(), "#1".to_string(), "#2".to_string()])
    );
    assert_eq!(graph.stats(&labels).computations, 3);
}
