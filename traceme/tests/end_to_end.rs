//! End-to-end tests: record events on real threads, flush to a real
//! file, and parse the exported document back.

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use traceme::{Config, Profiler};

fn trace_path(test_name: &str) -> PathBuf {
    let mut path = PathBuf::new();
    path.push("test-tmp");
    path.push("end_to_end");
    path.push(format!("{}.json", test_name));
    path
}

fn configure(profiler: &Profiler, test_name: &str, capacity: usize, enabled: bool) -> PathBuf {
    let path = trace_path(test_name);
    profiler
        .configure(Config {
            enabled,
            per_thread_capacity: capacity,
            trace_output_path: path.clone(),
            enable_native_signpost_integration: false,
        })
        .unwrap();
    path
}

fn read_trace(path: &PathBuf) -> Vec<Value> {
    let bytes = std::fs::read(path).unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    doc["traceEvents"].as_array().unwrap().clone()
}

fn name_and_phase(event: &Value) -> (String, String) {
    (
        event["name"].as_str().unwrap().to_owned(),
        event["ph"].as_str().unwrap().to_owned(),
    )
}

#[test]
fn round_trip_preserves_per_thread_order() {
    let profiler = Arc::new(Profiler::new());
    let path = configure(&profiler, "round_trip", 1024, true);

    let workers: Vec<_> = (0..3)
        .map(|worker| {
            let profiler = Arc::clone(&profiler);
            std::thread::spawn(move || {
                let work = profiler.intern(&format!("worker-{}.work", worker));
                let iters = profiler.intern(&format!("worker-{}.iters", worker));
                let done = profiler.intern(&format!("worker-{}.done", worker));
                for i in 0..10 {
                    let _region = profiler.start_region(work);
                    profiler.counter(iters, i);
                }
                profiler.mark(done);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    profiler.flush_all().unwrap();
    let events = read_trace(&path);

    // 10 * (begin + counter + end) + mark, per worker, exactly once.
    assert_eq!(events.len(), 3 * 31);

    // One constant pid for the whole file.
    let pids: Vec<_> = events.iter().map(|e| e["pid"].as_u64().unwrap()).collect();
    assert!(pids.windows(2).all(|w| w[0] == w[1]));

    for worker in 0..3 {
        let work = format!("worker-{}.work", worker);
        let iters = format!("worker-{}.iters", worker);
        let done = format!("worker-{}.done", worker);

        let sequence: Vec<_> = events
            .iter()
            .filter(|e| {
                let name = e["name"].as_str().unwrap();
                name == work || name == iters || name == done
            })
            .collect();
        assert_eq!(sequence.len(), 31);

        // All from one thread, in recorded order.
        let tid = sequence[0]["tid"].as_u64().unwrap();
        assert!(sequence.iter().all(|e| e["tid"].as_u64().unwrap() == tid));

        let mut expected = Vec::new();
        for i in 0..10 {
            expected.push((work.clone(), "B".to_owned()));
            expected.push((iters.clone(), "C".to_owned()));
            expected.push((work.clone(), "E".to_owned()));
            let counter = &sequence[i * 3 + 1];
            assert_eq!(counter["args"]["value"].as_i64().unwrap(), i as i64);
        }
        expected.push((done, "I".to_owned()));
        let actual: Vec<_> = sequence.iter().map(|e| name_and_phase(e)).collect();
        assert_eq!(actual, expected);

        // Timestamps never run backwards within a thread.
        let timestamps: Vec<f64> = sequence
            .iter()
            .map(|e| e["ts"].as_f64().unwrap())
            .collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn second_flush_with_no_new_events_is_empty() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "second_flush", 64, true);

    let id = profiler.intern("once");
    profiler.mark(id);

    profiler.flush_all().unwrap();
    assert_eq!(read_trace(&path).len(), 1);

    profiler.flush_all().unwrap();
    assert_eq!(read_trace(&path).len(), 0);
}

#[test]
fn overflow_exports_only_the_most_recent_events() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "overflow", 4, true);

    for name in &["a", "b", "c"] {
        let id = profiler.intern(name);
        profiler.begin(id);
        profiler.end(id);
    }

    profiler.flush_all().unwrap();
    let events: Vec<_> = read_trace(&path).iter().map(name_and_phase).collect();

    // Six writes into a capacity-4 buffer: write indices 2..=5 survive.
    assert_eq!(
        events,
        vec![
            ("b".to_owned(), "B".to_owned()),
            ("b".to_owned(), "E".to_owned()),
            ("c".to_owned(), "B".to_owned()),
            ("c".to_owned(), "E".to_owned()),
        ]
    );
}

#[test]
fn disabled_profiler_exports_an_empty_trace() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "disabled", 64, false);

    let id = profiler.intern("silent");
    profiler.begin(id);
    profiler.counter(id, 1);
    profiler.end(id);
    profiler.mark(id);

    profiler.flush_all().unwrap();
    assert_eq!(read_trace(&path).len(), 0);
}

#[test]
fn disabling_keeps_already_recorded_events() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "disable_keeps_events", 64, true);

    let id = profiler.intern("kept");
    profiler.mark(id);
    profiler.mark(id);

    profiler.enable(false);
    profiler.mark(id);
    profiler.mark(id);

    profiler.enable(true);
    profiler.mark(id);

    profiler.flush_all().unwrap();
    // Two recorded before the disable, one after re-enabling.
    assert_eq!(read_trace(&path).len(), 3);
}

#[test]
fn counter_round_trips_with_its_payload() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "counter", 64, true);

    let iter = profiler.intern("iter");
    profiler.counter(iter, 42);

    profiler.flush_all().unwrap();
    let events = read_trace(&path);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["name"], "iter");
    assert_eq!(events[0]["ph"], "C");
    assert_eq!(events[0]["args"]["value"], 42);
}

#[test]
fn concurrent_interning_agrees_across_threads() {
    let profiler = Arc::new(Profiler::new());
    configure(&profiler, "concurrent_intern", 64, true);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let profiler = Arc::clone(&profiler);
            std::thread::spawn(move || profiler.intern("region"))
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(ids[0], ids[1]);
    assert_eq!(profiler.names().len(), 1);
}

#[test]
fn shutdown_flushes_and_silences_recording() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "shutdown", 64, true);

    let id = profiler.intern("final");
    profiler.mark(id);
    profiler.shutdown().unwrap();

    assert_eq!(read_trace(&path).len(), 1);
    assert!(!profiler.is_enabled());

    // Recording after shutdown is a no-op; a second shutdown is safe
    // and rewrites the (now empty) trace.
    profiler.mark(id);
    profiler.shutdown().unwrap();
    assert_eq!(read_trace(&path).len(), 0);
}

#[test]
fn region_guard_records_end_on_early_exit() {
    let profiler = Profiler::new();
    let path = configure(&profiler, "guard_early_exit", 64, true);

    let outer = profiler.intern("outer");
    let inner = profiler.intern("inner");

    fn nested(profiler: &Profiler, outer: traceme::NameId, inner: traceme::NameId) {
        let _outer = profiler.start_region(outer);
        let _inner = profiler.start_region(inner);
        if profiler.is_enabled() {
            return; // early return still records both `End` events
        }
    }
    nested(&profiler, outer, inner);

    profiler.flush_all().unwrap();
    let events: Vec<_> = read_trace(&path).iter().map(name_and_phase).collect();
    assert_eq!(
        events,
        vec![
            ("outer".to_owned(), "B".to_owned()),
            ("inner".to_owned(), "B".to_owned()),
            ("inner".to_owned(), "E".to_owned()),
            ("outer".to_owned(), "E".to_owned()),
        ]
    );
}
