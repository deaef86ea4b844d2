//! Integration tests covering the public monitoring workflow.

use std::sync::Arc;
use std::time::Duration;

use on_the_clock::{
    BeginError, DispatchMode, MonitoringEngine, MonitoringOptions, MonitoringSnapshotProvider,
    OperationMonitor, OperationTags, TimeMode,
};

fn quiet_options() -> MonitoringOptions {
    // Inline dispatch with no sinks; nothing runs in the background besides
    // the rotation timers.
    MonitoringOptions {
        event_dispatch_mode: DispatchMode::Inline,
        ..MonitoringOptions::default()
    }
}

fn test_engine(options: MonitoringOptions) -> Arc<MonitoringEngine> {
    Arc::new(MonitoringEngine::new(options, Vec::new()).unwrap())
}

#[test]
fn balanced_scopes_leave_nothing_in_flight() {
    let engine = test_engine(quiet_options());
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    for _ in 0..25 {
        monitor.begin("orders/submit").unwrap().complete();
    }

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_operation_snapshot("orders/submit").unwrap();

    assert_eq!(snapshot.total_count, 25);
    assert_eq!(snapshot.total_failures, 0);
    assert_eq!(snapshot.current_in_flight, 0);
    assert!(snapshot.peak_in_flight >= 1);
}

#[test]
fn failures_require_an_explicit_mark() {
    let engine = test_engine(quiet_options());
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    monitor.begin("job").unwrap().complete();

    let mut scope = monitor.begin("job").unwrap();
    scope.mark_failed();
    drop(scope);

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_operation_snapshot("job").unwrap();

    assert_eq!(snapshot.total_count, 2);
    assert_eq!(snapshot.total_failures, 1);
}

#[test]
fn blank_operation_names_are_rejected() {
    let engine = test_engine(quiet_options());
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    assert_eq!(monitor.begin("").unwrap_err(), BeginError::BlankName);
    assert_eq!(monitor.begin(" \t ").unwrap_err(), BeginError::BlankName);

    let provider = MonitoringSnapshotProvider::new(engine);
    assert!(provider.get_operation_snapshot("").is_none());
    assert!(provider.get_operation_snapshot("   ").is_none());
}

#[test]
fn names_beyond_the_cap_become_noop_scopes() {
    let engine = test_engine(MonitoringOptions {
        max_operation_count: 1,
        ..quiet_options()
    });
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    let first = monitor.begin("kept").unwrap();
    assert!(!first.is_noop());
    first.complete();

    let rejected = monitor.begin("rejected").unwrap();
    assert!(rejected.is_noop());
    rejected.complete();

    // Known names keep working at capacity.
    assert!(!monitor.begin("kept").unwrap().is_noop());

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_snapshot();

    assert_eq!(snapshot.operations.len(), 1);
    assert!(provider.get_operation_snapshot("rejected").is_none());
}

#[test]
fn snapshots_are_ordered_by_name() {
    let engine = test_engine(quiet_options());
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    for name in ["bravo", "alpha", "charlie"] {
        monitor.begin(name).unwrap().complete();
    }

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_snapshot();

    let names: Vec<_> = snapshot
        .operations
        .iter()
        .map(|operation| operation.name.as_ref().to_string())
        .collect();

    assert_eq!(names, ["alpha", "bravo", "charlie"]);
    assert_eq!(snapshot.time_mode, TimeMode::Utc);
    assert_eq!(snapshot.dropped_events, 0);
}

#[test]
fn series_lengths_match_the_configured_bucket_counts() {
    let engine = test_engine(MonitoringOptions {
        hot_bucket_count: 10,
        warm_bucket_count: 5,
        cold_bucket_count: 3,
        ..quiet_options()
    });
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    let scope = monitor.begin("op").unwrap();
    std::thread::sleep(Duration::from_millis(5));
    scope.complete();

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_operation_snapshot("op").unwrap();

    assert_eq!(snapshot.hot_series.len(), 10);
    assert_eq!(snapshot.warm_series.len(), 5);
    assert_eq!(snapshot.cold_series.len(), 3);

    // Timestamps ascend by exactly one period per point.
    for pair in snapshot.hot_series.windows(2) {
        assert_eq!(
            pair[1].timestamp.duration_since(pair[0].timestamp).unwrap(),
            Duration::from_secs(1)
        );
    }

    let timed: u64 = snapshot
        .hot_series
        .iter()
        .map(|point| point.sample_count)
        .sum();
    assert_eq!(timed, 1);
}

#[test]
fn sampling_thins_the_latency_windows_only() {
    let engine = test_engine(MonitoringOptions {
        sampling_rate: 3,
        ..quiet_options()
    });
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    for _ in 0..6 {
        monitor.begin("op").unwrap().complete();
    }

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_operation_snapshot("op").unwrap();

    assert_eq!(snapshot.total_count, 6);
    // Only every third call is timed; zero-length completions may still be
    // skipped by the windows, so the sampled count is an upper bound.
    assert!(snapshot.hot_sample_count <= 2);
}

#[test]
fn tags_are_sanitized_against_the_configured_caps() {
    let engine = test_engine(MonitoringOptions {
        max_tags_per_operation: 2,
        max_tag_value_length: 4,
        ..quiet_options()
    });
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    let mut tags = OperationTags::new();
    tags.insert("tenant", "acme-corporation");
    tags.insert("region", "eu");
    tags.insert("extra", "discarded");

    monitor.begin_with_tags("op", tags).unwrap().complete();

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    assert_eq!(provider.get_operation_snapshot("op").unwrap().total_count, 1);
}

#[test]
fn rejected_reconfiguration_keeps_the_previous_options() {
    let engine = test_engine(quiet_options());

    let result = engine.apply_options(MonitoringOptions {
        hot_bucket_count: 0,
        ..quiet_options()
    });

    assert!(result.is_err());
    assert_eq!(engine.current_options().hot_bucket_count, 120);

    // The engine still measures after the rejected update.
    let monitor = OperationMonitor::new(Arc::clone(&engine));
    monitor.begin("op").unwrap().complete();

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    assert_eq!(provider.get_operation_snapshot("op").unwrap().total_count, 1);
}

#[test]
fn reconfiguration_applies_to_later_operations() {
    let engine = test_engine(quiet_options());
    let monitor = OperationMonitor::new(Arc::clone(&engine));

    monitor.begin("early").unwrap().complete();

    engine
        .apply_options(MonitoringOptions {
            hot_bucket_count: 4,
            ..quiet_options()
        })
        .unwrap();

    monitor.begin("late").unwrap().complete();

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));

    // Window depths are fixed at operation creation.
    assert_eq!(
        provider.get_operation_snapshot("early").unwrap().hot_series.len(),
        120
    );
    assert_eq!(
        provider.get_operation_snapshot("late").unwrap().hot_series.len(),
        4
    );
}

#[test]
fn concurrent_scopes_from_many_threads_reconcile() {
    const THREADS: usize = 8;
    const CALLS_PER_THREAD: usize = 50;

    let engine = test_engine(quiet_options());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let monitor = OperationMonitor::new(Arc::clone(&engine));
            std::thread::spawn(move || {
                for _ in 0..CALLS_PER_THREAD {
                    monitor.begin("shared").unwrap().complete();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
    let snapshot = provider.get_operation_snapshot("shared").unwrap();

    assert_eq!(
        snapshot.total_count,
        u64::try_from(THREADS * CALLS_PER_THREAD).unwrap()
    );
    assert_eq!(snapshot.current_in_flight, 0);
    assert!(snapshot.peak_in_flight >= 1);
}

#[test]
fn dropping_the_engine_is_prompt() {
    let engine = test_engine(MonitoringOptions {
        enable_cpu_measurement: true,
        cpu_sample_interval_seconds: 3600,
        cold_bucket_hours: 24,
        ..quiet_options()
    });

    let monitor = OperationMonitor::new(Arc::clone(&engine));
    monitor.begin("op").unwrap().complete();
    drop(monitor);

    let started = std::time::Instant::now();
    drop(engine);
    assert!(started.elapsed() < Duration::from_secs(5));
}
