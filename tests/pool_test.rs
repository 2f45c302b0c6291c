use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tidepool::executor::LONG_TASK_PRIORITY;
use tidepool::prelude::*;
use tidepool::status::STATUS_TIMEOUT;

fn config(primary: usize, max: usize) -> Config {
    Config::builder()
        .primary_threads(primary)
        .max_threads(max)
        .build()
        .unwrap()
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Stops `pool` from another thread, releasing `held` only once the stop
/// has had time to signal every worker.
fn stop_then_release(pool: &Arc<ThreadPool>, held: MutexGuard<'_, ()>) {
    let stopper = {
        let pool = pool.clone();
        thread::spawn(move || pool.stop())
    };
    assert!(wait_until(Duration::from_secs(5), || !pool.is_started()));
    thread::sleep(Duration::from_millis(50));
    drop(held);
    stopper.join().unwrap().unwrap();
}

#[test]
fn test_round_robin_dispatch_cycles_primaries() {
    let pool = ThreadPool::new(config(4, 8)).unwrap();
    let picks: Vec<_> = (0..8).map(|_| pool.dispatch(DispatchHint::RoundRobin)).collect();

    let first = match picks[0] {
        Destination::Primary(index) => index,
        other => panic!("unexpected destination {:?}", other),
    };
    for (offset, pick) in picks.iter().enumerate() {
        assert_eq!(*pick, Destination::Primary((first + offset) % 4));
    }

    assert_eq!(pool.dispatch(DispatchHint::Worker(3)), Destination::Primary(3));
    assert_eq!(pool.dispatch(DispatchHint::Worker(4)), Destination::Pool);
    assert_eq!(pool.dispatch(DispatchHint::LongTask), Destination::LongTask);
}

#[test]
fn test_commit_round_robin_wraps_to_first_primary() {
    let pool = Arc::new(
        ThreadPool::new(
            Config::builder()
                .primary_threads(3)
                .max_threads(3)
                .steal_range(0)
                .build()
                .unwrap(),
        )
        .unwrap(),
    );

    let ran_on: Vec<_> = (0..4)
        .map(|_| {
            let inner = pool.clone();
            pool.commit(move || inner.worker_index_for_current_thread())
                .unwrap()
                .wait()
                .unwrap()
        })
        .collect();

    assert_eq!(ran_on, vec![Some(0), Some(1), Some(2), Some(0)]);
}

#[test]
fn test_task_runs_on_chosen_worker() {
    let pool = Arc::new(
        ThreadPool::new(
            Config::builder()
                .primary_threads(3)
                .max_threads(3)
                .steal_range(0)
                .build()
                .unwrap(),
        )
        .unwrap(),
    );

    for index in 0..3 {
        let inner = pool.clone();
        let seen = pool
            .commit_with_hint(
                move || inner.worker_index_for_current_thread(),
                DispatchHint::Worker(index),
            )
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(seen, Some(index));
    }

    assert_eq!(pool.worker_index_for_current_thread(), None);
}

#[test]
fn test_commit_returns_values_and_panics() {
    let pool = ThreadPool::new(config(2, 4)).unwrap();

    let ok = pool.commit(|| String::from("done")).unwrap();
    assert_eq!(ok.wait().unwrap(), "done");

    let failed = pool.commit(|| -> u8 { panic!("bad input") }).unwrap();
    match failed.wait() {
        Err(Error::TaskPanicked(msg)) => assert_eq!(msg, "bad input"),
        other => panic!("unexpected {:?}", other),
    }

    // the worker survived the panic
    assert_eq!(pool.commit(|| 7).unwrap().wait().unwrap(), 7);
}

#[test]
fn test_pool_hint_reaches_primaries() {
    let pool = ThreadPool::new(config(2, 2)).unwrap();
    let handles: Vec<_> = (0..20)
        .map(|i| pool.commit_with_hint(move || i, DispatchHint::Pool).unwrap())
        .collect();
    let total: i32 = handles.into_iter().map(|h| h.wait().unwrap()).sum();
    assert_eq!(total, 190);
    assert_eq!(pool.secondary_count(), 0);
}

#[test]
fn test_priority_commit_uses_secondary() {
    let pool = ThreadPool::new(config(2, 3)).unwrap();
    assert_eq!(pool.secondary_count(), 0);

    let handle = pool.commit_with_priority(|| 5, 10).unwrap();
    assert_eq!(handle.wait().unwrap(), 5);
    assert_eq!(pool.secondary_count(), 1);
}

#[test]
fn test_priority_order_on_single_secondary() {
    let pool = ThreadPool::new(config(1, 2)).unwrap();
    let gate = Arc::new(Mutex::new(()));
    let order = Arc::new(Mutex::new(Vec::new()));

    let held = gate.lock();
    let blocker = {
        let gate = gate.clone();
        pool.commit_with_priority(move || drop(gate.lock()), 0).unwrap()
    };
    assert!(wait_until(Duration::from_secs(5), || {
        pool.stats().queued_priority_tasks == 0
    }));

    let mut handles = Vec::new();
    for priority in [1, 5, LONG_TASK_PRIORITY, 3] {
        let order = order.clone();
        handles.push(
            pool.commit_with_priority(move || order.lock().push(priority), priority)
                .unwrap(),
        );
    }
    drop(held);

    blocker.wait().unwrap();
    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(*order.lock(), vec![5, 3, 1, LONG_TASK_PRIORITY]);
}

#[test]
fn test_priority_commit_without_capacity_fails() {
    let pool = ThreadPool::new(config(2, 2)).unwrap();
    assert!(matches!(
        pool.commit_with_priority(|| (), 1),
        Err(Error::NoSecondaryCapacity)
    ));
    assert!(matches!(
        pool.commit_with_hint(|| (), DispatchHint::LongTask),
        Err(Error::NoSecondaryCapacity)
    ));
}

#[test]
fn test_submit_group_ok() {
    let pool = ThreadPool::new(config(2, 4)).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let reported = Arc::new(Mutex::new(Vec::new()));

    let mut group = TaskGroup::new();
    for _ in 0..8 {
        let counter = counter.clone();
        group = group.add_task(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }
    let sink = reported.clone();
    let group = group.on_finished(move |status| sink.lock().push(status));

    let status = pool.submit(group, Duration::from_secs(5));
    assert!(status.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 8);
    assert_eq!(*reported.lock(), vec![Status::ok()]);
}

#[test]
fn test_submit_times_out_and_task_still_runs() {
    let pool = ThreadPool::new(config(2, 4)).unwrap();
    let finished = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let done = finished.clone();
    let seen = calls.clone();
    let group = TaskGroup::new()
        .add_task(move || {
            thread::sleep(Duration::from_millis(300));
            done.fetch_add(1, Ordering::SeqCst);
        })
        .add_task(|| {})
        .with_ttl(Duration::from_secs(60))
        .on_finished(move |status| {
            assert!(status.is_timeout());
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let started = Instant::now();
    let status = pool.submit(group, Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(status.code(), STATUS_TIMEOUT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(wait_until(Duration::from_secs(5), || {
        finished.load(Ordering::SeqCst) == 1
    }));
}

#[test]
fn test_submit_reports_first_failure() {
    let pool = ThreadPool::new(config(2, 4)).unwrap();
    let group = TaskGroup::new()
        .add_task(|| {})
        .add_task(|| panic!("group member failed"));

    let status = pool.submit(group, Duration::from_secs(5));
    assert!(status.is_err());
    assert!(status.message().contains("group member failed"));
}

#[test]
fn test_submit_task_with_callback() {
    let pool = ThreadPool::new(config(2, 4)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let seen = calls.clone();
    let status = pool.submit_task(
        || {},
        Duration::from_secs(5),
        Some(Box::new(move |status: Status| {
            assert!(status.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        })),
    );
    assert!(status.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stopped_pool_rejects_work() {
    let pool = ThreadPool::unstarted(config(2, 4));
    assert!(matches!(pool.commit(|| ()), Err(Error::NotInitialized)));
    assert!(matches!(pool.grow_secondary(1), Err(Error::NotInitialized)));

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let group = TaskGroup::new()
        .add_task(|| {})
        .on_finished(move |status| {
            assert!(status.is_err());
            seen.fetch_add(1, Ordering::SeqCst);
        });
    let status = pool.submit(group, Duration::from_secs(1));
    assert!(status.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lifecycle_errors() {
    let pool = ThreadPool::unstarted(config(2, 4));
    assert!(matches!(pool.stop(), Err(Error::NotInitialized)));

    pool.start().unwrap();
    pool.start().unwrap();
    assert!(matches!(
        pool.configure(config(1, 1)),
        Err(Error::AlreadyInitialized)
    ));

    pool.stop().unwrap();
    assert!(!pool.is_started());
    assert!(matches!(
        pool.configure(Config {
            primary_threads: 0,
            ..Config::default()
        }),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let result = ThreadPool::new(Config {
        primary_threads: 4,
        secondary_threads: 4,
        max_threads: 6,
        ..Config::default()
    });
    assert!(matches!(result, Err(Error::Config(_))));

    assert!(Config::builder().primary_threads(0).build().is_err());
    assert!(Config::builder()
        .monitor(true, Duration::ZERO)
        .build()
        .is_err());
}

#[test]
fn test_initial_secondary_workers() {
    let pool = ThreadPool::new(
        Config::builder()
            .primary_threads(2)
            .secondary_threads(2)
            .max_threads(4)
            .build()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(pool.secondary_count(), 2);
    assert_eq!(pool.grow_secondary(3).unwrap(), 0);

    pool.shrink_secondary(1).unwrap();
    assert_eq!(pool.secondary_count(), 1);
    assert!(matches!(
        pool.shrink_secondary(2),
        Err(Error::InsufficientSecondary { .. })
    ));
}

#[test]
fn test_monitor_grows_then_reaps_secondaries() {
    let pool = ThreadPool::new(
        Config::builder()
            .primary_threads(2)
            .max_threads(4)
            .secondary_ttl(2)
            .monitor(true, Duration::from_millis(50))
            .build()
            .unwrap(),
    )
    .unwrap();

    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock();
    let handles: Vec<_> = (0..2)
        .map(|index| {
            let gate = gate.clone();
            pool.commit_with_hint(move || drop(gate.lock()), DispatchHint::Worker(index))
                .unwrap()
        })
        .collect();

    // both primaries blocked, so the pool reads as busy
    assert!(wait_until(Duration::from_secs(5), || pool.stats().is_busy()));
    assert!(wait_until(Duration::from_secs(5), || pool.secondary_count() >= 1));

    drop(held);
    for handle in handles {
        handle.wait().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || pool.secondary_count() == 0));
}

#[test]
fn test_batch_mode_runs_everything() {
    let pool = ThreadPool::new(
        Config::builder()
            .primary_threads(3)
            .max_threads(4)
            .batch_tasks(true)
            .batch_sizes(4, 4, 2)
            .build()
            .unwrap(),
    )
    .unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..200)
        .map(|i| {
            let counter = counter.clone();
            let hint = if i % 2 == 0 {
                DispatchHint::Worker(0)
            } else {
                DispatchHint::Pool
            };
            pool.commit_with_hint(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                hint,
            )
            .unwrap()
        })
        .collect();
    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 200);

    let reprioritized = pool.commit_with_priority(|| 1, 2).unwrap();
    assert_eq!(reprioritized.wait().unwrap(), 1);
}

#[test]
fn test_stats_track_execution() {
    let pool = ThreadPool::new(config(2, 4)).unwrap();
    for _ in 0..10 {
        pool.commit(|| ()).unwrap().wait().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        pool.stats().tasks_executed() == 10
    }));
    let stats = pool.stats();
    assert_eq!(stats.primaries.len(), 2);
    assert_eq!(stats.queued_priority_tasks, 0);
}

#[test]
fn test_stop_abandons_queued_work() {
    let pool = Arc::new(ThreadPool::new(config(1, 1)).unwrap());
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock();

    let blocker = {
        let gate = gate.clone();
        pool.commit(move || drop(gate.lock())).unwrap()
    };
    assert!(wait_until(Duration::from_secs(5), || pool.stats().is_busy()));
    let queued = pool.commit(|| 1).unwrap();

    stop_then_release(&pool, held);

    blocker.wait().unwrap();
    assert!(matches!(
        queued.wait_timeout(Duration::from_secs(5)),
        WaitOutcome::Abandoned
    ));
    assert!(!pool.is_started());
}

#[test]
fn test_stop_abandons_pool_queue_work() {
    let pool = Arc::new(ThreadPool::new(config(1, 1)).unwrap());
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock();

    let blocker = {
        let gate = gate.clone();
        pool.commit(move || drop(gate.lock())).unwrap()
    };
    assert!(wait_until(Duration::from_secs(5), || pool.stats().is_busy()));
    let queued = pool.commit_with_hint(|| 1, DispatchHint::Pool).unwrap();
    assert_eq!(pool.stats().queued_tasks, 1);

    stop_then_release(&pool, held);

    blocker.wait().unwrap();
    assert!(matches!(
        queued.wait_timeout(Duration::from_secs(5)),
        WaitOutcome::Abandoned
    ));
    assert!(matches!(queued.wait(), Err(Error::TaskDropped)));

    // nothing left over runs on restart
    pool.start().unwrap();
    assert_eq!(pool.stats().queued_tasks, 0);
    assert_eq!(pool.stats().tasks_executed(), 0);
}

#[test]
fn test_stop_abandons_priority_work() {
    let pool = Arc::new(ThreadPool::new(config(1, 2)).unwrap());
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock();

    let blocker = {
        let gate = gate.clone();
        pool.commit_with_priority(move || drop(gate.lock()), 1).unwrap()
    };
    assert_eq!(pool.secondary_count(), 1);
    assert!(wait_until(Duration::from_secs(5), || {
        pool.stats().queued_priority_tasks == 0
    }));
    let queued = pool.commit_with_priority(|| 2, 5).unwrap();
    assert_eq!(pool.stats().queued_priority_tasks, 1);

    stop_then_release(&pool, held);

    blocker.wait().unwrap();
    let started = Instant::now();
    assert!(matches!(
        queued.wait_timeout(Duration::from_secs(5)),
        WaitOutcome::Abandoned
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(pool.secondary_count(), 0);
}
