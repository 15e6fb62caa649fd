// tests/executor_groups.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cbgroup_demo::errors::DemoError;
use cbgroup_demo::executor::{CallbackKind, Executor, ExecutorOptions, ReadyCallback};
use cbgroup_demo::group::{CallbackGroup, GroupObserver};
use cbgroup_demo::node::{Runtime, RuntimeOptions};
use cbgroup_demo_test_utils::observer::RecordingObserver;
use cbgroup_demo_test_utils::{init_tracing, wait_until};
use parking_lot::Mutex;

fn started_runtime() -> Runtime {
    let runtime = Runtime::new(RuntimeOptions {
        call_timeout: Duration::from_secs(2),
    });
    runtime.start().unwrap();
    runtime
}

fn spin_in_background(executor: &Arc<Executor>) -> JoinHandle<()> {
    let executor = Arc::clone(executor);
    thread::spawn(move || executor.spin().unwrap())
}

fn work<F>(group: &Arc<CallbackGroup>, label: &str, f: F) -> ReadyCallback
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    ReadyCallback::new(CallbackKind::TimerTick, Arc::clone(group), label, f)
}

#[test]
fn exclusive_group_never_runs_two_callbacks_at_once() {
    init_tracing();
    let runtime = started_runtime();
    let observer = Arc::new(RecordingObserver::new());
    let executor = Arc::new(Executor::new(
        &runtime,
        ExecutorOptions {
            name: "stress".to_string(),
            num_threads: 4,
            observer: Some(observer.clone() as Arc<dyn GroupObserver>),
        },
    ));

    let exclusive = CallbackGroup::exclusive();
    let reentrant = CallbackGroup::reentrant();
    let done = Arc::new(AtomicUsize::new(0));
    let handle = executor.handle();

    for i in 0..20 {
        for group in [&exclusive, &reentrant] {
            let done = Arc::clone(&done);
            handle.enqueue(work(group, &format!("job-{i}"), move || {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }
    }

    let spinner = spin_in_background(&executor);
    assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 40));

    assert_eq!(observer.peak(exclusive.id()), 1);
    assert_eq!(observer.peak_exclusive(), 1);
    assert!(observer.peak(reentrant.id()) >= 1);
    assert_eq!(executor.dispatch_count(), 40);

    runtime.stop();
    spinner.join().unwrap();
}

#[test]
fn exclusive_group_runs_in_arrival_order() {
    init_tracing();
    let runtime = started_runtime();
    let executor = Arc::new(Executor::multi_threaded(&runtime, "fifo", 4));
    let group = CallbackGroup::exclusive();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..10 {
        let order = Arc::clone(&order);
        executor
            .handle()
            .enqueue(work(&group, &format!("job-{i}"), move || {
                order.lock().push(i);
                Ok(())
            }));
    }
    assert_eq!(executor.pending_len(), 10);

    let spinner = spin_in_background(&executor);
    assert!(wait_until(Duration::from_secs(5), || order.lock().len() == 10));
    assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());

    executor.shutdown();
    spinner.join().unwrap();
}

#[test]
fn failing_and_panicking_callbacks_release_their_group() {
    init_tracing();
    let runtime = started_runtime();
    let executor = Arc::new(Executor::single_threaded(&runtime, "faults"));
    let group = CallbackGroup::exclusive();
    let reached = Arc::new(AtomicUsize::new(0));
    let handle = executor.handle();

    handle.enqueue(work(&group, "fails", || Err(anyhow::anyhow!("boom"))));
    handle.enqueue(work(&group, "panics", || panic!("callback panic")));
    {
        let reached = Arc::clone(&reached);
        handle.enqueue(work(&group, "after", move || {
            reached.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }

    let spinner = spin_in_background(&executor);
    assert!(wait_until(Duration::from_secs(5), || reached.load(Ordering::SeqCst) == 1));
    assert_eq!(executor.dispatch_count(), 3);

    executor.shutdown();
    spinner.join().unwrap();
}

#[test]
fn shutdown_is_idempotent_and_stops_dispatch() {
    init_tracing();
    let runtime = started_runtime();
    let executor = Arc::new(Executor::multi_threaded(&runtime, "stopper", 2));
    let group = CallbackGroup::reentrant();
    let ran = Arc::new(AtomicUsize::new(0));

    let spinner = spin_in_background(&executor);
    {
        let ran = Arc::clone(&ran);
        executor.handle().enqueue(work(&group, "before", move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }
    assert!(wait_until(Duration::from_secs(5), || ran.load(Ordering::SeqCst) == 1));

    executor.shutdown();
    executor.shutdown();
    spinner.join().unwrap();
    assert!(executor.is_shut_down());

    {
        let ran = Arc::clone(&ran);
        executor.handle().enqueue(work(&group, "after", move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }
    assert_eq!(executor.pending_len(), 0);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(executor.dispatch_count(), 1);

    match executor.spin() {
        Err(DemoError::AlreadySpinning(name)) => assert_eq!(name, "stopper"),
        other => panic!("expected AlreadySpinning, got {other:?}"),
    }

    runtime.stop();
    runtime.stop();
}

#[test]
fn runtime_stop_shuts_down_its_executors() {
    init_tracing();
    let runtime = started_runtime();
    let executor = Arc::new(Executor::multi_threaded(&runtime, "owned", 2));
    let spinner = spin_in_background(&executor);

    runtime.stop();
    spinner.join().unwrap();
    assert!(executor.is_shut_down());
    assert!(!runtime.is_running());
    assert!(matches!(runtime.start(), Err(DemoError::NotStarted)));
}

#[test]
fn node_binds_to_one_executor_only() {
    init_tracing();
    let runtime = started_runtime();
    let node = runtime.create_node("bound").unwrap();
    let first = Executor::single_threaded(&runtime, "first");
    let second = Executor::single_threaded(&runtime, "second");

    first.add_node(&node).unwrap();
    first.add_node(&node).unwrap();
    match second.add_node(&node) {
        Err(DemoError::NodeAlreadyBound { node, executor }) => {
            assert_eq!(node, "bound");
            assert_eq!(executor, "first");
        }
        other => panic!("expected NodeAlreadyBound, got {other:?}"),
    }

    drop(first);
    second.add_node(&node).unwrap();
    runtime.stop();
}

#[test]
fn timer_keeps_at_most_one_tick_queued() {
    init_tracing();
    let runtime = started_runtime();
    let node = runtime.create_node("ticker").unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let timer = {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        node.create_timer(Duration::from_millis(10), None, move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(60));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    };
    assert_eq!(timer.group().id(), node.default_group().id());

    let executor = Arc::new(Executor::multi_threaded(&runtime, "ticks", 4));
    executor.add_node(&node).unwrap();
    let spinner = spin_in_background(&executor);

    let mut max_pending = 0;
    assert!(wait_until(Duration::from_secs(5), || {
        max_pending = max_pending.max(executor.pending_len());
        timer.fired() >= 3
    }));
    assert!(max_pending <= 1, "queued ticks piled up: {max_pending}");
    assert_eq!(peak.load(Ordering::SeqCst), 1);

    node.destroy();
    runtime.stop();
    spinner.join().unwrap();
}
