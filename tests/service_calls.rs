// tests/service_calls.rs

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cbgroup_demo::errors::DemoError;
use cbgroup_demo::executor::{CallbackKind, Executor, ReadyCallback};
use cbgroup_demo::group::CallbackGroup;
use cbgroup_demo::node::{Client, Empty, EmptyRequest, EmptyResponse, Node, Runtime, RuntimeOptions, ServiceType};
use cbgroup_demo_test_utils::init_tracing;

struct AddOne;

impl ServiceType for AddOne {
    const TYPE_NAME: &'static str = "test/AddOne";
    type Request = u32;
    type Response = u32;
}

fn started_runtime(call_timeout: Duration) -> Runtime {
    let runtime = Runtime::new(RuntimeOptions { call_timeout });
    runtime.start().unwrap();
    runtime
}

fn spin_in_background(executor: Executor) -> (Arc<Executor>, JoinHandle<()>) {
    let executor = Arc::new(executor);
    let spinner = {
        let executor = Arc::clone(&executor);
        thread::spawn(move || executor.spin().unwrap())
    };
    (executor, spinner)
}

/// A service node on its own single-threaded executor.
fn serve_add_one(runtime: &Runtime) -> (Node, Arc<Executor>, JoinHandle<()>) {
    let node = runtime.create_node("server").unwrap();
    node.create_service::<AddOne, _>("add_one", None, |n| Ok(n + 1))
        .unwrap();
    let executor = Executor::single_threaded(runtime, "server");
    executor.add_node(&node).unwrap();
    let (executor, spinner) = spin_in_background(executor);
    (node, executor, spinner)
}

#[test]
fn round_trip_completes_with_bounded_dispatches() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(2));
    let (_server, server_exec, server_spin) = serve_add_one(&runtime);

    let node = runtime.create_node("caller").unwrap();
    let client: Client<AddOne> = node.create_client("add_one", None);
    let executor = Executor::multi_threaded(&runtime, "caller", 2);
    executor.add_node(&node).unwrap();
    let (executor, spinner) = spin_in_background(executor);

    assert_eq!(client.call(41).unwrap(), 42);
    assert_eq!(client.pending_len(), 0);
    // One request callback on the server, one response callback on the client.
    assert_eq!(server_exec.dispatch_count(), 1);
    assert_eq!(executor.dispatch_count(), 1);

    runtime.stop();
    server_spin.join().unwrap();
    spinner.join().unwrap();
}

#[test]
fn unknown_service_is_unavailable() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(1));
    let node = runtime.create_node("caller").unwrap();
    let executor = Executor::single_threaded(&runtime, "caller");
    executor.add_node(&node).unwrap();

    let client: Client<Empty> = node.create_client("missing", None);
    match client.call(EmptyRequest) {
        Err(DemoError::ServiceUnavailable(name)) => assert_eq!(name, "missing"),
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    runtime.stop();
}

#[test]
fn client_of_the_wrong_type_is_rejected() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(1));
    let (_server, _server_exec, server_spin) = serve_add_one(&runtime);

    let node = runtime.create_node("caller").unwrap();
    let executor = Executor::single_threaded(&runtime, "caller");
    executor.add_node(&node).unwrap();

    let client: Client<Empty> = node.create_client("add_one", None);
    match client.call(EmptyRequest) {
        Err(DemoError::ServiceTypeMismatch {
            service,
            expected,
            actual,
        }) => {
            assert_eq!(service, "add_one");
            assert_eq!(expected, Empty::TYPE_NAME);
            assert_eq!(actual, AddOne::TYPE_NAME);
        }
        other => panic!("expected ServiceTypeMismatch, got {other:?}"),
    }

    runtime.stop();
    server_spin.join().unwrap();
}

#[test]
fn duplicate_service_names_are_rejected() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(1));
    let node = runtime.create_node("server").unwrap();
    node.create_service::<Empty, _>("svc", None, |_| Ok(EmptyResponse))
        .unwrap();
    let second = node.create_service::<Empty, _>("svc", None, |_| Ok(EmptyResponse));
    assert!(matches!(second, Err(DemoError::DuplicateService(name)) if name == "svc"));

    // Destroying the node frees the name again.
    node.destroy();
    node.create_service::<Empty, _>("svc", None, |_| Ok(EmptyResponse))
        .unwrap();
    runtime.stop();
}

#[test]
fn call_from_unbound_node_fails() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(1));
    let node = runtime.create_node("loose").unwrap();
    let client: Client<Empty> = node.create_client("anything", None);
    assert!(matches!(
        client.call(EmptyRequest),
        Err(DemoError::NodeNotBound(name)) if name == "loose"
    ));
    runtime.stop();
}

#[test]
fn call_times_out_when_nobody_serves_it() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(5));

    // The server executor never spins, so the request is never handled.
    let server = runtime.create_node("server").unwrap();
    server
        .create_service::<Empty, _>("stalled", None, |_| Ok(EmptyResponse))
        .unwrap();
    let server_exec = Executor::single_threaded(&runtime, "server");
    server_exec.add_node(&server).unwrap();

    let node = runtime.create_node("caller").unwrap();
    let executor = Executor::single_threaded(&runtime, "caller");
    executor.add_node(&node).unwrap();
    let client: Client<Empty> = node.create_client("stalled", None);

    let bound = Duration::from_millis(100);
    assert!(matches!(
        client.call_timeout(EmptyRequest, bound),
        Err(DemoError::Timeout(b)) if b == bound
    ));
    assert_eq!(client.pending_len(), 0);
    assert_eq!(server_exec.pending_len(), 1);
    runtime.stop();
}

#[test]
fn runtime_stop_wakes_a_blocked_call() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(30));

    let server = runtime.create_node("server").unwrap();
    server
        .create_service::<Empty, _>("stalled", None, |_| Ok(EmptyResponse))
        .unwrap();
    let server_exec = Executor::single_threaded(&runtime, "server");
    server_exec.add_node(&server).unwrap();

    let node = runtime.create_node("caller").unwrap();
    let executor = Executor::single_threaded(&runtime, "caller");
    executor.add_node(&node).unwrap();
    let client: Client<Empty> = node.create_client("stalled", None);

    let caller = thread::spawn(move || {
        let started = Instant::now();
        (client.call(EmptyRequest), started.elapsed())
    });

    thread::sleep(Duration::from_millis(100));
    runtime.stop();
    runtime.stop();

    let (result, waited) = caller.join().unwrap();
    assert!(matches!(result, Err(DemoError::Shutdown)));
    assert!(waited < Duration::from_secs(5), "call stayed blocked for {waited:?}");
    assert!(server_exec.is_shut_down());
    assert!(executor.is_shut_down());
}

#[test]
fn response_waits_for_its_group_to_free_up() {
    init_tracing();
    let runtime = started_runtime(Duration::from_secs(2));
    let (_server, _server_exec, server_spin) = serve_add_one(&runtime);

    let node = runtime.create_node("caller").unwrap();
    let group = CallbackGroup::exclusive();
    let client = Arc::new(node.create_client::<AddOne>("add_one", Some(Arc::clone(&group))));
    let executor = Executor::multi_threaded(&runtime, "caller", 4);
    executor.add_node(&node).unwrap();
    let handle = executor.handle();
    let (_executor, spinner) = spin_in_background(executor);

    // A callback in the client's own exclusive group that calls and blocks:
    // its response can never be dispatched, so the call times out.
    let (tx, rx) = crossbeam::channel::bounded(1);
    {
        let client = Arc::clone(&client);
        handle.enqueue(ReadyCallback::new(
            CallbackKind::TimerTick,
            group,
            "blocking-caller",
            move || {
                let _ = tx.send(client.call_timeout(7, Duration::from_millis(200)));
                Ok(())
            },
        ));
    }

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(result, Err(DemoError::Timeout(_))));

    runtime.stop();
    server_spin.join().unwrap();
    spinner.join().unwrap();
}
