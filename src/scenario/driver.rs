// src/scenario/driver.rs

//! Runs scenarios against a fresh runtime and classifies them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, info_span, warn};

use super::report::{ScenarioReport, Summary};
use super::{ScenarioSettings, ScenarioSpec};
use crate::errors::{DemoError, Result};
use crate::executor::{Executor, ExecutorOptions};
use crate::node::{Client, Empty, EmptyRequest, EmptyResponse, Node, Runtime, RuntimeOptions};
use crate::types::{ScenarioOutcome, TriggerMode};

pub const SERVICE_NODE: &str = "mock_service_node";
pub const DEMO_NODE: &str = "callback_group_demo_node";
pub const SERVICE_NAME: &str = "test_service";

/// Run every scenario in order. An interrupt ends only the scenario that is
/// running when it arrives.
pub fn run_all(
    scenarios: &[ScenarioSpec],
    settings: &ScenarioSettings,
    interrupt: &Receiver<()>,
) -> Result<Summary> {
    let mut summary = Summary::default();

    for (position, spec) in scenarios.iter().enumerate() {
        let mut report = run_scenario(spec, settings, interrupt)?;
        report.index = position + 1;

        if report.passed() {
            info!(scenario = %report.name, outcome = %report.outcome, "scenario matched expectation");
        } else {
            warn!(
                scenario = %report.name,
                outcome = %report.outcome,
                expected = %report.expected,
                "scenario did not match expectation"
            );
        }
        summary.reports.push(report);
    }

    Ok(summary)
}

/// Build the scenario's nodes and executors, wait for the first response,
/// the timeout or an interrupt, then tear everything down.
pub fn run_scenario(
    spec: &ScenarioSpec,
    settings: &ScenarioSettings,
    interrupt: &Receiver<()>,
) -> Result<ScenarioReport> {
    // Interrupts that arrived between scenarios don't count.
    while interrupt.try_recv().is_ok() {}

    let span = info_span!("scenario", name = %spec.name);
    let _entered = span.enter();

    let started = Instant::now();
    let runtime = Runtime::new(RuntimeOptions {
        call_timeout: settings.timeout,
    });
    runtime.start()?;

    let scenario = Scenario::build(spec, settings, &runtime);
    let outcome = match scenario {
        Ok(scenario) => {
            let outcome = scenario.wait(settings, interrupt);
            scenario.teardown(&runtime);
            outcome
        }
        Err(err) => {
            runtime.stop();
            return Err(err);
        }
    };

    Ok(ScenarioReport {
        index: 0,
        name: spec.name.clone(),
        description: spec.description.clone(),
        expected: spec.expect,
        outcome,
        elapsed: started.elapsed(),
    })
}

/// Live pieces of one scenario run.
struct Scenario {
    nodes: Vec<Node>,
    threads: Vec<JoinHandle<()>>,
    responses: Receiver<()>,
    /// Keeps `responses` connected even if every caller thread has exited.
    _response_tx: Sender<()>,
}

impl Scenario {
    fn build(spec: &ScenarioSpec, settings: &ScenarioSettings, runtime: &Runtime) -> Result<Self> {
        let groups = spec.instantiate_groups();
        let mut threads = Vec::new();

        let service_node = runtime.create_node(SERVICE_NODE)?;
        service_node.create_service::<Empty, _>(SERVICE_NAME, None, |_request| {
            info!(node = SERVICE_NODE, "Server received request");
            Ok(EmptyResponse)
        })?;
        let service_executor = Executor::single_threaded(runtime, "service");
        service_executor.add_node(&service_node)?;
        threads.push(spawn_spinner(service_executor)?);

        let node = runtime.create_node(DEMO_NODE)?;
        let client = Arc::new(node.create_client::<Empty>(SERVICE_NAME, groups.client));
        let (response_tx, responses) = channel::unbounded();

        if spec.trigger == TriggerMode::Timer {
            let client = Arc::clone(&client);
            let response_tx = response_tx.clone();
            node.create_timer(settings.timer_period, groups.timer, move || {
                call_service(&client, &response_tx).map(|_| ())
            });
        }

        let executor = Executor::new(
            runtime,
            ExecutorOptions {
                name: "demo".to_string(),
                num_threads: settings.worker_threads,
                observer: None,
            },
        );
        executor.add_node(&node)?;

        println!();
        info!(node = DEMO_NODE, "Beginning demo, end with CTRL-C");
        threads.push(spawn_spinner(executor)?);

        if spec.trigger == TriggerMode::Manual {
            threads.push(spawn_manual_call(
                client,
                response_tx.clone(),
                settings,
                runtime.stop_signal(),
            )?);
        }

        Ok(Self {
            nodes: vec![node, service_node],
            threads,
            responses,
            _response_tx: response_tx,
        })
    }

    fn wait(&self, settings: &ScenarioSettings, interrupt: &Receiver<()>) -> ScenarioOutcome {
        let deadline = Instant::now() + settings.timeout;
        let mut interrupt = interrupt.clone();

        loop {
            channel::select! {
                recv(self.responses) -> _ => return ScenarioOutcome::Completed,
                recv(interrupt) -> msg => {
                    if msg.is_ok() {
                        info!(node = DEMO_NODE, "KeyboardInterrupt, shutting down.");
                        return ScenarioOutcome::Interrupted;
                    }
                }
                default(deadline.saturating_duration_since(Instant::now())) => {
                    warn!(node = DEMO_NODE, timeout = ?settings.timeout, "no response within bound; classifying as deadlock");
                    return ScenarioOutcome::Deadlock;
                }
            }

            // Only reached when the interrupt sender is gone; keep waiting
            // for a response or the bound.
            debug!("interrupt source disconnected");
            interrupt = channel::never();
        }
    }

    fn teardown(self, runtime: &Runtime) {
        for node in &self.nodes {
            node.destroy();
        }
        runtime.stop();

        for handle in self.threads {
            if handle.join().is_err() {
                warn!("scenario thread panicked during teardown");
            }
        }
        debug!("scenario torn down");
    }
}

/// One client call with the demo's log lines. Returns whether a response
/// arrived; a call abandoned because the runtime stopped is a graceful stop,
/// not a failure.
fn call_service(client: &Client<Empty>, responses: &Sender<()>) -> anyhow::Result<bool> {
    info!(node = DEMO_NODE, "Client sending request");
    match client.call(EmptyRequest) {
        Ok(_) => {
            info!(node = DEMO_NODE, "Client received response");
            let _ = responses.send(());
            Ok(true)
        }
        Err(DemoError::Shutdown) => {
            debug!(node = DEMO_NODE, "call abandoned by shutdown");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn spawn_spinner(executor: Executor) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("{}-spin", executor.name()))
        .spawn(move || {
            if let Err(err) = executor.spin() {
                warn!(executor = %executor.name(), error = %err, "executor spin failed");
            }
        })?;
    Ok(handle)
}

fn spawn_manual_call(
    client: Arc<Client<Empty>>,
    responses: Sender<()>,
    settings: &ScenarioSettings,
    stop: Receiver<()>,
) -> Result<JoinHandle<()>> {
    let delay = settings.manual_call_delay;
    let handle = thread::Builder::new()
        .name("manual-call".to_string())
        .spawn(move || {
            channel::select! {
                recv(stop) -> _ => return,
                default(delay) => {}
            }
            match call_service(&client, &responses) {
                Ok(true) => info!(node = DEMO_NODE, "Test finished successfully."),
                Ok(false) => {}
                Err(err) => warn!(node = DEMO_NODE, error = %err, "manual call failed"),
            }
        })?;
    Ok(handle)
}
