use std::cell::RefCell;
use std::rc::Rc;

use trex_core::{PseudoClock, Reactor, ReactorFault, Tick, TimelineModes};
use trex_agent::{AgentConfig, Assembly, NullEventSink, ReactorConfig, ReactorRegistry};

#[derive(Clone, Copy, PartialEq)]
enum FailMode {
    SyncFalse,
    ResumeFalse,
    SyncPanic,
}

#[derive(Default)]
struct Trace {
    tick_starts: Vec<Tick>,
    syncs: Vec<Tick>,
    resumes: Vec<Tick>,
}

struct Failing {
    fail_at: Tick,
    mode: FailMode,
    trace: Rc<RefCell<Trace>>,
}

impl Reactor for Failing {
    fn name(&self) -> &str {
        "R"
    }

    fn timeline_modes(&self) -> TimelineModes {
        TimelineModes::default().internal("t")
    }

    fn handle_tick_start(&mut self, tick: Tick) {
        self.trace.borrow_mut().tick_starts.push(tick);
    }

    fn synchronize(&mut self, tick: Tick) -> bool {
        self.trace.borrow_mut().syncs.push(tick);
        if tick == self.fail_at {
            match self.mode {
                FailMode::SyncFalse => return false,
                FailMode::SyncPanic => panic!("inconsistent database"),
                FailMode::ResumeFalse => {}
            }
        }
        true
    }

    fn has_work(&self) -> bool {
        true
    }

    fn resume(&mut self, tick: Tick) -> bool {
        self.trace.borrow_mut().resumes.push(tick);
        !(self.mode == FailMode::ResumeFalse && tick == self.fail_at)
    }
}

fn run_failing(mode: FailMode, fail_at: Tick) -> (trex_agent::Agent, ReactorFault, Rc<RefCell<Trace>>) {
    let trace = Rc::new(RefCell::new(Trace::default()));

    let mut registry = ReactorRegistry::new();
    let ctor_trace = trace.clone();
    registry
        .register("failing", move |_| {
            Ok(Box::new(Failing {
                fail_at,
                mode,
                trace: ctor_trace.clone(),
            }))
        })
        .unwrap();

    let config = AgentConfig::new("fail", 10).with_reactor(ReactorConfig::new("R", "failing"));
    let mut agent = Assembly::new(registry)
        .assemble(&config, Box::new(PseudoClock::new(3)), Box::new(NullEventSink))
        .expect("assemble");

    let fault = agent.run().expect_err("the run must fail");
    (agent, fault, trace)
}

#[test]
fn synchronize_failure_halts_the_tick_loop() {
    let (agent, fault, trace) = run_failing(FailMode::SyncFalse, 2);

    assert_eq!(
        fault,
        ReactorFault::Synchronize {
            reactor: "R".to_string(),
            tick: 2
        }
    );
    assert!(agent.is_failed());
    assert_eq!(agent.current_tick(), Some(2));

    let trace = trace.borrow();
    assert_eq!(trace.syncs, vec![0, 1, 2]);
    assert!(
        trace.resumes.iter().all(|&tick| tick < 2),
        "no deliberation may run in the failed tick: {:?}",
        trace.resumes
    );
    assert!(
        trace.tick_starts.iter().all(|&tick| tick <= 2),
        "tick 3 must never start: {:?}",
        trace.tick_starts
    );
}

#[test]
fn failed_agent_refuses_to_run_again() {
    let (mut agent, first, _trace) = run_failing(FailMode::SyncFalse, 1);
    let again = agent.run().expect_err("a failed agent stays failed");
    assert_eq!(first, again);
}

#[test]
fn resume_failure_is_equally_fatal() {
    let (agent, fault, trace) = run_failing(FailMode::ResumeFalse, 1);

    assert_eq!(
        fault,
        ReactorFault::Resume {
            reactor: "R".to_string(),
            tick: 1
        }
    );
    assert!(agent.is_failed());

    let trace = trace.borrow();
    assert!(trace.tick_starts.iter().all(|&tick| tick <= 1));
}

#[test]
fn reactor_panic_counts_as_failure() {
    let (agent, fault, _trace) = run_failing(FailMode::SyncPanic, 1);

    assert_eq!(
        fault,
        ReactorFault::Panicked {
            reactor: "R".to_string(),
            operation: "synchronize",
            tick: 1
        }
    );
    assert!(agent.is_failed());
    assert_eq!(agent.current_tick(), Some(1));
}
