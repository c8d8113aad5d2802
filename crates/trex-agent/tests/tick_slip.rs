use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use trex_core::{RealTimeClock, Reactor, Tick, TimelineModes};
use trex_agent::{AgentConfig, Assembly, NullEventSink, ReactorConfig, ReactorRegistry};

#[derive(Default)]
struct SlipTrace {
    tick_starts: Vec<Tick>,
    slept_at: Option<Tick>,
}

/// Blocks the deliberation pass once, for several tick periods.
struct Sleeper {
    tick: Tick,
    trace: Rc<RefCell<SlipTrace>>,
}

impl Reactor for Sleeper {
    fn name(&self) -> &str {
        "S"
    }

    fn timeline_modes(&self) -> TimelineModes {
        TimelineModes::default().internal("t")
    }

    fn handle_tick_start(&mut self, tick: Tick) {
        self.tick = tick;
        self.trace.borrow_mut().tick_starts.push(tick);
    }

    fn synchronize(&mut self, _tick: Tick) -> bool {
        true
    }

    fn has_work(&self) -> bool {
        self.trace.borrow().slept_at.is_none()
    }

    fn resume(&mut self, _tick: Tick) -> bool {
        self.trace.borrow_mut().slept_at = Some(self.tick);
        std::thread::sleep(Duration::from_millis(90));
        true
    }
}

#[test]
fn overrunning_deliberation_slips_the_tick_boundary() {
    let trace = Rc::new(RefCell::new(SlipTrace::default()));

    let mut registry = ReactorRegistry::new();
    let ctor_trace = trace.clone();
    registry
        .register("sleeper", move |_| {
            Ok(Box::new(Sleeper {
                tick: 0,
                trace: ctor_trace.clone(),
            }))
        })
        .unwrap();

    let config = AgentConfig::new("slip", 12).with_reactor(ReactorConfig::new("S", "sleeper"));
    let mut agent = Assembly::new(registry)
        .assemble(
            &config,
            Box::new(RealTimeClock::new(0.02)),
            Box::new(NullEventSink),
        )
        .expect("assemble");

    agent.run().expect("an overrun is logged, never fatal");
    assert!(!agent.is_failed());

    let trace = trace.borrow();
    let slept_at = trace.slept_at.expect("the sleeper must have run once");

    // 90ms of blocking across 20ms periods: at least three periods elapsed,
    // so the next tick to start jumps and the skipped ones never run.
    let next = trace
        .tick_starts
        .iter()
        .copied()
        .find(|&tick| tick > slept_at)
        .expect("the loop must continue after the overrun");
    assert!(
        next >= slept_at + 3,
        "expected a slip of at least 3 ticks, got {slept_at} -> {next}"
    );
    assert!(
        !trace
            .tick_starts
            .iter()
            .any(|&tick| tick > slept_at && tick < next),
        "skipped ticks must never start: {:?}",
        trace.tick_starts
    );
}
