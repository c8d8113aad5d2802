use serde_json::json;
use trex_core::PseudoClock;
use trex_agent::{
    builtin_registry, Assembly, AssemblyError, AgentConfig, NullEventSink, ReactorConfig,
};

fn idle(name: &str, internals: &[&str], externals: &[&str]) -> ReactorConfig {
    ReactorConfig::new(name, "idle").with_params(json!({
        "internals": internals,
        "externals": externals,
    }))
}

fn assemble(config: AgentConfig) -> Result<trex_agent::Agent, AssemblyError> {
    Assembly::new(builtin_registry()).assemble(
        &config,
        Box::new(PseudoClock::new(1)),
        Box::new(NullEventSink),
    )
}

#[test]
fn cycle_is_rejected_naming_the_reactors() {
    let config = AgentConfig::new("agent", 10)
        .with_reactor(idle("P", &["t"], &["q"]))
        .with_reactor(idle("C", &["q"], &["t"]));

    let err = assemble(config).expect_err("cycle must be rejected");
    match &err {
        AssemblyError::PriorityCycle { cycle } => {
            assert!(cycle.contains(&"P".to_string()), "cycle: {cycle:?}");
            assert!(cycle.contains(&"C".to_string()), "cycle: {cycle:?}");
        }
        other => panic!("expected PriorityCycle, got {other}"),
    }
}

#[test]
fn self_subscription_is_a_cycle() {
    let config = AgentConfig::new("agent", 10).with_reactor(idle("R", &["t"], &["t"]));
    let err = assemble(config).expect_err("self-subscription must be rejected");
    assert!(matches!(err, AssemblyError::PriorityCycle { .. }), "{err}");
}

#[test]
fn unclaimed_external_is_rejected() {
    let config = AgentConfig::new("agent", 10).with_reactor(idle("C", &[], &["missing"]));
    let err = assemble(config).expect_err("unclaimed external must be rejected");
    match err {
        AssemblyError::UnclaimedExternal { timeline, reactor } => {
            assert_eq!(timeline, "missing");
            assert_eq!(reactor, "C");
        }
        other => panic!("expected UnclaimedExternal, got {other}"),
    }
}

#[test]
fn duplicate_internal_is_rejected() {
    let config = AgentConfig::new("agent", 10)
        .with_reactor(idle("A", &["t"], &[]))
        .with_reactor(idle("B", &["t"], &[]));
    let err = assemble(config).expect_err("duplicate owner must be rejected");
    assert!(matches!(err, AssemblyError::DuplicateInternal { .. }), "{err}");
}

#[test]
fn duplicate_reactor_name_is_rejected() {
    let config = AgentConfig::new("agent", 10)
        .with_reactor(idle("A", &["t"], &[]))
        .with_reactor(idle("A", &["q"], &[]));
    let err = assemble(config).expect_err("duplicate name must be rejected");
    assert!(matches!(err, AssemblyError::DuplicateReactor(name) if name == "A"));
}

#[test]
fn unknown_component_is_rejected() {
    let config =
        AgentConfig::new("agent", 10).with_reactor(ReactorConfig::new("A", "no-such-kind"));
    let err = assemble(config).expect_err("unknown component must be rejected");
    assert!(matches!(err, AssemblyError::UnknownComponent { .. }), "{err}");
}

#[test]
fn latency_beyond_look_ahead_is_rejected() {
    let config = AgentConfig::new("agent", 10).with_reactor(
        idle("A", &["t"], &[])
            .with_latency(3)
            .with_look_ahead(1),
    );
    let err = assemble(config).expect_err("latency > look-ahead must be rejected");
    match err {
        AssemblyError::LatencyExceedsLookAhead {
            latency, look_ahead, ..
        } => {
            assert_eq!((latency, look_ahead), (3, 1));
        }
        other => panic!("expected LatencyExceedsLookAhead, got {other}"),
    }
}

#[test]
fn duplicate_factory_registration_is_rejected() {
    let mut registry = builtin_registry();
    let err = registry
        .register("idle", |_| unreachable!())
        .expect_err("second registration must fail");
    assert!(matches!(err, AssemblyError::DuplicateFactory(name) if name == "idle"));
}

#[test]
fn zero_reactor_agent_runs_to_final_tick() {
    let mut agent = assemble(AgentConfig::new("empty", 4)).expect("assemble");
    agent.run().expect("run");
    assert_eq!(agent.current_tick(), Some(4));
    assert!(!agent.is_failed());
}

#[test]
fn step_drives_one_tick_at_a_time() {
    let mut agent = assemble(AgentConfig::new("stepper", 2).with_reactor(idle("only", &["t"], &[])))
        .expect("assemble");

    assert!(agent.step().expect("step"));
    assert_eq!(agent.current_tick(), Some(0));
    assert!(agent.step().expect("step"));
    assert_eq!(agent.current_tick(), Some(1));
    assert!(agent.step().expect("step"));
    assert_eq!(agent.current_tick(), Some(2));

    assert!(!agent.step().expect("step"), "the run is over after final_tick");
    assert_eq!(agent.current_tick(), Some(2));
}

#[test]
fn shutdown_is_honored_at_the_tick_boundary() {
    let mut agent = assemble(AgentConfig::new("stop", 100)).expect("assemble");
    agent.shutdown_handle().request();
    agent.run().expect("a shutdown is a clean exit");
    assert_eq!(agent.current_tick(), None, "no tick may start after shutdown");
}

#[test]
fn single_reactor_without_externals_has_priority_zero() {
    let agent = assemble(AgentConfig::new("solo", 10).with_reactor(idle("only", &["t"], &[])))
        .expect("assemble");
    assert_eq!(agent.priority_of("only"), Some(0));
    assert_eq!(agent.schedule_names(), vec!["only"]);
}

#[test]
fn assembled_topology_matches_the_config() {
    let config = AgentConfig::new("agent", 10)
        .with_reactor(idle("P", &["t", "u"], &[]))
        .with_reactor(idle("C", &["v"], &["t"]))
        .with_reactor(idle("D", &[], &["v", "u"]));

    let agent = assemble(config).expect("assemble");

    let owners = agent.timeline_owners();
    assert_eq!(owners.get("t").map(String::as_str), Some("P"));
    assert_eq!(owners.get("u").map(String::as_str), Some("P"));
    assert_eq!(owners.get("v").map(String::as_str), Some("C"));

    assert_eq!(agent.priority_of("P"), Some(0));
    assert_eq!(agent.priority_of("C"), Some(1));
    assert_eq!(agent.priority_of("D"), Some(2));
    assert_eq!(agent.schedule_names(), vec!["P", "C", "D"]);
}

#[test]
fn scripted_reactor_loads_timetable_from_search_path() {
    let dir = std::env::temp_dir().join(format!("trex-script-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    std::fs::write(
        dir.join("survey.yaml"),
        "- tick: 2\n  timeline: t\n  predicate: Survey\n",
    )
    .expect("write script");

    let mut config = AgentConfig::new("agent", 3).with_reactor(
        ReactorConfig::new("P", "scripted").with_params(json!({
            "internals": ["t"],
            "script_file": "survey.yaml",
        })),
    );
    config.search_path = Some(dir.display().to_string());

    let mut agent = assemble(config).expect("assemble");
    agent.run().expect("run");

    std::fs::remove_dir_all(&dir).ok();
}
