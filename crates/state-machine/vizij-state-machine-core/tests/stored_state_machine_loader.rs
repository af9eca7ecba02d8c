use std::sync::Arc;

use vizij_state_machine_core::{
    parse_state_machine_json, Blackboard, CommandBuffer, Config, ContentId, ContentLibrary,
    FrameTime, LifecycleCommand, NodeKind, StateMachineAspect, StateMachineDefinition,
    StateMachineRuntime,
};

fn load(name: &str) -> StateMachineDefinition {
    let json = vizij_test_fixtures::state_machines::json(name)
        .unwrap_or_else(|e| panic!("load {name} fixture: {e:#}"));
    parse_state_machine_json(&json).unwrap_or_else(|e| panic!("parse {name}: {e}"))
}

fn library() -> ContentLibrary {
    let mut lib = ContentLibrary::new();
    for id in 1..=5 {
        lib.insert_clip(ContentId(id), 1.0);
    }
    lib.insert_clip(ContentId(10), 1.0);
    lib.insert_clip(ContentId(11), 1.0);
    lib.insert_clip(ContentId(20), 1.5);
    lib
}

fn step(
    rt: &mut StateMachineRuntime,
    lib: &ContentLibrary,
    bb: &Blackboard,
    dt: f32,
) -> CommandBuffer {
    let mut commands = CommandBuffer::new();
    StateMachineAspect::new(rt, lib, bb, &mut commands, FrameTime::new(dt, 1.0))
        .pre_update()
        .expect("pre_update");
    commands
}

#[test]
fn every_fixture_parses() {
    for key in vizij_test_fixtures::state_machines::keys() {
        let def = load(&key);
        assert!(def.state_count() > 0, "{key}");
        def.validate().expect("fixture validates");
    }
}

#[test]
fn locomotion_follows_blackboard_values() {
    let def = Arc::new(load("locomotion"));
    let idle = def.state_index("Idle").unwrap();
    let walk = def.state_index("Walk").unwrap();
    let run = def.state_index("Run").unwrap();
    let hit = def.state_index("Hit").unwrap();

    let mut rt = StateMachineRuntime::new(def, Config::default());
    let lib = library();
    let mut bb = Blackboard::new();

    // Nothing written yet: every blackboard read fails and nothing fires.
    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.root_state(), idle);

    bb.write_f32(0, 0, 1.0);
    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.root_state(), walk);

    bb.write_f32(0, 0, 5.0);
    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.root_state(), run);
    assert_eq!(rt.registry().count(NodeKind::Blend), 2);

    // Global hit reaction cuts in from anywhere; its short fade completes this frame.
    bb.write_bool(1, 0, true);
    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.root_state(), hit);
    assert_eq!(rt.registry().count(NodeKind::Blend), 0);
    assert_eq!(rt.registry().count(NodeKind::Graph), 1);

    // Held while the flag stays set.
    step(&mut rt, &lib, &bb, 1.0);
    assert_eq!(rt.root_state(), hit);

    bb.write_bool(1, 0, false);
    bb.write_f32(0, 0, 0.0);
    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.root_state(), idle);
}

#[test]
fn ping_pong_fixture_terminates() {
    let def = Arc::new(load("ping-pong"));
    let mut rt = StateMachineRuntime::new(def, Config::default());
    let lib = library();
    let bb = Blackboard::new();
    for _ in 0..3 {
        step(&mut rt, &lib, &bb, 1.0 / 60.0);
        assert_eq!(rt.root_state_name(), Some("Ping"));
    }
}

#[test]
fn combat_nests_locomotion() {
    let locomotion = Arc::new(load("locomotion"));
    let combat = Arc::new(load("combat"));
    let attack = combat.state_index("Attack").unwrap();

    let mut lib = library();
    lib.insert_state_machine(ContentId(100), locomotion);
    let mut rt = StateMachineRuntime::new(combat, Config::default());
    let mut bb = Blackboard::new();
    bb.write_i32(2, 0, 0);

    let commands = step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(commands.commands(), &[LifecycleCommand::Activated]);
    assert_eq!(rt.root_state_name(), Some("Locomotion"));
    assert_eq!(rt.registry().count(NodeKind::StateMachine), 2);

    bb.write_i32(2, 0, 1);
    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.root_state(), attack);
    // The nested machine keeps running as the blend source.
    assert_eq!(rt.registry().count(NodeKind::StateMachine), 2);
    assert_eq!(rt.registry().count(NodeKind::Blend), 1);

    step(&mut rt, &lib, &bb, 0.1);
    assert_eq!(rt.registry().count(NodeKind::StateMachine), 1);
    assert_eq!(rt.registry().count(NodeKind::Blend), 0);
}
