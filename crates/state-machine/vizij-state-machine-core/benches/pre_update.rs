use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use vizij_state_machine_core::{
    parse_state_machine_json, Blackboard, CommandBuffer, Config, ContentId, ContentLibrary,
    FrameTime, MemoryRenderGraph, StateMachineAspect, StateMachineRuntime,
};

fn locomotion() -> (StateMachineRuntime, ContentLibrary) {
    let json = vizij_test_fixtures::state_machines::json("locomotion")
        .expect("load locomotion fixture");
    let def = parse_state_machine_json(&json).expect("parse locomotion fixture");
    let mut lib = ContentLibrary::new();
    for id in 1..=5 {
        lib.insert_clip(ContentId(id), 1.0);
    }
    (StateMachineRuntime::new(Arc::new(def), Config::default()), lib)
}

fn bench_pre_update(c: &mut Criterion) {
    c.bench_function("pre_update_locomotion_cycle", |b| {
        let (mut rt, lib) = locomotion();
        let mut bb = Blackboard::new();
        let mut commands = CommandBuffer::new();
        let mut frame = 0u32;

        b.iter(|| {
            // Sweep speed so the machine keeps crossfading between Idle, Walk and Run.
            let speed = (frame % 240) as f32 / 40.0;
            bb.write_f32(0, 0, speed);
            frame += 1;
            let mut aspect = StateMachineAspect::new(
                &mut rt,
                &lib,
                &bb,
                &mut commands,
                FrameTime::new(1.0 / 60.0, 1.0),
            );
            aspect.pre_update().expect("pre_update");
            commands.drain().for_each(drop);
            black_box(rt.frame_nodes().len());
        })
    });
}

fn bench_frame_with_reconcile(c: &mut Criterion) {
    c.bench_function("frame_with_render_graph", |b| {
        let (mut rt, lib) = locomotion();
        let mut bb = Blackboard::new();
        let mut commands = CommandBuffer::new();
        let mut graph = MemoryRenderGraph::new();
        let sink = graph.create_sink();
        let mut frame = 0u32;

        b.iter(|| {
            let speed = (frame % 240) as f32 / 40.0;
            bb.write_f32(0, 0, speed);
            frame += 1;
            let mut aspect = StateMachineAspect::new(
                &mut rt,
                &lib,
                &bb,
                &mut commands,
                FrameTime::new(1.0 / 60.0, 1.0),
            );
            aspect.pre_update().expect("pre_update");
            aspect
                .update_render_graph(&mut graph, Some(sink))
                .expect("update_render_graph");
            black_box(graph.connection_count());
        })
    });
}

criterion_group!(benches, bench_pre_update, bench_frame_with_reconcile);
criterion_main!(benches);
