use bevy::log::{debug, error};
use bevy::prelude::*;
use vizij_state_machine_core::{
    reconcile, Blackboard, CommandBuffer, FrameTime, LifecycleCommand, RenderGraph,
    StateMachineAspect, StateMachineRuntime,
};

use crate::components::{
    AnimationBlackboard, AnimationOutputSink, AnimationStateMachine, AnimationTimeControl,
    BlackboardSnapshot, StateMachineActivated, StateMachineRuntimeComponent,
};
use crate::resources::{
    AnimationContent, AnimationRenderGraph, OwnedRenderGraphs, StateMachineSettings,
};

/// Apply deferred lifecycle changes produced by the core to the entity's marker components.
fn apply_lifecycle(commands: &mut Commands, entity: Entity, buffer: &mut CommandBuffer) {
    let Some(mut entity_commands) = commands.get_entity(entity) else {
        buffer.drain().for_each(drop);
        return;
    };
    for command in buffer.drain() {
        match command {
            LifecycleCommand::Activated => {
                entity_commands.insert(StateMachineActivated);
            }
            LifecycleCommand::Deactivated => {
                entity_commands.remove::<StateMachineActivated>();
            }
        }
    }
}

/// Create a runtime for every entity that gained an [`AnimationStateMachine`].
pub fn attach_runtime_system(
    mut commands: Commands,
    settings: Res<StateMachineSettings>,
    added: Query<(Entity, &AnimationStateMachine), Without<StateMachineRuntimeComponent>>,
) {
    for (entity, machine) in added.iter() {
        let runtime = StateMachineRuntime::new(machine.definition.clone(), settings.0.clone());
        debug!("attached state machine runtime to {entity:?}");
        commands.entity(entity).insert((
            StateMachineRuntimeComponent(runtime),
            BlackboardSnapshot::default(),
        ));
    }
}

/// Freeze gameplay blackboard values for this frame's condition evaluation.
pub fn copy_blackboard_system(
    mut query: Query<(&AnimationBlackboard, &mut BlackboardSnapshot)>,
) {
    for (source, mut snapshot) in query.iter_mut() {
        snapshot.0.clone_from(&source.0);
    }
}

/// Advance every runtime by the frame delta scaled by its time control.
pub fn pre_update_system(
    mut commands: Commands,
    time: Res<Time>,
    content: Res<AnimationContent>,
    mut query: Query<(
        Entity,
        &mut StateMachineRuntimeComponent,
        Option<&BlackboardSnapshot>,
        Option<&AnimationTimeControl>,
    )>,
) {
    let dt = time.delta_seconds();
    let empty = Blackboard::new();
    let mut buffer = CommandBuffer::new();
    for (entity, mut runtime, snapshot, control) in query.iter_mut() {
        let blackboard = snapshot.map(|s| &s.0).unwrap_or(&empty);
        let timescale = control.copied().unwrap_or_default().timescale;
        let mut aspect = StateMachineAspect::new(
            &mut runtime.0,
            &content.0,
            blackboard,
            &mut buffer,
            FrameTime::new(dt, timescale),
        );
        if let Err(err) = aspect.pre_update() {
            error!("state machine pre-update failed for {entity:?}: {err}");
        }
        apply_lifecycle(&mut commands, entity, &mut buffer);
    }
}

/// Mirror each runtime's instance tree into the shared render graph.
pub fn update_render_graph_system(
    mut graph: ResMut<AnimationRenderGraph>,
    mut owned: ResMut<OwnedRenderGraphs>,
    mut query: Query<(
        Entity,
        &mut StateMachineRuntimeComponent,
        Option<&AnimationOutputSink>,
    )>,
) {
    for (entity, mut runtime, sink) in query.iter_mut() {
        let sink = sink.map(|s| s.0);
        if let Err(err) = reconcile::update_render_graph(&mut runtime.0, &mut graph.0, sink) {
            error!("render graph update failed for {entity:?}: {err}");
        }
        if let Some(id) = runtime.0.graph() {
            owned.map.insert(entity, id);
        }
    }
}

/// Tear down runtimes whose definition was removed and free graphs of despawned entities.
pub fn cleanup_system(
    mut commands: Commands,
    mut graph: ResMut<AnimationRenderGraph>,
    mut owned: ResMut<OwnedRenderGraphs>,
    mut removed_machines: RemovedComponents<AnimationStateMachine>,
    mut removed_runtimes: RemovedComponents<StateMachineRuntimeComponent>,
    mut runtimes: Query<&mut StateMachineRuntimeComponent>,
) {
    let mut buffer = CommandBuffer::new();
    for entity in removed_machines.read() {
        let Ok(mut runtime) = runtimes.get_mut(entity) else {
            continue;
        };
        if let Err(err) = runtime.0.destroy(&mut graph.0, &mut buffer) {
            error!("failed to destroy state machine on {entity:?}: {err}");
        }
        owned.map.remove(&entity);
        apply_lifecycle(&mut commands, entity, &mut buffer);
        if let Some(mut entity_commands) = commands.get_entity(entity) {
            entity_commands.remove::<(StateMachineRuntimeComponent, BlackboardSnapshot)>();
        }
    }

    for entity in removed_runtimes.read() {
        if let Some(id) = owned.map.remove(&entity) {
            graph.0.dispose_graph(id);
            debug!("disposed render graph of despawned {entity:?}");
        }
    }
}
