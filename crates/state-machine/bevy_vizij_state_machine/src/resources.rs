use bevy::prelude::*;
use hashbrown::HashMap;
use vizij_state_machine_core::{Config, ContentLibrary, GraphId, MemoryRenderGraph};

/// Animation content every state machine resolves its states against.
#[derive(Resource, Default)]
pub struct AnimationContent(pub ContentLibrary);

/// Shared render graph the state machines are mirrored into.
#[derive(Resource, Default)]
pub struct AnimationRenderGraph(pub MemoryRenderGraph);

/// Runtime configuration used for newly attached state machines.
#[derive(Resource, Default, Clone, Debug)]
pub struct StateMachineSettings(pub Config);

/// Render graph created on behalf of each entity, so it can be disposed even after the
/// entity is despawned.
#[derive(Resource, Default, Debug)]
pub struct OwnedRenderGraphs {
    pub map: HashMap<Entity, GraphId>,
}
