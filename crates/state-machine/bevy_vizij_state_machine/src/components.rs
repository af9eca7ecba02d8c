use std::sync::Arc;

use bevy::prelude::*;
use vizij_state_machine_core::{
    Blackboard, RenderSink, StateMachineDefinition, StateMachineRuntime,
};

/// Attach to an entity to give it an animation state machine. The runtime is created on
/// the next update and torn down when this component goes away.
#[derive(Component, Clone, Debug)]
pub struct AnimationStateMachine {
    pub definition: Arc<StateMachineDefinition>,
}

impl AnimationStateMachine {
    pub fn new(definition: Arc<StateMachineDefinition>) -> Self {
        Self { definition }
    }
}

/// Live runtime owned by the entity. Inserted by the plugin.
#[derive(Component, Debug)]
pub struct StateMachineRuntimeComponent(pub StateMachineRuntime);

/// Lifecycle marker: present once the root state machine has run its enter selectors.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct StateMachineActivated;

/// Per-entity playback speed multiplier applied on top of the frame delta.
#[derive(Component, Debug, Clone, Copy)]
pub struct AnimationTimeControl {
    pub timescale: f32,
}

impl Default for AnimationTimeControl {
    fn default() -> Self {
        Self { timescale: 1.0 }
    }
}

/// Gameplay-owned blackboard values. Copied into [`BlackboardSnapshot`] once per frame.
#[derive(Component, Debug, Default, Clone)]
pub struct AnimationBlackboard(pub Blackboard);

/// Frame-stable copy of the blackboard read by transition conditions.
#[derive(Component, Debug, Default, Clone)]
pub struct BlackboardSnapshot(pub Blackboard);

/// Render-graph input that receives the entity's root output.
#[derive(Component, Debug, Clone, Copy)]
pub struct AnimationOutputSink(pub RenderSink);
