//! Bevy adapter for the Vizij animation state-machine core.
//!
//! Add [`VizijStateMachinePlugin`], register content in [`AnimationContent`] and attach an
//! [`AnimationStateMachine`] to an entity. Each `Update` runs, in order: attach runtimes,
//! snapshot blackboards, pre-update, render-graph reconciliation, cleanup.

use bevy::prelude::*;

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{
    AnimationBlackboard, AnimationOutputSink, AnimationStateMachine, AnimationTimeControl,
    BlackboardSnapshot, StateMachineActivated, StateMachineRuntimeComponent,
};
pub use resources::{
    AnimationContent, AnimationRenderGraph, OwnedRenderGraphs, StateMachineSettings,
};

pub struct VizijStateMachinePlugin;

impl Plugin for VizijStateMachinePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AnimationContent>()
            .init_resource::<AnimationRenderGraph>()
            .init_resource::<StateMachineSettings>()
            .init_resource::<OwnedRenderGraphs>()
            .add_systems(
                Update,
                (
                    systems::attach_runtime_system,
                    systems::copy_blackboard_system,
                    systems::pre_update_system,
                    systems::update_render_graph_system,
                    systems::cleanup_system,
                )
                    .chain(),
            );
    }
}
