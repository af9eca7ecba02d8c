//! Per-entity accessor binding a runtime to the shared services one frame needs.

use serde::{Deserialize, Serialize};

use crate::blackboard::Blackboard;
use crate::content::ContentResolver;
use crate::error::Result;
use crate::reconcile;
use crate::render_graph::{RenderGraph, RenderSink};
use crate::runtime::StateMachineRuntime;
use crate::scheduler;

/// Time control for one entity and frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    pub delta_ratio: f32,
    pub timescale: f32,
}

impl Default for FrameTime {
    fn default() -> Self {
        Self {
            delta_ratio: 0.0,
            timescale: 1.0,
        }
    }
}

impl FrameTime {
    pub fn new(delta_ratio: f32, timescale: f32) -> Self {
        Self {
            delta_ratio,
            timescale,
        }
    }

    /// Seconds the state machine advances this frame.
    #[inline]
    pub fn budget(&self) -> f32 {
        self.delta_ratio * self.timescale
    }
}

/// Lifecycle marker changes for the owning entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleCommand {
    /// The root state machine ran its enter selectors.
    Activated,
    /// The runtime was destroyed.
    Deactivated,
}

/// Deferred lifecycle changes, applied by the host after the frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandBuffer {
    commands: Vec<LifecycleCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: LifecycleCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[LifecycleCommand] {
        &self.commands
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, LifecycleCommand> {
        self.commands.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

pub struct StateMachineAspect<'a> {
    pub runtime: &'a mut StateMachineRuntime,
    pub content: &'a dyn ContentResolver,
    pub blackboard: &'a Blackboard,
    pub commands: &'a mut CommandBuffer,
    pub time: FrameTime,
}

impl<'a> StateMachineAspect<'a> {
    pub fn new(
        runtime: &'a mut StateMachineRuntime,
        content: &'a dyn ContentResolver,
        blackboard: &'a Blackboard,
        commands: &'a mut CommandBuffer,
        time: FrameTime,
    ) -> Self {
        Self {
            runtime,
            content,
            blackboard,
            commands,
            time,
        }
    }

    /// Advance time, take transitions and rebuild the frame's node list.
    pub fn pre_update(&mut self) -> Result<()> {
        scheduler::pre_update(
            self.runtime,
            self.content,
            self.blackboard,
            self.commands,
            self.time.budget(),
        )
    }

    /// Mirror the frame's node list into `graph`, feeding the root into `sink` when given.
    pub fn update_render_graph(
        &mut self,
        graph: &mut dyn RenderGraph,
        sink: Option<RenderSink>,
    ) -> Result<()> {
        reconcile::update_render_graph(self.runtime, graph, sink)
    }
}
