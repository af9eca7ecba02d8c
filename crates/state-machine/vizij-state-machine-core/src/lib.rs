//! Vizij State Machine Core (engine-agnostic)
//!
//! Hierarchical animation state machines: a generational node arena holding live
//! leaf/blend/state-machine instances, a condition evaluator answering "when does this
//! fire within the step", a per-frame scheduler that advances time and chains
//! transitions, and a reconciler that mirrors the instance tree into an external
//! render graph.
//!
//! Frame order for one owner: `StateMachineAspect::pre_update` then
//! `StateMachineAspect::update_render_graph`.

pub mod aspect;
pub mod blackboard;
pub mod builder;
pub mod condition;
pub mod config;
pub mod content;
pub mod definition;
pub mod error;
pub mod ids;
pub mod instances;
pub mod reconcile;
pub mod registry;
pub mod render_graph;
pub mod runtime;
pub mod scheduler;
pub mod stored_state_machine;

// Re-exports for consumers (adapters)
pub use aspect::{CommandBuffer, FrameTime, LifecycleCommand, StateMachineAspect};
pub use blackboard::{Blackboard, BlackboardOperand, CompareOp};
pub use builder::{
    create_blend_instance, create_state_instance, create_state_machine_instance,
    StateMachineDefinitionBuilder, TransitionParams,
};
pub use condition::{ConditionContext, NEVER};
pub use config::Config;
pub use content::{AnimationAsset, ContentLibrary, ContentResolver};
pub use definition::{
    ConditionFragment, ConditionKind, StateDefinition, StateMachineDefinition,
    TransitionDefinition,
};
pub use error::{ErrorCode, RenderGraphError, Result, StateMachineError};
pub use ids::{ContentId, NodeHandle, NodeKind, TransitionId, NO_INDEX};
pub use instances::{
    BlendInstance, GraphInstance, Instance, InstanceMut, InstanceRef, RenderBinding,
    StateMachineInstance,
};
pub use registry::{NodeRegistry, NodeSlot};
pub use render_graph::{
    GraphId, InputPort, MemoryRenderGraph, NodeMessage, NodeParams, OutputPort, RenderGraph,
    RenderNodeId, RenderNodeKind, RenderSink, OUTPUT,
};
pub use runtime::StateMachineRuntime;
pub use stored_state_machine::parse_state_machine_json;
