//! Live instance payloads stored in the registry's per-kind stores.

use std::sync::Arc;

use crate::definition::{StateMachineDefinition, TransitionDefinition};
use crate::error::ErrorCode;
use crate::ids::{ContentId, NodeHandle, NodeKind};
use crate::render_graph::RenderNodeId;

/// Render-graph wiring of one instance: its own node plus what each input port is fed by.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderBinding {
    pub node: Option<RenderNodeId>,
    pub inputs: [Option<RenderNodeId>; 2],
}

impl RenderBinding {
    /// Forget the node and its recorded inputs (used when the node has to be recreated).
    pub fn reset(&mut self, node: RenderNodeId) {
        self.node = Some(node);
        self.inputs = [None; 2];
    }
}

/// Leaf animation source.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphInstance {
    pub content: ContentId,
    pub time: f32,
    /// Delta applied this frame; forwarded to the clip evaluator for sampling.
    pub delta_time: f32,
    /// Single animation duration in seconds, negative when unknown.
    pub duration: f32,
    pub error: Option<ErrorCode>,
    pub render: RenderBinding,
}

impl GraphInstance {
    pub fn new(content: ContentId, duration: f32) -> Self {
        Self {
            content,
            time: 0.0,
            delta_time: 0.0,
            duration,
            error: None,
            render: RenderBinding::default(),
        }
    }
}

/// In-progress crossfade from `source` to `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct BlendInstance {
    pub source: NodeHandle,
    pub target: NodeHandle,
    /// Owner in the instance tree: a state machine (as its current node) or an outer
    /// blend (as its source).
    pub parent: NodeHandle,
    pub transition: TransitionDefinition,
    pub accumulated_time: f32,
    /// Weight of `target`, in `[0, 1]`.
    pub weight: f32,
    pub render: RenderBinding,
}

impl BlendInstance {
    pub fn new(
        parent: NodeHandle,
        source: NodeHandle,
        target: NodeHandle,
        transition: TransitionDefinition,
    ) -> Self {
        Self {
            source,
            target,
            parent,
            transition,
            accumulated_time: 0.0,
            weight: 0.0,
            render: RenderBinding::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateMachineInstance {
    pub definition: Arc<StateMachineDefinition>,
    /// State machine whose state plays this one; `None` for the root.
    pub owner: Option<NodeHandle>,
    /// Index into `definition.states`, `NO_INDEX` until first activation.
    pub current_state: i32,
    pub current_state_node: Option<NodeHandle>,
    /// Time spent in the current state.
    pub accumulated_time: f32,
    /// Set when the last transition search stopped early (a transition came up twice or the
    /// per-frame limit was reached).
    pub search_truncated: bool,
    pub error: Option<ErrorCode>,
    pub render: RenderBinding,
}

impl StateMachineInstance {
    pub fn new(definition: Arc<StateMachineDefinition>) -> Self {
        Self {
            definition,
            owner: None,
            current_state: crate::ids::NO_INDEX,
            current_state_node: None,
            accumulated_time: 0.0,
            search_truncated: false,
            error: None,
            render: RenderBinding::default(),
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.current_state != crate::ids::NO_INDEX
    }
}

/// Owned payload handed to [`NodeRegistry::allocate`](crate::registry::NodeRegistry::allocate)
/// and returned by removal.
#[derive(Clone, Debug, PartialEq)]
pub enum Instance {
    Graph(GraphInstance),
    Blend(BlendInstance),
    StateMachine(StateMachineInstance),
}

impl Instance {
    pub fn kind(&self) -> NodeKind {
        match self {
            Instance::Graph(_) => NodeKind::Graph,
            Instance::Blend(_) => NodeKind::Blend,
            Instance::StateMachine(_) => NodeKind::StateMachine,
        }
    }

    pub fn render(&self) -> &RenderBinding {
        match self {
            Instance::Graph(g) => &g.render,
            Instance::Blend(b) => &b.render,
            Instance::StateMachine(sm) => &sm.render,
        }
    }
}

/// Borrowed view of a resolved node.
#[derive(Clone, Copy, Debug)]
pub enum InstanceRef<'a> {
    Graph(&'a GraphInstance),
    Blend(&'a BlendInstance),
    StateMachine(&'a StateMachineInstance),
}

impl InstanceRef<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            InstanceRef::Graph(_) => NodeKind::Graph,
            InstanceRef::Blend(_) => NodeKind::Blend,
            InstanceRef::StateMachine(_) => NodeKind::StateMachine,
        }
    }

    pub fn render(&self) -> &RenderBinding {
        match self {
            InstanceRef::Graph(g) => &g.render,
            InstanceRef::Blend(b) => &b.render,
            InstanceRef::StateMachine(sm) => &sm.render,
        }
    }

    /// Child nodes feeding this node's input ports, in port order.
    pub fn inputs(&self) -> [Option<NodeHandle>; 2] {
        match self {
            InstanceRef::Graph(_) => [None, None],
            InstanceRef::Blend(b) => [Some(b.source), Some(b.target)],
            InstanceRef::StateMachine(sm) => [sm.current_state_node, None],
        }
    }
}

/// Mutable view of a resolved node.
#[derive(Debug)]
pub enum InstanceMut<'a> {
    Graph(&'a mut GraphInstance),
    Blend(&'a mut BlendInstance),
    StateMachine(&'a mut StateMachineInstance),
}

impl InstanceMut<'_> {
    pub fn render_mut(&mut self) -> &mut RenderBinding {
        match self {
            InstanceMut::Graph(g) => &mut g.render,
            InstanceMut::Blend(b) => &mut b.render,
            InstanceMut::StateMachine(sm) => &mut sm.render,
        }
    }
}
