//! Runtime: per-entity ownership of the instance tree and its external graph wiring.
//!
//! Methods:
//! - new, root, registry, frame_nodes, root_state, errors, destroy

use std::sync::Arc;

use crate::aspect::{CommandBuffer, LifecycleCommand};
use crate::builder::create_state_machine_instance;
use crate::config::Config;
use crate::definition::StateMachineDefinition;
use crate::error::{ErrorCode, Result};
use crate::ids::{NodeHandle, NO_INDEX};
use crate::instances::InstanceRef;
use crate::registry::NodeRegistry;
use crate::render_graph::{GraphId, RenderGraph, RenderNodeId, RenderSink, OUTPUT};

/// One owning entity's state machine: the root instance, every live descendant and the
/// render graph mirroring them.
#[derive(Clone, Debug, PartialEq)]
pub struct StateMachineRuntime {
    pub(crate) registry: NodeRegistry,
    pub(crate) root: NodeHandle,
    pub(crate) config: Config,
    /// Nodes visited by the last pre-update, in traversal order.
    pub(crate) frame_nodes: Vec<NodeHandle>,
    pub(crate) graph: Option<GraphId>,
    /// Root render node currently feeding the external sink.
    pub(crate) root_link: Option<(RenderNodeId, RenderSink)>,
}

impl StateMachineRuntime {
    /// Create the runtime with its root state machine in slot 0. The root is activated by
    /// the first pre-update.
    pub fn new(definition: Arc<StateMachineDefinition>, config: Config) -> Self {
        let mut registry = NodeRegistry::with_capacity(config.initial_node_capacity);
        let root = create_state_machine_instance(&mut registry, definition);
        debug_assert!(root.is_root_slot());
        Self {
            registry,
            root,
            frame_nodes: Vec::with_capacity(config.initial_node_capacity),
            config,
            graph: None,
            root_link: None,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn frame_nodes(&self) -> &[NodeHandle] {
        &self.frame_nodes
    }

    pub fn graph(&self) -> Option<GraphId> {
        self.graph
    }

    pub fn root_link(&self) -> Option<(RenderNodeId, RenderSink)> {
        self.root_link
    }

    /// Current state index of the root, `NO_INDEX` before activation or after destroy.
    pub fn root_state(&self) -> i32 {
        self.registry
            .state_machine(self.root)
            .map(|sm| sm.current_state)
            .unwrap_or(NO_INDEX)
    }

    pub fn root_state_name(&self) -> Option<&str> {
        let sm = self.registry.state_machine(self.root).ok()?;
        sm.definition
            .state(sm.current_state)
            .ok()
            .map(|s| s.name.as_str())
    }

    pub fn is_activated(&self) -> bool {
        self.registry
            .state_machine(self.root)
            .is_ok_and(|sm| sm.is_initialized())
    }

    /// Error codes recorded on live instances, in slot order.
    pub fn errors(&self) -> Vec<ErrorCode> {
        self.registry
            .iter()
            .filter_map(|(_, instance)| match instance {
                InstanceRef::Graph(g) => g.error,
                InstanceRef::StateMachine(sm) => sm.error,
                InstanceRef::Blend(_) => None,
            })
            .collect()
    }

    /// Tear down every instance and the external graph. The runtime is inert afterwards.
    pub fn destroy(
        &mut self,
        graph: &mut dyn RenderGraph,
        commands: &mut CommandBuffer,
    ) -> Result<()> {
        if let Some((node, sink)) = self.root_link.take() {
            if graph.exists(node) && graph.exists(sink.node) {
                if let Err(err) = graph.disconnect(node, OUTPUT, sink.node, sink.port) {
                    log::warn!("failed to detach root from sink: {err}");
                }
            }
        }
        if self.registry.is_valid(self.root) {
            let removed = self.registry.remove_recursive(self.root)?;
            log::debug!("destroyed state machine {} ({removed} nodes)", self.root);
        }
        for node in self.registry.drain_pending_disposal() {
            if graph.exists(node) {
                graph.destroy_node(node);
            }
        }
        if let Some(id) = self.graph.take() {
            graph.dispose_graph(id);
        }
        self.frame_nodes.clear();
        commands.push(LifecycleCommand::Deactivated);
        Ok(())
    }
}
