//! Contract for the external execution graph the reconciler drives, plus an in-memory
//! implementation used by tests and by hosts without a real evaluation backend.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::RenderGraphError;
use crate::ids::ContentId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RenderNodeId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InputPort(pub u16);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OutputPort(pub u16);

/// Every node archetype exposes a single output.
pub const OUTPUT: OutputPort = OutputPort(0);

/// Node archetypes instantiated by the reconciler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RenderNodeKind {
    /// Pass-through buffer, one per state machine.
    BufferSink,
    /// Two-input weighted mixer, one per active blend.
    Mixer,
    /// Animation-content evaluator, one per leaf.
    ClipEvaluator,
}

impl RenderNodeKind {
    pub fn input_count(self) -> u16 {
        match self {
            RenderNodeKind::BufferSink => 1,
            RenderNodeKind::Mixer => 2,
            RenderNodeKind::ClipEvaluator => 0,
        }
    }
}

/// Per-frame parameter updates sent to render nodes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeMessage {
    Content(ContentId),
    Time(f32),
    DeltaTime(f32),
    Weight(f32),
}

/// Externally supplied input that receives the root state machine's output.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RenderSink {
    pub node: RenderNodeId,
    pub port: InputPort,
}

/// External execution-graph manager.
///
/// Implementations are expected to reject a second connection into an occupied input;
/// callers disconnect first.
pub trait RenderGraph {
    fn create_graph(&mut self) -> GraphId;
    /// Destroys the graph and every node created in it.
    fn dispose_graph(&mut self, graph: GraphId);
    fn create_node(
        &mut self,
        graph: GraphId,
        kind: RenderNodeKind,
    ) -> Result<RenderNodeId, RenderGraphError>;
    fn destroy_node(&mut self, node: RenderNodeId);
    fn exists(&self, node: RenderNodeId) -> bool;
    fn connect(
        &mut self,
        source: RenderNodeId,
        source_port: OutputPort,
        destination: RenderNodeId,
        destination_port: InputPort,
    ) -> Result<(), RenderGraphError>;
    fn disconnect(
        &mut self,
        source: RenderNodeId,
        source_port: OutputPort,
        destination: RenderNodeId,
        destination_port: InputPort,
    ) -> Result<(), RenderGraphError>;
    fn send_message(&mut self, node: RenderNodeId, message: NodeMessage)
        -> Result<(), RenderGraphError>;
}

/// Last values received by an in-memory node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeParams {
    pub content: Option<ContentId>,
    pub time: Option<f32>,
    pub delta_time: Option<f32>,
    pub weight: Option<f32>,
}

#[derive(Clone, Debug)]
struct MemoryNode {
    graph: GraphId,
    kind: RenderNodeKind,
    params: NodeParams,
}

/// In-memory [`RenderGraph`] that only records topology and parameters.
#[derive(Clone, Debug, Default)]
pub struct MemoryRenderGraph {
    next_graph: u32,
    next_node: u32,
    graphs: HashSet<GraphId>,
    nodes: HashMap<RenderNodeId, MemoryNode>,
    // (destination, input) -> source
    edges: HashMap<(RenderNodeId, InputPort), RenderNodeId>,
}

impl MemoryRenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a free-standing sink node, e.g. the consumer of a root state machine.
    pub fn create_sink(&mut self) -> RenderSink {
        let graph = self.create_graph();
        let node = self.insert_node(graph, RenderNodeKind::BufferSink);
        RenderSink {
            node,
            port: InputPort(0),
        }
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_kind(&self, node: RenderNodeId) -> Option<RenderNodeKind> {
        self.nodes.get(&node).map(|n| n.kind)
    }

    pub fn params(&self, node: RenderNodeId) -> Option<&NodeParams> {
        self.nodes.get(&node).map(|n| &n.params)
    }

    pub fn input_source(&self, node: RenderNodeId, port: InputPort) -> Option<RenderNodeId> {
        self.edges.get(&(node, port)).copied()
    }

    pub fn nodes_in_graph(&self, graph: GraphId) -> usize {
        self.nodes.values().filter(|n| n.graph == graph).count()
    }

    fn insert_node(&mut self, graph: GraphId, kind: RenderNodeKind) -> RenderNodeId {
        let id = RenderNodeId(self.next_node);
        self.next_node = self.next_node.wrapping_add(1);
        self.nodes.insert(
            id,
            MemoryNode {
                graph,
                kind,
                params: NodeParams::default(),
            },
        );
        id
    }

    fn check_input(&self, node: RenderNodeId, port: InputPort) -> Result<(), RenderGraphError> {
        let n = self
            .nodes
            .get(&node)
            .ok_or(RenderGraphError::UnknownNode(node.0))?;
        if port.0 >= n.kind.input_count() {
            return Err(RenderGraphError::InvalidPort {
                node: node.0,
                port: port.0,
            });
        }
        Ok(())
    }

    fn check_output(&self, node: RenderNodeId, port: OutputPort) -> Result<(), RenderGraphError> {
        if !self.nodes.contains_key(&node) {
            return Err(RenderGraphError::UnknownNode(node.0));
        }
        if port != OUTPUT {
            return Err(RenderGraphError::InvalidPort {
                node: node.0,
                port: port.0,
            });
        }
        Ok(())
    }
}

impl RenderGraph for MemoryRenderGraph {
    fn create_graph(&mut self) -> GraphId {
        let id = GraphId(self.next_graph);
        self.next_graph = self.next_graph.wrapping_add(1);
        self.graphs.insert(id);
        id
    }

    fn dispose_graph(&mut self, graph: GraphId) {
        if !self.graphs.remove(&graph) {
            return;
        }
        let doomed: Vec<RenderNodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.graph == graph)
            .map(|(id, _)| *id)
            .collect();
        for node in doomed {
            self.destroy_node(node);
        }
    }

    fn create_node(
        &mut self,
        graph: GraphId,
        kind: RenderNodeKind,
    ) -> Result<RenderNodeId, RenderGraphError> {
        if !self.graphs.contains(&graph) {
            return Err(RenderGraphError::UnknownGraph(graph.0));
        }
        Ok(self.insert_node(graph, kind))
    }

    fn destroy_node(&mut self, node: RenderNodeId) {
        if self.nodes.remove(&node).is_some() {
            self.edges
                .retain(|(dst, _), src| *dst != node && *src != node);
        }
    }

    fn exists(&self, node: RenderNodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn connect(
        &mut self,
        source: RenderNodeId,
        source_port: OutputPort,
        destination: RenderNodeId,
        destination_port: InputPort,
    ) -> Result<(), RenderGraphError> {
        self.check_output(source, source_port)?;
        self.check_input(destination, destination_port)?;
        if self.edges.contains_key(&(destination, destination_port)) {
            return Err(RenderGraphError::InputOccupied {
                node: destination.0,
                port: destination_port.0,
            });
        }
        self.edges.insert((destination, destination_port), source);
        Ok(())
    }

    fn disconnect(
        &mut self,
        source: RenderNodeId,
        source_port: OutputPort,
        destination: RenderNodeId,
        destination_port: InputPort,
    ) -> Result<(), RenderGraphError> {
        self.check_output(source, source_port)?;
        self.check_input(destination, destination_port)?;
        match self.edges.get(&(destination, destination_port)) {
            Some(src) if *src == source => {
                self.edges.remove(&(destination, destination_port));
                Ok(())
            }
            _ => Err(RenderGraphError::NotConnected {
                node: destination.0,
                port: destination_port.0,
                source_node: source.0,
            }),
        }
    }

    fn send_message(
        &mut self,
        node: RenderNodeId,
        message: NodeMessage,
    ) -> Result<(), RenderGraphError> {
        let n = self
            .nodes
            .get_mut(&node)
            .ok_or(RenderGraphError::UnknownNode(node.0))?;
        match message {
            NodeMessage::Content(id) => n.params.content = Some(id),
            NodeMessage::Time(t) => n.params.time = Some(t),
            NodeMessage::DeltaTime(dt) => n.params.delta_time = Some(dt),
            NodeMessage::Weight(w) => n.params.weight = Some(w),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_input_is_rejected_until_disconnected() {
        let mut g = MemoryRenderGraph::new();
        let graph = g.create_graph();
        let mixer = g.create_node(graph, RenderNodeKind::Mixer).unwrap();
        let a = g.create_node(graph, RenderNodeKind::ClipEvaluator).unwrap();
        let b = g.create_node(graph, RenderNodeKind::ClipEvaluator).unwrap();

        g.connect(a, OUTPUT, mixer, InputPort(0)).unwrap();
        assert!(matches!(
            g.connect(b, OUTPUT, mixer, InputPort(0)),
            Err(RenderGraphError::InputOccupied { .. })
        ));
        g.disconnect(a, OUTPUT, mixer, InputPort(0)).unwrap();
        g.connect(b, OUTPUT, mixer, InputPort(0)).unwrap();
        assert_eq!(g.input_source(mixer, InputPort(0)), Some(b));
    }

    #[test]
    fn clip_evaluator_has_no_inputs() {
        let mut g = MemoryRenderGraph::new();
        let graph = g.create_graph();
        let a = g.create_node(graph, RenderNodeKind::ClipEvaluator).unwrap();
        let b = g.create_node(graph, RenderNodeKind::ClipEvaluator).unwrap();
        assert!(matches!(
            g.connect(a, OUTPUT, b, InputPort(0)),
            Err(RenderGraphError::InvalidPort { .. })
        ));
    }

    #[test]
    fn dispose_graph_drops_nodes_and_edges() {
        let mut g = MemoryRenderGraph::new();
        let sink = g.create_sink();
        let graph = g.create_graph();
        let clip = g.create_node(graph, RenderNodeKind::ClipEvaluator).unwrap();
        g.connect(clip, OUTPUT, sink.node, sink.port).unwrap();
        assert_eq!(g.connection_count(), 1);

        g.dispose_graph(graph);
        assert!(!g.exists(clip));
        assert!(g.exists(sink.node));
        assert_eq!(g.connection_count(), 0);
        assert_eq!(g.nodes_in_graph(graph), 0);
    }
}
