//! Render-graph reconciliation: makes the external graph mirror the frame's instance tree.
//!
//! Only changed topology is rewired. A port is reconnected when its recorded source differs
//! from the child's current render node or no longer exists; the previous source is
//! disconnected first since graphs reject a second connection into an occupied input.

use crate::error::{Result, StateMachineError};
use crate::ids::NodeKind;
use crate::instances::{InstanceMut, RenderBinding};
use crate::render_graph::{
    GraphId, InputPort, NodeMessage, RenderGraph, RenderNodeId, RenderNodeKind, RenderSink,
    OUTPUT,
};
use crate::runtime::StateMachineRuntime;

fn render_kind(kind: NodeKind) -> Option<RenderNodeKind> {
    match kind {
        NodeKind::StateMachine => Some(RenderNodeKind::BufferSink),
        NodeKind::Blend => Some(RenderNodeKind::Mixer),
        NodeKind::Graph => Some(RenderNodeKind::ClipEvaluator),
        NodeKind::Invalid => None,
    }
}

/// Make sure `binding` points at a live node. Returns the node and whether it was created.
fn ensure_node(
    graph: &mut dyn RenderGraph,
    graph_id: GraphId,
    kind: RenderNodeKind,
    binding: &mut RenderBinding,
) -> Result<(RenderNodeId, bool)> {
    match binding.node {
        Some(node) if graph.exists(node) => Ok((node, false)),
        _ => {
            let node = graph.create_node(graph_id, kind)?;
            binding.reset(node);
            Ok((node, true))
        }
    }
}

pub fn update_render_graph(
    runtime: &mut StateMachineRuntime,
    graph: &mut dyn RenderGraph,
    sink: Option<RenderSink>,
) -> Result<()> {
    for node in runtime.registry.drain_pending_disposal() {
        if graph.exists(node) {
            graph.destroy_node(node);
        }
    }
    let graph_id = *runtime.graph.get_or_insert_with(|| graph.create_graph());

    // Nodes and per-frame parameters.
    for &handle in &runtime.frame_nodes {
        let kind = runtime.registry.kind(handle)?;
        let render = render_kind(kind).ok_or(StateMachineError::StaleHandle { handle })?;
        match runtime.registry.resolve_mut(handle)? {
            InstanceMut::Graph(leaf) => {
                let (node, fresh) = ensure_node(graph, graph_id, render, &mut leaf.render)?;
                if fresh && leaf.error.is_none() {
                    graph.send_message(node, NodeMessage::Content(leaf.content))?;
                }
                graph.send_message(node, NodeMessage::Time(leaf.time))?;
                graph.send_message(node, NodeMessage::DeltaTime(leaf.delta_time))?;
            }
            InstanceMut::Blend(blend) => {
                let (node, _) = ensure_node(graph, graph_id, render, &mut blend.render)?;
                graph.send_message(node, NodeMessage::Weight(blend.weight))?;
            }
            InstanceMut::StateMachine(sm) => {
                ensure_node(graph, graph_id, render, &mut sm.render)?;
            }
        }
    }

    // Connections from children into their parent's inputs.
    for &handle in &runtime.frame_nodes {
        let (node, recorded, desired) = {
            let instance = runtime.registry.resolve(handle)?;
            let binding = instance.render();
            let node = binding
                .node
                .ok_or(StateMachineError::StaleHandle { handle })?;
            let mut desired = [None; 2];
            for (port, child) in instance.inputs().into_iter().enumerate() {
                if let Some(child) = child {
                    desired[port] = runtime.registry.resolve(child)?.render().node;
                }
            }
            (node, binding.inputs, desired)
        };

        for port in 0..desired.len() {
            let Some(source) = desired[port] else {
                continue;
            };
            let previous = recorded[port];
            if previous == Some(source) && graph.exists(source) {
                continue;
            }
            let input = InputPort(port as u16);
            if let Some(previous) = previous.filter(|p| graph.exists(*p)) {
                graph.disconnect(previous, OUTPUT, node, input)?;
            }
            graph.connect(source, OUTPUT, node, input)?;
            runtime.registry.resolve_mut(handle)?.render_mut().inputs[port] = Some(source);
        }
    }

    connect_root(runtime, graph, sink)
}

/// Keep the first node of the frame connected to the host's sink.
fn connect_root(
    runtime: &mut StateMachineRuntime,
    graph: &mut dyn RenderGraph,
    sink: Option<RenderSink>,
) -> Result<()> {
    let root_node = match runtime.frame_nodes.first() {
        Some(&handle) => runtime.registry.resolve(handle)?.render().node,
        None => None,
    };
    let desired = root_node.zip(sink);
    let linked = runtime
        .root_link
        .filter(|(node, sink)| graph.exists(*node) && graph.exists(sink.node));
    if desired.is_some() && desired == linked {
        return Ok(());
    }

    if let Some((node, old_sink)) = linked {
        graph.disconnect(node, OUTPUT, old_sink.node, old_sink.port)?;
    }
    runtime.root_link = None;
    if let Some((node, sink)) = desired {
        if !graph.exists(sink.node) {
            log::warn!("render sink node {} does not exist", sink.node.0);
            return Ok(());
        }
        graph.connect(node, OUTPUT, sink.node, sink.port)?;
        runtime.root_link = Some((node, sink));
    }
    Ok(())
}
