use vizij_state_machine_core::{
    Blackboard, CommandBuffer, Config, ContentId, ContentLibrary, FrameTime, InputPort,
    LifecycleCommand, MemoryRenderGraph, RenderGraph, RenderNodeKind, RenderSink,
    StateMachineAspect, StateMachineDefinitionBuilder, StateMachineRuntime, TransitionParams,
};

struct Harness {
    rt: StateMachineRuntime,
    lib: ContentLibrary,
    bb: Blackboard,
    graph: MemoryRenderGraph,
    sink: RenderSink,
}

impl Harness {
    fn new() -> Self {
        let mut b = StateMachineDefinitionBuilder::new();
        let a = b.add_state("A", ContentId(0));
        let target = b.add_state("B", ContentId(1));
        let after = b.elapsed_time(1.0);
        b.add_enter_selector(a, None)
            .add_transition(a, target, Some(after), TransitionParams::crossfade(0.5));
        let rt = StateMachineRuntime::new(b.build_shared().unwrap(), Config::default());

        let mut lib = ContentLibrary::new();
        lib.insert_clip(ContentId(0), 2.0);
        lib.insert_clip(ContentId(1), 2.0);
        let mut graph = MemoryRenderGraph::new();
        let sink = graph.create_sink();
        Self {
            rt,
            lib,
            bb: Blackboard::new(),
            graph,
            sink,
        }
    }

    fn frame(&mut self, dt: f32) {
        let mut commands = CommandBuffer::new();
        let mut aspect = StateMachineAspect::new(
            &mut self.rt,
            &self.lib,
            &self.bb,
            &mut commands,
            FrameTime::new(dt, 1.0),
        );
        aspect.pre_update().expect("pre_update");
        aspect
            .update_render_graph(&mut self.graph, Some(self.sink))
            .expect("update_render_graph");
    }

    fn render_node(&self, index: usize) -> vizij_state_machine_core::RenderNodeId {
        let handle = self.rt.frame_nodes()[index];
        self.rt
            .registry()
            .resolve(handle)
            .unwrap()
            .render()
            .node
            .expect("render node created")
    }
}

#[test]
fn first_frame_builds_root_and_leaf() {
    let mut h = Harness::new();
    h.frame(0.25);

    let root = h.render_node(0);
    let leaf = h.render_node(1);
    assert_eq!(h.graph.node_kind(root), Some(RenderNodeKind::BufferSink));
    assert_eq!(h.graph.node_kind(leaf), Some(RenderNodeKind::ClipEvaluator));
    assert_eq!(h.graph.input_source(root, InputPort(0)), Some(leaf));
    assert_eq!(h.graph.input_source(h.sink.node, h.sink.port), Some(root));
    assert_eq!(h.graph.connection_count(), 2);
    assert_eq!(h.rt.root_link(), Some((root, h.sink)));

    let params = h.graph.params(leaf).unwrap();
    assert_eq!(params.content, Some(ContentId(0)));
    assert_eq!(params.time, Some(0.25));
    assert_eq!(params.delta_time, Some(0.25));
}

#[test]
fn steady_frames_do_not_rewire() {
    let mut h = Harness::new();
    h.frame(0.1);
    let nodes = h.graph.node_count();
    let root = h.render_node(0);
    let leaf = h.render_node(1);

    h.frame(0.1);
    h.frame(0.1);
    assert_eq!(h.graph.node_count(), nodes);
    assert_eq!(h.render_node(0), root);
    assert_eq!(h.render_node(1), leaf);
    assert_eq!(h.graph.connection_count(), 2);
    let time = h.graph.params(leaf).unwrap().time.unwrap();
    assert!((time - 0.3).abs() < 1e-5);
}

#[test]
fn blend_inserts_mixer_then_collapses() {
    let mut h = Harness::new();
    h.frame(0.0);
    let root = h.render_node(0);
    let leaf_a = h.render_node(1);

    h.frame(1.2);
    // [root, blend, A, B]
    assert_eq!(h.rt.frame_nodes().len(), 4);
    let mixer = h.render_node(1);
    let leaf_b = h.render_node(3);
    assert_eq!(h.render_node(2), leaf_a);
    assert_eq!(h.graph.node_kind(mixer), Some(RenderNodeKind::Mixer));
    assert_eq!(h.graph.input_source(root, InputPort(0)), Some(mixer));
    assert_eq!(h.graph.input_source(mixer, InputPort(0)), Some(leaf_a));
    assert_eq!(h.graph.input_source(mixer, InputPort(1)), Some(leaf_b));
    assert_eq!(h.graph.connection_count(), 4);
    let weight = h.graph.params(mixer).unwrap().weight.unwrap();
    assert!((weight - 0.4).abs() < 1e-5);
    assert_eq!(h.graph.params(leaf_b).unwrap().content, Some(ContentId(1)));

    h.frame(0.4);
    assert!(!h.graph.exists(mixer));
    assert!(!h.graph.exists(leaf_a));
    assert_eq!(h.graph.input_source(root, InputPort(0)), Some(leaf_b));
    assert_eq!(h.graph.connection_count(), 2);
    // sink + root buffer + B
    assert_eq!(h.graph.node_count(), 3);
}

#[test]
fn destroyed_render_node_is_recreated_and_rewired() {
    let mut h = Harness::new();
    h.frame(0.1);
    let root = h.render_node(0);
    let leaf = h.render_node(1);

    h.graph.destroy_node(leaf);
    h.frame(0.1);
    let recreated = h.render_node(1);
    assert_ne!(recreated, leaf);
    assert_eq!(h.graph.input_source(root, InputPort(0)), Some(recreated));
    assert_eq!(
        h.graph.params(recreated).unwrap().content,
        Some(ContentId(0))
    );
}

#[test]
fn sink_can_be_swapped_and_dropped() {
    let mut h = Harness::new();
    h.frame(0.1);
    let root = h.render_node(0);

    let other = h.graph.create_sink();
    let mut commands = CommandBuffer::new();
    let mut aspect = StateMachineAspect::new(
        &mut h.rt,
        &h.lib,
        &h.bb,
        &mut commands,
        FrameTime::new(0.1, 1.0),
    );
    aspect.pre_update().unwrap();
    aspect.update_render_graph(&mut h.graph, Some(other)).unwrap();
    assert_eq!(h.graph.input_source(h.sink.node, h.sink.port), None);
    assert_eq!(h.graph.input_source(other.node, other.port), Some(root));

    aspect.update_render_graph(&mut h.graph, None).unwrap();
    assert_eq!(h.graph.input_source(other.node, other.port), None);
    assert_eq!(h.rt.root_link(), None);
}

#[test]
fn destroy_releases_everything_but_the_sink() {
    let mut h = Harness::new();
    h.frame(0.0);
    h.frame(1.2);
    assert!(h.graph.node_count() > 1);

    let mut commands = CommandBuffer::new();
    h.rt.destroy(&mut h.graph, &mut commands).unwrap();
    assert_eq!(commands.commands(), &[LifecycleCommand::Deactivated]);
    assert_eq!(h.graph.node_count(), 1);
    assert!(h.graph.exists(h.sink.node));
    assert_eq!(h.graph.connection_count(), 0);
    assert_eq!(h.graph.graph_count(), 1);
    assert!(h.rt.graph().is_none());
    assert!(h.rt.registry().pending_disposal().is_empty());
    assert!(!h.rt.is_activated());
}

#[test]
fn errored_leaf_gets_no_content_message() {
    let mut b = StateMachineDefinitionBuilder::new();
    let a = b.add_state("A", ContentId(9));
    b.add_enter_selector(a, None);
    let mut rt = StateMachineRuntime::new(b.build_shared().unwrap(), Config::default());
    let lib = ContentLibrary::new();
    let bb = Blackboard::new();
    let mut graph = MemoryRenderGraph::new();

    let mut commands = CommandBuffer::new();
    let mut aspect =
        StateMachineAspect::new(&mut rt, &lib, &bb, &mut commands, FrameTime::new(0.1, 1.0));
    aspect.pre_update().unwrap();
    aspect.update_render_graph(&mut graph, None).unwrap();

    let leaf = rt.frame_nodes()[1];
    let node = rt.registry().graph(leaf).unwrap().render.node.unwrap();
    let params = graph.params(node).unwrap();
    assert_eq!(params.content, None);
    assert!(params.time.is_some());
    assert!(rt.root_link().is_none());
}
