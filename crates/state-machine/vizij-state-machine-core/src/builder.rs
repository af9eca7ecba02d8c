//! Construction of definition blobs and of live instances.

use std::sync::Arc;

use crate::blackboard::{BlackboardOperand, CompareOp};
use crate::content::ContentResolver;
use crate::definition::{
    ConditionFragment, ConditionKind, StateDefinition, StateMachineDefinition,
    TransitionDefinition,
};
use crate::error::{ErrorCode, Result, StateMachineError};
use crate::ids::{ContentId, IdAllocator, NodeHandle, NO_INDEX};
use crate::instances::{BlendInstance, GraphInstance, Instance, StateMachineInstance};
use crate::registry::NodeRegistry;

/// Timing options shared by every kind of transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionParams {
    pub duration: f32,
    pub advance_source_during_transition: bool,
}

impl Default for TransitionParams {
    fn default() -> Self {
        Self {
            duration: 0.0,
            advance_source_during_transition: true,
        }
    }
}

impl TransitionParams {
    pub fn crossfade(duration: f32) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }
}

/// Assembles a [`StateMachineDefinition`] from in-memory pieces.
///
/// Condition constructors return the fragment index to pass as a transition's root
/// condition or as a group child. Each fragment can be used once.
#[derive(Debug, Default)]
pub struct StateMachineDefinitionBuilder {
    ids: IdAllocator,
    states: Vec<StateDefinition>,
    enter_selectors: Vec<TransitionDefinition>,
    global_transitions: Vec<TransitionDefinition>,
    outgoing: Vec<TransitionDefinition>,
    fragments: Vec<ConditionFragment>,
}

impl StateMachineDefinitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, name: impl Into<String>, content: ContentId) -> i32 {
        self.states.push(StateDefinition {
            name: name.into(),
            content,
        });
        self.states.len() as i32 - 1
    }

    fn push_fragment(&mut self, kind: ConditionKind) -> i32 {
        self.fragments.push(ConditionFragment {
            kind,
            next_sibling_condition_index: NO_INDEX,
        });
        self.fragments.len() as i32 - 1
    }

    pub fn elapsed_time(&mut self, threshold: f32) -> i32 {
        self.push_fragment(ConditionKind::ElapsedTime { threshold })
    }

    pub fn end_of_dominant_animation(&mut self, margin: f32) -> i32 {
        self.push_fragment(ConditionKind::EndOfDominantAnimation { margin })
    }

    pub fn blackboard_value(
        &mut self,
        type_index: u32,
        byte_offset: u32,
        compare: CompareOp,
        value: BlackboardOperand,
    ) -> i32 {
        self.push_fragment(ConditionKind::BlackboardValue {
            type_index,
            byte_offset,
            compare,
            value,
        })
    }

    pub fn group_and(&mut self, children: &[i32]) -> Result<i32> {
        let first_child = self.link_siblings(children)?;
        Ok(self.push_fragment(ConditionKind::GroupAnd { first_child }))
    }

    pub fn group_or(&mut self, children: &[i32]) -> Result<i32> {
        let first_child = self.link_siblings(children)?;
        Ok(self.push_fragment(ConditionKind::GroupOr { first_child }))
    }

    fn link_siblings(&mut self, children: &[i32]) -> Result<i32> {
        for &c in children {
            let ok = usize::try_from(c)
                .ok()
                .and_then(|i| self.fragments.get(i))
                .is_some_and(|f| f.next_sibling_condition_index == NO_INDEX);
            if !ok {
                return Err(StateMachineError::invalid_definition(format!(
                    "condition {c} is unknown or already linked"
                )));
            }
        }
        for pair in children.windows(2) {
            self.fragments[pair[0] as usize].next_sibling_condition_index = pair[1];
        }
        Ok(children.first().copied().unwrap_or(NO_INDEX))
    }

    fn transition(
        &mut self,
        source: i32,
        target: i32,
        condition: Option<i32>,
        params: TransitionParams,
    ) -> TransitionDefinition {
        TransitionDefinition {
            id: self.ids.alloc_transition(),
            source_state_index: source,
            target_state_index: target,
            root_condition_index: condition.unwrap_or(NO_INDEX),
            duration: params.duration,
            advance_source_during_transition: params.advance_source_during_transition,
        }
    }

    /// Selector evaluated on first activation. `None` registers the default selector.
    pub fn add_enter_selector(&mut self, target: i32, condition: Option<i32>) -> &mut Self {
        let t = self.transition(NO_INDEX, target, condition, TransitionParams::default());
        self.enter_selectors.push(t);
        self
    }

    /// Transition evaluated from every state except its own target.
    pub fn add_global_transition(
        &mut self,
        target: i32,
        condition: Option<i32>,
        params: TransitionParams,
    ) -> &mut Self {
        let t = self.transition(NO_INDEX, target, condition, params);
        self.global_transitions.push(t);
        self
    }

    pub fn add_transition(
        &mut self,
        source: i32,
        target: i32,
        condition: Option<i32>,
        params: TransitionParams,
    ) -> &mut Self {
        let t = self.transition(source, target, condition, params);
        self.outgoing.push(t);
        self
    }

    /// Sort outgoing transitions by source, compute the per-state start indices and validate.
    pub fn build(self) -> Result<StateMachineDefinition> {
        let mut outgoing = self.outgoing;
        // Stable: declaration order is evaluation order within a state.
        outgoing.sort_by_key(|t| t.source_state_index);

        let mut starts = Vec::with_capacity(self.states.len());
        let mut cursor = 0usize;
        for state in 0..self.states.len() as i32 {
            while cursor < outgoing.len() && outgoing[cursor].source_state_index < state {
                cursor += 1;
            }
            starts.push(cursor as u32);
        }

        let definition = StateMachineDefinition {
            states: self.states,
            on_enter_selectors: self.enter_selectors,
            global_transitions: self.global_transitions,
            outgoing_transitions: outgoing,
            outgoing_transitions_start_indices: starts,
            condition_fragments: self.fragments,
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn build_shared(self) -> Result<Arc<StateMachineDefinition>> {
        self.build().map(Arc::new)
    }
}

/// Allocate a fresh, not yet activated state-machine instance.
pub fn create_state_machine_instance(
    registry: &mut NodeRegistry,
    definition: Arc<StateMachineDefinition>,
) -> NodeHandle {
    registry.allocate(Instance::StateMachine(StateMachineInstance::new(definition)))
}

/// Allocate the instance playing `state` of `definition` for the state machine `owner`:
/// a nested state machine when the content is one, otherwise a leaf. Unresolvable content,
/// and a nested definition already playing among `owner`'s ancestors, still yield a leaf,
/// tagged with an [`ErrorCode`] and an unknown duration.
pub fn create_state_instance(
    registry: &mut NodeRegistry,
    content: &dyn ContentResolver,
    owner: NodeHandle,
    definition: &StateMachineDefinition,
    state: i32,
) -> Result<NodeHandle> {
    let content_id = definition.state(state)?.content;
    let mut leaf = GraphInstance::new(content_id, -1.0);

    match content.try_get_animation_asset(content_id) {
        Some(asset) if asset.is_state_machine => match asset.definition {
            Some(nested) if asset.has_state_machine_definition => {
                if plays_among_owners(registry, owner, &nested) {
                    log::error!("{content_id} nests a state machine inside itself");
                    leaf.error = Some(ErrorCode::RecursiveStateMachine(content_id));
                } else {
                    let mut instance = StateMachineInstance::new(nested);
                    instance.owner = Some(owner);
                    return Ok(registry.allocate(Instance::StateMachine(instance)));
                }
            }
            _ => {
                log::error!("{content_id} is a state machine without a definition");
                leaf.error = Some(ErrorCode::MissingStateMachineDefinition(content_id));
            }
        },
        Some(asset) => leaf.duration = asset.single_animation_duration,
        None => {
            log::error!("{content_id} could not be resolved for state {state}");
            leaf.error = Some(ErrorCode::ContentNotFound(content_id));
        }
    }
    Ok(registry.allocate(Instance::Graph(leaf)))
}

/// Whether `nested` is the definition of `owner` or of any state machine above it.
fn plays_among_owners(
    registry: &NodeRegistry,
    owner: NodeHandle,
    nested: &Arc<StateMachineDefinition>,
) -> bool {
    let mut next = Some(owner);
    for _ in 0..=registry.live_count() {
        let Some(handle) = next else {
            return false;
        };
        let Ok(sm) = registry.state_machine(handle) else {
            return false;
        };
        if Arc::ptr_eq(&sm.definition, nested) || *sm.definition == **nested {
            return true;
        }
        next = sm.owner;
    }
    // A longer chain than there are live nodes can only be a loop.
    true
}

/// Wrap `source` and `target` in a blend owned by `parent`.
pub fn create_blend_instance(
    registry: &mut NodeRegistry,
    parent: NodeHandle,
    source: NodeHandle,
    target: NodeHandle,
    transition: TransitionDefinition,
) -> NodeHandle {
    let handle = registry.allocate(Instance::Blend(BlendInstance::new(
        parent, source, target, transition,
    )));
    // A blend being faded out now belongs to the new blend.
    if let Ok(inner) = registry.blend_mut(source) {
        inner.parent = handle;
    }
    handle
}
