//! Condition evaluation.
//!
//! Every condition answers "how far into this step do I become true?". A non-negative
//! result `t <= dt` fires `t` seconds into the step; a negative result means the condition
//! does not fire within the step.

use crate::blackboard::Blackboard;
use crate::definition::{ConditionKind, StateMachineDefinition, TransitionDefinition};
use crate::ids::{NodeHandle, NO_INDEX};
use crate::instances::{GraphInstance, InstanceRef};
use crate::registry::NodeRegistry;

/// Result of a condition that does not fire within the step.
pub const NEVER: f32 = -1.0;

/// Inputs a condition may read for one state machine.
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    pub definition: &'a StateMachineDefinition,
    pub registry: &'a NodeRegistry,
    pub blackboard: &'a Blackboard,
    /// Time already spent in the current state.
    pub accumulated_time: f32,
    pub current_node: Option<NodeHandle>,
}

impl<'a> ConditionContext<'a> {
    /// Fire time of a transition; unconditional transitions fire immediately.
    pub fn evaluate_transition(&self, transition: &TransitionDefinition, dt: f32) -> f32 {
        if transition.is_unconditional() {
            0.0
        } else {
            self.evaluate(transition.root_condition_index, dt)
        }
    }

    pub fn evaluate(&self, index: i32, dt: f32) -> f32 {
        self.evaluate_at_depth(index, dt, self.definition.condition_fragments.len())
    }

    /// `depth` bounds the recursion so a definition with a link cycle that skipped
    /// validation never fires instead of overflowing the stack.
    fn evaluate_at_depth(&self, index: i32, dt: f32, depth: usize) -> f32 {
        let Some(fragment) = usize::try_from(index)
            .ok()
            .and_then(|i| self.definition.condition_fragments.get(i))
        else {
            return NEVER;
        };
        let Some(depth) = depth.checked_sub(1) else {
            return NEVER;
        };

        match &fragment.kind {
            ConditionKind::GroupAnd { first_child } => {
                let mut latest = 0.0f32;
                for (child, _) in self.definition.children(*first_child) {
                    let t = self.evaluate_at_depth(child, dt, depth);
                    if t < 0.0 {
                        return NEVER;
                    }
                    latest = latest.max(t);
                }
                latest
            }
            ConditionKind::GroupOr { first_child } => {
                if *first_child == NO_INDEX {
                    return 0.0;
                }
                let mut earliest: Option<f32> = None;
                for (child, _) in self.definition.children(*first_child) {
                    let t = self.evaluate_at_depth(child, dt, depth);
                    if t == 0.0 {
                        return 0.0;
                    }
                    if t > 0.0 {
                        earliest = Some(earliest.map_or(t, |e| e.min(t)));
                    }
                }
                earliest.unwrap_or(NEVER)
            }
            ConditionKind::ElapsedTime { threshold } => {
                fire_within(threshold - self.accumulated_time, dt)
            }
            ConditionKind::EndOfDominantAnimation { margin } => {
                match dominant_leaf(self.registry, self.current_node) {
                    Some(leaf) if leaf.duration >= 0.0 => {
                        fire_within(leaf.duration - margin - leaf.time, dt)
                    }
                    _ => NEVER,
                }
            }
            ConditionKind::BlackboardValue {
                type_index,
                byte_offset,
                compare,
                value,
            } => match value.compare(self.blackboard, *type_index, *byte_offset, *compare) {
                Some(true) => 0.0,
                _ => NEVER,
            },
        }
    }
}

/// A threshold `remaining` seconds away fires within a step of `dt`; thresholds already
/// behind fire at the start of the step.
#[inline]
fn fire_within(remaining: f32, dt: f32) -> f32 {
    if remaining <= dt {
        remaining.max(0.0)
    } else {
        NEVER
    }
}

/// Follow blend targets and nested current states down to the active leaf.
pub fn dominant_leaf(
    registry: &NodeRegistry,
    start: Option<NodeHandle>,
) -> Option<&GraphInstance> {
    let mut node = start?;
    for _ in 0..=registry.live_count() {
        match registry.resolve(node).ok()? {
            InstanceRef::Graph(leaf) => return Some(leaf),
            InstanceRef::Blend(blend) => node = blend.target,
            InstanceRef::StateMachine(sm) => node = sm.current_state_node?,
        }
    }
    None
}
