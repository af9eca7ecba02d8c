//! Immutable state-machine definition blob.
//!
//! Everything is stored in flat arrays linked by `i32` indices (`NO_INDEX` terminates a
//! link), so a definition can be shared by any number of live instances through an `Arc`
//! and serialized as-is. Definitions are normally produced by
//! [`StateMachineDefinitionBuilder`](crate::builder::StateMachineDefinitionBuilder).

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::blackboard::{BlackboardOperand, CompareOp};
use crate::error::{Result, StateMachineError};
use crate::ids::{ContentId, TransitionId, NO_INDEX};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub name: String,
    /// Clip or nested state machine played while this state is active.
    pub content: ContentId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub id: TransitionId,
    /// `NO_INDEX` for enter selectors and global transitions.
    pub source_state_index: i32,
    pub target_state_index: i32,
    /// `NO_INDEX` means unconditional (and marks the default enter selector).
    pub root_condition_index: i32,
    /// Crossfade duration in seconds; zero switches instantly.
    pub duration: f32,
    pub advance_source_during_transition: bool,
}

impl TransitionDefinition {
    #[inline]
    pub fn is_unconditional(&self) -> bool {
        self.root_condition_index == NO_INDEX
    }
}

/// Payload of one condition node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConditionKind {
    GroupAnd {
        first_child: i32,
    },
    GroupOr {
        first_child: i32,
    },
    ElapsedTime {
        threshold: f32,
    },
    EndOfDominantAnimation {
        margin: f32,
    },
    BlackboardValue {
        type_index: u32,
        byte_offset: u32,
        compare: CompareOp,
        value: BlackboardOperand,
    },
}

/// One node of the condition forest. Children of a group form a singly linked sibling list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionFragment {
    pub kind: ConditionKind,
    pub next_sibling_condition_index: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub states: Vec<StateDefinition>,
    pub on_enter_selectors: Vec<TransitionDefinition>,
    pub global_transitions: Vec<TransitionDefinition>,
    /// Sorted by `source_state_index`.
    pub outgoing_transitions: Vec<TransitionDefinition>,
    /// First index into `outgoing_transitions` for each state.
    pub outgoing_transitions_start_indices: Vec<u32>,
    pub condition_fragments: Vec<ConditionFragment>,
}

impl StateMachineDefinition {
    #[inline]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: i32) -> Result<&StateDefinition> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.states.get(i))
            .ok_or(StateMachineError::StateOutOfRange {
                state: index,
                len: self.states.len(),
            })
    }

    pub fn state_index(&self, name: &str) -> Option<i32> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(|i| i as i32)
    }

    /// Range of `outgoing_transitions` leaving `state`.
    pub fn outgoing_range(&self, state: i32) -> Range<usize> {
        let Ok(state) = usize::try_from(state) else {
            return 0..0;
        };
        let total = self.outgoing_transitions.len();
        let start = self
            .outgoing_transitions_start_indices
            .get(state)
            .map_or(total, |&s| (s as usize).min(total));
        let end = self
            .outgoing_transitions_start_indices
            .get(state + 1)
            .map_or(total, |&s| (s as usize).min(total));
        start..end.max(start)
    }

    pub fn outgoing(&self, state: i32) -> &[TransitionDefinition] {
        &self.outgoing_transitions[self.outgoing_range(state)]
    }

    /// Iterate the direct children of a group fragment.
    pub fn children(&self, first_child: i32) -> ConditionChildren<'_> {
        ConditionChildren {
            fragments: &self.condition_fragments,
            next: first_child,
            remaining: self.condition_fragments.len(),
        }
    }

    /// Structural validation of indices and ordering.
    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(StateMachineError::invalid_definition(
                "a state machine needs at least one state",
            ));
        }
        if self.outgoing_transitions_start_indices.len() != self.states.len() {
            return Err(StateMachineError::invalid_definition(format!(
                "expected {} outgoing start indices, found {}",
                self.states.len(),
                self.outgoing_transitions_start_indices.len()
            )));
        }

        let state_count = self.states.len() as i32;
        let fragment_count = self.condition_fragments.len() as i32;
        let check_state = |what: &str, idx: i32| -> Result<()> {
            if (0..state_count).contains(&idx) {
                Ok(())
            } else {
                Err(StateMachineError::invalid_definition(format!(
                    "{what} state index {idx} out of range"
                )))
            }
        };
        let check_fragment = |what: &str, idx: i32| -> Result<()> {
            if idx == NO_INDEX || (0..fragment_count).contains(&idx) {
                Ok(())
            } else {
                Err(StateMachineError::invalid_definition(format!(
                    "{what} condition index {idx} out of range"
                )))
            }
        };

        for t in self
            .on_enter_selectors
            .iter()
            .chain(&self.global_transitions)
            .chain(&self.outgoing_transitions)
        {
            check_state("target", t.target_state_index)?;
            check_fragment("root", t.root_condition_index)?;
            if t.duration.is_nan() || t.duration < 0.0 {
                return Err(StateMachineError::invalid_definition(format!(
                    "transition {:?} has invalid duration {}",
                    t.id, t.duration
                )));
            }
        }

        let mut previous = 0;
        for t in &self.outgoing_transitions {
            check_state("source", t.source_state_index)?;
            if t.source_state_index < previous {
                return Err(StateMachineError::invalid_definition(
                    "outgoing transitions are not sorted by source state",
                ));
            }
            previous = t.source_state_index;
        }
        for state in 0..state_count {
            let range = self.outgoing_range(state);
            if self.outgoing_transitions[range]
                .iter()
                .any(|t| t.source_state_index != state)
            {
                return Err(StateMachineError::invalid_definition(format!(
                    "outgoing start indices do not partition state {state}"
                )));
            }
        }

        // Every fragment may be linked at most once, either as a group child or a sibling.
        let mut linked = vec![false; self.condition_fragments.len()];
        let mut linked_from = vec![NO_INDEX; self.condition_fragments.len()];
        for (i, frag) in self.condition_fragments.iter().enumerate() {
            check_fragment("sibling", frag.next_sibling_condition_index)?;
            let first_child = match frag.kind {
                ConditionKind::GroupAnd { first_child }
                | ConditionKind::GroupOr { first_child } => {
                    check_fragment("child", first_child)?;
                    first_child
                }
                _ => NO_INDEX,
            };
            for link in [first_child, frag.next_sibling_condition_index] {
                if link == NO_INDEX {
                    continue;
                }
                if link as usize == i || std::mem::replace(&mut linked[link as usize], true) {
                    return Err(StateMachineError::invalid_definition(format!(
                        "condition fragment {link} is linked more than once"
                    )));
                }
                linked_from[link as usize] = i as i32;
            }
        }

        // With at most one incoming link per fragment, a cycle shows up as a walk back
        // along `linked_from` that returns to a fragment of the same walk.
        const UNSEEN: u8 = 0;
        const ON_WALK: u8 = 1;
        const DONE: u8 = 2;
        let mut mark = vec![UNSEEN; self.condition_fragments.len()];
        let mut walk = Vec::new();
        for start in 0..self.condition_fragments.len() {
            let mut at = start as i32;
            while at != NO_INDEX && mark[at as usize] == UNSEEN {
                mark[at as usize] = ON_WALK;
                walk.push(at as usize);
                at = linked_from[at as usize];
            }
            if at != NO_INDEX && mark[at as usize] == ON_WALK {
                return Err(StateMachineError::invalid_definition(format!(
                    "condition fragment {at} is part of a link cycle"
                )));
            }
            for visited in walk.drain(..) {
                mark[visited] = DONE;
            }
        }
        Ok(())
    }
}

/// Iterator over `(index, fragment)` pairs of a sibling chain.
pub struct ConditionChildren<'a> {
    fragments: &'a [ConditionFragment],
    next: i32,
    remaining: usize,
}

impl<'a> Iterator for ConditionChildren<'a> {
    type Item = (i32, &'a ConditionFragment);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_INDEX || self.remaining == 0 {
            return None;
        }
        let index = self.next;
        let fragment = self.fragments.get(usize::try_from(index).ok()?)?;
        self.next = fragment.next_sibling_condition_index;
        self.remaining -= 1;
        Some((index, fragment))
    }
}
