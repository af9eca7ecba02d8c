//! Per-frame traversal: advances time, takes transitions and records the frame's node list.
//!
//! The walk is depth-first over an explicit stack of `(node, dt)` contexts starting at the
//! root state machine. A state machine spends part of its budget on transitions and hands
//! the rest to its current node; a blend either completes (its target takes its place) or
//! forwards time to both sides; a leaf simply accumulates time.

use std::sync::Arc;

use crate::aspect::{CommandBuffer, LifecycleCommand};
use crate::blackboard::Blackboard;
use crate::builder::{create_blend_instance, create_state_instance};
use crate::condition::ConditionContext;
use crate::config::Config;
use crate::content::ContentResolver;
use crate::definition::{StateMachineDefinition, TransitionDefinition};
use crate::error::{ErrorCode, Result, StateMachineError};
use crate::ids::{NodeHandle, NodeKind};
use crate::instances::InstanceMut;
use crate::registry::NodeRegistry;
use crate::runtime::StateMachineRuntime;

/// Run one frame of scheduling for `runtime` with a budget of `dt` seconds.
pub fn pre_update(
    runtime: &mut StateMachineRuntime,
    content: &dyn ContentResolver,
    blackboard: &Blackboard,
    commands: &mut CommandBuffer,
    dt: f32,
) -> Result<()> {
    let root = runtime.root;
    let mut pass = Pass {
        registry: &mut runtime.registry,
        content,
        blackboard,
        config: &runtime.config,
    };
    let frame_nodes = &mut runtime.frame_nodes;
    frame_nodes.clear();

    let mut stack: Vec<(NodeHandle, f32)> = vec![(root, dt)];
    while let Some((handle, dt)) = stack.pop() {
        match pass.registry.kind(handle)? {
            NodeKind::StateMachine => {
                frame_nodes.push(handle);
                if pass.activate_if_needed(handle, dt)? && handle == root {
                    commands.push(LifecycleCommand::Activated);
                }
                let remaining = pass.search_transitions(handle, dt)?;
                let sm = pass.registry.state_machine_mut(handle)?;
                sm.accumulated_time += remaining;
                if let Some(current) = sm.current_state_node {
                    stack.push((current, remaining));
                }
            }
            NodeKind::Blend => match pass.advance_blend(handle, dt)? {
                BlendStep::Completed { target } => stack.push((target, dt)),
                BlendStep::Running {
                    source,
                    target,
                    source_dt,
                } => {
                    frame_nodes.push(handle);
                    // Source is visited first so the list follows input-port order.
                    stack.push((target, dt));
                    stack.push((source, source_dt));
                }
            },
            NodeKind::Graph => {
                frame_nodes.push(handle);
                let leaf = pass.registry.graph_mut(handle)?;
                leaf.time += dt;
                leaf.delta_time = dt;
            }
            NodeKind::Invalid => return Err(StateMachineError::StaleHandle { handle }),
        }
    }
    Ok(())
}

enum BlendStep {
    Completed {
        target: NodeHandle,
    },
    Running {
        source: NodeHandle,
        target: NodeHandle,
        source_dt: f32,
    },
}

struct Pass<'a> {
    registry: &'a mut NodeRegistry,
    content: &'a dyn ContentResolver,
    blackboard: &'a Blackboard,
    config: &'a Config,
}

impl Pass<'_> {
    fn conditions<'b>(
        &'b self,
        definition: &'b StateMachineDefinition,
        handle: NodeHandle,
    ) -> Result<ConditionContext<'b>> {
        let sm = self.registry.state_machine(handle)?;
        Ok(ConditionContext {
            definition,
            registry: &*self.registry,
            blackboard: self.blackboard,
            accumulated_time: sm.accumulated_time,
            current_node: sm.current_state_node,
        })
    }

    /// Run the enter selectors of a state machine that has never been activated. Returns
    /// whether activation happened.
    fn activate_if_needed(&mut self, handle: NodeHandle, dt: f32) -> Result<bool> {
        let sm = self.registry.state_machine(handle)?;
        if sm.is_initialized() {
            return Ok(false);
        }
        let definition = Arc::clone(&sm.definition);

        let selected = {
            let ctx = self.conditions(&definition, handle)?;
            let selectors = &definition.on_enter_selectors;
            selectors
                .iter()
                .filter(|t| !t.is_unconditional())
                .find(|t| ctx.evaluate(t.root_condition_index, dt) >= 0.0)
                .or_else(|| selectors.iter().find(|t| t.is_unconditional()))
                .map(|t| t.target_state_index)
        };

        let (state, error) = match selected {
            Some(state) => (state, None),
            None => {
                log::error!("state machine {handle}: no enter selector fired; entering state 0");
                (0, Some(ErrorCode::NoEnterSelectorTransition))
            }
        };

        let node = create_state_instance(self.registry, self.content, handle, &definition, state)?;
        let sm = self.registry.state_machine_mut(handle)?;
        sm.current_state = state;
        sm.current_state_node = Some(node);
        sm.accumulated_time = 0.0;
        if error.is_some() {
            sm.error = error;
        }
        log::debug!("state machine {handle} entered state {state}");
        Ok(true)
    }

    /// Take global then outgoing transitions; returns the unspent budget.
    fn search_transitions(&mut self, handle: NodeHandle, dt: f32) -> Result<f32> {
        let definition = Arc::clone(&self.registry.state_machine(handle)?.definition);
        let mut remaining = dt;

        let global = {
            let ctx = self.conditions(&definition, handle)?;
            let current = self.registry.state_machine(handle)?.current_state;
            earliest(
                &ctx,
                definition
                    .global_transitions
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.target_state_index != current),
                remaining,
            )
        };
        if let Some((index, fire_time)) = global {
            let transition = &definition.global_transitions[index];
            self.take_transition(handle, &definition, transition, fire_time)?;
            remaining = (remaining - fire_time).max(0.0);
        }

        let mut taken = vec![false; definition.outgoing_transitions.len()];
        let mut count = 0usize;
        let mut truncated = false;
        loop {
            let pick = {
                let ctx = self.conditions(&definition, handle)?;
                let state = self.registry.state_machine(handle)?.current_state;
                let range = definition.outgoing_range(state);
                let offset = range.start;
                earliest(
                    &ctx,
                    definition.outgoing_transitions[range].iter().enumerate(),
                    remaining,
                )
                .map(|(i, t)| (i + offset, t))
            };
            let Some((index, fire_time)) = pick else {
                break;
            };
            if taken[index] {
                log::warn!(
                    "state machine {handle}: transition {} repeated this frame; search stopped",
                    definition.outgoing_transitions[index].id.0
                );
                truncated = true;
                break;
            }
            if count >= self.config.max_transitions_per_frame {
                log::warn!(
                    "state machine {handle}: over {} transitions this frame; search stopped",
                    self.config.max_transitions_per_frame
                );
                truncated = true;
                break;
            }
            taken[index] = true;
            count += 1;

            let transition = &definition.outgoing_transitions[index];
            self.take_transition(handle, &definition, transition, fire_time)?;
            remaining = (remaining - fire_time).max(0.0);
        }
        self.registry.state_machine_mut(handle)?.search_truncated = truncated;
        Ok(remaining)
    }

    fn take_transition(
        &mut self,
        handle: NodeHandle,
        definition: &StateMachineDefinition,
        transition: &TransitionDefinition,
        fire_time: f32,
    ) -> Result<()> {
        let (previous_state, previous) = {
            let sm = self.registry.state_machine(handle)?;
            (sm.current_state, sm.current_state_node)
        };
        if let Some(previous) = previous {
            advance_subtree(self.registry, previous, fire_time)?;
        }

        let target = create_state_instance(
            self.registry,
            self.content,
            handle,
            definition,
            transition.target_state_index,
        )?;
        let current = match previous {
            Some(source) if transition.duration > self.config.blend_completion_epsilon => {
                create_blend_instance(self.registry, handle, source, target, transition.clone())
            }
            Some(source) => {
                self.registry.remove_recursive(source)?;
                target
            }
            None => target,
        };

        let sm = self.registry.state_machine_mut(handle)?;
        sm.current_state = transition.target_state_index;
        sm.current_state_node = Some(current);
        sm.accumulated_time = 0.0;
        log::debug!(
            "state machine {handle}: {previous_state} -> {} at {fire_time}s (duration {})",
            transition.target_state_index,
            transition.duration
        );
        Ok(())
    }

    fn advance_blend(&mut self, handle: NodeHandle, dt: f32) -> Result<BlendStep> {
        let epsilon = self.config.blend_completion_epsilon;
        let blend = self.registry.blend_mut(handle)?;
        blend.accumulated_time += dt;
        let duration = blend.transition.duration;

        if blend.accumulated_time < duration - epsilon {
            blend.weight = blend.accumulated_time.min(duration) / duration;
            let source_dt = if blend.transition.advance_source_during_transition {
                dt
            } else {
                0.0
            };
            return Ok(BlendStep::Running {
                source: blend.source,
                target: blend.target,
                source_dt,
            });
        }

        let (parent, source, target) = (blend.parent, blend.source, blend.target);
        match self.registry.resolve_mut(parent)? {
            InstanceMut::StateMachine(sm) => {
                if sm.current_state_node == Some(handle) {
                    sm.current_state_node = Some(target);
                }
            }
            InstanceMut::Blend(outer) => {
                if outer.source == handle {
                    outer.source = target;
                }
                if outer.target == handle {
                    outer.target = target;
                }
            }
            InstanceMut::Graph(_) => {}
        }
        if let Ok(inner) = self.registry.blend_mut(target) {
            inner.parent = parent;
        }
        self.registry.remove_recursive(source)?;
        self.registry.remove(handle)?;
        log::debug!("blend {handle} completed");
        Ok(BlendStep::Completed { target })
    }
}

/// Earliest firing transition; ties keep the first seen and a zero hit ends the scan.
fn earliest<'t>(
    ctx: &ConditionContext<'_>,
    transitions: impl Iterator<Item = (usize, &'t TransitionDefinition)>,
    dt: f32,
) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, transition) in transitions {
        let fire_time = ctx.evaluate_transition(transition, dt);
        if fire_time < 0.0 {
            continue;
        }
        if best.map_or(true, |(_, b)| fire_time < b) {
            best = Some((index, fire_time));
            if fire_time == 0.0 {
                break;
            }
        }
    }
    best
}

/// Move a sub-tree forward by `dt` without evaluating any of its transitions.
fn advance_subtree(registry: &mut NodeRegistry, root: NodeHandle, dt: f32) -> Result<()> {
    let mut stack = vec![root];
    while let Some(handle) = stack.pop() {
        match registry.resolve_mut(handle)? {
            InstanceMut::Graph(leaf) => leaf.time += dt,
            InstanceMut::Blend(blend) => {
                blend.accumulated_time += dt;
                stack.push(blend.target);
                if blend.transition.advance_source_during_transition {
                    stack.push(blend.source);
                }
            }
            InstanceMut::StateMachine(sm) => {
                sm.accumulated_time += dt;
                stack.extend(sm.current_state_node);
            }
        }
    }
    Ok(())
}
