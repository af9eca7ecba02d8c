use serde::Deserialize;

use crate::blackboard::{BlackboardOperand, CompareOp};
use crate::builder::{StateMachineDefinitionBuilder, TransitionParams};
use crate::definition::StateMachineDefinition;
use crate::error::{Result, StateMachineError};
use crate::ids::ContentId;

/// Public API: parse an authored state-machine JSON document into a flat
/// [`StateMachineDefinition`].
///
/// Notes:
/// - States, transitions and selectors reference states by name.
/// - Condition trees are nested in the JSON and flattened into sibling-linked fragments.
/// - A selector or transition without `condition` is unconditional; an enter selector
///   without one is the default selector.
/// - Durations are in seconds.
pub fn parse_state_machine_json(s: &str) -> Result<StateMachineDefinition> {
    let stored: StoredStateMachine =
        serde_json::from_str(s).map_err(|e| StateMachineError::Parse(e.to_string()))?;

    let mut builder = StateMachineDefinitionBuilder::new();
    for state in &stored.states {
        if count_states_named(&stored, &state.name) > 1 {
            return Err(StateMachineError::invalid_definition(format!(
                "duplicate state name '{}'",
                state.name
            )));
        }
        builder.add_state(state.name.clone(), ContentId(state.content));
    }
    let lookup = |name: &str| -> Result<i32> {
        stored
            .states
            .iter()
            .position(|s| s.name == name)
            .map(|i| i as i32)
            .ok_or_else(|| StateMachineError::invalid_definition(format!("unknown state '{name}'")))
    };

    for selector in &stored.enter_selectors {
        let target = lookup(&selector.target)?;
        let condition = flatten_optional(&mut builder, selector.condition.as_ref())?;
        builder.add_enter_selector(target, condition);
    }
    for global in &stored.global_transitions {
        let target = lookup(&global.to)?;
        let condition = flatten_optional(&mut builder, global.condition.as_ref())?;
        builder.add_global_transition(target, condition, global.params());
    }
    for transition in &stored.transitions {
        let from = transition.from.as_deref().ok_or_else(|| {
            StateMachineError::invalid_definition(format!(
                "transition to '{}' is missing 'from'",
                transition.to
            ))
        })?;
        let source = lookup(from)?;
        let target = lookup(&transition.to)?;
        let condition = flatten_optional(&mut builder, transition.condition.as_ref())?;
        builder.add_transition(source, target, condition, transition.params());
    }

    log::debug!(
        "parsed state machine '{}' ({} states)",
        stored.name.as_deref().unwrap_or("<unnamed>"),
        stored.states.len()
    );
    builder.build()
}

fn count_states_named(stored: &StoredStateMachine, name: &str) -> usize {
    stored.states.iter().filter(|s| s.name == name).count()
}

fn flatten_optional(
    builder: &mut StateMachineDefinitionBuilder,
    condition: Option<&StoredCondition>,
) -> Result<Option<i32>> {
    condition.map(|c| flatten(builder, c)).transpose()
}

/// Children are flattened before their group so each group links finished fragments.
fn flatten(
    builder: &mut StateMachineDefinitionBuilder,
    condition: &StoredCondition,
) -> Result<i32> {
    match condition {
        StoredCondition::And { children } => {
            let ids = flatten_children(builder, children)?;
            builder.group_and(&ids)
        }
        StoredCondition::Or { children } => {
            let ids = flatten_children(builder, children)?;
            builder.group_or(&ids)
        }
        StoredCondition::ElapsedTime { threshold } => Ok(builder.elapsed_time(*threshold)),
        StoredCondition::EndOfDominantAnimation { margin } => {
            Ok(builder.end_of_dominant_animation(*margin))
        }
        StoredCondition::Blackboard {
            type_index,
            offset,
            op,
            value,
        } => Ok(builder.blackboard_value(*type_index, *offset, *op, *value)),
    }
}

fn flatten_children(
    builder: &mut StateMachineDefinitionBuilder,
    children: &[StoredCondition],
) -> Result<Vec<i32>> {
    children.iter().map(|c| flatten(builder, c)).collect()
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredStateMachine {
    #[serde(default)]
    name: Option<String>,
    states: Vec<StoredState>,
    #[serde(default)]
    enter_selectors: Vec<StoredSelector>,
    #[serde(default)]
    global_transitions: Vec<StoredTransition>,
    #[serde(default)]
    transitions: Vec<StoredTransition>,
}

#[derive(Debug, Deserialize)]
struct StoredState {
    name: String,
    content: u32,
}

#[derive(Debug, Deserialize)]
struct StoredSelector {
    target: String,
    #[serde(default)]
    condition: Option<StoredCondition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTransition {
    #[serde(default)]
    from: Option<String>,
    to: String,
    #[serde(default)]
    condition: Option<StoredCondition>,
    #[serde(default)]
    duration: f32,
    #[serde(default = "default_advance_source")]
    advance_source: bool,
}

fn default_advance_source() -> bool {
    true
}

impl StoredTransition {
    fn params(&self) -> TransitionParams {
        TransitionParams {
            duration: self.duration,
            advance_source_during_transition: self.advance_source,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum StoredCondition {
    And {
        #[serde(default)]
        children: Vec<StoredCondition>,
    },
    Or {
        #[serde(default)]
        children: Vec<StoredCondition>,
    },
    ElapsedTime {
        threshold: f32,
    },
    EndOfDominantAnimation {
        #[serde(default)]
        margin: f32,
    },
    #[serde(rename_all = "camelCase")]
    Blackboard {
        type_index: u32,
        offset: u32,
        op: CompareOp,
        value: BlackboardOperand,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ConditionKind;

    const WALK_RUN: &str = r#"{
        "name": "locomotion",
        "states": [
            { "name": "Idle", "content": 1 },
            { "name": "Walk", "content": 2 }
        ],
        "enterSelectors": [ { "target": "Idle" } ],
        "transitions": [
            {
                "from": "Idle", "to": "Walk", "duration": 0.25,
                "condition": { "type": "or", "children": [
                    { "type": "elapsedTime", "threshold": 2.0 },
                    { "type": "blackboard", "typeIndex": 0, "offset": 4,
                      "op": "greaterThan", "value": 0.5 }
                ] }
            },
            { "from": "Walk", "to": "Idle", "advanceSource": false,
              "condition": { "type": "endOfDominantAnimation" } }
        ]
    }"#;

    #[test]
    fn parses_nested_conditions() {
        let def = parse_state_machine_json(WALK_RUN).expect("parse");
        assert_eq!(def.state_count(), 2);
        assert_eq!(def.state_index("Walk"), Some(1));
        assert_eq!(def.on_enter_selectors.len(), 1);
        assert!(def.on_enter_selectors[0].is_unconditional());

        let idle_out = def.outgoing(0);
        assert_eq!(idle_out.len(), 1);
        assert_eq!(idle_out[0].duration, 0.25);
        let root = &def.condition_fragments[idle_out[0].root_condition_index as usize];
        let first_child = match root.kind {
            ConditionKind::GroupOr { first_child } => first_child,
            ref other => panic!("expected or-group, got {other:?}"),
        };
        assert_eq!(def.children(first_child).count(), 2);

        let walk_out = def.outgoing(1);
        assert!(!walk_out[0].advance_source_during_transition);
    }

    #[test]
    fn unknown_state_is_rejected() {
        let json = r#"{ "states": [ { "name": "A", "content": 0 } ],
                        "transitions": [ { "from": "A", "to": "Nope" } ] }"#;
        assert!(matches!(
            parse_state_machine_json(json),
            Err(StateMachineError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse_state_machine_json("{ \"states\": 3 }"),
            Err(StateMachineError::Parse(_))
        ));
    }
}
