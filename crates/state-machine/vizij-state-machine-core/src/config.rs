//! Core configuration for vizij-state-machine-core.

use serde::{Deserialize, Serialize};

/// Maximum number of outgoing transitions a single state machine may take in one frame.
pub const MAX_TRANSITIONS_PER_FRAME: usize = 10;

/// Smallest positive subnormal `f32`. Used both as the blend-completion tolerance and as
/// the "transition has a duration" threshold.
pub const BLEND_COMPLETION_EPSILON: f32 = 1.4e-45;

/// Runtime tuning shared by every state machine of an owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Safeguard bound for chained outgoing transitions within one frame.
    pub max_transitions_per_frame: usize,
    pub blend_completion_epsilon: f32,

    /// Initial capacity hint for registry slots and instance stores.
    pub initial_node_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_transitions_per_frame: MAX_TRANSITIONS_PER_FRAME,
            blend_completion_epsilon: BLEND_COMPLETION_EPSILON,
            initial_node_capacity: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_is_smallest_subnormal() {
        assert_eq!(BLEND_COMPLETION_EPSILON.to_bits(), 1);
        assert_eq!(Config::default().max_transitions_per_frame, 10);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = Config {
            max_transitions_per_frame: 4,
            ..Config::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize config");
        let back: Config = serde_json::from_str(&json).expect("deserialize config");
        assert_eq!(back, cfg);
    }
}
