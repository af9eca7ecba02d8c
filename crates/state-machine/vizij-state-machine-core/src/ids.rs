//! Identifiers for registry slots, animation content and transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel used by the flat definition arrays for "no index".
pub const NO_INDEX: i32 = -1;

/// Generational handle into a [`NodeRegistry`](crate::registry::NodeRegistry).
///
/// A handle only resolves while the slot at `index` still carries `version`.
/// Removing a node bumps the slot version, so every handle obtained before the
/// removal goes stale even if the slot is later reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub index: u32,
    pub version: u32,
}

impl NodeHandle {
    #[inline]
    pub const fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    /// Whether this handle addresses slot 0, where a runtime places its root state machine.
    #[inline]
    pub fn is_root_slot(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@v{}", self.index, self.version)
    }
}

/// Kind stored in a registry slot. `Invalid` marks a free slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[default]
    Invalid,
    Graph,
    Blend,
    StateMachine,
}

/// Animation content referenced by a state (a clip or a nested state machine).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub u32);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content:{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub u32);

/// Monotonic allocator for transition ids handed out by the definition builder.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_transition: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_transition(&mut self) -> TransitionId {
        let id = TransitionId(self.next_transition);
        self.next_transition = self.next_transition.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_transition(), TransitionId(0));
        assert_eq!(alloc.alloc_transition(), TransitionId(1));
    }

    #[test]
    fn handle_display_includes_version() {
        assert_eq!(NodeHandle::new(3, 7).to_string(), "#3@v7");
    }
}
