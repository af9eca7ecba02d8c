//! Error types for the state-machine runtime.

use serde::{Deserialize, Serialize};

use crate::ids::{ContentId, NodeHandle, NodeKind};

/// Failures returned by runtime operations.
///
/// `StaleHandle` and `KindMismatch` are contract violations: a handle was held across a
/// structural change or pointed at the wrong kind of node. Everything that should not stop
/// playback is recorded as an [`ErrorCode`] on the instance instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StateMachineError {
    #[error("stale node handle {handle}")]
    StaleHandle { handle: NodeHandle },

    #[error("node {handle} is a {actual:?} node, expected {expected:?}")]
    KindMismatch {
        handle: NodeHandle,
        expected: NodeKind,
        actual: NodeKind,
    },

    #[error("state index {state} out of range (definition has {len} states)")]
    StateOutOfRange { state: i32, len: usize },

    #[error("invalid state machine definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("render graph error: {0}")]
    RenderGraph(#[from] RenderGraphError),
}

impl StateMachineError {
    pub fn invalid_definition(reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            reason: reason.into(),
        }
    }

    /// Contract violations that indicate a bug in the caller rather than bad data.
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::StaleHandle { .. } | Self::KindMismatch { .. })
    }
}

/// Failures reported by a [`RenderGraph`](crate::render_graph::RenderGraph) implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderGraphError {
    #[error("unknown render graph {0}")]
    UnknownGraph(u32),

    #[error("unknown render node {0}")]
    UnknownNode(u32),

    #[error("render node {node} has no port {port}")]
    InvalidPort { node: u32, port: u16 },

    #[error("input {port} of render node {node} is already connected")]
    InputOccupied { node: u32, port: u16 },

    #[error("input {port} of render node {node} is not connected to {source_node}")]
    NotConnected {
        node: u32,
        port: u16,
        source_node: u32,
    },
}

/// Non-fatal conditions recorded on an instance so a degraded state machine keeps running.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No enter selector fired and no default selector exists; state 0 was forced.
    NoEnterSelectorTransition,
    /// The content resolver does not know this content.
    ContentNotFound(ContentId),
    /// The content claims to be a state machine but carries no definition.
    MissingStateMachineDefinition(ContentId),
    /// The nested state machine is already playing further up the same tree.
    RecursiveStateMachine(ContentId),
}

pub type Result<T> = core::result::Result<T, StateMachineError>;
