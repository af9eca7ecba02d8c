//! Per-owner gameplay property snapshot read by blackboard conditions.
//!
//! Properties are grouped by a type index; each group is a flat little-endian byte buffer
//! and conditions address a value by byte offset. The host copies gameplay values in once
//! per frame before the scheduler runs.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Comparison applied by a blackboard condition.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl CompareOp {
    fn apply<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CompareOp::Equal => lhs == rhs,
            CompareOp::NotEqual => lhs != rhs,
            CompareOp::LessThan => lhs < rhs,
            CompareOp::LessOrEqual => lhs <= rhs,
            CompareOp::GreaterThan => lhs > rhs,
            CompareOp::GreaterOrEqual => lhs >= rhs,
        }
    }
}

/// Fixed operand of a blackboard condition; its variant selects how the stored bytes are read.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlackboardOperand {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl BlackboardOperand {
    /// Read the value at `offset` and compare it against this operand.
    /// Returns `None` when the value cannot be read or the comparison is unsupported.
    pub fn compare(
        &self,
        board: &Blackboard,
        type_index: u32,
        offset: u32,
        op: CompareOp,
    ) -> Option<bool> {
        match *self {
            BlackboardOperand::Bool(rhs) => {
                let lhs = board.read_bool(type_index, offset)?;
                match op {
                    CompareOp::Equal | CompareOp::NotEqual => Some(op.apply(lhs, rhs)),
                    _ => None,
                }
            }
            BlackboardOperand::Int(rhs) => Some(op.apply(board.read_i32(type_index, offset)?, rhs)),
            BlackboardOperand::Float(rhs) => {
                Some(op.apply(board.read_f32(type_index, offset)?, rhs))
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blackboard {
    buffers: HashMap<u32, Vec<u8>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole buffer for a type index.
    pub fn set_buffer(&mut self, type_index: u32, bytes: Vec<u8>) {
        self.buffers.insert(type_index, bytes);
    }

    pub fn buffer(&self, type_index: u32) -> Option<&[u8]> {
        self.buffers.get(&type_index).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    pub fn write_bool(&mut self, type_index: u32, offset: u32, value: bool) {
        self.write_bytes(type_index, offset, &[u8::from(value)]);
    }

    pub fn write_i32(&mut self, type_index: u32, offset: u32, value: i32) {
        self.write_bytes(type_index, offset, &value.to_le_bytes());
    }

    pub fn write_f32(&mut self, type_index: u32, offset: u32, value: f32) {
        self.write_bytes(type_index, offset, &value.to_le_bytes());
    }

    pub fn read_bool(&self, type_index: u32, offset: u32) -> Option<bool> {
        self.read_bytes::<1>(type_index, offset).map(|b| b[0] != 0)
    }

    pub fn read_i32(&self, type_index: u32, offset: u32) -> Option<i32> {
        self.read_bytes::<4>(type_index, offset).map(i32::from_le_bytes)
    }

    pub fn read_f32(&self, type_index: u32, offset: u32) -> Option<f32> {
        self.read_bytes::<4>(type_index, offset).map(f32::from_le_bytes)
    }

    fn write_bytes(&mut self, type_index: u32, offset: u32, bytes: &[u8]) {
        let buf = self.buffers.entry(type_index).or_default();
        let start = offset as usize;
        let end = start + bytes.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(bytes);
    }

    fn read_bytes<const N: usize>(&self, type_index: u32, offset: u32) -> Option<[u8; N]> {
        let buf = self.buffers.get(&type_index)?;
        let start = offset as usize;
        let slice = buf.get(start..start.checked_add(N)?)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Some(out)
    }
}
