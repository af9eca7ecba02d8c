//! Generational node arena.
//!
//! Slots map a [`NodeHandle`] to a dense index into one of three per-kind stores. Stores
//! are kept dense with ordered removal: removing an element shifts the later ones down and
//! every slot of the same kind pointing past it is decremented, so store order always
//! matches insertion order.
//!
//! A single version counter is bumped on every structural change. New slots are stamped
//! with it and removed slots are restamped, which makes every handle issued before a
//! removal stale and guarantees a reused slot carries a strictly greater version.

use crate::error::{Result, StateMachineError};
use crate::ids::{NodeHandle, NodeKind};
use crate::instances::{
    BlendInstance, GraphInstance, Instance, InstanceMut, InstanceRef, StateMachineInstance,
};
use crate::render_graph::RenderNodeId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeSlot {
    pub kind: NodeKind,
    pub version: u32,
    pub store_index: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeRegistry {
    slots: Vec<NodeSlot>,
    graphs: Vec<GraphInstance>,
    blends: Vec<BlendInstance>,
    state_machines: Vec<StateMachineInstance>,
    version: u32,
    // Render nodes of removed instances, destroyed by the next reconciliation.
    pending_disposal: Vec<RenderNodeId>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            graphs: Vec::with_capacity(capacity),
            blends: Vec::with_capacity(capacity),
            state_machines: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Current structural version.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// All slots, including free ones.
    pub fn slots(&self) -> &[NodeSlot] {
        &self.slots
    }

    pub fn live_count(&self) -> usize {
        self.graphs.len() + self.blends.len() + self.state_machines.len()
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Invalid => self.slots.iter().filter(|s| s.kind == kind).count(),
            NodeKind::Graph => self.graphs.len(),
            NodeKind::Blend => self.blends.len(),
            NodeKind::StateMachine => self.state_machines.len(),
        }
    }

    /// Store `instance` in the first free slot, or a new one.
    pub fn allocate(&mut self, instance: Instance) -> NodeHandle {
        self.version += 1;
        let kind = instance.kind();
        let store_index = match instance {
            Instance::Graph(g) => {
                self.graphs.push(g);
                self.graphs.len() - 1
            }
            Instance::Blend(b) => {
                self.blends.push(b);
                self.blends.len() - 1
            }
            Instance::StateMachine(sm) => {
                self.state_machines.push(sm);
                self.state_machines.len() - 1
            }
        };
        let slot = NodeSlot {
            kind,
            version: self.version,
            store_index: store_index as u32,
        };
        let index = match self.slots.iter().position(|s| s.kind == NodeKind::Invalid) {
            Some(free) => {
                self.slots[free] = slot;
                free
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        NodeHandle::new(index as u32, self.version)
    }

    fn slot(&self, handle: NodeHandle) -> Result<NodeSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.kind != NodeKind::Invalid && s.version == handle.version)
            .copied()
            .ok_or(StateMachineError::StaleHandle { handle })
    }

    #[inline]
    pub fn is_valid(&self, handle: NodeHandle) -> bool {
        self.slot(handle).is_ok()
    }

    pub fn kind(&self, handle: NodeHandle) -> Result<NodeKind> {
        self.slot(handle).map(|s| s.kind)
    }

    pub fn resolve(&self, handle: NodeHandle) -> Result<InstanceRef<'_>> {
        let slot = self.slot(handle)?;
        let i = slot.store_index as usize;
        Ok(match slot.kind {
            NodeKind::Graph => InstanceRef::Graph(&self.graphs[i]),
            NodeKind::Blend => InstanceRef::Blend(&self.blends[i]),
            NodeKind::StateMachine => InstanceRef::StateMachine(&self.state_machines[i]),
            NodeKind::Invalid => return Err(StateMachineError::StaleHandle { handle }),
        })
    }

    pub fn resolve_mut(&mut self, handle: NodeHandle) -> Result<InstanceMut<'_>> {
        let slot = self.slot(handle)?;
        let i = slot.store_index as usize;
        Ok(match slot.kind {
            NodeKind::Graph => InstanceMut::Graph(&mut self.graphs[i]),
            NodeKind::Blend => InstanceMut::Blend(&mut self.blends[i]),
            NodeKind::StateMachine => InstanceMut::StateMachine(&mut self.state_machines[i]),
            NodeKind::Invalid => return Err(StateMachineError::StaleHandle { handle }),
        })
    }

    fn store_index(&self, handle: NodeHandle, expected: NodeKind) -> Result<usize> {
        let slot = self.slot(handle)?;
        if slot.kind != expected {
            return Err(StateMachineError::KindMismatch {
                handle,
                expected,
                actual: slot.kind,
            });
        }
        Ok(slot.store_index as usize)
    }

    pub fn graph(&self, handle: NodeHandle) -> Result<&GraphInstance> {
        let i = self.store_index(handle, NodeKind::Graph)?;
        Ok(&self.graphs[i])
    }

    pub fn graph_mut(&mut self, handle: NodeHandle) -> Result<&mut GraphInstance> {
        let i = self.store_index(handle, NodeKind::Graph)?;
        Ok(&mut self.graphs[i])
    }

    pub fn blend(&self, handle: NodeHandle) -> Result<&BlendInstance> {
        let i = self.store_index(handle, NodeKind::Blend)?;
        Ok(&self.blends[i])
    }

    pub fn blend_mut(&mut self, handle: NodeHandle) -> Result<&mut BlendInstance> {
        let i = self.store_index(handle, NodeKind::Blend)?;
        Ok(&mut self.blends[i])
    }

    pub fn state_machine(&self, handle: NodeHandle) -> Result<&StateMachineInstance> {
        let i = self.store_index(handle, NodeKind::StateMachine)?;
        Ok(&self.state_machines[i])
    }

    pub fn state_machine_mut(&mut self, handle: NodeHandle) -> Result<&mut StateMachineInstance> {
        let i = self.store_index(handle, NodeKind::StateMachine)?;
        Ok(&mut self.state_machines[i])
    }

    /// Child nodes of `handle` in input-port order.
    pub fn children(&self, handle: NodeHandle) -> Result<[Option<NodeHandle>; 2]> {
        self.resolve(handle).map(|r| r.inputs())
    }

    /// Remove a single node. Its children are left untouched; its render node is queued
    /// for disposal.
    pub fn remove(&mut self, handle: NodeHandle) -> Result<Instance> {
        let slot = self.slot(handle)?;
        self.version += 1;
        self.slots[handle.index as usize] = NodeSlot {
            kind: NodeKind::Invalid,
            version: self.version,
            store_index: 0,
        };

        let removed = slot.store_index as usize;
        let instance = match slot.kind {
            NodeKind::Graph => Instance::Graph(self.graphs.remove(removed)),
            NodeKind::Blend => Instance::Blend(self.blends.remove(removed)),
            NodeKind::StateMachine => Instance::StateMachine(self.state_machines.remove(removed)),
            NodeKind::Invalid => return Err(StateMachineError::StaleHandle { handle }),
        };
        for s in self.slots.iter_mut() {
            if s.kind == slot.kind && s.store_index > slot.store_index {
                s.store_index -= 1;
            }
        }

        if let Some(node) = instance.render().node {
            self.pending_disposal.push(node);
        }
        Ok(instance)
    }

    /// Remove `handle` and its whole sub-tree. Returns the number of nodes removed.
    pub fn remove_recursive(&mut self, handle: NodeHandle) -> Result<usize> {
        let mut stack = vec![handle];
        let mut removed = 0;
        while let Some(next) = stack.pop() {
            stack.extend(self.children(next)?.into_iter().flatten());
            self.remove(next)?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn pending_disposal(&self) -> &[RenderNodeId] {
        &self.pending_disposal
    }

    pub fn drain_pending_disposal(&mut self) -> Vec<RenderNodeId> {
        std::mem::take(&mut self.pending_disposal)
    }

    /// Live nodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, InstanceRef<'_>)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(i, s)| {
            let handle = NodeHandle::new(i as u32, s.version);
            self.resolve(handle).ok().map(|r| (handle, r))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ContentId;

    fn leaf(id: u32) -> Instance {
        Instance::Graph(GraphInstance::new(ContentId(id), 1.0))
    }

    #[test]
    fn removed_handle_goes_stale_and_slot_reuse_bumps_version() {
        let mut reg = NodeRegistry::new();
        let a = reg.allocate(leaf(1));
        let b = reg.allocate(leaf(2));
        reg.remove(a).unwrap();

        assert!(matches!(
            reg.resolve(a),
            Err(StateMachineError::StaleHandle { .. })
        ));
        let c = reg.allocate(leaf(3));
        assert_eq!(c.index, a.index);
        assert!(c.version > a.version);
        assert!(reg.is_valid(b));
        assert_eq!(reg.graph(c).unwrap().content, ContentId(3));
    }

    #[test]
    fn ordered_removal_compacts_store_indices() {
        let mut reg = NodeRegistry::new();
        let handles: Vec<_> = (0..4).map(|i| reg.allocate(leaf(i))).collect();
        let before: Vec<u32> = reg.slots().iter().map(|s| s.store_index).collect();
        reg.remove(handles[1]).unwrap();

        for (i, h) in handles.iter().enumerate() {
            if i == 1 {
                continue;
            }
            let after = reg.slots()[h.index as usize].store_index;
            let expected = if before[i] > before[1] {
                before[i] - 1
            } else {
                before[i]
            };
            assert_eq!(after, expected);
            assert_eq!(reg.graph(*h).unwrap().content, ContentId(i as u32));
        }
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let mut reg = NodeRegistry::new();
        let a = reg.allocate(leaf(1));
        assert!(matches!(
            reg.blend(a),
            Err(StateMachineError::KindMismatch {
                expected: NodeKind::Blend,
                actual: NodeKind::Graph,
                ..
            })
        ));
    }

    #[test]
    fn removal_queues_render_node() {
        let mut reg = NodeRegistry::new();
        let mut g = GraphInstance::new(ContentId(1), 1.0);
        g.render.node = Some(RenderNodeId(9));
        let a = reg.allocate(Instance::Graph(g));
        reg.remove(a).unwrap();
        assert_eq!(reg.drain_pending_disposal(), vec![RenderNodeId(9)]);
        assert!(reg.pending_disposal().is_empty());
    }
}
