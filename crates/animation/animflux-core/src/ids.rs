//! Identifiers for arena entries and layers.

use serde::{Deserialize, Serialize};

/// Position of a layer in the root mixer. Assigned sequentially, never reused.
pub type LayerIndex = usize;

/// Generational handle to a node in a [`PlayableGraph`](crate::playable::PlayableGraph).
///
/// The generation is bumped every time the slot is freed, so a handle kept past
/// `destroy` never resolves to whichever node later reuses the slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}v{}", self.index, self.generation)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OutputId(pub u32);

/// Monotonic allocator for output ids.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_output: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_output(&mut self) -> OutputId {
        let id = OutputId(self.next_output);
        self.next_output = self.next_output.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
