//! Node payloads stored in the arena.

use std::sync::Arc;

use crate::clip::ClipHandle;
use crate::fade::FadeState;
use crate::ids::NodeId;
use crate::pose::BoneMask;

/// One addressable input of a node: at most one connected source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Input {
    pub source: Option<NodeId>,
    pub weight: f32,
}

/// Live playback of a clip inside the graph.
#[derive(Clone, Debug)]
pub struct ClipPlayback {
    pub clip: ClipHandle,
    /// Local time in seconds.
    pub time: f32,
    pub duration: f32,
    pub apply_foot_ik: bool,
    pub apply_playable_ik: bool,
}

/// Per-slot compositing settings of a layer mixer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerBlend {
    pub additive: bool,
    pub mask: Option<Arc<BoneMask>>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Clip(ClipPlayback),
    /// Two-slot crossfade mixer; the fade bookkeeping lives with the node so
    /// the per-frame ticker can reach it through the arena.
    Crossfade(FadeState),
    /// Root mixer: one entry per input slot.
    LayerMixer(Vec<LayerBlend>),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<Input>,
    /// (parent, slot) this node is plugged into, if any.
    pub(crate) parent: Option<(NodeId, usize)>,
    pub(crate) speed: f32,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, input_count: usize) -> Self {
        let mut node = Self {
            kind,
            inputs: Vec::new(),
            parent: None,
            speed: 1.0,
        };
        node.resize_inputs(input_count);
        node
    }

    /// Resize the input list (and the layer settings that shadow it).
    /// Callers must disconnect inputs beyond `count` first.
    pub(crate) fn resize_inputs(&mut self, count: usize) {
        self.inputs.resize(count, Input::default());
        if let NodeKind::LayerMixer(layers) = &mut self.kind {
            layers.resize(count, LayerBlend::default());
        }
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    #[inline]
    pub fn parent(&self) -> Option<(NodeId, usize)> {
        self.parent
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn is_clip(&self) -> bool {
        matches!(self.kind, NodeKind::Clip(_))
    }
}
