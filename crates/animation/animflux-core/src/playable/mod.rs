//! PlayableGraph: the evaluation context every node is anchored to.
//!
//! Nodes live in an arena addressed by generational [`NodeId`]s. Topology is
//! changed only through explicit primitives:
//! - `connect(source, dest, slot)` / `disconnect(dest, slot)`
//! - `destroy(id)` (frees the slot; stale ids stop resolving)
//! - `set_input_count(id, n)`
//!
//! Per-frame work that is not part of pose sampling (fade timers) is registered
//! with `bind_per_frame` into a flat ticker list the graph owns and iterates
//! at the start of every `evaluate`.

mod eval;
pub mod node;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::animator::AnimatorHandle;
use crate::clip::ClipHandle;
use crate::fade::FadeState;
use crate::ids::{IdAllocator, NodeId, OutputId};
use crate::pose::BoneMask;

pub use node::{ClipPlayback, Input, LayerBlend, Node, NodeKind};

/// Per-frame callback bound to a node.
pub type TickFn = fn(&mut PlayableGraph, NodeId, f32);

/// Clock the host drives the graph from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUpdateMode {
    #[default]
    GameTime,
    UnscaledGameTime,
    Manual,
}

/// Pose sink: a source node whose pose is delivered to an animator each tick.
pub struct PoseOutput {
    id: OutputId,
    name: String,
    source: Option<NodeId>,
    target: AnimatorHandle,
}

impl std::fmt::Debug for PoseOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseOutput")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Notifications raised while ticking, drained by the owner of the graph.
#[derive(Clone, Debug)]
pub enum NodeEvent {
    FadeCompleted { mixer: NodeId, clip: ClipHandle },
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct PlayableGraph {
    name: String,
    valid: bool,
    playing: bool,
    time_mode: TimeUpdateMode,
    frame: u64,

    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,

    ids: IdAllocator,
    outputs: Vec<PoseOutput>,
    tickers: Vec<(NodeId, TickFn)>,
    events: Vec<NodeEvent>,
}

impl PlayableGraph {
    /// Create a valid, stopped graph.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            valid: true,
            playing: false,
            time_mode: TimeUpdateMode::default(),
            frame: 0,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            ids: IdAllocator::new(),
            outputs: Vec::new(),
            tickers: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.valid && self.playing
    }

    pub fn play(&mut self) {
        if self.valid {
            self.playing = true;
        }
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn set_time_update_mode(&mut self, mode: TimeUpdateMode) {
        self.time_mode = mode;
    }

    pub fn time_update_mode(&self) -> TimeUpdateMode {
        self.time_mode
    }

    /// Number of `evaluate` calls since creation.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Tear down every node, output, and ticker. The graph is unusable afterwards.
    pub fn destroy_graph(&mut self) {
        if !self.valid {
            return;
        }
        log::debug!(
            "graph '{}': destroying ({} live nodes, {} outputs)",
            self.name,
            self.live,
            self.outputs.len()
        );
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        self.outputs.clear();
        self.tickers.clear();
        self.events.clear();
        self.ids.reset();
        self.playing = false;
        self.valid = false;
    }

    // ---- arena -------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    /// Create a clip node at local time 0 with unit speed and the clip's duration.
    pub fn create_clip_node(&mut self, clip: ClipHandle) -> NodeId {
        let duration = clip.duration();
        self.alloc(Node::new(
            NodeKind::Clip(ClipPlayback {
                clip,
                time: 0.0,
                duration,
                apply_foot_ik: false,
                apply_playable_ik: false,
            }),
            0,
        ))
    }

    pub fn create_crossfade(&mut self, input_count: usize) -> NodeId {
        self.alloc(Node::new(
            NodeKind::Crossfade(FadeState::default()),
            input_count,
        ))
    }

    pub fn create_layer_mixer(&mut self, input_count: usize) -> NodeId {
        self.alloc(Node::new(NodeKind::LayerMixer(Vec::new()), input_count))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of nodes currently alive in the arena.
    #[inline]
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    pub fn live_clip_nodes(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.node.as_ref())
            .filter(|n| n.is_clip())
            .count()
    }

    pub fn input_count(&self, id: NodeId) -> usize {
        self.node(id).map(|n| n.inputs.len()).unwrap_or(0)
    }

    /// Grow or shrink a node's inputs. Sources in dropped slots are disconnected.
    pub fn set_input_count(&mut self, id: NodeId, count: usize) {
        let current = self.input_count(id);
        for slot in count..current {
            self.disconnect(id, slot);
        }
        if let Some(node) = self.node_mut(id) {
            node.resize_inputs(count);
        }
    }

    pub fn input(&self, id: NodeId, slot: usize) -> Option<NodeId> {
        self.node(id)
            .and_then(|n| n.inputs.get(slot))
            .and_then(|i| i.source)
    }

    pub fn parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        self.node(id).and_then(|n| n.parent)
    }

    /// True when `ancestor` is reachable from `id` by following parent links.
    fn has_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some((p, _)) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.parent(p);
        }
        false
    }

    /// Plug `source` into `dest`'s input `slot`. Refuses occupied slots, sources
    /// that already have a parent, stale ids, and connections that would form a cycle.
    pub fn connect(&mut self, source: NodeId, dest: NodeId, slot: usize) -> bool {
        let Some(src) = self.node(source) else {
            log::warn!("graph '{}': connect from stale {source}", self.name);
            return false;
        };
        if let Some((p, s)) = src.parent {
            log::warn!(
                "graph '{}': {source} is already plugged into {p} slot {s}",
                self.name
            );
            return false;
        }
        if source == dest || self.has_ancestor(dest, source) {
            log::warn!("graph '{}': connecting {source} into {dest} would form a cycle", self.name);
            return false;
        }
        let name = self.name.clone();
        let Some(dst) = self.node_mut(dest) else {
            log::warn!("graph '{name}': connect into stale {dest}");
            return false;
        };
        let Some(input) = dst.inputs.get_mut(slot) else {
            log::warn!("graph '{name}': {dest} has no input slot {slot}");
            return false;
        };
        if let Some(existing) = input.source {
            log::warn!("graph '{name}': {dest} slot {slot} is occupied by {existing}");
            return false;
        }
        input.source = Some(source);
        if let Some(src) = self.node_mut(source) {
            src.parent = Some((dest, slot));
        }
        true
    }

    /// Unplug whatever sits in `dest`'s input `slot`, returning it. The source
    /// node stays alive.
    pub fn disconnect(&mut self, dest: NodeId, slot: usize) -> Option<NodeId> {
        let source = self
            .node_mut(dest)?
            .inputs
            .get_mut(slot)?
            .source
            .take()?;
        if let Some(src) = self.node_mut(source) {
            if src.parent == Some((dest, slot)) {
                src.parent = None;
            }
        }
        Some(source)
    }

    /// Free a node. A node still plugged into a parent is disconnected first;
    /// its own inputs are detached but not destroyed.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        let (parent, children) = match self.node(id) {
            Some(node) => (
                node.parent,
                node.inputs.iter().filter_map(|i| i.source).collect::<Vec<_>>(),
            ),
            None => return false,
        };
        if let Some((p, s)) = parent {
            log::warn!(
                "graph '{}': destroying {id} while plugged into {p} slot {s}",
                self.name
            );
            self.disconnect(p, s);
        }
        for child in children {
            if let Some(c) = self.node_mut(child) {
                c.parent = None;
            }
        }
        self.unbind_per_frame(id);
        for out in &mut self.outputs {
            if out.source == Some(id) {
                out.source = None;
            }
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    pub fn set_input_weight(&mut self, id: NodeId, slot: usize, weight: f32) {
        if let Some(input) = self.node_mut(id).and_then(|n| n.inputs.get_mut(slot)) {
            input.weight = weight;
        }
    }

    pub fn input_weight(&self, id: NodeId, slot: usize) -> f32 {
        self.node(id)
            .and_then(|n| n.inputs.get(slot))
            .map(|i| i.weight)
            .unwrap_or(0.0)
    }

    /// Rate multiplier applied to the node and everything beneath it.
    pub fn set_speed(&mut self, id: NodeId, speed: f32) {
        if let Some(node) = self.node_mut(id) {
            node.speed = speed;
        }
    }

    pub fn speed(&self, id: NodeId) -> f32 {
        self.node(id).map(|n| n.speed).unwrap_or(0.0)
    }

    // ---- clip nodes --------------------------------------------------------

    fn playback_mut(&mut self, id: NodeId) -> Option<&mut ClipPlayback> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Clip(p) => Some(p),
            _ => None,
        }
    }

    pub fn playback(&self, id: NodeId) -> Option<&ClipPlayback> {
        match &self.node(id)?.kind {
            NodeKind::Clip(p) => Some(p),
            _ => None,
        }
    }

    pub fn clip(&self, id: NodeId) -> Option<&ClipHandle> {
        self.playback(id).map(|p| &p.clip)
    }

    pub fn set_time(&mut self, id: NodeId, time: f32) {
        if let Some(p) = self.playback_mut(id) {
            p.time = time;
        }
    }

    pub fn time(&self, id: NodeId) -> Option<f32> {
        self.playback(id).map(|p| p.time)
    }

    pub fn set_duration(&mut self, id: NodeId, duration: f32) {
        if let Some(p) = self.playback_mut(id) {
            p.duration = duration;
        }
    }

    pub fn set_apply_foot_ik(&mut self, id: NodeId, enabled: bool) {
        if let Some(p) = self.playback_mut(id) {
            p.apply_foot_ik = enabled;
        }
    }

    pub fn set_apply_playable_ik(&mut self, id: NodeId, enabled: bool) {
        if let Some(p) = self.playback_mut(id) {
            p.apply_playable_ik = enabled;
        }
    }

    // ---- layer mixers ------------------------------------------------------

    fn layer_blend_mut(&mut self, id: NodeId, layer: usize) -> Option<&mut LayerBlend> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::LayerMixer(layers) => layers.get_mut(layer),
            _ => None,
        }
    }

    pub fn layer_blend(&self, id: NodeId, layer: usize) -> Option<&LayerBlend> {
        match &self.node(id)?.kind {
            NodeKind::LayerMixer(layers) => layers.get(layer),
            _ => None,
        }
    }

    pub fn set_layer_additive(&mut self, id: NodeId, layer: usize, additive: bool) {
        if let Some(blend) = self.layer_blend_mut(id, layer) {
            blend.additive = additive;
        }
    }

    pub fn set_layer_mask(&mut self, id: NodeId, layer: usize, mask: Option<Arc<BoneMask>>) {
        if let Some(blend) = self.layer_blend_mut(id, layer) {
            blend.mask = mask;
        }
    }

    // ---- crossfade state ---------------------------------------------------

    pub fn fade_state(&self, id: NodeId) -> Option<FadeState> {
        match &self.node(id)?.kind {
            NodeKind::Crossfade(state) => Some(*state),
            _ => None,
        }
    }

    pub(crate) fn set_fade_state(&mut self, id: NodeId, state: FadeState) {
        if let Some(Node {
            kind: NodeKind::Crossfade(slot),
            ..
        }) = self.node_mut(id)
        {
            *slot = state;
        }
    }

    // ---- outputs -----------------------------------------------------------

    pub fn create_output(&mut self, name: &str, target: AnimatorHandle) -> OutputId {
        let id = self.ids.alloc_output();
        self.outputs.push(PoseOutput {
            id,
            name: name.to_string(),
            source: None,
            target,
        });
        id
    }

    pub fn is_output_valid(&self, output: OutputId) -> bool {
        self.outputs.iter().any(|o| o.id == output)
    }

    pub fn set_output_source(&mut self, output: OutputId, source: Option<NodeId>) {
        let source = source.filter(|s| self.contains(*s));
        if let Some(out) = self.outputs.iter_mut().find(|o| o.id == output) {
            out.source = source;
        }
    }

    pub fn output_source(&self, output: OutputId) -> Option<NodeId> {
        self.outputs
            .iter()
            .find(|o| o.id == output)
            .and_then(|o| o.source)
    }

    /// Drop an output and its reference to the animator.
    pub fn destroy_output(&mut self, output: OutputId) {
        self.outputs.retain(|o| o.id != output);
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    // ---- per-frame tickers -------------------------------------------------

    /// Run `tick` for `node` at the start of every evaluate. Rebinding a node
    /// replaces its previous callback.
    pub fn bind_per_frame(&mut self, node: NodeId, tick: TickFn) {
        if !self.contains(node) {
            return;
        }
        if let Some(entry) = self.tickers.iter_mut().find(|(id, _)| *id == node) {
            entry.1 = tick;
        } else {
            self.tickers.push((node, tick));
        }
    }

    pub fn unbind_per_frame(&mut self, node: NodeId) {
        self.tickers.retain(|(id, _)| *id != node);
    }

    pub fn is_ticking(&self, node: NodeId) -> bool {
        self.tickers.iter().any(|(id, _)| *id == node)
    }

    pub fn ticker_count(&self) -> usize {
        self.tickers.len()
    }

    // ---- events ------------------------------------------------------------

    pub(crate) fn push_event(&mut self, event: NodeEvent) {
        self.events.push(event);
    }

    /// Events raised by the last [`PlayableGraph::evaluate`].
    pub fn drain_node_events(&mut self) -> Vec<NodeEvent> {
        std::mem::take(&mut self.events)
    }
}
