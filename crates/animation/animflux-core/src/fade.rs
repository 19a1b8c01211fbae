//! Two-slot crossfade unit backing a single layer.
//!
//! Slot 0 holds the "current" clip node and slot 1 the "next" one. Every
//! transition is expressed as plugging a fresh clip node into one slot, which
//! first evicts (disconnects and destroys) whatever occupied it:
//!
//! - Empty: the first clip goes straight into "current" at weight 1.
//! - Hard cut (`fade <= FADE_EPSILON`): the clip replaces "current"; any
//!   "next" occupant is evicted as well and weights return to (1, 0).
//! - Crossfade: the clip replaces "next", the timer restarts, and a per-frame
//!   ticker is bound on the mixer. When the timer completes the old "current"
//!   is destroyed and "next" is moved into slot 0.
//!
//! A play request that lands mid-fade cancels the running fade before the
//! plug, so the old "next" occupant goes through the same eviction path.

use serde::{Deserialize, Serialize};

use crate::clip::{ClipHandle, MIN_CLIP_DURATION};
use crate::ids::NodeId;
use crate::playable::{NodeEvent, PlayableGraph};

/// Fade durations at or below this are hard cuts.
pub const FADE_EPSILON: f32 = 1e-4;

const CURRENT: usize = 0;
const NEXT: usize = 1;

/// Bookkeeping stored on the crossfade node itself.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FadeState {
    pub current: Option<NodeId>,
    pub next: Option<NodeId>,
    pub fade_time: f32,
    pub elapsed: f32,
    pub is_fading: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadePhase {
    Empty,
    Single,
    Fading,
}

impl FadeState {
    pub fn phase(&self) -> FadePhase {
        match (self.current, self.is_fading) {
            (None, _) => FadePhase::Empty,
            (Some(_), false) => FadePhase::Single,
            (Some(_), true) => FadePhase::Fading,
        }
    }

    /// Normalized fade progress in [0,1]; 0 when no fade is running.
    pub fn progress(&self) -> f32 {
        if !self.is_fading {
            return 0.0;
        }
        (self.elapsed / self.fade_time.max(FADE_EPSILON)).clamp(0.0, 1.0)
    }
}

/// How a play request was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// First clip on an empty node.
    Placed,
    HardCut,
    Crossfade,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayOutcome {
    pub transition: Transition,
    /// A running fade was cancelled by this request.
    pub interrupted: bool,
}

/// Handle to one layer's crossfade mixer inside a [`PlayableGraph`].
#[derive(Debug)]
pub struct FadeNode {
    mixer: Option<NodeId>,
}

impl FadeNode {
    /// Allocate the two-slot mixer with weights (1, 0).
    pub fn create(graph: &mut PlayableGraph) -> Self {
        let mixer = graph.create_crossfade(2);
        graph.set_input_weight(mixer, CURRENT, 1.0);
        graph.set_input_weight(mixer, NEXT, 0.0);
        Self { mixer: Some(mixer) }
    }

    /// The mixer node, or `None` once disposed.
    pub fn mixer(&self) -> Option<NodeId> {
        self.mixer
    }

    pub fn is_disposed(&self) -> bool {
        self.mixer.is_none()
    }

    pub fn state(&self, graph: &PlayableGraph) -> FadeState {
        self.mixer
            .and_then(|m| graph.fade_state(m))
            .unwrap_or_default()
    }

    pub fn phase(&self, graph: &PlayableGraph) -> FadePhase {
        self.state(graph).phase()
    }

    /// (current, next) slot weights.
    pub fn weights(&self, graph: &PlayableGraph) -> (f32, f32) {
        match self.mixer {
            Some(m) if graph.contains(m) => {
                (graph.input_weight(m, CURRENT), graph.input_weight(m, NEXT))
            }
            _ => (0.0, 0.0),
        }
    }

    pub fn current_clip(&self, graph: &PlayableGraph) -> Option<ClipHandle> {
        self.state(graph).current.and_then(|n| graph.clip(n).cloned())
    }

    pub fn next_clip(&self, graph: &PlayableGraph) -> Option<ClipHandle> {
        self.state(graph).next.and_then(|n| graph.clip(n).cloned())
    }

    /// Start `clip` at `normalized_time`, crossfading over `fade` seconds.
    ///
    /// Returns `None` when nothing changed (no clip, disposed node).
    pub fn play_clip(
        &self,
        graph: &mut PlayableGraph,
        clip: Option<&ClipHandle>,
        normalized_time: f32,
        fade: f32,
    ) -> Option<PlayOutcome> {
        let clip = clip?;
        let mixer = self.mixer?;
        let mut state = graph.fade_state(mixer)?;

        let interrupted = state.is_fading;
        if interrupted {
            cancel_fade(graph, mixer, &mut state);
            log::debug!("{mixer}: fade interrupted by '{}'", clip.name);
        }

        let node = spawn_clip_node(graph, clip, normalized_time);

        let transition = if state.current.is_none() {
            plug_into_slot(graph, mixer, CURRENT, node);
            state.current = Some(node);
            Transition::Placed
        } else if fade > FADE_EPSILON {
            plug_into_slot(graph, mixer, NEXT, node);
            state.next = Some(node);
            state.elapsed = 0.0;
            state.fade_time = fade;
            state.is_fading = true;
            graph.bind_per_frame(mixer, update_fade);
            log::debug!("{mixer}: crossfade to '{}' over {fade}s", clip.name);
            Transition::Crossfade
        } else {
            plug_into_slot(graph, mixer, CURRENT, node);
            if state.next.take().is_some() {
                unplug_slot(graph, mixer, NEXT);
            }
            state.current = Some(node);
            Transition::HardCut
        };

        graph.set_input_weight(mixer, CURRENT, 1.0);
        graph.set_input_weight(mixer, NEXT, 0.0);
        graph.set_fade_state(mixer, state);

        Some(PlayOutcome {
            transition,
            interrupted,
        })
    }

    /// Cancel any fade, destroy every clip node, then the mixer. Idempotent.
    pub fn dispose(&mut self, graph: &mut PlayableGraph) {
        let Some(mixer) = self.mixer.take() else {
            return;
        };
        if !graph.contains(mixer) {
            return;
        }
        if let Some(mut state) = graph.fade_state(mixer) {
            cancel_fade(graph, mixer, &mut state);
        }
        for slot in 0..graph.input_count(mixer) {
            unplug_slot(graph, mixer, slot);
        }
        if let Some((parent, slot)) = graph.parent(mixer) {
            graph.disconnect(parent, slot);
        }
        graph.destroy(mixer);
    }
}

fn cancel_fade(graph: &mut PlayableGraph, mixer: NodeId, state: &mut FadeState) {
    state.is_fading = false;
    state.elapsed = 0.0;
    state.fade_time = 0.0;
    graph.unbind_per_frame(mixer);
    graph.set_fade_state(mixer, *state);
}

fn spawn_clip_node(graph: &mut PlayableGraph, clip: &ClipHandle, normalized_time: f32) -> NodeId {
    let duration = clip.duration().max(MIN_CLIP_DURATION);
    let node = graph.create_clip_node(clip.clone());
    graph.set_duration(node, duration);
    graph.set_time(node, normalized_time.clamp(0.0, 1.0) * duration);
    graph.set_speed(node, 1.0);
    graph.set_apply_foot_ik(node, true);
    graph.set_apply_playable_ik(node, true);
    node
}

/// Evict whatever sits in `slot`, then plug `node` there.
fn plug_into_slot(graph: &mut PlayableGraph, mixer: NodeId, slot: usize, node: NodeId) {
    unplug_slot(graph, mixer, slot);
    graph.connect(node, mixer, slot);
}

fn unplug_slot(graph: &mut PlayableGraph, mixer: NodeId, slot: usize) {
    if let Some(old) = graph.disconnect(mixer, slot) {
        graph.destroy(old);
    }
}

/// Per-frame fade advance bound on the mixer while a crossfade runs.
fn update_fade(graph: &mut PlayableGraph, mixer: NodeId, dt: f32) {
    let Some(mut state) = graph.fade_state(mixer) else {
        graph.unbind_per_frame(mixer);
        return;
    };
    if !state.is_fading {
        graph.unbind_per_frame(mixer);
        return;
    }

    state.elapsed += dt;
    // Summed frame deltas land a hair short of the duration; finish within epsilon.
    let t = if state.elapsed + FADE_EPSILON >= state.fade_time {
        1.0
    } else {
        (state.elapsed / state.fade_time.max(FADE_EPSILON)).clamp(0.0, 1.0)
    };
    graph.set_input_weight(mixer, CURRENT, 1.0 - t);
    graph.set_input_weight(mixer, NEXT, t);

    if t >= 1.0 {
        unplug_slot(graph, mixer, CURRENT);
        if let Some(next) = graph.disconnect(mixer, NEXT) {
            graph.connect(next, mixer, CURRENT);
            state.current = Some(next);
            if let Some(clip) = graph.clip(next).cloned() {
                log::debug!("{mixer}: fade to '{}' completed", clip.name);
                graph.push_event(NodeEvent::FadeCompleted { mixer, clip });
            }
        } else {
            state.current = None;
        }
        state.next = None;
        state.is_fading = false;
        state.elapsed = 0.0;
        state.fade_time = 0.0;
        graph.set_input_weight(mixer, CURRENT, 1.0);
        graph.set_input_weight(mixer, NEXT, 0.0);
        graph.unbind_per_frame(mixer);
    }

    graph.set_fade_state(mixer, state);
}
