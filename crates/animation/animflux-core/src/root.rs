//! Root layer mixer: one weighted slot per layer, wired to the animator output.

use std::sync::Arc;

use crate::animator::AnimatorHandle;
use crate::error::GraphError;
use crate::ids::{LayerIndex, NodeId, OutputId};
use crate::playable::PlayableGraph;
use crate::pose::BoneMask;

const OUTPUT_NAME: &str = "AnimFluxOutput";

#[derive(Default)]
pub struct RootMixer {
    mixer: Option<NodeId>,
    output: Option<OutputId>,
    target: Option<AnimatorHandle>,
}

impl std::fmt::Debug for RootMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootMixer")
            .field("mixer", &self.mixer)
            .field("output", &self.output)
            .field("has_target", &self.target.is_some())
            .finish()
    }
}

impl RootMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty layer mixer and an output delivering its pose to
    /// `animator`.
    pub fn initialize(
        &mut self,
        graph: &mut PlayableGraph,
        animator: Option<AnimatorHandle>,
    ) -> Result<&mut Self, GraphError> {
        if !graph.is_valid() {
            return Err(GraphError::InvalidContext);
        }
        let animator = animator.ok_or(GraphError::MissingTarget)?;
        if self.is_initialized(graph) {
            return Ok(self);
        }
        let mixer = graph.create_layer_mixer(0);
        let output = graph.create_output(OUTPUT_NAME, animator.clone());
        graph.set_output_source(output, Some(mixer));
        self.mixer = Some(mixer);
        self.output = Some(output);
        self.target = Some(animator);
        Ok(self)
    }

    pub fn is_initialized(&self, graph: &PlayableGraph) -> bool {
        self.mixer.is_some_and(|m| graph.contains(m))
    }

    pub fn layer_mixer(&self) -> Option<NodeId> {
        self.mixer
    }

    pub fn output(&self) -> Option<OutputId> {
        self.output
    }

    pub fn layer_slots(&self, graph: &PlayableGraph) -> usize {
        self.mixer.map(|m| graph.input_count(m)).unwrap_or(0)
    }

    /// Grow the mixer to at least `count` slots. Never shrinks.
    pub fn ensure_layer_slots(&self, graph: &mut PlayableGraph, count: usize) {
        if let Some(m) = self.live_mixer(graph) {
            if graph.input_count(m) < count {
                graph.set_input_count(m, count);
            }
        }
    }

    pub fn set_layer_weight(&self, graph: &mut PlayableGraph, index: LayerIndex, weight: f32) {
        if let Some(m) = self.live_mixer(graph) {
            graph.set_input_weight(m, index, weight.clamp(0.0, 1.0));
        }
    }

    pub fn layer_weight(&self, graph: &PlayableGraph, index: LayerIndex) -> f32 {
        match self.live_mixer(graph) {
            Some(m) => graph.input_weight(m, index),
            None => 0.0,
        }
    }

    pub fn set_layer_additive(&self, graph: &mut PlayableGraph, index: LayerIndex, additive: bool) {
        if let Some(m) = self.live_mixer(graph) {
            graph.set_layer_additive(m, index, additive);
        }
    }

    pub fn layer_additive(&self, graph: &PlayableGraph, index: LayerIndex) -> bool {
        self.live_mixer(graph)
            .and_then(|m| graph.layer_blend(m, index))
            .is_some_and(|b| b.additive)
    }

    /// Apply `mask` to a layer. An absent mask leaves the current one in place.
    pub fn set_layer_mask(
        &self,
        graph: &mut PlayableGraph,
        index: LayerIndex,
        mask: Option<Arc<BoneMask>>,
    ) {
        let Some(mask) = mask else { return };
        if let Some(m) = self.live_mixer(graph) {
            graph.set_layer_mask(m, index, Some(mask));
        }
    }

    pub fn layer_mask(&self, graph: &PlayableGraph, index: LayerIndex) -> Option<Arc<BoneMask>> {
        self.live_mixer(graph)
            .and_then(|m| graph.layer_blend(m, index))
            .and_then(|b| b.mask.clone())
    }

    /// Rate multiplier for the whole layer subtree.
    pub fn set_speed(&self, graph: &mut PlayableGraph, speed: f32) {
        if let Some(m) = self.live_mixer(graph) {
            graph.set_speed(m, speed);
        }
    }

    pub fn speed(&self, graph: &PlayableGraph) -> f32 {
        self.live_mixer(graph).map(|m| graph.speed(m)).unwrap_or(0.0)
    }

    /// Detach the output, destroy the mixer, release the animator. Idempotent.
    pub fn dispose(&mut self, graph: &mut PlayableGraph) {
        if let Some(output) = self.output.take() {
            if graph.is_output_valid(output) {
                graph.set_output_source(output, None);
                graph.destroy_output(output);
            }
        }
        if let Some(mixer) = self.mixer.take() {
            graph.destroy(mixer);
        }
        self.target = None;
    }

    fn live_mixer(&self, graph: &PlayableGraph) -> Option<NodeId> {
        self.mixer.filter(|m| graph.contains(*m))
    }
}
