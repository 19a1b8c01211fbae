//! Layer bookkeeping: one crossfade node per layer, wired into the root mixer.

use std::sync::Arc;

use crate::clip::ClipHandle;
use crate::config::BlendMode;
use crate::error::GraphError;
use crate::fade::{FadeNode, FadeState, PlayOutcome};
use crate::ids::{LayerIndex, NodeId};
use crate::playable::PlayableGraph;
use crate::pose::BoneMask;
use crate::root::RootMixer;

#[derive(Debug)]
pub struct Layer {
    pub name: String,
    pub index: LayerIndex,
    pub blend_mode: BlendMode,
    pub mask: Option<Arc<BoneMask>>,
    fade: FadeNode,
}

impl Layer {
    pub fn fade(&self) -> &FadeNode {
        &self.fade
    }
}

#[derive(Debug, Default)]
pub struct LayerManager {
    layers: Vec<Layer>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            layers: Vec::with_capacity(capacity),
        }
    }

    pub fn count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: LayerIndex) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Layer whose crossfade node is `mixer`.
    pub fn index_of_fade(&self, mixer: NodeId) -> Option<LayerIndex> {
        self.layers
            .iter()
            .position(|l| l.fade.mixer() == Some(mixer))
    }

    pub fn validate_layer(&self, index: LayerIndex) -> Result<&Layer, GraphError> {
        self.layers.get(index).ok_or(GraphError::IndexOutOfRange {
            index,
            count: self.layers.len(),
        })
    }

    /// Append a layer at the next index: grow the root, create its crossfade
    /// node, plug it in and apply the initial weight, mask and mode.
    pub fn add_layer(
        &mut self,
        graph: &mut PlayableGraph,
        root: &RootMixer,
        name: &str,
        mask: Option<Arc<BoneMask>>,
        default_weight: f32,
        blend_mode: BlendMode,
    ) -> LayerIndex {
        let index = self.layers.len();
        root.ensure_layer_slots(graph, index + 1);

        let fade = FadeNode::create(graph);
        if let (Some(mixer), Some(root_mixer)) = (fade.mixer(), root.layer_mixer()) {
            graph.connect(mixer, root_mixer, index);
        }
        root.set_layer_weight(graph, index, default_weight);
        root.set_layer_mask(graph, index, mask.clone());
        root.set_layer_additive(graph, index, blend_mode.is_additive());

        log::debug!("layer {index} '{name}' added ({blend_mode:?}, weight {default_weight})");
        self.layers.push(Layer {
            name: name.to_string(),
            index,
            blend_mode,
            mask,
            fade,
        });
        index
    }

    pub fn play_clip(
        &self,
        graph: &mut PlayableGraph,
        index: LayerIndex,
        clip: Option<&ClipHandle>,
        normalized_time: f32,
        fade: f32,
    ) -> Result<Option<PlayOutcome>, GraphError> {
        let layer = self.validate_layer(index)?;
        Ok(layer.fade.play_clip(graph, clip, normalized_time, fade))
    }

    pub fn set_layer_weight(
        &self,
        graph: &mut PlayableGraph,
        root: &RootMixer,
        index: LayerIndex,
        weight: f32,
    ) -> Result<(), GraphError> {
        self.validate_layer(index)?;
        root.set_layer_weight(graph, index, weight);
        Ok(())
    }

    pub fn layer_weight(
        &self,
        graph: &PlayableGraph,
        root: &RootMixer,
        index: LayerIndex,
    ) -> Result<f32, GraphError> {
        self.validate_layer(index)?;
        Ok(root.layer_weight(graph, index))
    }

    pub fn set_layer_additive(
        &mut self,
        graph: &mut PlayableGraph,
        root: &RootMixer,
        index: LayerIndex,
        additive: bool,
    ) -> Result<(), GraphError> {
        self.validate_layer(index)?;
        root.set_layer_additive(graph, index, additive);
        self.layers[index].blend_mode = if additive {
            BlendMode::Additive
        } else {
            BlendMode::Override
        };
        Ok(())
    }

    pub fn set_layer_mask(
        &mut self,
        graph: &mut PlayableGraph,
        root: &RootMixer,
        index: LayerIndex,
        mask: Option<Arc<BoneMask>>,
    ) -> Result<(), GraphError> {
        self.validate_layer(index)?;
        if mask.is_some() {
            self.layers[index].mask = mask.clone();
        }
        root.set_layer_mask(graph, index, mask);
        Ok(())
    }

    pub fn fade_state(
        &self,
        graph: &PlayableGraph,
        index: LayerIndex,
    ) -> Result<FadeState, GraphError> {
        Ok(self.validate_layer(index)?.fade.state(graph))
    }

    /// Dispose crossfade nodes newest first, then forget the layers.
    pub fn dispose(&mut self, graph: &mut PlayableGraph) {
        for layer in self.layers.iter_mut().rev() {
            layer.fade.dispose(graph);
        }
        if !self.layers.is_empty() {
            log::debug!("disposed {} layers", self.layers.len());
        }
        self.layers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::{AnimatorHandle, PoseRecorder};
    use crate::clip::AnimationClip;

    fn setup() -> (PlayableGraph, RootMixer) {
        let mut graph = PlayableGraph::new("layers");
        let mut root = RootMixer::new();
        let rec: AnimatorHandle = PoseRecorder::shared();
        root.initialize(&mut graph, Some(rec)).unwrap();
        (graph, root)
    }

    #[test]
    fn indices_are_sequential_and_wired() {
        let (mut graph, root) = setup();
        let mut layers = LayerManager::new();
        let a = layers.add_layer(&mut graph, &root, "a", None, 1.0, BlendMode::Override);
        let b = layers.add_layer(&mut graph, &root, "b", None, 0.25, BlendMode::Additive);
        assert_eq!((a, b), (0, 1));
        assert_eq!(root.layer_slots(&graph), 2);
        let mixer = root.layer_mixer().unwrap();
        assert_eq!(graph.input(mixer, 1), layers.layer(1).unwrap().fade().mixer());
        assert_eq!(layers.layer_weight(&graph, &root, 1), Ok(0.25));
        assert!(root.layer_additive(&graph, 1));
    }

    #[test]
    fn out_of_range_is_reported_on_every_operation() {
        let (mut graph, root) = setup();
        let mut layers = LayerManager::new();
        layers.add_layer(&mut graph, &root, "a", None, 1.0, BlendMode::Override);
        let err = GraphError::IndexOutOfRange { index: 3, count: 1 };
        let clip = AnimationClip::new("c", 1.0).into_handle();
        assert_eq!(layers.play_clip(&mut graph, 3, Some(&clip), 0.0, 0.0).err(), Some(err.clone()));
        assert_eq!(layers.set_layer_weight(&mut graph, &root, 3, 1.0), Err(err.clone()));
        assert_eq!(layers.layer_weight(&graph, &root, 3), Err(err.clone()));
        assert_eq!(layers.set_layer_additive(&mut graph, &root, 3, true), Err(err.clone()));
        assert_eq!(layers.set_layer_mask(&mut graph, &root, 3, None), Err(err));
    }

    #[test]
    fn dispose_removes_every_fade_node() {
        let (mut graph, root) = setup();
        let mut layers = LayerManager::new();
        let clip = AnimationClip::new("c", 1.0).into_handle();
        for name in ["a", "b", "c"] {
            let i = layers.add_layer(&mut graph, &root, name, None, 1.0, BlendMode::Override);
            layers.play_clip(&mut graph, i, Some(&clip), 0.0, 0.0).unwrap();
        }
        assert_eq!(graph.live_nodes(), 1 + 3 + 3);
        layers.dispose(&mut graph);
        layers.dispose(&mut graph);
        assert_eq!(layers.count(), 0);
        assert_eq!(graph.live_nodes(), 1);
    }

    #[test]
    fn dispose_mid_fade_leaves_no_ticker_behind() {
        let (mut graph, root) = setup();
        graph.play();
        let mut layers = LayerManager::new();
        let (a, b) = (
            AnimationClip::new("a", 1.0).into_handle(),
            AnimationClip::new("b", 1.0).into_handle(),
        );
        for name in ["a", "b"] {
            let i = layers.add_layer(&mut graph, &root, name, None, 1.0, BlendMode::Override);
            layers.play_clip(&mut graph, i, Some(&a), 0.0, 0.0).unwrap();
            layers.play_clip(&mut graph, i, Some(&b), 0.0, 1.0).unwrap();
        }
        graph.evaluate(0.25);
        assert_eq!(graph.ticker_count(), 2);
        assert_eq!(graph.live_clip_nodes(), 4);

        layers.dispose(&mut graph);
        assert_eq!(graph.ticker_count(), 0);
        assert_eq!(graph.live_clip_nodes(), 0);
        layers.dispose(&mut graph);
        graph.evaluate(0.25);
        assert_eq!(graph.live_nodes(), 1);
    }
}
