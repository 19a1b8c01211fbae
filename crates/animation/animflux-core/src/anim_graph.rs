//! `AnimGraph`: host, root mixer and layers behind one handle.
//!
//! Teardown runs children first: layer crossfade nodes (newest first), then
//! the root mixer and output, then the evaluation context. `dispose` is also
//! run on drop.
//!
//! After `dispose` every operation except `add_layer` quietly does nothing.

use std::sync::Arc;

use crate::animator::AnimatorHandle;
use crate::clip::ClipHandle;
use crate::config::{BlendMode, GraphConfig};
use crate::error::GraphError;
use crate::fade::{FadePhase, FadeState};
use crate::host::GraphHost;
use crate::ids::LayerIndex;
use crate::layers::{Layer, LayerManager};
use crate::outputs::GraphEvent;
use crate::playable::{NodeEvent, PlayableGraph};
use crate::pose::BoneMask;
use crate::root::RootMixer;

#[derive(Debug)]
pub struct AnimGraph {
    host: GraphHost,
    root: RootMixer,
    layers: LayerManager,
    config: GraphConfig,
    events: Vec<GraphEvent>,
    // Events queued before the end of the last evaluate; dropped on the next one.
    stale_events: usize,
}

impl AnimGraph {
    /// Build a graph delivering poses to `animator`. `name` defaults to the
    /// configured graph name.
    pub fn create(
        animator: Option<AnimatorHandle>,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        let mut config = GraphConfig::default();
        if let Some(name) = name {
            config.graph_name = name.to_string();
        }
        Self::with_config(animator, config)
    }

    pub fn with_config(
        animator: Option<AnimatorHandle>,
        config: GraphConfig,
    ) -> Result<Self, GraphError> {
        let animator = animator.ok_or(GraphError::MissingTarget)?;

        let mut host = GraphHost::new();
        host.initialize(&config.graph_name);
        let mut root = RootMixer::new();
        let attached = match host.graph_mut() {
            Some(graph) => root.initialize(graph, Some(animator)).map(|_| ()),
            None => Err(GraphError::InvalidContext),
        };
        if let Err(err) = attached {
            host.dispose();
            return Err(err);
        }

        Ok(Self {
            host,
            root,
            layers: LayerManager::with_capacity(config.layer_capacity),
            config,
            events: Vec::new(),
            stale_events: 0,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.host.is_initialized()
    }

    pub fn name(&self) -> &str {
        &self.config.graph_name
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn layer_count(&self) -> usize {
        self.layers.count()
    }

    pub fn layer(&self, index: LayerIndex) -> Option<&Layer> {
        self.layers.layer(index)
    }

    /// Read-only view of the evaluation context, for inspection.
    pub fn graph(&self) -> Option<&PlayableGraph> {
        self.host.graph()
    }

    pub fn add_layer(
        &mut self,
        name: &str,
        mask: Option<Arc<BoneMask>>,
        default_weight: f32,
        blend_mode: BlendMode,
    ) -> Result<LayerIndex, GraphError> {
        let graph = self.host.graph_mut().ok_or(GraphError::InvalidContext)?;
        Ok(self
            .layers
            .add_layer(graph, &self.root, name, mask, default_weight, blend_mode))
    }

    /// Play `clip` on `layer` from `normalized_time`, crossfading over `fade`
    /// seconds. A `None` clip is ignored.
    pub fn play_clip(
        &mut self,
        layer: LayerIndex,
        clip: Option<&ClipHandle>,
        normalized_time: f32,
        fade: f32,
    ) -> Result<(), GraphError> {
        let Some(graph) = self.host.graph_mut() else {
            return Ok(());
        };
        let Some(outcome) = self
            .layers
            .play_clip(graph, layer, clip, normalized_time, fade)?
        else {
            return Ok(());
        };
        if outcome.interrupted {
            self.events.push(GraphEvent::FadeInterrupted { layer });
        }
        if let Some(clip) = clip {
            self.events.push(GraphEvent::ClipStarted {
                layer,
                clip: clip.clone(),
            });
        }
        Ok(())
    }

    /// `play_clip` from the start with the configured default crossfade.
    pub fn play(&mut self, layer: LayerIndex, clip: Option<&ClipHandle>) -> Result<(), GraphError> {
        let fade = self.config.default_crossfade;
        self.play_clip(layer, clip, 0.0, fade)
    }

    pub fn set_layer_weight(&mut self, layer: LayerIndex, weight: f32) -> Result<(), GraphError> {
        match self.host.graph_mut() {
            Some(graph) => self.layers.set_layer_weight(graph, &self.root, layer, weight),
            None => Ok(()),
        }
    }

    pub fn layer_weight(&self, layer: LayerIndex) -> Result<f32, GraphError> {
        match self.host.graph() {
            Some(graph) => self.layers.layer_weight(graph, &self.root, layer),
            None => Ok(0.0),
        }
    }

    pub fn set_layer_additive(
        &mut self,
        layer: LayerIndex,
        additive: bool,
    ) -> Result<(), GraphError> {
        match self.host.graph_mut() {
            Some(graph) => self.layers.set_layer_additive(graph, &self.root, layer, additive),
            None => Ok(()),
        }
    }

    pub fn set_layer_mask(
        &mut self,
        layer: LayerIndex,
        mask: Option<Arc<BoneMask>>,
    ) -> Result<(), GraphError> {
        match self.host.graph_mut() {
            Some(graph) => self.layers.set_layer_mask(graph, &self.root, layer, mask),
            None => Ok(()),
        }
    }

    pub fn fade_state(&self, layer: LayerIndex) -> Result<FadeState, GraphError> {
        match self.host.graph() {
            Some(graph) => self.layers.fade_state(graph, layer),
            None => Ok(FadeState::default()),
        }
    }

    pub fn phase(&self, layer: LayerIndex) -> Result<FadePhase, GraphError> {
        self.fade_state(layer).map(|s| s.phase())
    }

    /// Clip currently owning `layer`'s "current" slot.
    pub fn current_clip(&self, layer: LayerIndex) -> Option<ClipHandle> {
        let graph = self.host.graph()?;
        self.layers.layer(layer)?.fade().current_clip(graph)
    }

    pub fn set_speed(&mut self, speed: f32) {
        if let Some(graph) = self.host.graph_mut() {
            self.root.set_speed(graph, speed);
        }
    }

    pub fn speed(&self) -> f32 {
        self.host
            .graph()
            .map(|g| self.root.speed(g))
            .unwrap_or(0.0)
    }

    pub fn pause(&mut self) {
        self.host.stop();
    }

    pub fn resume(&mut self) {
        self.host.play();
    }

    pub fn is_paused(&self) -> bool {
        !self.host.is_playing()
    }

    /// The per-frame call: advance fades and clips, deliver the pose, and
    /// queue completion events.
    ///
    /// Events survive one evaluate after they are queued. Anything still
    /// undrained from before the previous call is dropped here.
    pub fn evaluate(&mut self, dt: f32) {
        let stale = self.stale_events.min(self.events.len());
        self.events.drain(..stale);
        self.stale_events = 0;

        self.host.evaluate(dt);
        let Some(graph) = self.host.graph_mut() else {
            return;
        };
        for event in graph.drain_node_events() {
            match event {
                NodeEvent::FadeCompleted { mixer, clip } => {
                    if let Some(layer) = self.layers.index_of_fade(mixer) {
                        self.events.push(GraphEvent::FadeCompleted { layer, clip });
                    }
                }
            }
        }
        self.stale_events = self.events.len();
    }

    /// Take every event queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        self.stale_events = 0;
        std::mem::take(&mut self.events)
    }

    /// Tear down layers, root and context. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(graph) = self.host.graph_mut() {
            self.layers.dispose(graph);
            self.root.dispose(graph);
        }
        self.host.dispose();
        self.events.clear();
        self.stale_events = 0;
    }
}

impl Drop for AnimGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}
