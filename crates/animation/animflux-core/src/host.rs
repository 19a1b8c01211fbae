//! Owner of the evaluation context. Created first, destroyed last.

use crate::playable::{PlayableGraph, TimeUpdateMode};

#[derive(Debug, Default)]
pub struct GraphHost {
    graph: Option<PlayableGraph>,
    name: String,
}

impl GraphHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the context in game-time mode and start it playing. A second
    /// call on a live host does nothing.
    pub fn initialize(&mut self, name: &str) -> &mut Self {
        if self.is_initialized() {
            return self;
        }
        let mut graph = PlayableGraph::new(name);
        graph.set_time_update_mode(TimeUpdateMode::GameTime);
        graph.play();
        log::debug!("graph host '{name}' initialized");
        self.name = name.to_string();
        self.graph = Some(graph);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.as_ref().is_some_and(PlayableGraph::is_valid)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn play(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            if !graph.is_playing() {
                graph.play();
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            if graph.is_playing() {
                graph.stop();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.graph.as_ref().is_some_and(PlayableGraph::is_playing)
    }

    /// The per-frame entry point. Does nothing before `initialize`.
    pub fn evaluate(&mut self, dt: f32) {
        if let Some(graph) = self.graph.as_mut() {
            graph.evaluate(dt);
        }
    }

    pub fn graph(&self) -> Option<&PlayableGraph> {
        self.graph.as_ref().filter(|g| g.is_valid())
    }

    pub fn graph_mut(&mut self) -> Option<&mut PlayableGraph> {
        self.graph.as_mut().filter(|g| g.is_valid())
    }

    /// Destroy the context. Safe to call any number of times.
    pub fn dispose(&mut self) {
        if let Some(mut graph) = self.graph.take() {
            log::debug!("graph host '{}' disposed", self.name);
            graph.destroy_graph();
        }
    }
}
