//! `AnimController`: the per-character driver built from a [`ControllerConfig`].
//!
//! One `update(dt)` per frame runs, in order:
//! 1. locomotion selection (may start a clip on the base layer)
//! 2. graph evaluation (fades advance, pose delivered)
//! 3. routing of graph events into the timeline event router
//! 4. timeline scan, dispatching to registered handlers
//! 5. the IK pass on the animator

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::anim_graph::AnimGraph;
use crate::animator::AnimatorHandle;
use crate::clip::{ClipHandle, ClipLibrary};
use crate::config::{ControllerConfig, LayerType};
use crate::error::{ControllerError, GraphError};
use crate::events::{AnimationEventHandler, EventRouter};
use crate::ids::LayerIndex;
use crate::ik::{IkController, IkGoal, IkTarget};
use crate::locomotion::{LocomotionClips, LocomotionLayer, PlayRequest};
use crate::outputs::GraphEvent;

pub type EventHandlerHandle = Rc<RefCell<dyn AnimationEventHandler>>;

#[derive(Default)]
pub struct AnimController {
    animator: Option<AnimatorHandle>,
    graph: Option<AnimGraph>,
    layer_lookup: HashMap<LayerType, LayerIndex>,
    locomotion: Option<LocomotionLayer>,
    ik: Option<IkController>,
    router: Option<EventRouter>,
    handlers: Vec<EventHandlerHandle>,
}

impl std::fmt::Debug for AnimController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimController")
            .field("graph", &self.graph)
            .field("layer_lookup", &self.layer_lookup)
            .field("locomotion", &self.locomotion)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl AnimController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    /// Build the graph, layers, locomotion and event routing. Without an
    /// animator this logs a warning and leaves the controller uninitialized.
    pub fn initialize(
        &mut self,
        animator: Option<AnimatorHandle>,
        config: &ControllerConfig,
        library: &ClipLibrary,
    ) -> Result<(), ControllerError> {
        if self.is_initialized() {
            return Ok(());
        }
        let Some(animator) = animator else {
            log::warn!("AnimController requires an animator; staying uninitialized");
            return Ok(());
        };

        let mut graph = AnimGraph::with_config(Some(animator.clone()), config.graph.clone())?;
        let mut lookup = HashMap::new();
        for def in config.effective_layers() {
            let mask = config.layer_mask(&def)?;
            let index = graph.add_layer(&def.display_name(), mask, def.weight(), def.blend_mode)?;
            lookup.insert(def.layer_type, index);
        }

        let mut locomotion = None;
        let mut initial = None;
        if let (Some(loco), Some(&base)) = (&config.locomotion, lookup.get(&LayerType::Base)) {
            let clips = LocomotionClips::resolve(loco, library)?;
            let (layer, request) = LocomotionLayer::new(loco.clone(), clips);
            apply_root_motion(&animator, layer.root_motion());
            initial = request.map(|r| (base, r));
            locomotion = Some(layer);
        }

        self.router = config.events.clone().map(EventRouter::new);
        self.animator = Some(animator);
        self.graph = Some(graph);
        self.layer_lookup = lookup;
        self.locomotion = locomotion;
        self.ik = Some(IkController::new());

        if let Some((base, request)) = initial {
            self.play_request(base, &request)?;
        }
        log::debug!("AnimController initialized with {} layers", self.layer_lookup.len());
        Ok(())
    }

    pub fn graph(&self) -> Option<&AnimGraph> {
        self.graph.as_ref()
    }

    pub fn layer_index(&self, layer: LayerType) -> Option<LayerIndex> {
        self.layer_lookup.get(&layer).copied()
    }

    pub fn locomotion(&self) -> Option<&LocomotionLayer> {
        self.locomotion.as_ref()
    }

    pub fn ik(&self) -> Option<&IkController> {
        self.ik.as_ref()
    }

    pub fn router(&self) -> Option<&EventRouter> {
        self.router.as_ref()
    }

    /// Per-frame driver.
    pub fn update(&mut self, dt: f32) -> Result<(), GraphError> {
        if !self.is_initialized() {
            return Ok(());
        }

        let request = self.locomotion.as_mut().and_then(|l| l.update(dt));
        if let (Some(request), Some(base)) = (request, self.layer_index(LayerType::Base)) {
            self.play_request(base, &request)?;
        }

        if let Some(graph) = self.graph.as_mut() {
            graph.evaluate(dt);
        }
        self.route_graph_events();

        let handlers = &self.handlers;
        if let Some(router) = self.router.as_mut() {
            router.update(dt, |event_id, normalized_time| {
                for handler in handlers {
                    match handler.try_borrow_mut() {
                        Ok(mut h) => h.on_animation_event(event_id, normalized_time),
                        Err(_) => log::warn!("event handler busy; dropped '{event_id}'"),
                    }
                }
            });
        }

        self.apply_ik();
        Ok(())
    }

    /// Start `clip` on the layer mapped to `layer`. Unmapped layer types and
    /// `None` clips are ignored.
    pub fn play_clip(
        &mut self,
        layer: LayerType,
        clip: Option<&ClipHandle>,
        normalized_time: f32,
        fade: f32,
    ) -> Result<(), GraphError> {
        let (Some(index), Some(clip)) = (self.layer_index(layer), clip) else {
            return Ok(());
        };
        let Some(graph) = self.graph.as_mut() else {
            return Ok(());
        };
        graph.play_clip(index, Some(clip), normalized_time, fade)?;
        self.route_graph_events();
        Ok(())
    }

    pub fn set_layer_weight(&mut self, layer: LayerType, weight: f32) -> Result<(), GraphError> {
        match (self.layer_index(layer), self.graph.as_mut()) {
            (Some(index), Some(graph)) => graph.set_layer_weight(index, weight.clamp(0.0, 1.0)),
            _ => Ok(()),
        }
    }

    pub fn layer_weight(&self, layer: LayerType) -> f32 {
        match (self.layer_index(layer), self.graph.as_ref()) {
            (Some(index), Some(graph)) => graph.layer_weight(index).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn set_move_speed(&mut self, speed: f32) {
        if let Some(l) = self.locomotion.as_mut() {
            l.set_move_speed(speed);
        }
    }

    pub fn set_move_direction(&mut self, direction: [f32; 3]) {
        if let Some(l) = self.locomotion.as_mut() {
            l.set_move_direction(direction);
        }
    }

    pub fn set_grounded(&mut self, grounded: bool) {
        if let Some(l) = self.locomotion.as_mut() {
            l.set_grounded(grounded);
        }
    }

    pub fn set_root_motion_enabled(&mut self, enabled: bool) {
        if let (Some(l), Some(animator)) = (self.locomotion.as_mut(), self.animator.as_ref()) {
            l.set_root_motion_enabled(enabled);
            apply_root_motion(animator, l.root_motion());
        }
    }

    pub fn set_look_at(&mut self, position: [f32; 3], weight: f32) {
        if let Some(ik) = self.ik.as_mut() {
            ik.set_look_at(position, weight);
        }
    }

    pub fn clear_look_at(&mut self) {
        if let Some(ik) = self.ik.as_mut() {
            ik.clear_look_at();
        }
    }

    pub fn set_ik_goal(
        &mut self,
        goal: IkGoal,
        target: IkTarget,
        position_weight: f32,
        rotation_weight: f32,
    ) {
        if let Some(ik) = self.ik.as_mut() {
            ik.set_goal(goal, target, position_weight, rotation_weight);
        }
    }

    pub fn clear_ik_goal(&mut self, goal: IkGoal) {
        if let Some(ik) = self.ik.as_mut() {
            ik.clear_goal(goal);
        }
    }

    /// Register a handler once; registering the same handle again does nothing.
    pub fn register_handler(&mut self, handler: EventHandlerHandle) {
        if !self.handlers.iter().any(|h| Rc::ptr_eq(h, &handler)) {
            self.handlers.push(handler);
        }
    }

    pub fn unregister_handler(&mut self, handler: &EventHandlerHandle) {
        self.handlers.retain(|h| !Rc::ptr_eq(h, handler));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Drop the graph and every collaborator. Handlers stay registered.
    pub fn dispose(&mut self) {
        if !self.is_initialized() {
            return;
        }
        if let Some(router) = self.router.as_mut() {
            router.clear();
        }
        self.router = None;
        self.locomotion = None;
        self.ik = None;
        self.layer_lookup.clear();
        if let Some(mut graph) = self.graph.take() {
            graph.dispose();
        }
        self.animator = None;
    }

    fn play_request(&mut self, layer: LayerIndex, request: &PlayRequest) -> Result<(), GraphError> {
        if let Some(graph) = self.graph.as_mut() {
            graph.play_clip(layer, Some(&request.clip), request.normalized_time, request.fade)?;
        }
        self.route_graph_events();
        Ok(())
    }

    /// Feed "clip started" notifications to the event router.
    fn route_graph_events(&mut self) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let events = graph.drain_events();
        let Some(router) = self.router.as_mut() else {
            return;
        };
        for event in &events {
            if let GraphEvent::ClipStarted { layer, clip } = event {
                router.track_clip(*layer, clip);
            }
        }
    }

    fn apply_ik(&self) {
        let (Some(ik), Some(animator)) = (self.ik.as_ref(), self.animator.as_ref()) else {
            return;
        };
        match animator.try_borrow_mut() {
            Ok(mut a) => ik.apply(&mut *a),
            Err(_) => log::warn!("animator busy; IK pass skipped"),
        };
    }
}

fn apply_root_motion(animator: &AnimatorHandle, enabled: bool) {
    if let Ok(mut a) = animator.try_borrow_mut() {
        a.set_apply_root_motion(enabled);
    }
}

impl Drop for AnimController {
    fn drop(&mut self) {
        self.dispose();
    }
}
