use std::cell::RefCell;
use std::rc::Rc;

use animflux_core::{
    parse_clip_json, parse_controller_config_json, AnimController, AnimationEventHandler,
    AnimatorHandle, ClipLibrary, ConfigError, ControllerConfig, ControllerError,
    EventHandlerHandle, IkGoal, IkTarget, LayerType, PoseRecorder,
};

#[derive(Default)]
struct EventLog {
    events: Vec<(String, f32)>,
}

impl AnimationEventHandler for EventLog {
    fn on_animation_event(&mut self, event_id: &str, normalized_time: f32) {
        self.events.push((event_id.to_string(), normalized_time));
    }
}

fn library() -> ClipLibrary {
    let mut lib = ClipLibrary::new();
    for key in animflux_test_fixtures::clips::keys() {
        let json = animflux_test_fixtures::clips::json(&key).unwrap();
        lib.insert(parse_clip_json(&json).unwrap().into_handle());
    }
    lib
}

fn humanoid() -> ControllerConfig {
    let json = animflux_test_fixtures::controllers::json("humanoid").unwrap();
    parse_controller_config_json(&json).unwrap()
}

fn controller(config: &ControllerConfig) -> (AnimController, Rc<RefCell<PoseRecorder>>) {
    let recorder = PoseRecorder::shared();
    let animator: AnimatorHandle = recorder.clone();
    let mut ctrl = AnimController::new();
    ctrl.initialize(Some(animator), config, &library()).unwrap();
    (ctrl, recorder)
}

fn base_clip_name(ctrl: &AnimController) -> Option<String> {
    let graph = ctrl.graph()?;
    let base = ctrl.layer_index(LayerType::Base)?;
    graph.current_clip(base).map(|c| c.name.clone())
}

#[test]
fn builds_layers_from_config() {
    let (ctrl, recorder) = controller(&humanoid());
    let graph = ctrl.graph().unwrap();
    assert_eq!(graph.name(), "HumanoidGraph");
    assert_eq!(graph.layer_count(), 4);
    assert_eq!(ctrl.layer_index(LayerType::UpperBody), Some(1));
    assert_eq!(graph.layer(3).unwrap().name, "IK");
    assert_eq!(
        graph.layer(1).unwrap().mask.as_ref().map(|m| m.name.as_str()),
        Some("upper_body")
    );
    assert_eq!(ctrl.layer_weight(LayerType::Additive), 0.0);
    // Locomotion starts on idle and turns root motion on.
    assert_eq!(base_clip_name(&ctrl).as_deref(), Some("idle"));
    assert!(recorder.borrow().root_motion);
}

#[test]
fn empty_layer_list_uses_defaults() {
    let json = animflux_test_fixtures::controllers::json("minimal").unwrap();
    let config = parse_controller_config_json(&json).unwrap();
    let (ctrl, _) = controller(&config);
    assert_eq!(ctrl.graph().unwrap().layer_count(), 4);
    assert_eq!(ctrl.layer_weight(LayerType::Base), 1.0);
    assert_eq!(ctrl.layer_weight(LayerType::UpperBody), 0.0);
    assert!(ctrl.locomotion().is_none());
}

#[test]
fn locomotion_switches_base_clip_with_speed() {
    let (mut ctrl, _) = controller(&humanoid());
    ctrl.set_move_speed(2.0);
    for _ in 0..60 {
        ctrl.update(1.0 / 60.0).unwrap();
    }
    assert_eq!(base_clip_name(&ctrl).as_deref(), Some("walk"));

    ctrl.set_grounded(false);
    for _ in 0..30 {
        ctrl.update(1.0 / 60.0).unwrap();
    }
    assert_eq!(base_clip_name(&ctrl).as_deref(), Some("fall"));
}

#[test]
fn timeline_events_reach_registered_handlers_in_order() {
    let config = humanoid();
    let (mut ctrl, _) = controller(&config);
    let log = Rc::new(RefCell::new(EventLog::default()));
    let handler: EventHandlerHandle = log.clone();
    ctrl.register_handler(handler.clone());
    ctrl.register_handler(handler.clone());
    assert_eq!(ctrl.handler_count(), 1);

    let wave = library().get("wave").cloned();
    ctrl.play_clip(LayerType::UpperBody, wave.as_ref(), 0.0, 0.0).unwrap();
    assert!(ctrl.router().unwrap().is_tracking(1));

    ctrl.update(0.1).unwrap();
    ctrl.update(0.7).unwrap();
    ctrl.update(1.0).unwrap();
    let fired: Vec<String> = log.borrow().events.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(fired, ["wave_start", "wave_peak"]);
    assert!(!ctrl.router().unwrap().is_tracking(1));

    ctrl.unregister_handler(&handler);
    assert_eq!(ctrl.handler_count(), 0);
}

#[test]
fn ik_goals_are_written_after_evaluation() {
    let (mut ctrl, recorder) = controller(&humanoid());
    ctrl.set_ik_goal(IkGoal::LeftFoot, IkTarget::at([0.1, 0.0, 0.2]), 0.8, 0.3);
    ctrl.set_look_at([0.0, 1.6, 3.0], 0.5);
    ctrl.update(0.016).unwrap();
    {
        let rec = recorder.borrow();
        assert_eq!(rec.goal(IkGoal::LeftFoot).position_weight, 0.8);
        assert_eq!(rec.goal(IkGoal::LeftFoot).position, [0.1, 0.0, 0.2]);
        assert_eq!(rec.look_at_weight, 0.5);
        assert!(rec.poses_applied >= 1);
    }

    ctrl.clear_ik_goal(IkGoal::LeftFoot);
    ctrl.clear_look_at();
    ctrl.update(0.016).unwrap();
    let rec = recorder.borrow();
    assert_eq!(rec.goal(IkGoal::LeftFoot).position_weight, 0.0);
    assert_eq!(rec.look_at_weight, 0.0);
}

#[test]
fn unmapped_layer_type_is_ignored() {
    let config = parse_controller_config_json(r#"{ "layers": [{ "layer_type": "base" }] }"#).unwrap();
    let (mut ctrl, _) = controller(&config);
    let wave = library().get("wave").cloned();
    ctrl.play_clip(LayerType::Ik, wave.as_ref(), 0.0, 0.0).unwrap();
    ctrl.set_layer_weight(LayerType::Ik, 1.0).unwrap();
    assert_eq!(ctrl.layer_weight(LayerType::Ik), 0.0);
}

#[test]
fn missing_animator_leaves_controller_uninitialized() {
    let mut ctrl = AnimController::new();
    ctrl.initialize(None, &humanoid(), &library()).unwrap();
    assert!(!ctrl.is_initialized());
    ctrl.update(0.1).unwrap();
    ctrl.dispose();
}

#[test]
fn unknown_locomotion_clip_is_a_config_error() {
    let mut config = humanoid();
    if let Some(loco) = config.locomotion.as_mut() {
        loco.run_clip = Some("sprint".into());
    }
    let recorder: AnimatorHandle = PoseRecorder::shared();
    let mut ctrl = AnimController::new();
    let err = ctrl.initialize(Some(recorder), &config, &library()).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Config(ConfigError::UnknownClip(ref name)) if name == "sprint"
    ));
    assert!(!ctrl.is_initialized());
}

#[test]
fn dispose_releases_the_graph() {
    let (mut ctrl, recorder) = controller(&humanoid());
    ctrl.dispose();
    ctrl.dispose();
    assert!(ctrl.graph().is_none());
    assert_eq!(Rc::strong_count(&recorder), 1);
}
