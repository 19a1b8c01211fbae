use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use animflux_core::{
    AnimGraph, AnimationClip, AnimatorHandle, BlendMode, ClipHandle, FadePhase, GraphError,
    PoseRecorder,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn clip(name: &str, duration: f32) -> ClipHandle {
    AnimationClip::new(name, duration).looping(true).into_handle()
}

fn new_graph() -> (AnimGraph, Rc<RefCell<PoseRecorder>>) {
    let recorder = PoseRecorder::shared();
    let animator: AnimatorHandle = recorder.clone();
    let graph = AnimGraph::create(Some(animator), Some("Scenario")).unwrap();
    (graph, recorder)
}

fn same(a: Option<ClipHandle>, b: &ClipHandle) -> bool {
    a.is_some_and(|a| Arc::ptr_eq(&a, b))
}

fn live_clip_nodes(g: &AnimGraph) -> usize {
    g.graph().map(|p| p.live_clip_nodes()).unwrap_or(0)
}

#[test]
fn hard_cut_then_one_second_crossfade() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let (a, b) = (clip("a", 1.0), clip("b", 1.0));

    g.play_clip(layer, Some(&a), 0.0, 0.0).unwrap();
    assert_eq!(g.layer_weight(layer), Ok(1.0));
    assert_eq!(g.phase(layer), Ok(FadePhase::Single));
    assert!(same(g.current_clip(layer), &a));

    g.play_clip(layer, Some(&b), 0.0, 1.0).unwrap();
    let fade = g.layer(layer).unwrap().fade();
    let graph = g.graph().unwrap();
    assert!(same(fade.current_clip(graph), &a));
    assert!(same(fade.next_clip(graph), &b));
    let (wc, wn) = fade.weights(graph);
    approx(wc, 1.0, 1e-6);
    approx(wn, 0.0, 1e-6);

    // Uneven steps, exactly representable, summing to one second.
    for dt in [0.125, 0.25, 0.0625, 0.3125, 0.25] {
        g.evaluate(dt);
    }
    let state = g.fade_state(layer).unwrap();
    assert!(!state.is_fading);
    assert!(state.next.is_none());
    assert!(same(g.current_clip(layer), &b));
    let (wc, wn) = g.layer(layer).unwrap().fade().weights(g.graph().unwrap());
    assert_eq!((wc, wn), (1.0, 0.0));
    assert_eq!(live_clip_nodes(&g), 1);
}

#[test]
fn one_second_crossfade_completes_after_one_second_at_any_frame_rate() {
    for (steps, dt) in [(60, 1.0 / 60.0), (100, 0.01), (144, 1.0 / 144.0), (1000, 0.001)] {
        let (mut g, _) = new_graph();
        let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
        let (a, b) = (clip("a", 1.0), clip("b", 1.0));
        g.play_clip(layer, Some(&a), 0.0, 0.0).unwrap();
        g.play_clip(layer, Some(&b), 0.0, 1.0).unwrap();

        for _ in 0..steps {
            g.evaluate(dt);
        }
        let state = g.fade_state(layer).unwrap();
        assert!(!state.is_fading, "{steps} x {dt}: still fading at {}", state.elapsed);
        assert!(state.next.is_none());
        assert!(same(g.current_clip(layer), &b));
        let (wc, wn) = g.layer(layer).unwrap().fade().weights(g.graph().unwrap());
        assert_eq!((wc, wn), (1.0, 0.0));
        assert_eq!(live_clip_nodes(&g), 1);
    }
}

#[test]
fn interruption_restarts_the_fade_and_evicts_the_old_next() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let (a, c, d) = (clip("a", 1.0), clip("c", 1.0), clip("d", 1.0));

    g.play_clip(layer, Some(&a), 0.0, 0.0).unwrap();
    g.play_clip(layer, Some(&c), 0.0, 1.0).unwrap();
    let c_node = g.fade_state(layer).unwrap().next.unwrap();
    for _ in 0..5 {
        g.evaluate(0.1);
    }
    approx(g.fade_state(layer).unwrap().elapsed, 0.5, 1e-5);

    g.play_clip(layer, Some(&d), 0.0, 1.0).unwrap();
    let state = g.fade_state(layer).unwrap();
    assert!(state.is_fading);
    assert_eq!(state.elapsed, 0.0);
    assert!(!g.graph().unwrap().contains(c_node));
    assert!(same(g.current_clip(layer), &a));
    assert_eq!(live_clip_nodes(&g), 2);

    g.evaluate(1.0);
    assert!(same(g.current_clip(layer), &d));
    assert_eq!(live_clip_nodes(&g), 1);
}

#[test]
fn weights_always_sum_to_one_and_progress_is_monotonic() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let (a, b) = (clip("a", 1.0), clip("b", 1.0));
    g.play_clip(layer, Some(&a), 0.0, 0.0).unwrap();
    g.play_clip(layer, Some(&b), 0.0, 0.8).unwrap();

    let mut last = 0.0;
    let mut total = 0.0f32;
    while total + 0.07 < 0.8 {
        g.evaluate(0.07);
        total += 0.07;
        let fade = g.layer(layer).unwrap().fade();
        let (wc, wn) = fade.weights(g.graph().unwrap());
        approx(wc + wn, 1.0, 1e-6);
        assert!(wn > last && wn < 1.0, "next weight {wn} after {last}");
        assert_eq!(g.phase(layer), Ok(FadePhase::Fading));
        last = wn;
    }
    g.evaluate(0.07);
    assert_eq!(g.phase(layer), Ok(FadePhase::Single));
}

#[test]
fn rapid_requests_in_one_frame_keep_one_node_per_slot() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let clips: Vec<ClipHandle> = (0..8).map(|i| clip(&format!("c{i}"), 0.5)).collect();

    for (i, c) in clips.iter().enumerate() {
        let fade = if i % 3 == 0 { 0.0 } else { 0.4 };
        g.play_clip(layer, Some(c), 0.0, fade).unwrap();
        assert!(live_clip_nodes(&g) <= 2);
        g.evaluate(0.05);
    }
    g.evaluate(1.0);
    assert_eq!(live_clip_nodes(&g), 1);
    assert!(same(g.current_clip(layer), &clips[7]));
}

#[test]
fn layer_indices_stay_valid_and_out_of_range_is_reported() {
    let (mut g, _) = new_graph();
    let base = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let upper = g.add_layer("Upper", None, 0.0, BlendMode::Override).unwrap();
    assert_eq!((base, upper), (0, 1));

    g.set_layer_weight(upper, 0.4).unwrap();
    g.play_clip(base, Some(&clip("a", 1.0)), 0.0, 0.0).unwrap();
    g.add_layer("Extra", None, 1.0, BlendMode::Additive).unwrap();
    g.evaluate(0.5);
    assert_eq!(g.layer_weight(upper), Ok(0.4));

    g.set_layer_weight(upper, 1.7).unwrap();
    assert_eq!(g.layer_weight(upper), Ok(1.0));

    let err = Err(GraphError::IndexOutOfRange { index: 3, count: 3 });
    assert_eq!(g.play_clip(3, Some(&clip("b", 1.0)), 0.0, 0.2), err);
    assert_eq!(g.set_layer_weight(3, 1.0), err);
    assert_eq!(g.layer_weight(3).map(|_| ()), err);
}

#[test]
fn null_clip_is_a_no_op() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    g.play_clip(layer, None, 0.5, 0.2).unwrap();
    assert_eq!(g.phase(layer), Ok(FadePhase::Empty));
    assert!(g.drain_events().is_empty());
}

#[test]
fn dispose_tears_everything_down_and_is_repeatable() {
    let (mut g, recorder) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    g.play_clip(layer, Some(&clip("a", 1.0)), 0.0, 0.0).unwrap();
    g.play_clip(layer, Some(&clip("b", 1.0)), 0.0, 1.0).unwrap();
    g.evaluate(0.1);

    g.dispose();
    assert!(!g.is_initialized());
    assert!(g.graph().is_none());
    g.dispose();

    // The animator is no longer referenced by the graph.
    assert_eq!(Rc::strong_count(&recorder), 1);
}

#[test]
fn pause_freezes_fades_but_keeps_delivering() {
    let (mut g, recorder) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    g.play_clip(layer, Some(&clip("a", 1.0)), 0.0, 0.0).unwrap();
    g.play_clip(layer, Some(&clip("b", 1.0)), 0.0, 1.0).unwrap();

    g.pause();
    assert!(g.is_paused());
    g.evaluate(0.5);
    assert_eq!(g.fade_state(layer).unwrap().elapsed, 0.0);
    assert_eq!(recorder.borrow().poses_applied, 1);

    g.resume();
    g.evaluate(0.5);
    approx(g.fade_state(layer).unwrap().elapsed, 0.5, 1e-6);
    assert_eq!(recorder.borrow().poses_applied, 2);
}

#[test]
fn speed_scales_clip_time_but_not_fade_time() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    g.play_clip(layer, Some(&clip("a", 4.0)), 0.0, 0.0).unwrap();
    g.play_clip(layer, Some(&clip("b", 4.0)), 0.0, 1.0).unwrap();
    g.set_speed(2.0);
    assert_eq!(g.speed(), 2.0);

    g.evaluate(0.25);
    let state = g.fade_state(layer).unwrap();
    approx(state.elapsed, 0.25, 1e-6);
    let graph = g.graph().unwrap();
    approx(graph.time(state.current.unwrap()).unwrap(), 0.5, 1e-6);
    approx(graph.time(state.next.unwrap()).unwrap(), 0.5, 1e-6);
}

#[test]
fn normalized_start_time_maps_onto_clip_duration() {
    let (mut g, _) = new_graph();
    let layer = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    g.play_clip(layer, Some(&clip("a", 2.0)), 0.25, 0.0).unwrap();
    let node = g.fade_state(layer).unwrap().current.unwrap();
    approx(g.graph().unwrap().time(node).unwrap(), 0.5, 1e-6);

    let empty = AnimationClip::new("empty", 0.0).into_handle();
    g.play_clip(layer, Some(&empty), 1.0, 0.0).unwrap();
    let node = g.fade_state(layer).unwrap().current.unwrap();
    let t = g.graph().unwrap().time(node).unwrap();
    assert!(t.is_finite() && t > 0.0);
}
