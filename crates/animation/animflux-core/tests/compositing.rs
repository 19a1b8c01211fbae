use std::cell::RefCell;
use std::rc::Rc;

use animflux_core::{
    parse_clip_json, AnimGraph, AnimatorHandle, BlendMode, BoneMask, ClipHandle, PoseRecorder,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn fixture_clip(name: &str) -> ClipHandle {
    let json = animflux_test_fixtures::clips::json(name).expect("clip fixture");
    parse_clip_json(&json).expect("valid clip").into_handle()
}

fn new_graph() -> (AnimGraph, Rc<RefCell<PoseRecorder>>) {
    let recorder = PoseRecorder::shared();
    let animator: AnimatorHandle = recorder.clone();
    (AnimGraph::create(Some(animator), None).unwrap(), recorder)
}

#[test]
fn crossfade_blends_both_clips_by_weight() {
    let (mut g, rec) = new_graph();
    let base = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    g.play_clip(base, Some(&fixture_clip("idle")), 0.0, 0.0).unwrap();
    g.play_clip(base, Some(&fixture_clip("run")), 0.0, 1.0).unwrap();

    g.evaluate(0.5);
    let hips = *rec.borrow().last_pose.get("hips").unwrap();
    approx(hips.translation[1], 0.95, 1e-4);

    g.evaluate(0.5);
    let hips = *rec.borrow().last_pose.get("hips").unwrap();
    approx(hips.translation[1], 0.9, 1e-4);
}

#[test]
fn masked_override_layer_only_touches_masked_bones() {
    let (mut g, rec) = new_graph();
    let base = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let upper_mask = BoneMask::new("upper_body", ["spine", "arm_l", "arm_r"]);
    let upper = g
        .add_layer("Upper", Some(upper_mask.into()), 1.0, BlendMode::Override)
        .unwrap();

    g.play_clip(base, Some(&fixture_clip("idle")), 0.0, 0.0).unwrap();
    g.play_clip(upper, Some(&fixture_clip("wave")), 0.5, 0.0).unwrap();
    g.evaluate(0.0);

    let pose = rec.borrow().last_pose.clone();
    // The wave clip also keys hips, but the mask keeps the base value.
    approx(pose.get("hips").unwrap().translation[1], 1.0, 1e-5);
    let arm = pose.get("arm_r").unwrap();
    approx(arm.rotation[2], 0.7071068, 1e-4);
}

#[test]
fn additive_layer_offsets_the_base_by_weight() {
    let (mut g, rec) = new_graph();
    let base = g.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
    let add = g.add_layer("Additive", None, 0.5, BlendMode::Additive).unwrap();
    g.play_clip(base, Some(&fixture_clip("idle")), 0.0, 0.0).unwrap();
    g.play_clip(add, Some(&fixture_clip("lean")), 0.0, 0.0).unwrap();
    g.evaluate(0.1);

    let pose = rec.borrow().last_pose.clone();
    let spine = pose.get("spine").unwrap();
    approx(spine.translation[1], 0.05, 1e-5);
    approx(spine.rotation[3], 1.0, 1e-5);
    approx(pose.get("hips").unwrap().translation[1], 1.0, 1e-5);

    g.set_layer_additive(add, false).unwrap();
    g.evaluate(0.1);
    let spine = *rec.borrow().last_pose.get("spine").unwrap();
    approx(spine.translation[1], 0.05, 1e-5);

    g.set_layer_weight(add, 0.0).unwrap();
    g.evaluate(0.1);
    let spine = *rec.borrow().last_pose.get("spine").unwrap();
    approx(spine.translation[1], 0.0, 1e-5);
}
