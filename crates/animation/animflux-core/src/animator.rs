//! The animator seam: where final poses and IK requests land.
//!
//! Hosts implement [`Animator`] for whatever owns the skeleton and hand the
//! graph an [`AnimatorHandle`]. Everything except `apply_pose` defaults to a
//! no-op so pose-only hosts stay small.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ik::IkGoal;
use crate::pose::Pose;

pub trait Animator {
    /// Receive the composited pose for this tick.
    fn apply_pose(&mut self, pose: &Pose);

    fn set_apply_root_motion(&mut self, _enabled: bool) {}

    fn set_look_at_weight(&mut self, _weight: f32) {}
    fn set_look_at_position(&mut self, _position: [f32; 3]) {}

    fn set_ik_position_weight(&mut self, _goal: IkGoal, _weight: f32) {}
    fn set_ik_position(&mut self, _goal: IkGoal, _position: [f32; 3]) {}
    fn set_ik_rotation_weight(&mut self, _goal: IkGoal, _weight: f32) {}
    fn set_ik_rotation(&mut self, _goal: IkGoal, _rotation: [f32; 4]) {}
}

/// Shared handle to the animator. The graph is single-threaded, so a
/// reference-counted cell is enough.
pub type AnimatorHandle = Rc<RefCell<dyn Animator>>;

/// Per-goal IK state as last written by the IK pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IkGoalState {
    pub position_weight: f32,
    pub position: [f32; 3],
    pub rotation_weight: f32,
    pub rotation: [f32; 4],
}

/// Animator that keeps the last pose and IK writes for inspection.
#[derive(Debug, Default)]
pub struct PoseRecorder {
    pub last_pose: Pose,
    pub poses_applied: u64,
    pub root_motion: bool,
    pub look_at_weight: f32,
    pub look_at_position: [f32; 3],
    pub goals: [IkGoalState; 4],
}

impl PoseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for hosts/tests: a recorder already wrapped for sharing.
    pub fn shared() -> Rc<RefCell<PoseRecorder>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn goal(&self, goal: IkGoal) -> &IkGoalState {
        &self.goals[goal.index()]
    }
}

impl Animator for PoseRecorder {
    fn apply_pose(&mut self, pose: &Pose) {
        self.last_pose.clone_from(pose);
        self.poses_applied += 1;
    }

    fn set_apply_root_motion(&mut self, enabled: bool) {
        self.root_motion = enabled;
    }

    fn set_look_at_weight(&mut self, weight: f32) {
        self.look_at_weight = weight;
    }

    fn set_look_at_position(&mut self, position: [f32; 3]) {
        self.look_at_position = position;
    }

    fn set_ik_position_weight(&mut self, goal: IkGoal, weight: f32) {
        self.goals[goal.index()].position_weight = weight;
    }

    fn set_ik_position(&mut self, goal: IkGoal, position: [f32; 3]) {
        self.goals[goal.index()].position = position;
    }

    fn set_ik_rotation_weight(&mut self, goal: IkGoal, weight: f32) {
        self.goals[goal.index()].rotation_weight = weight;
    }

    fn set_ik_rotation(&mut self, goal: IkGoal, rotation: [f32; 4]) {
        self.goals[goal.index()].rotation = rotation;
    }
}
