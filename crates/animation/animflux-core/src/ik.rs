//! Look-at and limb IK targets, written to the animator once per IK pass.

use serde::{Deserialize, Serialize};

use crate::animator::Animator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IkGoal {
    LeftFoot,
    RightFoot,
    LeftHand,
    RightHand,
}

impl IkGoal {
    pub const ALL: [IkGoal; 4] = [
        IkGoal::LeftFoot,
        IkGoal::RightFoot,
        IkGoal::LeftHand,
        IkGoal::RightHand,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// World-space target for a goal or the look-at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IkTarget {
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w).
    pub rotation: [f32; 4],
}

impl IkTarget {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct LimbTarget {
    target: Option<IkTarget>,
    position_weight: f32,
    rotation_weight: f32,
}

#[derive(Clone, Debug, Default)]
pub struct IkController {
    look_at: Option<[f32; 3]>,
    look_weight: f32,
    limbs: [LimbTarget; 4],
}

impl IkController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_look_at(&mut self, position: [f32; 3], weight: f32) {
        self.look_at = Some(position);
        self.look_weight = weight.clamp(0.0, 1.0);
    }

    pub fn clear_look_at(&mut self) {
        self.look_at = None;
        self.look_weight = 0.0;
    }

    pub fn set_goal(
        &mut self,
        goal: IkGoal,
        target: IkTarget,
        position_weight: f32,
        rotation_weight: f32,
    ) {
        self.limbs[goal.index()] = LimbTarget {
            target: Some(target),
            position_weight: position_weight.clamp(0.0, 1.0),
            rotation_weight: rotation_weight.clamp(0.0, 1.0),
        };
    }

    pub fn clear_goal(&mut self, goal: IkGoal) {
        self.limbs[goal.index()] = LimbTarget::default();
    }

    /// Write look-at and every goal. Empty or zero-weight goals get zero weights.
    pub fn apply(&self, animator: &mut dyn Animator) {
        match self.look_at {
            Some(position) if self.look_weight > 0.0 => {
                animator.set_look_at_weight(self.look_weight);
                animator.set_look_at_position(position);
            }
            _ => animator.set_look_at_weight(0.0),
        }

        for goal in IkGoal::ALL {
            let limb = &self.limbs[goal.index()];
            match limb.target {
                Some(target) if limb.position_weight > 0.0 => {
                    animator.set_ik_position_weight(goal, limb.position_weight);
                    animator.set_ik_position(goal, target.position);
                    animator.set_ik_rotation_weight(goal, limb.rotation_weight);
                    animator.set_ik_rotation(goal, target.rotation);
                }
                _ => {
                    animator.set_ik_position_weight(goal, 0.0);
                    animator.set_ik_rotation_weight(goal, 0.0);
                }
            }
        }
    }
}
