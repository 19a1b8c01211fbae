//! Speed-driven clip selection for the base layer.
//!
//! The layer smooths the requested move speed with a critically damped spring
//! and picks a clip from it. It never touches the graph itself: when the
//! selection changes it hands back a [`PlayRequest`] for the caller to route.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::{ClipHandle, ClipLibrary};
use crate::error::ConfigError;

/// Smoothed speeds below this count as standing still.
pub const IDLE_SPEED: f32 = 1e-3;

const MIN_DAMP_TIME: f32 = 1e-4;

fn default_walk_speed() -> f32 {
    1.5
}

fn default_run_speed() -> f32 {
    4.0
}

fn default_damp_time() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocomotionConfig {
    #[serde(default)]
    pub idle_clip: Option<String>,
    #[serde(default)]
    pub walk_clip: Option<String>,
    #[serde(default)]
    pub run_clip: Option<String>,
    #[serde(default)]
    pub fall_clip: Option<String>,
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f32,
    #[serde(default = "default_run_speed")]
    pub run_speed: f32,
    #[serde(default = "default_damp_time")]
    pub speed_damp_time: f32,
    #[serde(default = "default_damp_time")]
    pub direction_damp_time: f32,
    #[serde(default = "default_damp_time")]
    pub crossfade_duration: f32,
    #[serde(default = "default_true")]
    pub enable_root_motion: bool,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            idle_clip: None,
            walk_clip: None,
            run_clip: None,
            fall_clip: None,
            walk_speed: default_walk_speed(),
            run_speed: default_run_speed(),
            speed_damp_time: default_damp_time(),
            direction_damp_time: default_damp_time(),
            crossfade_duration: default_damp_time(),
            enable_root_motion: true,
        }
    }
}

/// Clip handles resolved from a [`LocomotionConfig`].
#[derive(Clone, Debug, Default)]
pub struct LocomotionClips {
    pub idle: Option<ClipHandle>,
    pub walk: Option<ClipHandle>,
    pub run: Option<ClipHandle>,
    pub fall: Option<ClipHandle>,
}

impl LocomotionClips {
    pub fn resolve(config: &LocomotionConfig, library: &ClipLibrary) -> Result<Self, ConfigError> {
        Ok(Self {
            idle: library.resolve(config.idle_clip.as_deref())?,
            walk: library.resolve(config.walk_clip.as_deref())?,
            run: library.resolve(config.run_clip.as_deref())?,
            fall: library.resolve(config.fall_clip.as_deref())?,
        })
    }
}

/// A clip the locomotion layer wants started on its layer.
#[derive(Clone, Debug)]
pub struct PlayRequest {
    pub clip: ClipHandle,
    pub normalized_time: f32,
    pub fade: f32,
}

/// Critically damped spring toward `target`, in the style of a game-engine
/// `SmoothDamp`. `velocity` carries state between calls.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    dt: f32,
) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(MIN_DAMP_TIME);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;
    // No overshoot.
    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = (output - target) / dt;
    }
    output
}

#[derive(Debug)]
pub struct LocomotionLayer {
    config: LocomotionConfig,
    clips: LocomotionClips,
    desired_speed: f32,
    current_speed: f32,
    speed_velocity: f32,
    desired_direction: [f32; 3],
    direction: [f32; 3],
    direction_velocity: [f32; 3],
    grounded: bool,
    root_motion_enabled: bool,
    active: Option<ClipHandle>,
}

impl LocomotionLayer {
    /// Build the layer. The returned request, if any, starts the idle clip
    /// with no crossfade.
    pub fn new(config: LocomotionConfig, clips: LocomotionClips) -> (Self, Option<PlayRequest>) {
        let initial = clips.idle.clone().map(|clip| PlayRequest {
            clip,
            normalized_time: 0.0,
            fade: 0.0,
        });
        let layer = Self {
            root_motion_enabled: config.enable_root_motion,
            active: clips.idle.clone(),
            config,
            clips,
            desired_speed: 0.0,
            current_speed: 0.0,
            speed_velocity: 0.0,
            desired_direction: [0.0; 3],
            direction: [0.0; 3],
            direction_velocity: [0.0; 3],
            grounded: true,
        };
        (layer, initial)
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn set_move_speed(&mut self, speed: f32) {
        self.desired_speed = speed.max(0.0);
    }

    pub fn set_move_direction(&mut self, direction: [f32; 3]) {
        self.desired_direction = direction;
    }

    pub fn set_grounded(&mut self, grounded: bool) {
        self.grounded = grounded;
    }

    pub fn set_root_motion_enabled(&mut self, enabled: bool) {
        self.root_motion_enabled = enabled;
    }

    /// Root motion applies only when both the config and the runtime toggle allow it.
    pub fn root_motion(&self) -> bool {
        self.config.enable_root_motion && self.root_motion_enabled
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    /// Smoothed move direction.
    pub fn move_direction(&self) -> [f32; 3] {
        self.direction
    }

    pub fn active_clip(&self) -> Option<&ClipHandle> {
        self.active.as_ref()
    }

    /// Advance smoothing and return a request when the selected clip changes.
    pub fn update(&mut self, dt: f32) -> Option<PlayRequest> {
        self.current_speed = smooth_damp(
            self.current_speed,
            self.desired_speed,
            &mut self.speed_velocity,
            self.config.speed_damp_time,
            dt,
        );
        for i in 0..3 {
            self.direction[i] = smooth_damp(
                self.direction[i],
                self.desired_direction[i],
                &mut self.direction_velocity[i],
                self.config.direction_damp_time,
                dt,
            );
        }

        let next = self.select_clip()?;
        if self.active.as_ref().is_some_and(|a| Arc::ptr_eq(a, &next)) {
            return None;
        }
        self.active = Some(next.clone());
        Some(PlayRequest {
            clip: next,
            normalized_time: 0.0,
            fade: self.config.crossfade_duration,
        })
    }

    fn select_clip(&self) -> Option<ClipHandle> {
        let c = &self.clips;
        if !self.grounded && c.fall.is_some() {
            return c.fall.clone();
        }
        if self.current_speed < IDLE_SPEED {
            return c.idle.clone();
        }
        let walk = c.walk.clone().or_else(|| c.idle.clone());
        if self.current_speed < self.config.run_speed {
            return walk;
        }
        c.run.clone().or(walk)
    }
}
