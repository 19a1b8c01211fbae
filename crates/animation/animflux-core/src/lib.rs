//! animflux-core: layered crossfade blending for skeletal animation.
//!
//! The crate is engine-agnostic. A host supplies an [`Animator`] that receives the
//! final pose, and drives everything with one `evaluate(dt)` per frame.
//!
//! Structure
//! - `playable`: the evaluation context. An arena of clip, crossfade and layer
//!   mixer nodes with explicit connect/disconnect/destroy and a flat per-frame
//!   ticker list.
//! - `fade`: the two-slot crossfade state machine each layer owns.
//! - `host`, `root`, `layers`, `anim_graph`: the context owner, the root layer
//!   mixer, layer bookkeeping and the facade tying them together.
//! - `pose`, `clip`: pose values, blend math, clip data and sampling.
//! - `config`, `events`, `locomotion`, `ik`, `controller`: declarative setup and
//!   the per-character collaborators built on top of the facade.
//!
//! Quick start
//! ```rust
//! use animflux_core::{AnimGraph, AnimationClip, AnimatorHandle, BlendMode, PoseRecorder};
//!
//! let recorder = PoseRecorder::shared();
//! let animator: AnimatorHandle = recorder.clone();
//! let mut graph = AnimGraph::create(Some(animator), Some("Demo")).unwrap();
//! let base = graph.add_layer("Base", None, 1.0, BlendMode::Override).unwrap();
//!
//! let idle = AnimationClip::new("idle", 1.0).looping(true).into_handle();
//! graph.play_clip(base, Some(&idle), 0.0, 0.0).unwrap();
//! graph.evaluate(1.0 / 60.0);
//! assert_eq!(recorder.borrow().poses_applied, 1);
//! ```

pub mod anim_graph;
pub mod animator;
pub mod clip;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod fade;
pub mod host;
pub mod ids;
pub mod ik;
pub mod layers;
pub mod locomotion;
pub mod outputs;
pub mod playable;
pub mod pose;
pub mod root;

pub use anim_graph::AnimGraph;
pub use animator::{Animator, AnimatorHandle, IkGoalState, PoseRecorder};
pub use clip::{parse_clip_json, AnimationClip, BoneTrack, ClipHandle, ClipLibrary, Keyframe};
pub use config::{
    default_layers, parse_controller_config_json, BlendMode, ControllerConfig, GraphConfig,
    LayerDefinition, LayerType,
};
pub use controller::{AnimController, EventHandlerHandle};
pub use error::{ConfigError, ControllerError, GraphError};
pub use events::{
    AnimationEventHandler, AnimationEventStream, ClipEvents, EventMarker, EventRouter,
};
pub use fade::{FadeNode, FadePhase, FadeState, PlayOutcome, Transition, FADE_EPSILON};
pub use host::GraphHost;
pub use ids::{LayerIndex, NodeId, OutputId};
pub use ik::{IkController, IkGoal, IkTarget};
pub use layers::{Layer, LayerManager};
pub use locomotion::{LocomotionClips, LocomotionConfig, LocomotionLayer, PlayRequest};
pub use outputs::GraphEvent;
pub use playable::{NodeEvent, PlayableGraph, TimeUpdateMode};
pub use pose::{BoneMask, Pose, Transform};
pub use root::RootMixer;
