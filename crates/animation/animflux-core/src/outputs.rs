//! Notifications produced by the graph for collaborators (event routing, UI).

use std::sync::Arc;

use serde::Serialize;

use crate::clip::ClipHandle;
use crate::ids::LayerIndex;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A play request was accepted on `layer`.
    ClipStarted {
        layer: LayerIndex,
        #[serde(serialize_with = "clip_name")]
        clip: ClipHandle,
    },
    /// A play request cancelled a crossfade that was still running.
    FadeInterrupted { layer: LayerIndex },
    /// A crossfade finished and `clip` now owns the layer.
    FadeCompleted {
        layer: LayerIndex,
        #[serde(serialize_with = "clip_name")]
        clip: ClipHandle,
    },
}

impl GraphEvent {
    pub fn layer(&self) -> LayerIndex {
        match self {
            GraphEvent::ClipStarted { layer, .. }
            | GraphEvent::FadeInterrupted { layer }
            | GraphEvent::FadeCompleted { layer, .. } => *layer,
        }
    }
}

impl PartialEq for GraphEvent {
    fn eq(&self, other: &Self) -> bool {
        use GraphEvent::*;
        match (self, other) {
            (ClipStarted { layer: a, clip: ca }, ClipStarted { layer: b, clip: cb })
            | (FadeCompleted { layer: a, clip: ca }, FadeCompleted { layer: b, clip: cb }) => {
                a == b && Arc::ptr_eq(ca, cb)
            }
            (FadeInterrupted { layer: a }, FadeInterrupted { layer: b }) => a == b,
            _ => false,
        }
    }
}

fn clip_name<S: serde::Serializer>(clip: &ClipHandle, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&clip.name)
}
