//! Timeline events: per-clip marker lists and the router that scans them.
//!
//! The router keeps one tracker per layer. A tracker is (re)started whenever a
//! clip starts on that layer and fires every marker whose normalized time has
//! been reached, in order. Trackers run on their own clock, so they keep going
//! while the clip is crossfaded out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clip::{AnimationClip, MIN_CLIP_DURATION};
use crate::ids::LayerIndex;

/// A tracker is finished once its normalized time reaches this.
pub const COMPLETION_THRESHOLD: f32 = 0.999;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMarker {
    pub event_id: String,
    /// Position in the clip, in [0,1].
    pub normalized_time: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipEvents {
    /// Clip name the markers belong to.
    pub clip: String,
    #[serde(default)]
    pub events: Vec<EventMarker>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationEventStream {
    #[serde(default)]
    pub clips: Vec<ClipEvents>,
}

impl AnimationEventStream {
    pub fn new(clips: Vec<ClipEvents>) -> Self {
        let mut stream = Self { clips };
        stream.sort_markers();
        stream
    }

    /// Order every marker list by normalized time.
    pub fn sort_markers(&mut self) {
        for entry in &mut self.clips {
            entry
                .events
                .sort_by(|a, b| a.normalized_time.total_cmp(&b.normalized_time));
        }
    }

    /// Markers for `clip`, empty when it has none.
    pub fn events(&self, clip: &str) -> &[EventMarker] {
        self.clips
            .iter()
            .find(|c| c.clip == clip)
            .map(|c| c.events.as_slice())
            .unwrap_or(&[])
    }
}

/// Receiver of timeline events.
pub trait AnimationEventHandler {
    fn on_animation_event(&mut self, event_id: &str, normalized_time: f32);
}

#[derive(Clone, Debug)]
struct ClipTracker {
    duration: f32,
    events: Vec<EventMarker>,
    next: usize,
    elapsed: f32,
    complete: bool,
}

impl ClipTracker {
    fn new(duration: f32, events: Vec<EventMarker>) -> Self {
        Self {
            duration: duration.max(MIN_CLIP_DURATION),
            events,
            next: 0,
            elapsed: 0.0,
            complete: false,
        }
    }

    fn advance(&mut self, dt: f32, dispatch: &mut impl FnMut(&str, f32)) {
        if self.complete {
            return;
        }
        self.elapsed += dt;
        let normalized = (self.elapsed / self.duration).clamp(0.0, 1.0);
        while let Some(marker) = self.events.get(self.next) {
            if normalized < marker.normalized_time {
                break;
            }
            dispatch(&marker.event_id, marker.normalized_time);
            self.next += 1;
        }
        if normalized >= COMPLETION_THRESHOLD {
            self.complete = true;
        }
    }
}

#[derive(Debug, Default)]
pub struct EventRouter {
    stream: AnimationEventStream,
    trackers: BTreeMap<LayerIndex, ClipTracker>,
}

impl EventRouter {
    pub fn new(mut stream: AnimationEventStream) -> Self {
        stream.sort_markers();
        Self {
            stream,
            trackers: BTreeMap::new(),
        }
    }

    pub fn stream(&self) -> &AnimationEventStream {
        &self.stream
    }

    /// Restart tracking on `layer` for `clip`. Clips without markers stop
    /// tracking on that layer.
    pub fn track_clip(&mut self, layer: LayerIndex, clip: &AnimationClip) {
        let events = self.stream.events(&clip.name);
        if events.is_empty() {
            self.trackers.remove(&layer);
            return;
        }
        self.trackers
            .insert(layer, ClipTracker::new(clip.duration(), events.to_vec()));
    }

    pub fn is_tracking(&self, layer: LayerIndex) -> bool {
        self.trackers.contains_key(&layer)
    }

    pub fn active_trackers(&self) -> usize {
        self.trackers.len()
    }

    /// Advance every tracker, calling `dispatch(event_id, normalized_time)` for
    /// each marker passed. Layers are visited in index order.
    pub fn update(&mut self, dt: f32, mut dispatch: impl FnMut(&str, f32)) {
        if self.trackers.is_empty() || dt <= 0.0 {
            return;
        }
        for tracker in self.trackers.values_mut() {
            tracker.advance(dt, &mut dispatch);
        }
        self.trackers.retain(|_, t| !t.complete);
    }

    pub fn clear(&mut self) {
        self.trackers.clear();
    }
}
