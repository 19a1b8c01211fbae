//! Clip data model, sampling, and JSON loading.
//!
//! Model:
//! - A clip has a duration in milliseconds (authoritative) and per-bone tracks.
//! - Each track has ordered keyframes with normalized stamps in [0,1].
//! - Sampling maps local time to a normalized position (wrapping for looping
//!   clips, clamping otherwise) and lerps the bracketing keyframes.
//!
//! Clips are immutable once loaded and shared through [`ClipHandle`]; the
//! graph only holds a handle for as long as a clip node plays it.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pose::{Pose, Transform};

/// Floor applied to clip durations before dividing by them.
pub const MIN_CLIP_DURATION: f32 = 1e-4;

/// Shared, immutable reference to clip data.
pub type ClipHandle = Arc<AnimationClip>;

/// A single keyframe in normalized time [0..1].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Keyframe {
    /// Normalized time in [0,1] within the clip duration.
    pub stamp: f32,
    pub value: Transform,
}

/// Keyframes for one bone.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoneTrack {
    pub bone: String,
    pub points: Vec<Keyframe>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Duration in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u32,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    /// A clip lasting `duration_s` seconds, quantised to whole milliseconds
    /// (`0.12345` becomes 123 ms; anything under half a millisecond becomes 0
    /// and samples as a minimum-length clip).
    pub fn new(name: &str, duration_s: f32) -> Self {
        Self {
            name: name.to_string(),
            duration_ms: (duration_s.max(0.0) * 1000.0).round() as u32,
            looping: false,
            tracks: Vec::new(),
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_track(mut self, bone: &str, points: Vec<Keyframe>) -> Self {
        self.tracks.push(BoneTrack {
            bone: bone.to_string(),
            points,
        });
        self
    }

    /// Wrap into a shareable handle.
    pub fn into_handle(self) -> ClipHandle {
        Arc::new(self)
    }

    /// Duration in seconds.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration_ms as f32 / 1000.0
    }

    /// Map a local playback time (seconds) to a normalized position in [0,1].
    pub fn normalized_time(&self, local_time: f32) -> f32 {
        let duration = self.duration().max(MIN_CLIP_DURATION);
        if self.looping {
            let wrapped = local_time.rem_euclid(duration);
            (wrapped / duration).clamp(0.0, 1.0)
        } else {
            (local_time / duration).clamp(0.0, 1.0)
        }
    }

    /// Sample every track at `local_time` into `out`.
    pub fn sample(&self, local_time: f32, out: &mut Pose) {
        let u = self.normalized_time(local_time);
        for track in &self.tracks {
            if let Some(value) = sample_track(track, u) {
                out.set(&track.bone, value);
            }
        }
    }

    /// Validate basic invariants (non-zero duration, stamps in [0,1] and non-decreasing).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidClip {
            clip: self.name.clone(),
            reason,
        };
        if self.duration_ms == 0 {
            return Err(invalid("duration must be > 0 ms".into()));
        }
        for track in &self.tracks {
            let mut last = -f32::INFINITY;
            for p in &track.points {
                if !p.stamp.is_finite() || p.stamp < 0.0 || p.stamp > 1.0 {
                    return Err(invalid(format!(
                        "keyframe stamp must be in [0,1] and finite for '{}'",
                        track.bone
                    )));
                }
                if p.stamp < last {
                    return Err(invalid(format!(
                        "keyframe stamps must be non-decreasing for '{}'",
                        track.bone
                    )));
                }
                last = p.stamp;
            }
        }
        Ok(())
    }
}

/// Find the segment [i, i+1] containing normalized time u and the local blend
/// factor between the two stamps. Out-of-range u pins to the first/last key.
fn find_segment(points: &[Keyframe], u: f32) -> (usize, usize, f32) {
    let n = points.len();
    if n == 1 || u <= points[0].stamp {
        return (0, 0, 0.0);
    }
    if u >= points[n - 1].stamp {
        return (n - 1, n - 1, 0.0);
    }
    // Keys are sorted; find the first stamp strictly after u.
    let hi = points.partition_point(|p| p.stamp <= u).clamp(1, n - 1);
    let lo = hi - 1;
    let t0 = points[lo].stamp;
    let t1 = points[hi].stamp;
    let denom = (t1 - t0).max(f32::EPSILON);
    (lo, hi, ((u - t0) / denom).clamp(0.0, 1.0))
}

/// Sample a single track at normalized time u ∈ [0,1]. Empty tracks yield nothing.
pub fn sample_track(track: &BoneTrack, u: f32) -> Option<Transform> {
    match track.points.len() {
        0 => None,
        1 => Some(track.points[0].value),
        _ => {
            let (i0, i1, lt) = find_segment(&track.points, u.clamp(0.0, 1.0));
            if i0 == i1 {
                return Some(track.points[i0].value);
            }
            Some(track.points[i0].value.lerp(&track.points[i1].value, lt))
        }
    }
}

/// Parse a JSON clip and validate it.
pub fn parse_clip_json(s: &str) -> Result<AnimationClip, ConfigError> {
    let clip: AnimationClip = serde_json::from_str(s)?;
    clip.validate()?;
    Ok(clip)
}

/// Named clip lookup used to resolve clip names in configs.
#[derive(Clone, Debug, Default)]
pub struct ClipLibrary {
    clips: HashMap<String, ClipHandle>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a clip under its own name, replacing any previous entry.
    pub fn insert(&mut self, clip: ClipHandle) -> Option<ClipHandle> {
        self.clips.insert(clip.name.clone(), clip)
    }

    pub fn get(&self, name: &str) -> Option<&ClipHandle> {
        self.clips.get(name)
    }

    /// Resolve an optional name; a named clip that is missing is an error.
    pub fn resolve(&self, name: Option<&str>) -> Result<Option<ClipHandle>, ConfigError> {
        match name {
            None => Ok(None),
            Some(n) => self
                .clips
                .get(n)
                .cloned()
                .map(Some)
                .ok_or_else(|| ConfigError::UnknownClip(n.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(stamp: f32, x: f32) -> Keyframe {
        Keyframe {
            stamp,
            value: Transform::from_translation([x, 0.0, 0.0]),
        }
    }

    #[test]
    fn samples_between_keys() {
        let clip = AnimationClip::new("slide", 2.0)
            .with_track("hips", vec![key(0.0, 0.0), key(0.5, 1.0), key(1.0, 3.0)]);
        let mut pose = Pose::new();
        clip.sample(0.5, &mut pose);
        assert!((pose.get("hips").unwrap().translation[0] - 0.5).abs() < 1e-5);
        clip.sample(1.5, &mut pose);
        assert!((pose.get("hips").unwrap().translation[0] - 2.0).abs() < 1e-5);
        // Past the end of a non-looping clip holds the last key.
        clip.sample(10.0, &mut pose);
        assert!((pose.get("hips").unwrap().translation[0] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn looping_clip_wraps_local_time() {
        let clip = AnimationClip::new("loop", 1.0).looping(true);
        assert!((clip.normalized_time(1.25) - 0.25).abs() < 1e-5);
        assert!((clip.normalized_time(-0.25) - 0.75).abs() < 1e-5);
    }

    #[test]
    fn zero_duration_is_floored_for_normalization() {
        let clip = AnimationClip::new("empty", 0.0);
        assert_eq!(clip.normalized_time(0.0), 0.0);
        assert!(clip.normalized_time(1.0).is_finite());
        assert!(clip.validate().is_err());
    }

    #[test]
    fn rejects_unsorted_stamps() {
        let clip =
            AnimationClip::new("bad", 1.0).with_track("hips", vec![key(0.6, 0.0), key(0.2, 1.0)]);
        assert!(matches!(clip.validate(), Err(ConfigError::InvalidClip { .. })));
    }

    #[test]
    fn parses_json_with_partial_transforms() {
        let json = r#"{
            "name": "nod",
            "duration": 500,
            "loop": true,
            "tracks": [{ "bone": "head", "points": [{ "stamp": 0.0, "value": { "translation": [0, 1, 0] } }] }]
        }"#;
        let clip = parse_clip_json(json).unwrap();
        assert_eq!(clip.duration(), 0.5);
        assert!(clip.looping);
        let v = clip.tracks[0].points[0].value;
        assert_eq!(v.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(v.scale, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn library_resolves_names() {
        let mut lib = ClipLibrary::new();
        lib.insert(AnimationClip::new("idle", 1.0).into_handle());
        assert!(lib.resolve(Some("idle")).unwrap().is_some());
        assert!(lib.resolve(None).unwrap().is_none());
        assert!(matches!(lib.resolve(Some("run")), Err(ConfigError::UnknownClip(_))));
    }
}
