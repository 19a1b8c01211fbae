//! Pose values and the blend math used by mixers and layers.
//!
//! - `Transform` is split into TRS so each part blends on its own terms
//!   (translation/scale lerp, rotation NLERP with shortest-arc correction).
//! - `Pose` maps bone names to transforms. Bones missing from a pose read as
//!   `Transform::IDENTITY` when composited.
//! - `PoseAccumulator` collects weighted contributions and normalizes by the
//!   total weight, the same way track values are accumulated per target.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

const IDENTITY_QUAT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
fn normalize4(mut q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        q[0] *= inv_len;
        q[1] *= inv_len;
        q[2] *= inv_len;
        q[3] *= inv_len;
        q
    } else {
        IDENTITY_QUAT
    }
}

/// Quaternion NLERP with shortest-arc correction.
/// If dot < 0, negate the second quaternion to ensure the shortest path.
/// Returns a normalized quaternion (x,y,z,w).
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize4([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

/// Hamilton product `a * b` for (x,y,z,w) quaternions.
#[inline]
pub fn mul_quat(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

fn default_translation() -> [f32; 3] {
    [0.0; 3]
}

fn default_rotation() -> [f32; 4] {
    IDENTITY_QUAT
}

fn default_scale() -> [f32; 3] {
    [1.0; 3]
}

/// Local bone transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default = "default_translation")]
    pub translation: [f32; 3],
    /// Quaternion (x, y, z, w)
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0; 3],
        rotation: IDENTITY_QUAT,
        scale: [1.0; 3],
    };

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: [f32; 4]) -> Self {
        Self {
            rotation: normalize4(rotation),
            ..Self::IDENTITY
        }
    }

    /// Blend toward `other` by `t` (override semantics).
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            translation: lerp_vec3(self.translation, other.translation, t),
            rotation: nlerp_quat(self.rotation, other.rotation, t),
            scale: lerp_vec3(self.scale, other.scale, t),
        }
    }

    /// Apply `delta` on top of `self`, scaled by `weight` (additive semantics).
    pub fn add_weighted(&self, delta: &Transform, weight: f32) -> Transform {
        let rot = nlerp_quat(IDENTITY_QUAT, delta.rotation, weight);
        Transform {
            translation: [
                self.translation[0] + delta.translation[0] * weight,
                self.translation[1] + delta.translation[1] * weight,
                self.translation[2] + delta.translation[2] * weight,
            ],
            rotation: normalize4(mul_quat(self.rotation, rot)),
            scale: [
                self.scale[0] * lerp_f32(1.0, delta.scale[0], weight),
                self.scale[1] * lerp_f32(1.0, delta.scale[1], weight),
                self.scale[2] * lerp_f32(1.0, delta.scale[2], weight),
            ],
        }
    }
}

/// Bone name → local transform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    bones: HashMap<String, Transform>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, bone: &str) -> Option<&Transform> {
        self.bones.get(bone)
    }

    #[inline]
    pub fn set(&mut self, bone: &str, value: Transform) {
        if let Some(slot) = self.bones.get_mut(bone) {
            *slot = value;
        } else {
            self.bones.insert(bone.to_string(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Transform)> {
        self.bones.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.bones.clear();
    }
}

/// Per-bone filter restricting which bones a layer may write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneMask {
    pub name: String,
    pub bones: HashSet<String>,
}

impl BoneMask {
    pub fn new<I, S>(name: &str, bones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            bones: bones.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn contains(&self, bone: &str) -> bool {
        self.bones.contains(bone)
    }
}

#[derive(Clone, Debug)]
struct AccumEntry {
    t_sum: [f32; 3],
    r_sum: [f32; 4], // sign-aligned weighted sum; normalized at finalize
    s_sum: [f32; 3],
    w: f32,
}

impl AccumEntry {
    fn from_value(v: &Transform, w: f32) -> Self {
        let t = v.translation;
        let r = v.rotation;
        let s = v.scale;
        Self {
            t_sum: [t[0] * w, t[1] * w, t[2] * w],
            r_sum: [r[0] * w, r[1] * w, r[2] * w, r[3] * w],
            s_sum: [s[0] * w, s[1] * w, s[2] * w],
            w,
        }
    }

    fn add_value(&mut self, v: &Transform, w: f32) {
        for i in 0..3 {
            self.t_sum[i] += v.translation[i] * w;
            self.s_sum[i] += v.scale[i] * w;
        }
        // Keep every contribution on the same hemisphere as the running sum.
        let sign = if dot4(self.r_sum, v.rotation) < 0.0 {
            -1.0
        } else {
            1.0
        };
        for i in 0..4 {
            self.r_sum[i] += v.rotation[i] * w * sign;
        }
        self.w += w;
    }

    fn finalize(self) -> Option<Transform> {
        if self.w <= 0.0 {
            return None;
        }
        let w = self.w;
        Some(Transform {
            translation: [self.t_sum[0] / w, self.t_sum[1] / w, self.t_sum[2] / w],
            rotation: normalize4(self.r_sum),
            scale: [self.s_sum[0] / w, self.s_sum[1] / w, self.s_sum[2] / w],
        })
    }
}

/// Accumulates weighted poses and blends them per bone.
#[derive(Default)]
pub struct PoseAccumulator {
    map: HashMap<String, AccumEntry>,
}

impl PoseAccumulator {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn add(&mut self, pose: &Pose, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        for (bone, value) in pose.iter() {
            match self.map.get_mut(bone) {
                Some(entry) => entry.add_value(value, weight),
                None => {
                    self.map
                        .insert(bone.to_string(), AccumEntry::from_value(value, weight));
                }
            }
        }
    }

    pub fn finalize(self) -> Pose {
        let mut out = Pose::new();
        for (bone, entry) in self.map.into_iter() {
            if let Some(v) = entry.finalize() {
                out.bones.insert(bone, v);
            }
        }
        out
    }
}
