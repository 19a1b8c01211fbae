//! Per-tick evaluation: tickers, time advance, pose sampling, delivery.

use crate::animator::AnimatorHandle;
use crate::ids::NodeId;
use crate::pose::{Pose, PoseAccumulator, Transform};

use super::node::NodeKind;
use super::PlayableGraph;

impl PlayableGraph {
    /// Advance the graph by `dt` seconds and push the resulting pose to every
    /// output. A stopped graph still delivers its pose, with a zero delta.
    ///
    /// Node events from the previous tick are discarded; read them with
    /// [`PlayableGraph::drain_node_events`] before the next call.
    pub fn evaluate(&mut self, dt: f32) {
        if !self.valid {
            return;
        }
        let delta = if self.playing && dt.is_finite() {
            dt.max(0.0)
        } else {
            0.0
        };
        self.frame += 1;
        self.events.clear();

        self.run_tickers(delta);

        let roots: Vec<NodeId> = self.outputs.iter().filter_map(|o| o.source).collect();
        for root in roots {
            self.advance_times(root, delta);
        }

        let deliveries: Vec<(AnimatorHandle, Pose)> = self
            .outputs
            .iter()
            .filter_map(|o| o.source.map(|s| (o.target.clone(), self.evaluate_pose(s))))
            .collect();
        for (target, pose) in deliveries {
            match target.try_borrow_mut() {
                Ok(mut animator) => animator.apply_pose(&pose),
                Err(_) => log::warn!(
                    "graph '{}': animator is borrowed elsewhere; pose dropped this tick",
                    self.name
                ),
            }
        }
    }

    /// Call every bound ticker once. Tickers may unbind themselves or others;
    /// an entry removed earlier in the same pass is skipped.
    fn run_tickers(&mut self, delta: f32) {
        let snapshot = self.tickers.clone();
        for (node, tick) in snapshot {
            if self.is_ticking(node) {
                tick(self, node, delta);
            }
        }
    }

    /// Move local time forward for `root` and its subtree. Each node's speed
    /// scales the delta seen by everything beneath it.
    fn advance_times(&mut self, root: NodeId, delta: f32) {
        let mut stack = vec![(root, delta)];
        while let Some((id, dt)) = stack.pop() {
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            let scaled = dt * node.speed;
            if let NodeKind::Clip(playback) = &mut node.kind {
                playback.time += scaled;
            }
            stack.extend(node.inputs.iter().filter_map(|i| i.source).map(|s| (s, scaled)));
        }
    }

    /// Sample the pose produced by `id`. Stale ids produce an empty pose.
    pub fn evaluate_pose(&self, id: NodeId) -> Pose {
        let Some(node) = self.node(id) else {
            return Pose::new();
        };
        match &node.kind {
            NodeKind::Clip(playback) => {
                let mut pose = Pose::new();
                playback.clip.sample(playback.time, &mut pose);
                pose
            }
            NodeKind::Crossfade(_) => {
                let mut acc = PoseAccumulator::new();
                for input in &node.inputs {
                    if let Some(src) = input.source {
                        if input.weight > 0.0 {
                            acc.add(&self.evaluate_pose(src), input.weight);
                        }
                    }
                }
                acc.finalize()
            }
            NodeKind::LayerMixer(layers) => {
                let mut out = Pose::new();
                for (input, blend) in node.inputs.iter().zip(layers) {
                    let Some(src) = input.source else { continue };
                    let w = input.weight.clamp(0.0, 1.0);
                    if w <= 0.0 {
                        continue;
                    }
                    let layer_pose = self.evaluate_pose(src);
                    for (bone, value) in layer_pose.iter() {
                        if let Some(mask) = &blend.mask {
                            if !mask.contains(bone) {
                                continue;
                            }
                        }
                        let base = out.get(bone).copied().unwrap_or(Transform::IDENTITY);
                        let blended = if blend.additive {
                            base.add_weighted(value, w)
                        } else {
                            base.lerp(value, w)
                        };
                        out.set(bone, blended);
                    }
                }
                out
            }
        }
    }
}
