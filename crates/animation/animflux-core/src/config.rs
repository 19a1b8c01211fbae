//! Declarative graph and layer configuration.
//!
//! Everything here is plain data consumed at construction time. A
//! `ControllerConfig` with an empty layer list falls back to [`default_layers`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::events::AnimationEventStream;
use crate::locomotion::LocomotionConfig;
use crate::pose::BoneMask;

fn default_graph_name() -> String {
    "AnimFluxGraph".to_string()
}

fn default_crossfade() -> f32 {
    0.15
}

fn default_layer_capacity() -> usize {
    4
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_name")]
    pub graph_name: String,
    /// Fade used by play requests that do not name one, in seconds.
    #[serde(default = "default_crossfade")]
    pub default_crossfade: f32,
    /// Expected number of layers; used to pre-size collections.
    #[serde(default = "default_layer_capacity")]
    pub layer_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_name: default_graph_name(),
            default_crossfade: default_crossfade(),
            layer_capacity: default_layer_capacity(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Override,
    Additive,
}

impl BlendMode {
    pub fn is_additive(self) -> bool {
        matches!(self, BlendMode::Additive)
    }
}

/// Role a layer plays for the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Base,
    UpperBody,
    Additive,
    Ik,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerType::Base => "Base",
            LayerType::UpperBody => "UpperBody",
            LayerType::Additive => "Additive",
            LayerType::Ik => "IK",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub layer_type: LayerType,
    #[serde(default)]
    pub name: String,
    /// Name of a mask in [`ControllerConfig::masks`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default = "default_weight")]
    pub default_weight: f32,
    #[serde(default)]
    pub blend_mode: BlendMode,
}

impl LayerDefinition {
    pub fn new(layer_type: LayerType, default_weight: f32, blend_mode: BlendMode) -> Self {
        Self {
            layer_type,
            name: String::new(),
            mask: None,
            default_weight,
            blend_mode,
        }
    }

    /// The configured name, or the layer type when none was given.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.layer_type.to_string()
        } else {
            self.name.clone()
        }
    }

    pub fn weight(&self) -> f32 {
        self.default_weight.clamp(0.0, 1.0)
    }
}

/// Base, UpperBody, Additive and IK, with only the base layer audible.
pub fn default_layers() -> Vec<LayerDefinition> {
    vec![
        LayerDefinition::new(LayerType::Base, 1.0, BlendMode::Override),
        LayerDefinition::new(LayerType::UpperBody, 0.0, BlendMode::Override),
        LayerDefinition::new(LayerType::Additive, 0.0, BlendMode::Additive),
        LayerDefinition::new(LayerType::Ik, 0.0, BlendMode::Override),
    ]
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
    #[serde(default)]
    pub masks: Vec<BoneMask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locomotion: Option<LocomotionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<AnimationEventStream>,
}

impl ControllerConfig {
    /// Configured layers, or the defaults when none are listed.
    pub fn effective_layers(&self) -> Vec<LayerDefinition> {
        if self.layers.is_empty() {
            default_layers()
        } else {
            self.layers.clone()
        }
    }

    pub fn mask(&self, name: &str) -> Result<Arc<BoneMask>, ConfigError> {
        self.masks
            .iter()
            .find(|m| m.name == name)
            .map(|m| Arc::new(m.clone()))
            .ok_or_else(|| ConfigError::UnknownMask(name.to_string()))
    }

    /// Resolve a layer's mask reference, if it has one.
    pub fn layer_mask(
        &self,
        layer: &LayerDefinition,
    ) -> Result<Option<Arc<BoneMask>>, ConfigError> {
        layer.mask.as_deref().map(|name| self.mask(name)).transpose()
    }

    /// Check that every layer's mask reference resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for layer in &self.layers {
            self.layer_mask(layer)?;
        }
        Ok(())
    }
}

/// Parse and validate a controller config.
pub fn parse_controller_config_json(s: &str) -> Result<ControllerConfig, ConfigError> {
    let mut config: ControllerConfig = serde_json::from_str(s)?;
    config.validate()?;
    if let Some(events) = config.events.as_mut() {
        events.sort_markers();
    }
    Ok(config)
}
