//! Error types surfaced by graph construction, per-layer calls, and config loading.

use thiserror::Error;

use crate::ids::LayerIndex;

/// Errors raised by the graph API. Everything else on the per-frame path is
/// absorbed (logged and ignored) rather than returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The evaluation context is missing or was already destroyed.
    #[error("evaluation context is invalid or destroyed")]
    InvalidContext,
    /// No animator handle was supplied to receive the final pose.
    #[error("no animator target supplied")]
    MissingTarget,
    #[error("layer index {index} is out of range (0..{count})")]
    IndexOutOfRange { index: LayerIndex, count: usize },
}

/// Errors produced while loading clips or controller configs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid clip '{clip}': {reason}")]
    InvalidClip { clip: String, reason: String },
    #[error("unknown bone mask '{0}'")]
    UnknownMask(String),
    #[error("unknown clip '{0}'")]
    UnknownClip(String),
}

/// Errors from building a controller: graph construction or config resolution.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
