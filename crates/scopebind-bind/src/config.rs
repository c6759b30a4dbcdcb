use serde::{Deserialize, Serialize};

/// How record-shaped members of an array-valued resolution are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessDecoding {
    /// A record member is a liveness map: `{value: alive}`.
    #[default]
    Structural,
    /// Record members are rejected. For hosts that decode set attributes
    /// before they reach the context.
    Disabled,
}

/// Configuration for the filter binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Decoding of record members inside array-valued resolutions
    pub liveness: LivenessDecoding,
    /// Treat a reference that resolves to nothing as an error instead of
    /// binding `Undefined`
    pub require_resolved: bool,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            liveness: LivenessDecoding::Structural,
            require_resolved: false,
        }
    }
}
