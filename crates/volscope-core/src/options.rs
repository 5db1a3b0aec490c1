//! Configuration options for volscope.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Global configuration options for volscope.
///
/// Options can be built in code or loaded from a JSON file; missing fields
/// take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Threads in the region scatter pool (0 = one per logical core).
    pub num_threads: usize,

    /// Log filter used when volscope installs the logger (e.g. `"info"`).
    pub log_level: String,

    /// Sampling rate given to new volumes that do not set `samplingRate`.
    pub default_sampling_rate: f32,

    /// Whether to warn when a region write reaches outside the volume.
    pub warn_on_clipped_regions: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            num_threads: 0,
            log_level: "info".to_string(),
            default_sampling_rate: 0.125,
            warn_on_clipped_regions: true,
        }
    }
}

impl Options {
    /// Parses options from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes the options to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
