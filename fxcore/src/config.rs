//! Region configuration surface.
//!
//! A configuration names, per function, the region proposed for
//! extraction: either an explicit set of textual block labels or a source
//! line span. The driver loads it exactly once before any per-function
//! analysis call and passes it around as an immutable value; nothing in
//! the engine reads configuration from ambient state.
//!
//! ```toml
//! [regions]
//! grayscale = { blocks = ["for.cond", "for.body", "for.end"] }
//! blur = { lines = [110, 142] }
//! ```
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use strum::EnumIs;

use crate::Error;

/// How one function's target region is identified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, EnumIs)]
#[serde(untagged)]
pub enum RegionSpec {
    /// Explicit block-label set. Matches only when the labels account for
    /// the function's blocks exactly (no missing, no extra).
    Blocks { blocks: BTreeSet<String> },

    /// Closed source-line span `[start, end]`; the region is every block
    /// whose instructions fall within it.
    Lines { lines: [u32; 2] },
}

/// Full region configuration, keyed by function name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub regions: BTreeMap<String, RegionSpec>,
}

impl ExtractConfig {
    /// Parse a configuration from TOML text.
    pub fn from_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file. Intended to be called once at startup.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// The region spec configured for `function`, if any.
    pub fn spec_for(&self, function: &str) -> Option<&RegionSpec> {
        self.regions.get(function)
    }
}
