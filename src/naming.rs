//! Display names for machine and experiment tags.
//!
//! Result files carry short tags (`m3.large`, `weave`); plots may want
//! friendlier legend text. The overlay is a JSON object with two optional
//! maps:
//!
//! ```json
//! { "machines": { "m3.large": "AWS m3.large" }, "experiments": { "bare": "Bare metal" } }
//! ```
//!
//! A tag without an entry is shown as-is.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Naming {
    #[serde(default)]
    pub machines: HashMap<String, String>,
    #[serde(default)]
    pub experiments: HashMap<String, String>,
}

impl Naming {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let naming = Self::from_json(&std::fs::read_to_string(path)?)?;
        debug!(
            "Loaded naming overlay {:?} ({} machines, {} experiments)",
            path,
            naming.machines.len(),
            naming.experiments.len()
        );
        Ok(naming)
    }

    pub fn machine<'a>(&'a self, key: &'a str) -> &'a str {
        self.machines.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn experiment<'a>(&'a self, key: &'a str) -> &'a str {
        self.experiments.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Legend text of a series, `"<experiment> on <machine>"`
    pub fn series_name(&self, experiment: &str, machine: &str) -> String {
        format!("{} on {}", self.experiment(experiment), self.machine(machine))
    }
}
