// src/scenario/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::Result;
use crate::scenario::model::{RawScenario, Scenario};

/// Read and deserialize a scenario file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawScenario> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(?path, bytes = contents.len(), "read scenario file");
    parse_str(&contents)
}

/// Deserialize a scenario from TOML text without validating it.
pub fn parse_str(contents: &str) -> Result<RawScenario> {
    let raw: RawScenario = toml::from_str(contents)?;
    Ok(raw)
}

/// Read, deserialize and validate a scenario file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Scenario> {
    let raw = load_from_path(&path)?;
    Scenario::try_from(raw)
}
