use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "state-machines")]
    state_machines: HashMap<String, StateMachineEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateMachineEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl StateMachineEntry {
    fn as_path(&self) -> &str {
        match self {
            StateMachineEntry::Path(path) => path,
            StateMachineEntry::Detailed { path, .. } => path,
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            StateMachineEntry::Path(_) => None,
            StateMachineEntry::Detailed { description, .. } => description.as_deref(),
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod state_machines {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = MANIFEST.state_machines.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        Ok(resolve_path(entry.as_path()))
    }

    pub fn description(name: &str) -> Result<Option<String>> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        Ok(entry.description().map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_is_readable_json() {
        for key in state_machines::keys() {
            let value: serde_json::Value =
                state_machines::load(&key).unwrap_or_else(|e| panic!("{key}: {e:#}"));
            assert!(value.get("states").is_some(), "{key} has no states");
        }
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        assert!(state_machines::json("does-not-exist").is_err());
    }
}
