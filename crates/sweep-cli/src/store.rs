//! File-backed stand-ins for the extension's storage and rule registry.
//!
//! A state directory holds `storage.json` (the key-value storage object) and
//! `dynamic_rules.json` (the registered dynamic rules).

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sweep_core::gate::{RuleSyncError, StoreError};
use sweep_core::{DomainSet, DomainStore, NetworkRule, RuleRegistry, RuleUpdate, SiteList};

pub const STORAGE_FILE: &str = "storage.json";
pub const RULES_FILE: &str = "dynamic_rules.json";

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STORAGE_FILE),
        }
    }

    fn read_object(&self, key: &'static str) -> Result<Map<String, Value>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    key,
                    reason: format!("{}: {}", self.path.display(), e),
                })
            }
        };

        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::Decode {
                key,
                reason: format!("{} is not a JSON object", self.path.display()),
            }),
            Err(e) => Err(StoreError::Decode {
                key,
                reason: e.to_string(),
            }),
        }
    }
}

impl DomainStore for FileStore {
    fn load(&self, list: SiteList) -> Result<DomainSet, StoreError> {
        let key = list.storage_key();
        let mut object = self.read_object(key)?;
        match object.remove(key) {
            None | Some(Value::Null) => Ok(DomainSet::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| StoreError::Decode {
                key,
                reason: e.to_string(),
            }),
        }
    }

    fn save(&mut self, list: SiteList, domains: &DomainSet) -> Result<(), StoreError> {
        let key = list.storage_key();
        // Keep whatever else lives in storage.
        let mut object = self.read_object(key)?;
        let value = serde_json::to_value(domains).map_err(|e| StoreError::Write {
            key,
            reason: e.to_string(),
        })?;
        object.insert(key.to_string(), value);

        write_json(&self.path, &Value::Object(object)).map_err(|reason| StoreError::Write { key, reason })
    }
}

pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(RULES_FILE),
        }
    }

    /// Currently registered dynamic rules.
    pub fn rules(&self) -> Result<Vec<NetworkRule>, String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| format!("Malformed '{}': {}", self.path.display(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(format!("Failed to read '{}': {}", self.path.display(), e)),
        }
    }
}

impl RuleRegistry for FileRegistry {
    fn update_rules(&mut self, update: &RuleUpdate) -> Result<(), RuleSyncError> {
        let mut rules = self.rules().map_err(RuleSyncError::Rejected)?;
        update.apply_to(&mut rules);
        let value = serde_json::to_value(&rules).map_err(|e| RuleSyncError::Rejected(e.to_string()))?;
        write_json(&self.path, &value).map_err(RuleSyncError::Rejected)
    }
}

fn write_json(path: &Path, value: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to encode '{}': {}", path.display(), e))?;
    fs::write(path, text + "\n").map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}
