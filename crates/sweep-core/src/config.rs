//! Engine configuration
//!
//! Passed explicitly into each page session (JSON from the extension glue,
//! or a file for the CLI). Every field has a default, so `{}` is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::gate::SiteList;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid engine config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    /// Zero the height and hide ad elements before removing them.
    #[serde(default = "default_true")]
    pub collapse_before_remove: bool,

    /// Also sweep popups, modals and tracking nodes.
    #[serde(default = "default_true")]
    pub include_intrusive: bool,

    /// CSS selectors appended after the built-in list.
    #[serde(default)]
    pub extra_selectors: Vec<String>,

    /// Lists whose members disable the engine.
    #[serde(default = "default_gate_lists")]
    pub gate_lists: Vec<SiteList>,
}

fn default_true() -> bool {
    true
}

fn default_gate_lists() -> Vec<SiteList> {
    vec![SiteList::Paused, SiteList::Whitelist]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collapse_before_remove: true,
            include_intrusive: true,
            extra_selectors: Vec::new(),
            gate_lists: default_gate_lists(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration. Empty input yields the defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
        assert_eq!(EngineConfig::from_json("  ").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_json(
            r#"{ "includeIntrusive": false, "gateLists": ["whitelist"] }"#,
        )
        .unwrap();
        assert!(config.collapse_before_remove);
        assert!(!config.include_intrusive);
        assert_eq!(config.gate_lists, vec![SiteList::Whitelist]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_json(r#"{ "collapse": true }"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid engine config"));
    }

    #[test]
    fn test_unknown_list_rejected() {
        assert!(EngineConfig::from_json(r#"{ "gateLists": ["blocklist"] }"#).is_err());
    }
}
