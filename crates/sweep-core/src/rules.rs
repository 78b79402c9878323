//! Network rule records
//!
//! Builds the declarativeNetRequest rules the extension registers: the
//! static ruleset shipped with the extension and the per-domain rule that
//! follows a domain in and out of the pause list.

use serde::{Deserialize, Serialize};

use crate::hash::compute_rule_id;
use crate::types::{ResourceType, RuleAction};

/// Rule priority used for every rule we register.
pub const DEFAULT_PRIORITY: u32 = 1;

/// A declarative network rule, serialized in the browser's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRule {
    pub id: i32,
    pub priority: u32,
    pub action: RuleActionSpec,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActionSpec {
    #[serde(rename = "type")]
    pub kind: RuleAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: ResourceType,
}

impl NetworkRule {
    /// Create a block rule with the default priority.
    pub fn block(id: i32, url_filter: impl Into<String>, resource_types: ResourceType) -> Self {
        Self {
            id,
            priority: DEFAULT_PRIORITY,
            action: RuleActionSpec { kind: RuleAction::Block },
            condition: RuleCondition {
                url_filter: url_filter.into(),
                resource_types,
            },
        }
    }

    /// The rule that accompanies `domain` while it sits in the pause list.
    ///
    /// `domain` is expected to be normalized already (see
    /// [`crate::gate::normalize_domain`]), so the id matches the one computed
    /// again on removal.
    pub fn for_paused_domain(domain: &str) -> Self {
        Self::block(
            compute_rule_id(domain),
            format!("||{domain}"),
            ResourceType::MAIN_FRAME,
        )
    }

    pub fn url_filter(&self) -> &str {
        &self.condition.url_filter
    }
}

/// Argument to the host's dynamic rule update call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(default)]
    pub add_rules: Vec<NetworkRule>,
    #[serde(default)]
    pub remove_rule_ids: Vec<i32>,
}

impl RuleUpdate {
    pub fn add(rule: NetworkRule) -> Self {
        Self {
            add_rules: vec![rule],
            remove_rule_ids: Vec::new(),
        }
    }

    pub fn remove(id: i32) -> Self {
        Self {
            add_rules: Vec::new(),
            remove_rule_ids: vec![id],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add_rules.is_empty() && self.remove_rule_ids.is_empty()
    }

    /// Apply this update to a locally held rule set the way the browser does:
    /// removals first, then additions replacing any rule with the same id.
    pub fn apply_to(&self, rules: &mut Vec<NetworkRule>) {
        rules.retain(|rule| !self.remove_rule_ids.contains(&rule.id));
        for rule in &self.add_rules {
            rules.retain(|existing| existing.id != rule.id);
            rules.push(rule.clone());
        }
    }
}

/// Rules shipped with the extension and registered at startup.
/// Ids here must stay below [`crate::hash::RULE_ID_BASE`].
pub fn static_rules() -> Vec<NetworkRule> {
    vec![NetworkRule::block(
        1,
        "*://*.ads.example.com/*",
        ResourceType::MAIN_FRAME
            | ResourceType::SUB_FRAME
            | ResourceType::SCRIPT
            | ResourceType::IMAGE
            | ResourceType::STYLESHEET
            | ResourceType::OBJECT
            | ResourceType::XMLHTTPREQUEST,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::RULE_ID_BASE;

    #[test]
    fn test_paused_domain_rule() {
        let rule = NetworkRule::for_paused_domain("ads.example.com");
        assert_eq!(rule.id, compute_rule_id("ads.example.com"));
        assert_eq!(rule.url_filter(), "||ads.example.com");
        assert_eq!(rule.condition.resource_types, ResourceType::MAIN_FRAME);
        assert_eq!(rule.action.kind, RuleAction::Block);
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = NetworkRule::block(7, "||x.test", ResourceType::MAIN_FRAME);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 7,
                "priority": 1,
                "action": { "type": "block" },
                "condition": { "urlFilter": "||x.test", "resourceTypes": ["main_frame"] }
            })
        );
    }

    #[test]
    fn test_update_json_shape() {
        let update = RuleUpdate::remove(1234);
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, serde_json::json!({ "addRules": [], "removeRuleIds": [1234] }));
    }

    #[test]
    fn test_static_ids_below_dynamic_range() {
        for rule in static_rules() {
            assert!(rule.id >= 1 && rule.id < RULE_ID_BASE);
        }
    }

    #[test]
    fn test_static_rule_types() {
        let rules = static_rules();
        let names: Vec<_> = rules[0].condition.resource_types.names().collect();
        assert_eq!(
            names,
            vec!["main_frame", "sub_frame", "stylesheet", "script", "image", "object", "xmlhttprequest"]
        );
    }

    #[test]
    fn test_apply_to_replaces_same_id() {
        let mut rules = vec![NetworkRule::block(5, "||a.test", ResourceType::MAIN_FRAME)];
        RuleUpdate::add(NetworkRule::block(5, "||b.test", ResourceType::MAIN_FRAME)).apply_to(&mut rules);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].url_filter(), "||b.test");

        RuleUpdate::remove(5).apply_to(&mut rules);
        assert!(rules.is_empty());
    }
}
