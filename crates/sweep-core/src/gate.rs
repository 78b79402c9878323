//! Site gate
//!
//! Per-site exclusion lists (pause list and whitelist), the membership check
//! that disables the suppression engine on listed domains, and the toggle
//! that flips a domain in or out of a list while keeping the pause list's
//! network rules in step.
//!
//! The persisted lists are passed in explicitly as [`SiteLists`]; storage
//! and the browser's rule registry sit behind the [`DomainStore`] and
//! [`RuleRegistry`] traits. Toggle is a read-modify-write with no locking:
//! two contexts toggling concurrently race and the last write wins.

use std::fmt;
use std::str::FromStr;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::hash::compute_rule_id;
use crate::rules::{NetworkRule, RuleUpdate};
use crate::url::page_domain;

// =============================================================================
// Lists
// =============================================================================

/// A persisted exclusion list, named by its storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteList {
    /// Sites where blocking is paused; mirrored by dynamic network rules
    #[serde(rename = "pausedSites")]
    Paused,
    /// Sites the user trusts; no rules attached
    #[serde(rename = "whitelist")]
    Whitelist,
}

impl SiteList {
    pub const ALL: [SiteList; 2] = [SiteList::Paused, SiteList::Whitelist];

    /// Key the list is stored under.
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Paused => "pausedSites",
            Self::Whitelist => "whitelist",
        }
    }

    /// Whether membership changes add/remove a network rule.
    pub const fn syncs_network_rules(self) -> bool {
        matches!(self, Self::Paused)
    }
}

impl fmt::Display for SiteList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for SiteList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paused" | "pausedSites" => Ok(Self::Paused),
            "whitelist" => Ok(Self::Whitelist),
            _ => Err(format!("Unknown site list '{s}' (expected 'paused' or 'whitelist')")),
        }
    }
}

/// Normalize a hostname for storage and comparison: trimmed, ASCII
/// lowercase, without a trailing root dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// The domain a toggle target names: a page URL's hostname, or a bare
/// domain normalized. `None` when there is no hostname.
pub fn resolve_domain(target: &str) -> Option<String> {
    if target.contains("://") {
        return page_domain(target);
    }
    let domain = normalize_domain(target);
    (!domain.is_empty()).then_some(domain)
}

/// A set of normalized hostnames in insertion order. Deserializes from a
/// JSON array; `null` (a never-written storage key) is the empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Vec<String>")]
pub struct DomainSet {
    domains: Vec<String>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        self.domains.iter().any(|d| *d == domain)
    }

    /// Insert a domain. Returns false if it was already present or blank.
    pub fn insert(&mut self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        if domain.is_empty() || self.domains.contains(&domain) {
            return false;
        }
        self.domains.push(domain);
        true
    }

    /// Remove a domain. Returns false if it was not present.
    pub fn remove(&mut self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        let before = self.domains.len();
        self.domains.retain(|d| *d != domain);
        self.domains.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for DomainSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for domain in iter {
            set.insert(domain.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for DomainSet {
    fn from(domains: Vec<String>) -> Self {
        domains.into_iter().collect()
    }
}

impl From<Option<Vec<String>>> for DomainSet {
    fn from(domains: Option<Vec<String>>) -> Self {
        domains.map(Self::from).unwrap_or_default()
    }
}

impl From<DomainSet> for Vec<String> {
    fn from(set: DomainSet) -> Self {
        set.domains
    }
}

/// Pure membership test.
#[inline]
pub fn is_excluded(domain: &str, set: &DomainSet) -> bool {
    set.contains(domain)
}

/// Both persisted lists, in their storage shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLists {
    #[serde(rename = "pausedSites", default)]
    pub paused: DomainSet,
    #[serde(default)]
    pub whitelist: DomainSet,
}

impl SiteLists {
    pub fn get(&self, list: SiteList) -> &DomainSet {
        match list {
            SiteList::Paused => &self.paused,
            SiteList::Whitelist => &self.whitelist,
        }
    }

    pub fn get_mut(&mut self, list: SiteList) -> &mut DomainSet {
        match list {
            SiteList::Paused => &mut self.paused,
            SiteList::Whitelist => &mut self.whitelist,
        }
    }

    /// Parse the storage snapshot `{"pausedSites": [...], "whitelist": [...]}`.
    /// Missing or `null` keys are empty lists; empty input is no lists at all.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Decides whether the suppression engine runs for a domain.
#[derive(Debug, Clone)]
pub struct SiteGate {
    lists: SiteLists,
    consulted: Vec<SiteList>,
}

impl SiteGate {
    pub fn new(lists: SiteLists, consulted: Vec<SiteList>) -> Self {
        Self { lists, consulted }
    }

    pub fn from_config(lists: SiteLists, config: &EngineConfig) -> Self {
        Self::new(lists, config.gate_lists.clone())
    }

    /// The first consulted list containing `domain`, if any.
    pub fn excluded_by(&self, domain: &str) -> Option<SiteList> {
        self.consulted
            .iter()
            .copied()
            .find(|&list| is_excluded(domain, self.lists.get(list)))
    }

    pub fn is_excluded(&self, domain: &str) -> bool {
        self.excluded_by(domain).is_some()
    }

    pub fn lists(&self) -> &SiteLists {
        &self.lists
    }

    /// Swap in a fresh copy of the persisted lists.
    pub fn replace_lists(&mut self, lists: SiteLists) {
        self.lists = lists;
    }
}

// =============================================================================
// Host seams
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read '{key}': {reason}")]
    Read { key: &'static str, reason: String },
    #[error("Failed to write '{key}': {reason}")]
    Write { key: &'static str, reason: String },
    #[error("Malformed value under '{key}': {reason}")]
    Decode { key: &'static str, reason: String },
}

/// Durable key-value storage holding the site lists.
pub trait DomainStore {
    fn load(&self, list: SiteList) -> Result<DomainSet, StoreError>;
    fn save(&mut self, list: SiteList, domains: &DomainSet) -> Result<(), StoreError>;

    fn load_all(&self) -> Result<SiteLists, StoreError> {
        Ok(SiteLists {
            paused: self.load(SiteList::Paused)?,
            whitelist: self.load(SiteList::Whitelist)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleSyncError {
    #[error("Rule update rejected: {0}")]
    Rejected(String),
}

/// The browser's dynamic network rule set.
pub trait RuleRegistry {
    fn update_rules(&mut self, update: &RuleUpdate) -> Result<(), RuleSyncError>;
}

// =============================================================================
// Toggle
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ToggleError {
    #[error("No domain to toggle")]
    EmptyDomain,
    #[error("No hostname in '{0}'")]
    NoHostname(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The pure half of a toggle: the list's next contents and the rule update
/// that keeps the browser in step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePlan {
    pub list: SiteList,
    pub domain: String,
    /// Whether the domain is in the list after the toggle
    pub listed: bool,
    pub domains: DomainSet,
    pub rules: RuleUpdate,
}

impl TogglePlan {
    /// Id of the rule this plan registers, if any.
    pub fn added_rule_id(&self) -> Option<i32> {
        self.rules.add_rules.first().map(|rule| rule.id)
    }
}

/// Plan a toggle of `target`, a bare domain or the URL of the page to toggle.
pub fn plan_toggle(list: SiteList, target: &str, current: &DomainSet) -> Result<TogglePlan, ToggleError> {
    let domain = match resolve_domain(target) {
        Some(domain) => domain,
        None if target.contains("://") => return Err(ToggleError::NoHostname(target.trim().to_string())),
        None => return Err(ToggleError::EmptyDomain),
    };

    let mut domains = current.clone();
    let listed = if domains.remove(&domain) {
        false
    } else {
        domains.insert(&domain);
        true
    };

    let rules = match (list.syncs_network_rules(), listed) {
        (false, _) => RuleUpdate::default(),
        (true, true) => RuleUpdate::add(NetworkRule::for_paused_domain(&domain)),
        (true, false) => RuleUpdate::remove(compute_rule_id(&domain)),
    };

    Ok(TogglePlan {
        list,
        domain,
        listed,
        domains,
        rules,
    })
}

/// Result of [`toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub list: SiteList,
    pub domain: String,
    pub listed: bool,
    /// Id of the rule added or removed, for lists that carry rules
    pub rule_id: Option<i32>,
    /// False when the rule registry rejected the update
    pub rules_synced: bool,
}

/// Flip `domain` in `list`: read, modify, write back, then sync rules.
///
/// A store failure abandons the toggle. A rule registry failure is logged
/// and reported in the outcome; the list change stands.
pub fn toggle<S, R>(
    list: SiteList,
    domain: &str,
    store: &mut S,
    registry: &mut R,
) -> Result<ToggleOutcome, ToggleError>
where
    S: DomainStore + ?Sized,
    R: RuleRegistry + ?Sized,
{
    let current = store.load(list)?;
    let plan = plan_toggle(list, domain, &current)?;
    store.save(list, &plan.domains)?;

    let rule_id = plan
        .added_rule_id()
        .or_else(|| plan.rules.remove_rule_ids.first().copied());

    let rules_synced = if plan.rules.is_empty() {
        true
    } else {
        match registry.update_rules(&plan.rules) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to sync network rules for {}: {}", plan.domain, e);
                false
            }
        }
    };

    match (plan.listed, rule_id) {
        (true, Some(id)) => info!("Added {} to {}, rule {}", plan.domain, list, id),
        (false, Some(id)) => info!("Removed {} from {}, rule {}", plan.domain, list, id),
        (true, None) => info!("Added {} to {}", plan.domain, list),
        (false, None) => info!("Removed {} from {}", plan.domain, list),
    }

    Ok(ToggleOutcome {
        list,
        domain: plan.domain,
        listed: plan.listed,
        rule_id,
        rules_synced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceType;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        values: HashMap<SiteList, DomainSet>,
        fail_writes: bool,
    }

    impl DomainStore for MemoryStore {
        fn load(&self, list: SiteList) -> Result<DomainSet, StoreError> {
            Ok(self.values.get(&list).cloned().unwrap_or_default())
        }

        fn save(&mut self, list: SiteList, domains: &DomainSet) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Write {
                    key: list.storage_key(),
                    reason: "quota exceeded".to_string(),
                });
            }
            self.values.insert(list, domains.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryRegistry {
        rules: Vec<NetworkRule>,
        reject: bool,
        calls: usize,
    }

    impl RuleRegistry for MemoryRegistry {
        fn update_rules(&mut self, update: &RuleUpdate) -> Result<(), RuleSyncError> {
            self.calls += 1;
            if self.reject {
                return Err(RuleSyncError::Rejected("registry unavailable".to_string()));
            }
            update.apply_to(&mut self.rules);
            Ok(())
        }
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("  Ads.Example.COM. "), "ads.example.com");
        assert_eq!(normalize_domain(""), "");
    }

    #[test]
    fn test_site_list_keys() {
        assert_eq!(SiteList::Paused.storage_key(), "pausedSites");
        assert_eq!(SiteList::Whitelist.storage_key(), "whitelist");
        assert_eq!("paused".parse::<SiteList>(), Ok(SiteList::Paused));
        assert!("blocklist".parse::<SiteList>().is_err());
    }

    #[test]
    fn test_domain_set_dedupes_and_normalizes() {
        let set: DomainSet = ["a.com", "A.com", "b.com.", ""].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["a.com", "b.com"]);
        assert!(set.contains("B.COM"));
    }

    #[test]
    fn test_site_lists_storage_shape() {
        let lists = SiteLists::from_json(r#"{"whitelist": ["mail.google.com"]}"#).unwrap();
        assert!(lists.paused.is_empty());
        assert!(lists.whitelist.contains("mail.google.com"));

        let json = serde_json::to_value(&lists).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "pausedSites": [], "whitelist": ["mail.google.com"] })
        );
    }

    #[test]
    fn test_gate_consults_configured_lists() {
        let lists = SiteLists {
            paused: ["paused.test"].into_iter().collect(),
            whitelist: ["trusted.test"].into_iter().collect(),
        };
        let gate = SiteGate::new(lists.clone(), SiteList::ALL.to_vec());
        assert_eq!(gate.excluded_by("paused.test"), Some(SiteList::Paused));
        assert_eq!(gate.excluded_by("trusted.test"), Some(SiteList::Whitelist));
        assert!(!gate.is_excluded("other.test"));

        let gate = SiteGate::new(lists, vec![SiteList::Whitelist]);
        assert!(!gate.is_excluded("paused.test"));
    }

    #[test]
    fn test_toggle_pause_scenario() {
        let mut store = MemoryStore::default();
        let mut registry = MemoryRegistry::default();

        let on = toggle(SiteList::Paused, "ads.example.com", &mut store, &mut registry).unwrap();
        assert!(on.listed);
        assert!(on.rules_synced);
        assert_eq!(on.rule_id, Some(compute_rule_id("ads.example.com")));
        assert!(store.load(SiteList::Paused).unwrap().contains("ads.example.com"));
        assert_eq!(registry.rules.len(), 1);
        assert_eq!(registry.rules[0].url_filter(), "||ads.example.com");
        assert_eq!(registry.rules[0].condition.resource_types, ResourceType::MAIN_FRAME);
        assert_eq!(registry.rules[0].id, on.rule_id.unwrap());

        let off = toggle(SiteList::Paused, "ads.example.com", &mut store, &mut registry).unwrap();
        assert!(!off.listed);
        assert_eq!(off.rule_id, on.rule_id);
        assert!(store.load(SiteList::Paused).unwrap().is_empty());
        assert!(registry.rules.is_empty());
    }

    #[test]
    fn test_toggle_whitelist_has_no_rules() {
        let mut store = MemoryStore::default();
        let mut registry = MemoryRegistry::default();

        let outcome = toggle(SiteList::Whitelist, "mail.google.com", &mut store, &mut registry).unwrap();
        assert!(outcome.listed);
        assert_eq!(outcome.rule_id, None);
        assert_eq!(registry.calls, 0);
        assert!(store.load(SiteList::Whitelist).unwrap().contains("mail.google.com"));
    }

    #[test]
    fn test_toggle_rejects_blank_domain() {
        let mut store = MemoryStore::default();
        let mut registry = MemoryRegistry::default();
        let err = toggle(SiteList::Paused, "  ", &mut store, &mut registry).unwrap_err();
        assert!(matches!(err, ToggleError::EmptyDomain));
    }

    #[test]
    fn test_toggle_store_failure_skips_rules() {
        let mut store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let mut registry = MemoryRegistry::default();
        let err = toggle(SiteList::Paused, "ads.example.com", &mut store, &mut registry).unwrap_err();
        assert!(matches!(err, ToggleError::Store(StoreError::Write { .. })));
        assert_eq!(registry.calls, 0);
    }

    #[test]
    fn test_toggle_registry_failure_keeps_list_change() {
        let mut store = MemoryStore::default();
        let mut registry = MemoryRegistry {
            reject: true,
            ..MemoryRegistry::default()
        };
        let outcome = toggle(SiteList::Paused, "ads.example.com", &mut store, &mut registry).unwrap();
        assert!(outcome.listed);
        assert!(!outcome.rules_synced);
        assert_eq!(registry.calls, 1);
        assert!(store.load(SiteList::Paused).unwrap().contains("ads.example.com"));
    }

    #[test]
    fn test_plan_toggle_normalizes_domain() {
        let plan = plan_toggle(SiteList::Paused, "Ads.Example.com.", &DomainSet::new()).unwrap();
        assert_eq!(plan.domain, "ads.example.com");
        assert_eq!(plan.added_rule_id(), Some(compute_rule_id("ads.example.com")));
        assert_eq!(plan.rules.add_rules[0].url_filter(), "||ads.example.com");
    }

    #[test]
    fn test_resolve_domain() {
        assert_eq!(resolve_domain("Ads.Example.com").as_deref(), Some("ads.example.com"));
        assert_eq!(
            resolve_domain("https://mail.google.com/inbox").as_deref(),
            Some("mail.google.com")
        );
        assert_eq!(resolve_domain("file:///tmp/x.html"), None);
        assert_eq!(resolve_domain("   "), None);
    }

    #[test]
    fn test_plan_toggle_from_page_url() {
        let plan = plan_toggle(SiteList::Paused, "https://ads.example.com/page?x=1", &DomainSet::new()).unwrap();
        assert_eq!(plan.domain, "ads.example.com");
        assert!(plan.domains.contains("ads.example.com"));
        assert_eq!(plan.rules.add_rules[0].url_filter(), "||ads.example.com");

        let off = plan_toggle(SiteList::Paused, "https://ads.example.com/other", &plan.domains).unwrap();
        assert!(!off.listed);
        assert_eq!(off.rules.remove_rule_ids, vec![compute_rule_id("ads.example.com")]);

        let err = plan_toggle(SiteList::Paused, "file:///tmp/x.html", &DomainSet::new()).unwrap_err();
        assert!(matches!(err, ToggleError::NoHostname(_)));
    }

    #[test]
    fn test_null_storage_keys_are_empty() {
        let lists = SiteLists::from_json(r#"{"pausedSites": null, "whitelist": ["mail.google.com"]}"#).unwrap();
        assert!(lists.paused.is_empty());
        assert!(lists.whitelist.contains("mail.google.com"));

        let set: DomainSet = serde_json::from_str("null").unwrap();
        assert!(set.is_empty());
    }

    proptest! {
        #[test]
        fn membership_follows_insert_and_remove(domain in "[a-z0-9-]{1,20}(\\.[a-z]{2,6}){1,2}") {
            let mut set = DomainSet::new();
            prop_assert!(!is_excluded(&domain, &set));
            set.insert(&domain);
            prop_assert!(is_excluded(&domain, &set));
            set.remove(&domain);
            prop_assert!(!is_excluded(&domain, &set));
        }

        #[test]
        fn double_toggle_restores_list(domain in "[a-z0-9-]{1,20}\\.[a-z]{2,6}") {
            let start: DomainSet = ["keep.test"].into_iter().collect();
            let once = plan_toggle(SiteList::Paused, &domain, &start).unwrap();
            let twice = plan_toggle(SiteList::Paused, &domain, &once.domains).unwrap();
            prop_assert_eq!(twice.domains, start);
            prop_assert_eq!(once.added_rule_id(), twice.rules.remove_rule_ids.first().copied());
        }
    }
}
