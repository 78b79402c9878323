//! AdSweep Core Library
//!
//! This crate provides the platform-independent logic of the AdSweep content
//! blocker: which elements to sweep from a page, when a site is exempt, and
//! which network rules accompany a paused site.
//!
//! # Architecture
//!
//! The page-side engine is a [`PageSession`]: it checks the page URL and the
//! persisted site lists, sweeps the DOM once, then sweeps again on every
//! mutation batch until the page goes away. The DOM, the mutation observer,
//! storage and the browser's rule registry are reached through traits so the
//! wasm bindings and the CLI can supply their own.
//!
//! # Modules
//!
//! - `hash`: Murmur3 hashing and rule id derivation
//! - `url`: page eligibility and hostname extraction
//! - `selectors`: built-in selector list
//! - `engine`: sweep, DOM seam and page session
//! - `gate`: site lists, exclusion check and toggle
//! - `rules`: declarative network rule records
//! - `config`: engine configuration
//! - `types`: shared type definitions

pub mod config;
pub mod engine;
pub mod gate;
pub mod hash;
pub mod rules;
pub mod selectors;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{Dom, DomError, Observation, PageSession, SessionState, Suppressor, SweepStats};
pub use gate::{
    is_excluded, plan_toggle, resolve_domain, toggle, DomainSet, DomainStore, RuleRegistry,
    SiteGate, SiteList, SiteLists, ToggleOutcome, TogglePlan,
};
pub use hash::{compute_rule_id, RULE_ID_BASE};
pub use rules::{static_rules, NetworkRule, RuleUpdate};
pub use selectors::{Selector, SelectorList};
pub use types::{ResourceType, RuleAction};
pub use url::{is_eligible, page_domain};
