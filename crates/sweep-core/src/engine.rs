//! Suppression engine
//!
//! Sweeps the page for elements matching the selector list and removes
//! them. The DOM is reached through the [`Dom`] trait so the same sweep runs
//! against `web-sys` in the extension and against fakes in tests.
//!
//! A [`PageSession`] ties one page's sweep to the site gate and to the
//! mutation observation that re-runs it:
//!
//! ```text
//! start ──excluded──▶ Excluded(list) ◀──┐
//!   │                    │ update_lists │ update_lists
//!   ▼                    ▼              │
//! Active ◀──────────── (allowed) ───────┘
//!   │ teardown (any state)
//!   ▼
//! TornDown
//! ```

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::gate::{SiteGate, SiteList, SiteLists};
use crate::selectors::{Selector, SelectorList};
use crate::url::{is_eligible, page_domain};

// =============================================================================
// DOM seam
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DomError {
    #[error("Selector '{selector}' rejected: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("Failed to collapse element: {0}")]
    Collapse(String),
    #[error("Failed to remove element: {0}")]
    Removal(String),
}

/// The operations the sweep needs from a document.
pub trait Dom {
    type Element;

    /// All elements currently matching a CSS selector, in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, DomError>;

    /// The element with the given id, if any.
    fn element_by_id(&self, id: &str) -> Result<Option<Self::Element>, DomError>;

    /// All elements carrying a class name.
    fn elements_by_class(&self, class: &str) -> Result<Vec<Self::Element>, DomError>;

    /// Zero the element's height and hide it.
    fn collapse(&self, element: &Self::Element) -> Result<(), DomError>;

    /// Detach the element from the document.
    fn remove(&self, element: &Self::Element) -> Result<(), DomError>;
}

/// Handle to a running mutation observation.
pub trait Observation {
    /// Stop delivering mutation batches.
    fn cancel(&mut self);
}

// =============================================================================
// Sweep
// =============================================================================

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub matched: usize,
    pub removed: usize,
    pub failed: usize,
}

impl SweepStats {
    fn merge(&mut self, other: SweepStats) {
        self.matched += other.matched;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Applies a selector list to a document.
#[derive(Debug, Clone)]
pub struct Suppressor {
    selectors: SelectorList,
    collapse_before_remove: bool,
}

impl Suppressor {
    pub fn new(selectors: SelectorList, collapse_before_remove: bool) -> Self {
        Self {
            selectors,
            collapse_before_remove,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(SelectorList::from_config(config), config.collapse_before_remove)
    }

    pub fn selectors(&self) -> &SelectorList {
        &self.selectors
    }

    /// Remove every element matching any selector.
    ///
    /// Failures are per element or per selector: they are logged and counted
    /// and the sweep moves on. Removed elements no longer match, so a second
    /// sweep over an unchanged document finds nothing.
    pub fn apply<D: Dom>(&self, dom: &D) -> SweepStats {
        let mut stats = SweepStats::default();

        for entry in self.selectors.iter() {
            let elements = match find(dom, &entry.selector) {
                Ok(elements) => elements,
                Err(e) => {
                    warn!("Skipping selector {}: {}", entry.selector, e);
                    continue;
                }
            };

            let collapse = self.collapse_before_remove && entry.group.collapses();
            stats.merge(remove_all(dom, &elements, collapse));
        }

        if stats.matched > 0 {
            debug!(
                "Sweep matched {} element(s), removed {}, failed {}",
                stats.matched, stats.removed, stats.failed
            );
        }
        stats
    }
}

fn find<D: Dom>(dom: &D, selector: &Selector) -> Result<Vec<D::Element>, DomError> {
    match selector {
        Selector::Id(id) => Ok(dom.element_by_id(id)?.into_iter().collect()),
        Selector::Class(class) => dom.elements_by_class(class),
        Selector::Css(css) => dom.query_all(css),
    }
}

fn remove_all<D: Dom>(dom: &D, elements: &[D::Element], collapse: bool) -> SweepStats {
    let mut stats = SweepStats {
        matched: elements.len(),
        ..SweepStats::default()
    };

    for element in elements {
        let result = if collapse {
            dom.collapse(element).and_then(|()| dom.remove(element))
        } else {
            dom.remove(element)
        };

        match result {
            Ok(()) => stats.removed += 1,
            Err(e) => {
                warn!("Ad removal failed: {}", e);
                stats.failed += 1;
            }
        }
    }

    stats
}

// =============================================================================
// Page session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Sweeping on every mutation batch
    Active,
    /// The domain sits in a gating list; nothing is swept
    Excluded(SiteList),
    /// Observation cancelled; the session is inert
    TornDown,
}

/// One page's engine: gate, sweep and observation handle.
pub struct PageSession<D: Dom, O: Observation> {
    dom: D,
    domain: String,
    gate: SiteGate,
    suppressor: Suppressor,
    observation: Option<O>,
    state: SessionState,
    sweeps: usize,
}

impl<D: Dom, O: Observation> PageSession<D, O> {
    /// Start the engine on a page. Returns `None` for ineligible URLs.
    ///
    /// When the domain is not excluded the first sweep runs immediately.
    pub fn start(dom: D, url: &str, lists: SiteLists, config: &EngineConfig) -> Option<Self> {
        if !is_eligible(url) {
            info!("Not starting on ineligible page {}", url);
            return None;
        }
        let domain = page_domain(url)?;

        let mut session = Self {
            dom,
            domain,
            gate: SiteGate::from_config(lists, config),
            suppressor: Suppressor::from_config(config),
            observation: None,
            state: SessionState::Active,
            sweeps: 0,
        };
        session.refresh_state();
        if session.state == SessionState::Active {
            session.sweep();
        }
        Some(session)
    }

    /// Keep the observation handle so teardown can cancel it.
    /// A handle attached after teardown is cancelled at once.
    pub fn attach(&mut self, mut observation: O) {
        if self.state == SessionState::TornDown {
            observation.cancel();
            return;
        }
        if let Some(mut previous) = self.observation.replace(observation) {
            previous.cancel();
        }
    }

    /// Handle one batch of DOM mutations.
    pub fn on_mutations(&mut self) -> Option<SweepStats> {
        if self.state != SessionState::Active {
            return None;
        }
        Some(self.sweep())
    }

    /// Swap in fresh persisted lists, re-evaluating the gate.
    pub fn update_lists(&mut self, lists: SiteLists) {
        if self.state == SessionState::TornDown {
            return;
        }
        let was_active = self.state == SessionState::Active;
        self.gate.replace_lists(lists);
        self.refresh_state();
        if !was_active && self.state == SessionState::Active {
            self.sweep();
        }
    }

    /// Cancel the observation. Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(mut observation) = self.observation.take() {
            observation.cancel();
        }
        if self.state != SessionState::TornDown {
            debug!("Engine torn down on {} after {} sweep(s)", self.domain, self.sweeps);
        }
        self.state = SessionState::TornDown;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    fn refresh_state(&mut self) {
        self.state = match self.gate.excluded_by(&self.domain) {
            Some(list) => {
                if self.state == SessionState::Active {
                    info!("Blocking disabled on {} ({})", self.domain, list);
                }
                SessionState::Excluded(list)
            }
            None => SessionState::Active,
        };
    }

    fn sweep(&mut self) -> SweepStats {
        self.sweeps += 1;
        self.suppressor.apply(&self.dom)
    }
}

impl<D: Dom, O: Observation> Drop for PageSession<D, O> {
    fn drop(&mut self) {
        if let Some(mut observation) = self.observation.take() {
            observation.cancel();
        }
    }
}
