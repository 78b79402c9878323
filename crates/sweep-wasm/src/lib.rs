//! WebAssembly bindings for AdSweep
//!
//! Two sets of exports:
//!
//! - Page context: [`start_page`] runs the suppression engine against the
//!   live document and returns a [`PageHandle`] the content glue must keep
//!   alive for the life of the page.
//! - Background context: eligibility, rule ids, exclusion checks and toggle
//!   planning. Storage and `declarativeNetRequest` calls stay in the glue,
//!   which performs the I/O these functions describe.

mod dom;
mod logger;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use sweep_core::{
    engine::SessionState, gate::normalize_domain, DomainSet, EngineConfig, PageSession,
    SelectorList, SiteList, SiteLists,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, MutationObserver, Window};

use crate::dom::{WebDom, WebObservation};

type WebSession = PageSession<WebDom, WebObservation>;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn json_value(json: &str) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(json)
}

// =============================================================================
// Logging
// =============================================================================

/// Route `log` output to the console at the given level
/// (`error`, `warn`, `info`, `debug`, `trace`, `off`).
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    logger::install(logger::parse_level(level));
}

// =============================================================================
// Page context
// =============================================================================

/// The running engine on one page.
#[wasm_bindgen]
pub struct PageHandle {
    session: Rc<RefCell<WebSession>>,
    window: Window,
    on_pagehide: Closure<dyn FnMut(Event)>,
}

/// Start the suppression engine on the current page.
///
/// `lists_json` is the storage snapshot (`{"pausedSites": [...],
/// "whitelist": [...]}`), `config_json` an engine config (may be empty).
/// Returns `undefined` when the page is ineligible.
#[wasm_bindgen]
pub fn start_page(url: &str, lists_json: &str, config_json: &str) -> Result<Option<PageHandle>, JsValue> {
    let config = EngineConfig::from_json(config_json).map_err(js_error)?;
    let lists = SiteLists::from_json(lists_json).map_err(js_error)?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window in this context"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document in this context"))?;

    let session = match WebSession::start(WebDom::new(document), url, lists, &config) {
        Some(session) => session,
        None => return Ok(None),
    };
    let target = session
        .dom()
        .observe_target()
        .ok_or_else(|| JsValue::from_str("Document has no root element"))?;
    let session = Rc::new(RefCell::new(session));

    let weak = Rc::downgrade(&session);
    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |_records: js_sys::Array, _observer: MutationObserver| {
            with_session(&weak, |session| {
                session.on_mutations();
            });
        },
    );
    let observation = WebObservation::observe(&target, callback)?;
    session.borrow_mut().attach(observation);

    let weak = Rc::downgrade(&session);
    let on_pagehide = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        with_session(&weak, |session| session.teardown());
    });
    window.add_event_listener_with_callback("pagehide", on_pagehide.as_ref().unchecked_ref())?;

    Ok(Some(PageHandle {
        session,
        window,
        on_pagehide,
    }))
}

fn with_session(weak: &Weak<RefCell<WebSession>>, f: impl FnOnce(&mut WebSession)) {
    let Some(session) = weak.upgrade() else {
        return;
    };
    // A callback arriving while the session is borrowed would only repeat
    // work the borrower is already doing.
    if let Ok(mut session) = session.try_borrow_mut() {
        f(&mut session);
    };
}

#[wasm_bindgen]
impl PageHandle {
    /// Replace the site lists after a storage change.
    pub fn update_lists(&self, lists_json: &str) -> Result<(), JsValue> {
        let lists = SiteLists::from_json(lists_json).map_err(js_error)?;
        self.session.borrow_mut().update_lists(lists);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.borrow().is_active()
    }

    /// `active`, `excluded:<list>` or `tornDown`.
    pub fn state(&self) -> String {
        match self.session.borrow().state() {
            SessionState::Active => "active".to_string(),
            SessionState::Excluded(list) => format!("excluded:{}", list.storage_key()),
            SessionState::TornDown => "tornDown".to_string(),
        }
    }

    pub fn domain(&self) -> String {
        self.session.borrow().domain().to_string()
    }

    pub fn sweeps(&self) -> usize {
        self.session.borrow().sweeps()
    }

    /// Disconnect the observer. Also runs on `pagehide`.
    pub fn teardown(&self) {
        self.session.borrow_mut().teardown();
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if let Err(e) = self
            .window
            .remove_event_listener_with_callback("pagehide", self.on_pagehide.as_ref().unchecked_ref())
        {
            log::warn!("Failed to remove pagehide listener: {}", dom::describe(&e));
        }
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.teardown();
        }
    }
}

/// The effective selectors joined into one CSS selector group.
#[wasm_bindgen]
pub fn selector_css(config_json: &str) -> Result<String, JsValue> {
    let config = EngineConfig::from_json(config_json).map_err(js_error)?;
    Ok(SelectorList::from_config(&config).to_css_group())
}

// =============================================================================
// Background context
// =============================================================================

/// Whether content scripts may be injected into a page at `url`.
#[wasm_bindgen]
pub fn is_eligible(url: &str) -> bool {
    let eligible = sweep_core::is_eligible(url);
    if !eligible {
        log::info!("Skipping injection into ineligible page {}", url);
    }
    eligible
}

/// Normalized hostname of `url`, if it has one.
#[wasm_bindgen]
pub fn page_domain(url: &str) -> Option<String> {
    sweep_core::page_domain(url)
}

#[wasm_bindgen]
pub fn compute_rule_id(domain: &str) -> i32 {
    sweep_core::compute_rule_id(&normalize_domain(domain))
}

/// Whether `domain` is in the list given as a JSON array of hostnames.
#[wasm_bindgen]
pub fn is_excluded(domain: &str, list_json: &str) -> Result<bool, JsValue> {
    let set: DomainSet = serde_json::from_str(list_json).map_err(js_error)?;
    Ok(sweep_core::is_excluded(domain, &set))
}

/// Plan a toggle in `list` (`paused` / `pausedSites` / `whitelist`) given
/// the list's current JSON array. `target` is the active tab's URL or a bare
/// domain; a URL toggles its hostname.
///
/// Returns `{list, domain, listed, domains, rules: {addRules, removeRuleIds}}`:
/// the glue writes `domains` back under the list's key, then passes `rules`
/// to `updateDynamicRules`.
#[wasm_bindgen]
pub fn plan_toggle(list: &str, target: &str, current_json: &str) -> Result<JsValue, JsValue> {
    let list: SiteList = list.parse().map_err(|e: String| JsValue::from_str(&e))?;
    let current: DomainSet = if current_json.trim().is_empty() {
        DomainSet::new()
    } else {
        serde_json::from_str(current_json).map_err(js_error)?
    };

    let plan = sweep_core::plan_toggle(list, target, &current).map_err(js_error)?;
    match plan.added_rule_id() {
        Some(id) => log::info!("Pausing {}, adding rule {}", plan.domain, id),
        None if plan.listed => log::info!("Adding {} to {}", plan.domain, list),
        None => log::info!("Removing {} from {}", plan.domain, list),
    }

    json_value(&serde_json::to_string(&plan).map_err(js_error)?)
}

/// The static ruleset, for registration at startup.
#[wasm_bindgen]
pub fn static_rules() -> Result<JsValue, JsValue> {
    json_value(&serde_json::to_string(&sweep_core::static_rules()).map_err(js_error)?)
}
