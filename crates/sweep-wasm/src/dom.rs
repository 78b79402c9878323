//! `web-sys` implementations of the engine's DOM and observation seams.

use sweep_core::engine::{Dom, DomError, Observation};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, MutationObserver, MutationObserverInit, Node};

/// The live page document.
pub struct WebDom {
    document: Document,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Node to observe: the body, or the root element before the body exists.
    pub fn observe_target(&self) -> Option<Node> {
        match self.document.body() {
            Some(body) => Some(body.into()),
            None => self.document.document_element().map(Into::into),
        }
    }
}

impl Dom for WebDom {
    type Element = Element;

    fn query_all(&self, selector: &str) -> Result<Vec<Element>, DomError> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| DomError::InvalidSelector {
                selector: selector.to_string(),
                reason: describe(&e),
            })?;

        Ok((0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Result<Option<Element>, DomError> {
        Ok(self.document.get_element_by_id(id))
    }

    fn elements_by_class(&self, class: &str) -> Result<Vec<Element>, DomError> {
        // The collection is live; copy it before anything is removed.
        let collection = self.document.get_elements_by_class_name(class);
        Ok((0..collection.length())
            .filter_map(|i| collection.item(i))
            .collect())
    }

    fn collapse(&self, element: &Element) -> Result<(), DomError> {
        // SVG and other non-HTML elements have no inline style to collapse.
        let Some(html) = element.dyn_ref::<HtmlElement>() else {
            return Ok(());
        };
        let style = html.style();
        style
            .set_property("visibility", "hidden")
            .and_then(|()| style.set_property("height", "0px"))
            .map_err(|e| DomError::Collapse(describe(&e)))
    }

    fn remove(&self, element: &Element) -> Result<(), DomError> {
        if element.parent_node().is_none() {
            return Err(DomError::Removal("element is already detached".to_string()));
        }
        element.remove();
        Ok(())
    }
}

type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

/// A connected `MutationObserver` and the callback it invokes.
pub struct WebObservation {
    observer: MutationObserver,
    _callback: MutationCallback,
}

impl WebObservation {
    /// Observe child list changes in the subtree under `target`.
    pub fn observe(target: &Node, callback: MutationCallback) -> Result<Self, JsValue> {
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(target, &init)?;
        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Observation for WebObservation {
    fn cancel(&mut self) {
        self.observer.disconnect();
    }
}

/// Best-effort text for a thrown JS value.
pub fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
