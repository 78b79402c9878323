//! Selector list
//!
//! The static set of element selectors the suppression engine sweeps.
//! Entries are fixed at build time; configuration may drop the intrusive
//! group or append extra CSS selectors.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use crate::config::EngineConfig;

/// How a selector locates elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Element id (`getElementById`), at most one match
    Id(Cow<'static, str>),
    /// Class name (`getElementsByClassName`)
    Class(Cow<'static, str>),
    /// Arbitrary CSS selector (`querySelectorAll`)
    Css(Cow<'static, str>),
}

impl Selector {
    /// Render as CSS selector syntax.
    pub fn to_css(&self) -> String {
        match self {
            Self::Id(id) => format!("#{}", escape_ident(id)),
            Self::Class(class) => format!(".{}", escape_ident(class)),
            Self::Css(css) => css.to_string(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Which treatment matched elements receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorGroup {
    /// Ad containers: collapsed before removal to avoid layout shift
    Ads,
    /// Popups, modals and tracking nodes: removed outright
    Intrusive,
}

impl SelectorGroup {
    pub const fn collapses(self) -> bool {
        matches!(self, Self::Ads)
    }
}

/// One entry of the sweep list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorEntry {
    pub selector: Selector,
    pub group: SelectorGroup,
}

const fn ads(selector: Selector) -> SelectorEntry {
    SelectorEntry { selector, group: SelectorGroup::Ads }
}

const fn intrusive(selector: Selector) -> SelectorEntry {
    SelectorEntry { selector, group: SelectorGroup::Intrusive }
}

/// Built-in selectors, in sweep order.
pub static BUILTIN_SELECTORS: &[SelectorEntry] = &[
    ads(Selector::Class(Cow::Borrowed("ad-container"))),
    ads(Selector::Id(Cow::Borrowed("banner-ad"))),
    ads(Selector::Id(Cow::Borrowed("ad"))),
    ads(Selector::Css(Cow::Borrowed(r#"div[data-ad="true"]"#))),
    ads(Selector::Css(Cow::Borrowed(r#"div[class*="ad"]"#))),
    ads(Selector::Css(Cow::Borrowed(r#"div[id*="advertisement"]"#))),
    ads(Selector::Css(Cow::Borrowed(".banner-ad"))),
    ads(Selector::Css(Cow::Borrowed("[data-ad-type]"))),
    ads(Selector::Css(Cow::Borrowed(r#"iframe[src*="ads"]"#))),
    intrusive(Selector::Css(Cow::Borrowed(r#"div[class*="popup"]"#))),
    intrusive(Selector::Css(Cow::Borrowed(r#"div[class*="modal"]"#))),
    intrusive(Selector::Css(Cow::Borrowed("[data-tracking]"))),
];

/// The effective, ordered selector list for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    entries: Vec<SelectorEntry>,
}

impl SelectorList {
    /// Built-in selectors with default configuration.
    pub fn builtin() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    /// Built-in selectors filtered and extended by `config`.
    /// Duplicates (by rendered CSS) keep their first position.
    pub fn from_config(config: &EngineConfig) -> Self {
        let builtin = BUILTIN_SELECTORS
            .iter()
            .filter(|entry| config.include_intrusive || entry.group != SelectorGroup::Intrusive)
            .cloned();
        let extra = config
            .extra_selectors
            .iter()
            .map(|css| css.trim())
            .filter(|css| !css.is_empty())
            .map(|css| ads(Selector::Css(Cow::Owned(css.to_string()))));

        let mut seen = HashSet::new();
        let entries = builtin
            .chain(extra)
            .filter(|entry| seen.insert(entry.selector.to_css()))
            .collect();

        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All selectors joined into one selector group, for a hiding stylesheet.
    pub fn to_css_group(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.selector.to_css())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Escape an identifier for use after `#` or `.`.
fn escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, c) in ident.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            // Leading digits must be written as a hex escape
            out.push_str(&format!("\\{:x} ", c as u32));
            continue;
        }
        let plain = c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
        if !plain {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
