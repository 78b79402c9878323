//! Core type definitions for AdSweep
//!
//! These types mirror the browser's declarativeNetRequest records and are
//! shared between the rule builder, the site gate and the bindings.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

// =============================================================================
// Rule Actions
// =============================================================================

/// Action to take for a matched network rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleAction {
    /// Cancels the request
    Block,
}

// =============================================================================
// Resource Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Resource type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u32 {
        const MAIN_FRAME = 1 << 0;   // main document
        const SUB_FRAME = 1 << 1;    // iframe/frame
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const OTHER = 1 << 12;

        /// Document types (main_frame + sub_frame)
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUB_FRAME.bits();
    }
}

/// Browser names for each single resource type, in serialization order.
const RESOURCE_TYPE_NAMES: &[(ResourceType, &str)] = &[
    (ResourceType::MAIN_FRAME, "main_frame"),
    (ResourceType::SUB_FRAME, "sub_frame"),
    (ResourceType::STYLESHEET, "stylesheet"),
    (ResourceType::SCRIPT, "script"),
    (ResourceType::IMAGE, "image"),
    (ResourceType::FONT, "font"),
    (ResourceType::OBJECT, "object"),
    (ResourceType::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceType::PING, "ping"),
    (ResourceType::CSP_REPORT, "csp_report"),
    (ResourceType::MEDIA, "media"),
    (ResourceType::WEBSOCKET, "websocket"),
    (ResourceType::OTHER, "other"),
];

impl ResourceType {
    /// Parse from browser resource type string.
    pub fn from_dnr_name(s: &str) -> Option<Self> {
        RESOURCE_TYPE_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(ty, _)| *ty)
    }

    /// Browser names of every type in this mask.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        RESOURCE_TYPE_NAMES
            .iter()
            .filter(move |(ty, _)| self.contains(*ty))
            .map(|(_, name)| *name)
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for name in self.names() {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamesVisitor;

        impl<'de> Visitor<'de> for NamesVisitor {
            type Value = ResourceType;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a list of resource type names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut mask = ResourceType::empty();
                while let Some(name) = seq.next_element::<String>()? {
                    let ty = ResourceType::from_dnr_name(&name).ok_or_else(|| {
                        de::Error::custom(format!("unknown resource type: {name}"))
                    })?;
                    mask |= ty;
                }
                Ok(mask)
            }
        }

        deserializer.deserialize_seq(NamesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dnr_name() {
        assert_eq!(ResourceType::from_dnr_name("main_frame"), Some(ResourceType::MAIN_FRAME));
        assert_eq!(ResourceType::from_dnr_name("sub_frame"), Some(ResourceType::SUB_FRAME));
        assert_eq!(ResourceType::from_dnr_name("beacon"), None);
    }

    #[test]
    fn test_names_in_browser_order() {
        let mask = ResourceType::SCRIPT | ResourceType::MAIN_FRAME;
        let names: Vec<_> = mask.names().collect();
        assert_eq!(names, vec!["main_frame", "script"]);
    }

    #[test]
    fn test_serialize_as_name_list() {
        let json = serde_json::to_string(&ResourceType::DOCUMENT).unwrap();
        assert_eq!(json, r#"["main_frame","sub_frame"]"#);
    }

    #[test]
    fn test_deserialize_rejects_unknown() {
        let err = serde_json::from_str::<ResourceType>(r#"["main_frame","popup"]"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_action_name() {
        assert_eq!(serde_json::to_string(&RuleAction::Block).unwrap(), r#""block""#);
    }
}
