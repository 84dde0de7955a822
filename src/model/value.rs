//! Rendered literal values.
//!
//! A `TypedValue` is what a raw KGTK cell becomes once classified. Each
//! kind carries exactly the fields it renders; the wire form is a flat
//! object with `ref`, `text`, `description`, `lang`, `url` and `units`
//! present only when the kind defines them.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// The kind of a rendered value, as sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "/w/item")]
    Item,
    #[serde(rename = "/w/text")]
    Text,
    #[serde(rename = "/w/string")]
    String,
    #[serde(rename = "/w/quantity")]
    Quantity,
    #[serde(rename = "/w/time")]
    Time,
    #[serde(rename = "/w/geo")]
    Geo,
    #[serde(rename = "/w/external-id")]
    ExternalId,
    #[serde(rename = "/w/unknown")]
    Unknown,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Item => "/w/item",
            ValueKind::Text => "/w/text",
            ValueKind::String => "/w/string",
            ValueKind::Quantity => "/w/quantity",
            ValueKind::Time => "/w/time",
            ValueKind::Geo => "/w/geo",
            ValueKind::ExternalId => "/w/external-id",
            ValueKind::Unknown => "/w/unknown",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Item {
        node: String,
        text: String,
        description: String,
    },
    Text {
        text: String,
        /// Language display name (or the raw tag when unresolved).
        lang: String,
        url: Option<String>,
    },
    String {
        text: String,
        url: Option<String>,
    },
    Quantity {
        text: String,
        /// Rendered unit, either SI text or the unit node's label.
        units: Option<String>,
        /// Unit node id, when the unit is a graph node.
        unit_node: Option<String>,
    },
    Time {
        text: String,
    },
    Geo {
        text: String,
        lat: Option<f64>,
        lon: Option<f64>,
        url: String,
    },
    ExternalId {
        text: String,
        url: Option<String>,
    },
    Unknown {
        text: String,
    },
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Item { .. } => ValueKind::Item,
            TypedValue::Text { .. } => ValueKind::Text,
            TypedValue::String { .. } => ValueKind::String,
            TypedValue::Quantity { .. } => ValueKind::Quantity,
            TypedValue::Time { .. } => ValueKind::Time,
            TypedValue::Geo { .. } => ValueKind::Geo,
            TypedValue::ExternalId { .. } => ValueKind::ExternalId,
            TypedValue::Unknown { .. } => ValueKind::Unknown,
        }
    }

    /// The display text every kind carries.
    pub fn text(&self) -> &str {
        match self {
            TypedValue::Item { text, .. }
            | TypedValue::Text { text, .. }
            | TypedValue::String { text, .. }
            | TypedValue::Quantity { text, .. }
            | TypedValue::Time { text }
            | TypedValue::Geo { text, .. }
            | TypedValue::ExternalId { text, .. }
            | TypedValue::Unknown { text } => text,
        }
    }

    /// The node this value links to, if any.
    pub fn node_ref(&self) -> Option<&str> {
        match self {
            TypedValue::Item { node, .. } => Some(node),
            TypedValue::Quantity { unit_node, .. } => unit_node.as_deref(),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            TypedValue::Text { url, .. }
            | TypedValue::String { url, .. }
            | TypedValue::ExternalId { url, .. } => url.as_deref(),
            TypedValue::Geo { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(node) = self.node_ref() {
            map.serialize_entry("ref", node)?;
        }
        map.serialize_entry("text", self.text())?;
        match self {
            TypedValue::Item { description, .. } => {
                map.serialize_entry("description", description)?;
            }
            TypedValue::Text { lang, .. } => {
                map.serialize_entry("lang", lang)?;
            }
            TypedValue::Quantity { units: Some(units), .. } => {
                map.serialize_entry("units", units)?;
            }
            _ => {}
        }
        if let Some(url) = self.url() {
            map.serialize_entry("url", url)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_wire_shape() {
        let v = TypedValue::Item {
            node: "Q5".into(),
            text: "human".into(),
            description: "Q5".into(),
        };
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"ref": "Q5", "text": "human", "description": "Q5"})
        );
    }

    #[test]
    fn test_quantity_wire_shape_omits_absent_fields() {
        let v = TypedValue::Quantity { text: "12".into(), units: None, unit_node: None };
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"text": "12"}));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ValueKind::Time.as_str(), "/w/time");
        assert_eq!(serde_json::to_value(ValueKind::Geo).unwrap(), json!("/w/geo"));
    }
}
