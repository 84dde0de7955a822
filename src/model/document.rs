//! Flat response documents for the item, related-items and search endpoints.

use serde::Serialize;

use super::{TypedValue, ValueKind};

/// One value of a property, with its qualifiers nested one level deep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueEntry {
    #[serde(flatten)]
    pub value: TypedValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<PropertyEntry>,
}

impl ValueEntry {
    pub fn new(value: TypedValue) -> Self {
        Self { value, qualifiers: Vec::new() }
    }
}

/// All values of one relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyEntry {
    #[serde(rename = "ref")]
    pub relationship: String,
    /// Relationship display label.
    pub property: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub values: Vec<ValueEntry>,
}

/// A thumbnail in the item gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    pub url: String,
    pub text: String,
}

/// A link to the item's page on another site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sitelink {
    #[serde(rename = "ref")]
    pub relationship: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The document served by `/kb/item` and `/kb/related_items`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDocument {
    #[serde(rename = "ref")]
    pub node: String,
    pub text: String,
    pub description: String,
    pub properties: Vec<PropertyEntry>,
    pub xrefs: Vec<PropertyEntry>,
    pub sitelinks: Vec<Sitelink>,
    pub gallery: Vec<GalleryImage>,
}

/// One `/kb/query` hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    #[serde(rename = "ref")]
    pub node: String,
    pub text: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<SearchMatch>,
}
