//! Per-relationship sort metadata.
//!
//! The metadata file maps a relationship to either a bare order
//! (`"P1082": "desc"`) or an object naming the qualifier whose value
//! orders the relationship's values:
//!
//! ```json
//! {"ajax_properties": {"P1082": {"sort_by": "desc", "qualifier": "P585",
//!   "property_datatype": "quantity", "qualifier_datatype": "time"}}}
//! ```
//!
//! Keys of the form `P1082_P585` (per-qualifier orders) are accepted and
//! ignored.

use std::cmp::Ordering;
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::model::{PropertyEntry, ValueEntry};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Default order for a wikidata datatype: newest first for times.
pub fn default_order(datatype: &str) -> SortOrder {
    if datatype == "time" {
        SortOrder::Desc
    } else {
        SortOrder::Asc
    }
}

/// How one relationship's values are ordered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SortSpec {
    #[serde(default)]
    pub sort_by: Option<SortOrder>,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default)]
    pub property_datatype: Option<String>,
    #[serde(default)]
    pub qualifier_datatype: Option<String>,
}

impl SortSpec {
    /// The configured order, else the datatype default of whatever the
    /// values are sorted by.
    pub fn order(&self) -> SortOrder {
        if let Some(order) = self.sort_by {
            return order;
        }
        let datatype = if self.qualifier.is_some() {
            self.qualifier_datatype.as_deref()
        } else {
            self.property_datatype.as_deref()
        };
        datatype.map_or(SortOrder::Asc, default_order)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SortMetadata {
    specs: HashMap<String, SortSpec>,
}

impl SortMetadata {
    pub fn from_json(text: &str) -> Result<Self> {
        let root: JsonValue = serde_json::from_str(text)?;
        let table = match root.get("ajax_properties") {
            Some(inner) => inner,
            None => &root,
        };
        let JsonValue::Object(entries) = table else {
            return Err(Error::Config("sort metadata must be a JSON object".into()));
        };

        let mut specs = HashMap::new();
        for (key, entry) in entries {
            if key.contains('_') {
                continue;
            }
            let spec = match entry {
                JsonValue::String(_) => SortSpec {
                    sort_by: Some(serde_json::from_value(entry.clone())?),
                    qualifier: None,
                    property_datatype: None,
                    qualifier_datatype: None,
                },
                JsonValue::Object(_) => serde_json::from_value(entry.clone())?,
                JsonValue::Null => continue,
                other => {
                    return Err(Error::Config(format!(
                        "sort metadata entry {key}: unexpected value {other}"
                    )))
                }
            };
            specs.insert(key.clone(), spec);
        }
        debug!(entries = specs.len(), "loaded sort metadata");
        Ok(Self { specs })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn get(&self, relationship: &str) -> Option<&SortSpec> {
        self.specs.get(relationship)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Reorder the values of every listed property. Unlisted properties
    /// keep their assembled order.
    pub fn sort_properties(&self, properties: &mut [PropertyEntry]) {
        for property in properties {
            if let Some(spec) = self.get(&property.relationship) {
                sort_values(&mut property.values, spec);
            }
        }
    }
}

/// Stable sort of `values` by the spec's key. Values without the key stay
/// after those that have one, in either direction.
pub fn sort_values(values: &mut [ValueEntry], spec: &SortSpec) {
    let order = spec.order();
    values.sort_by(|a, b| {
        let ka = sort_key(a, spec.qualifier.as_deref());
        let kb = sort_key(b, spec.qualifier.as_deref());
        match (ka, kb) {
            (Some(x), Some(y)) => order.apply(compare_text(x, y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn sort_key<'v>(value: &'v ValueEntry, qualifier: Option<&str>) -> Option<&'v str> {
    match qualifier {
        None => Some(value.value.text()),
        Some(rel) => value
            .qualifiers
            .iter()
            .find(|q| q.relationship == rel)
            .and_then(|q| q.values.first())
            .map(|v| v.value.text()),
    }
}

/// Numbers compare numerically, anything else as text.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (leading_number(a), leading_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// The numeric part of a rendered quantity such as `12.5[12,13]`.
fn leading_number(text: &str) -> Option<f64> {
    let end = text.find(['[', ' ']).unwrap_or(text.len());
    text[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypedValue, ValueKind};

    fn value(text: &str, qualifier: Option<(&str, &str)>) -> ValueEntry {
        let mut entry = ValueEntry::new(TypedValue::Quantity {
            text: text.into(),
            units: None,
            unit_node: None,
        });
        if let Some((rel, q)) = qualifier {
            entry.qualifiers.push(PropertyEntry {
                relationship: rel.into(),
                property: rel.into(),
                kind: ValueKind::Time,
                values: vec![ValueEntry::new(TypedValue::Time { text: q.into() })],
            });
        }
        entry
    }

    fn texts(values: &[ValueEntry]) -> Vec<&str> {
        values.iter().map(|v| v.value.text()).collect()
    }

    #[test]
    fn test_parses_both_shapes() {
        let meta = SortMetadata::from_json(
            r#"{"ajax_properties": {
                "P1082": {"sort_by": "desc", "qualifier": "P585",
                          "property_datatype": "quantity", "qualifier_datatype": "time"},
                "P569": "desc",
                "P1082_P585": "desc",
                "P999": null
            }}"#,
        )
        .unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("P1082").unwrap().qualifier.as_deref(), Some("P585"));
        assert_eq!(meta.get("P569").unwrap().order(), SortOrder::Desc);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(SortMetadata::from_json("[1, 2]"), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_order_from_datatype() {
        let spec = SortSpec {
            sort_by: None,
            qualifier: Some("P585".into()),
            property_datatype: Some("quantity".into()),
            qualifier_datatype: Some("time".into()),
        };
        assert_eq!(spec.order(), SortOrder::Desc);
        assert_eq!(default_order("quantity"), SortOrder::Asc);
    }

    #[test]
    fn test_sort_by_qualifier_desc_missing_last() {
        let spec = SortSpec {
            sort_by: Some(SortOrder::Desc),
            qualifier: Some("P585".into()),
            property_datatype: None,
            qualifier_datatype: None,
        };
        let mut values = vec![
            value("100", Some(("P585", "1990"))),
            value("7", None),
            value("300", Some(("P585", "2020"))),
            value("200", Some(("P585", "2000"))),
        ];
        sort_values(&mut values, &spec);
        assert_eq!(texts(&values), vec!["300", "200", "100", "7"]);
    }

    #[test]
    fn test_sort_by_own_value_numeric() {
        let spec = SortSpec {
            sort_by: Some(SortOrder::Asc),
            qualifier: None,
            property_datatype: None,
            qualifier_datatype: None,
        };
        let mut values = vec![value("100", None), value("9[8,10]", None), value("25", None)];
        sort_values(&mut values, &spec);
        assert_eq!(texts(&values), vec!["9[8,10]", "25", "100"]);
    }
}
