//! # Query Engine
//!
//! The contract between the browser and the graph store. The browser only
//! ever asks a fixed set of named questions; every engine answers them with
//! a `Frame` whose header is fixed per query kind.
//!
//! ## Implementations
//!
//! | Engine | Module | Description |
//! |--------|--------|-------------|
//! | `MemoryEngine` | `memory` | In-memory edge tables for testing/embedding |
//! | `SqliteEngine` | `sqlite` | KGTK graph cache in a SQLite file |
//!
//! ## Language filtering
//!
//! A label matches language `L` when it is a language-qualified string
//! whose full tag equals `L`. `LANGUAGE_ANY` disables the filter.
//!
//! ## Row caps
//!
//! A query carrying `limit: 0` is capped at the engine's `max_results`.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use serde::{Deserialize, Serialize};

use crate::classify::stringify;
use crate::frame::{Frame, FromRow};
use crate::model::{Edge, ItemEdge, QualifierEdge};
use crate::{Error, Result};

pub use memory::MemoryEngine;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;

/// Language code that disables language filtering.
pub const LANGUAGE_ANY: &str = "any";

/// Default per-query row cap.
pub const DEFAULT_MAX_RESULTS: usize = 10_000;

// ============================================================================
// Graph schema
// ============================================================================

/// Table names and relationship labels of a KGTK graph cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSchema {
    pub edges_table: String,
    pub qualifiers_table: String,
    pub labels_table: String,
    pub aliases_table: String,
    pub descriptions_table: String,
    pub metadata_table: String,
    pub datatypes_table: String,

    pub label_label: String,
    pub alias_label: String,
    pub description_label: String,
    pub image_label: String,
    pub fanout_label: String,
    pub datatype_label: String,
    pub formatter_label: String,
    pub subproperty_label: String,
    pub language_code_label: String,
    pub instance_of_label: String,
    pub language_classes: Vec<String>,
}

impl Default for GraphSchema {
    fn default() -> Self {
        Self {
            edges_table: "claims".into(),
            qualifiers_table: "qualifiers".into(),
            labels_table: "labels".into(),
            aliases_table: "aliases".into(),
            descriptions_table: "descriptions".into(),
            metadata_table: "metadata".into(),
            datatypes_table: "datatypes".into(),
            label_label: "label".into(),
            alias_label: "alias".into(),
            description_label: "description".into(),
            image_label: "P18".into(),
            fanout_label: "count_distinct_properties".into(),
            datatype_label: "datatype".into(),
            formatter_label: "P1630".into(),
            subproperty_label: "P1647".into(),
            language_code_label: "P424".into(),
            instance_of_label: "P31".into(),
            language_classes: vec!["Q34770".into(), "Q1288568".into(), "Q33742".into()],
        }
    }
}

/// The logical graphs a cache holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphTable {
    Edges,
    Qualifiers,
    Labels,
    Aliases,
    Descriptions,
    Metadata,
    Datatypes,
}

impl GraphTable {
    pub const ALL: [GraphTable; 7] = [
        GraphTable::Edges,
        GraphTable::Qualifiers,
        GraphTable::Labels,
        GraphTable::Aliases,
        GraphTable::Descriptions,
        GraphTable::Metadata,
        GraphTable::Datatypes,
    ];
}

impl GraphSchema {
    /// Table names are spliced into SQL, so they must be plain identifiers.
    pub fn validate(&self) -> Result<()> {
        for graph in GraphTable::ALL {
            let name = self.table(graph);
            let mut chars = name.chars();
            let valid = chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(Error::Config(format!("invalid table name '{name}'")));
            }
        }
        Ok(())
    }

    pub fn table(&self, graph: GraphTable) -> &str {
        match graph {
            GraphTable::Edges => &self.edges_table,
            GraphTable::Qualifiers => &self.qualifiers_table,
            GraphTable::Labels => &self.labels_table,
            GraphTable::Aliases => &self.aliases_table,
            GraphTable::Descriptions => &self.descriptions_table,
            GraphTable::Metadata => &self.metadata_table,
            GraphTable::Datatypes => &self.datatypes_table,
        }
    }
}

// ============================================================================
// Named queries
// ============================================================================

/// Parameters shared by the node-data edge queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeQuery {
    pub node: String,
    pub lang: String,
    pub images: bool,
    pub fanouts: bool,
}

/// Every question the browser asks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    NodeLabels { node: String, lang: String },
    NodeAliases { node: String, lang: String },
    NodeDescriptions { node: String, lang: String },
    NodeImages { node: String },
    NodeEdges(EdgeQuery),
    NodeInverseEdges(EdgeQuery),
    NodeEdgeQualifiers(EdgeQuery),
    NodeInverseEdgeQualifiers(EdgeQuery),

    ItemEdges { node: String, lang: String, limit: usize },
    ItemInverseEdges { node: String, lang: String, limit: usize },
    ItemQualifiers { node: String, lang: String, limit: usize },
    ItemQualifiersByEdge { edge_id: String, lang: String, limit: usize },
    ItemQualifiersIn { edge_ids: Vec<String>, lang: String, limit: usize },

    FormatterTemplate { relationship: String },
    SubpropertyRelationships { lang: String },
    LanguageLabels { code: String, lang: String },

    MatchItemExactly { node: String, lang: String, limit: usize },
    MatchLabelExactly { label: String, lang: String, ignore_case: bool, limit: usize },
    MatchItemPrefix { prefix: String, lang: String, limit: usize },
    MatchLabelPrefix { prefix: String, lang: String, ignore_case: bool, limit: usize },
}

/// Query names, used for headers and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    NodeLabels,
    NodeAliases,
    NodeDescriptions,
    NodeImages,
    NodeEdges,
    NodeInverseEdges,
    NodeEdgeQualifiers,
    NodeInverseEdgeQualifiers,
    ItemEdges,
    ItemInverseEdges,
    ItemQualifiers,
    ItemQualifiersByEdge,
    ItemQualifiersIn,
    FormatterTemplate,
    SubpropertyRelationships,
    LanguageLabels,
    MatchItemExactly,
    MatchLabelExactly,
    MatchItemPrefix,
    MatchLabelPrefix,
}

pub const NODE_EDGE_HEADER: &[&str] =
    &["id", "node1", "label", "node2", "node_label", "node_image", "node_fanout"];
pub const NODE_MATCH_HEADER: &[&str] = &["node1", "node_label"];

impl QueryKind {
    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::NodeLabels => "node_labels",
            QueryKind::NodeAliases => "node_aliases",
            QueryKind::NodeDescriptions => "node_descriptions",
            QueryKind::NodeImages => "node_images",
            QueryKind::NodeEdges => "node_edges",
            QueryKind::NodeInverseEdges => "node_inverse_edges",
            QueryKind::NodeEdgeQualifiers => "node_edge_qualifiers",
            QueryKind::NodeInverseEdgeQualifiers => "node_inverse_edge_qualifiers",
            QueryKind::ItemEdges => "item_edges",
            QueryKind::ItemInverseEdges => "item_inverse_edges",
            QueryKind::ItemQualifiers => "item_qualifiers",
            QueryKind::ItemQualifiersByEdge => "item_qualifiers_by_edge",
            QueryKind::ItemQualifiersIn => "item_qualifiers_in",
            QueryKind::FormatterTemplate => "formatter_template",
            QueryKind::SubpropertyRelationships => "subproperty_relationships",
            QueryKind::LanguageLabels => "language_labels",
            QueryKind::MatchItemExactly => "match_item_exactly",
            QueryKind::MatchLabelExactly => "match_label_exactly",
            QueryKind::MatchItemPrefix => "match_item_prefix",
            QueryKind::MatchLabelPrefix => "match_label_prefix",
        }
    }

    /// The fixed column names of this query's result.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            QueryKind::NodeLabels => &["node1", "node_label"],
            QueryKind::NodeAliases => &["node1", "node_alias"],
            QueryKind::NodeDescriptions => &["node1", "node_description"],
            QueryKind::NodeImages => &["node1", "node_image"],
            QueryKind::NodeEdges
            | QueryKind::NodeInverseEdges
            | QueryKind::NodeEdgeQualifiers
            | QueryKind::NodeInverseEdgeQualifiers => NODE_EDGE_HEADER,
            QueryKind::ItemEdges | QueryKind::ItemInverseEdges => ItemEdge::COLUMNS,
            QueryKind::ItemQualifiers
            | QueryKind::ItemQualifiersByEdge
            | QueryKind::ItemQualifiersIn => QualifierEdge::COLUMNS,
            QueryKind::FormatterTemplate => &["node2"],
            QueryKind::SubpropertyRelationships => &["node1", "node2", "node1_label"],
            QueryKind::LanguageLabels => &["node1", "node1_label"],
            QueryKind::MatchItemExactly
            | QueryKind::MatchLabelExactly
            | QueryKind::MatchItemPrefix
            | QueryKind::MatchLabelPrefix => NODE_MATCH_HEADER,
        }
    }
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::NodeLabels { .. } => QueryKind::NodeLabels,
            Query::NodeAliases { .. } => QueryKind::NodeAliases,
            Query::NodeDescriptions { .. } => QueryKind::NodeDescriptions,
            Query::NodeImages { .. } => QueryKind::NodeImages,
            Query::NodeEdges(_) => QueryKind::NodeEdges,
            Query::NodeInverseEdges(_) => QueryKind::NodeInverseEdges,
            Query::NodeEdgeQualifiers(_) => QueryKind::NodeEdgeQualifiers,
            Query::NodeInverseEdgeQualifiers(_) => QueryKind::NodeInverseEdgeQualifiers,
            Query::ItemEdges { .. } => QueryKind::ItemEdges,
            Query::ItemInverseEdges { .. } => QueryKind::ItemInverseEdges,
            Query::ItemQualifiers { .. } => QueryKind::ItemQualifiers,
            Query::ItemQualifiersByEdge { .. } => QueryKind::ItemQualifiersByEdge,
            Query::ItemQualifiersIn { .. } => QueryKind::ItemQualifiersIn,
            Query::FormatterTemplate { .. } => QueryKind::FormatterTemplate,
            Query::SubpropertyRelationships { .. } => QueryKind::SubpropertyRelationships,
            Query::LanguageLabels { .. } => QueryKind::LanguageLabels,
            Query::MatchItemExactly { .. } => QueryKind::MatchItemExactly,
            Query::MatchLabelExactly { .. } => QueryKind::MatchLabelExactly,
            Query::MatchItemPrefix { .. } => QueryKind::MatchItemPrefix,
            Query::MatchLabelPrefix { .. } => QueryKind::MatchLabelPrefix,
        }
    }
}

// ============================================================================
// Label patterns
// ============================================================================

/// How a label search compares stored labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelPattern {
    Exact(String),
    Prefix(String),
}

impl LabelPattern {
    /// The stored form of `label` in `lang`. With `LANGUAGE_ANY` the tag is
    /// left open, so any language matches.
    pub fn exact(label: &str, lang: &str) -> Self {
        if lang == LANGUAGE_ANY {
            LabelPattern::Prefix(stringify(label, ""))
        } else {
            LabelPattern::Exact(stringify(label, lang))
        }
    }

    /// Labels whose text starts with `prefix`.
    pub fn prefix(prefix: &str) -> Self {
        let quoted = stringify(prefix, "");
        let open = quoted.strip_suffix("'@").unwrap_or(&quoted);
        LabelPattern::Prefix(open.to_string())
    }

    /// ASCII case folding, matching SQLite's `upper()`.
    pub fn matches(&self, value: &str, ignore_case: bool) -> bool {
        let fold = |s: &str| if ignore_case { s.to_ascii_uppercase() } else { s.to_string() };
        match self {
            LabelPattern::Exact(p) => fold(value) == fold(p),
            LabelPattern::Prefix(p) => fold(value).starts_with(&fold(p)),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            LabelPattern::Exact(p) | LabelPattern::Prefix(p) => p,
        }
    }
}

// ============================================================================
// Engine capabilities
// ============================================================================

/// What an engine tolerates.
#[derive(Debug, Clone, Default)]
pub struct EngineCapabilities {
    /// Safe to query from several threads at once without serialization.
    pub concurrent_readers: bool,
    pub max_results: usize,
}

// ============================================================================
// QueryEngine Trait
// ============================================================================

/// The store contract.
///
/// Engines are synchronous; callers that run inside an async runtime move
/// work onto a blocking thread.
pub trait QueryEngine: Send + Sync + 'static {
    /// Run one named query.
    fn execute(&self, query: &Query) -> Result<Frame>;

    /// Column names `execute` returns for `kind`.
    fn result_header(&self, kind: QueryKind) -> &'static [&'static str] {
        kind.header()
    }

    fn capabilities(&self) -> EngineCapabilities;

    fn schema(&self) -> &GraphSchema;
}

/// Write access used to populate a cache.
pub trait EdgeSink {
    fn insert_edges(&self, graph: GraphTable, edges: &[Edge]) -> Result<()>;
}

/// Resolve a request limit against an engine cap.
pub(crate) fn effective_limit(limit: usize, max_results: usize) -> usize {
    if limit == 0 { max_results } else { limit }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern_any_language_is_prefix() {
        let p = LabelPattern::exact("Paris", LANGUAGE_ANY);
        assert_eq!(p, LabelPattern::Prefix("'Paris'@".into()));
        assert!(p.matches("'Paris'@fr", false));
        assert!(!p.matches("'Parisian'@en", false));
    }

    #[test]
    fn test_exact_pattern_ignore_case() {
        let p = LabelPattern::exact("paris", "en");
        assert!(p.matches("'Paris'@en", true));
        assert!(!p.matches("'Paris'@en", false));
        assert!(!p.matches("'Paris'@fr", true));
    }

    #[test]
    fn test_prefix_pattern_escapes_quotes() {
        let p = LabelPattern::prefix("it's");
        assert_eq!(p.text(), "'it\\'s");
        assert!(p.matches("'it\\'s a test'@en", false));
    }

    #[test]
    fn test_headers_are_fixed() {
        assert_eq!(QueryKind::NodeAliases.header(), &["node1", "node_alias"]);
        assert_eq!(QueryKind::ItemEdges.header().len(), 9);
        assert_eq!(QueryKind::ItemQualifiersIn.header().len(), 8);
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(0, 100), 100);
        assert_eq!(effective_limit(5, 100), 5);
    }
}
