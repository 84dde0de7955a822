//! Edges and qualifier edges as returned by the item queries.

use serde::{Deserialize, Serialize};

use crate::frame::{optional, required, FromRow, Row, row};
use crate::Result;

/// Which end of an edge a query is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Edges whose `node1` is the anchor.
    Outgoing,
    /// Edges whose `node2` is the anchor.
    Incoming,
}

/// A raw KGTK edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub node1: String,
    pub label: String,
    pub node2: String,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        node1: impl Into<String>,
        label: impl Into<String>,
        node2: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node1: node1.into(),
            label: label.into(),
            node2: node2.into(),
        }
    }

    /// The end of the edge facing away from an anchor.
    pub fn far_end(&self, direction: Direction) -> &str {
        match direction {
            Direction::Outgoing => &self.node2,
            Direction::Incoming => &self.node1,
        }
    }

    pub fn to_row(&self) -> Row {
        row([
            Some(self.id.as_str()),
            Some(self.node1.as_str()),
            Some(self.label.as_str()),
            Some(self.node2.as_str()),
        ])
    }
}

impl FromRow for Edge {
    const COLUMNS: &'static [&'static str] = &["id", "node1", "label", "node2"];

    fn from_row(cells: &[Option<&str>]) -> Result<Self> {
        Ok(Self {
            id: required(cells, 0, "id")?,
            node1: required(cells, 1, "node1")?,
            label: required(cells, 2, "label")?,
            node2: required(cells, 3, "node2")?,
        })
    }
}

/// One row of the item-edge query: an edge plus the labels needed to
/// render it. `target_node` is `node2` for outgoing edges and `node1`
/// for inverse ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEdge {
    pub id: String,
    pub node1: String,
    pub relationship: String,
    pub node2: String,
    pub relationship_label: Option<String>,
    pub target_node: String,
    pub target_label: Option<String>,
    pub target_description: Option<String>,
    pub wikidatatype: Option<String>,
}

impl ItemEdge {
    pub fn is_external_id(&self) -> bool {
        self.wikidatatype.as_deref() == Some("external-id")
    }
}

impl FromRow for ItemEdge {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "node1",
        "relationship",
        "node2",
        "relationship_label",
        "target_node",
        "target_label",
        "target_description",
        "wikidatatype",
    ];

    fn from_row(cells: &[Option<&str>]) -> Result<Self> {
        Ok(Self {
            id: required(cells, 0, "id")?,
            node1: required(cells, 1, "node1")?,
            relationship: required(cells, 2, "relationship")?,
            node2: required(cells, 3, "node2")?,
            relationship_label: optional(cells, 4),
            target_node: required(cells, 5, "target_node")?,
            target_label: optional(cells, 6),
            target_description: optional(cells, 7),
            wikidatatype: optional(cells, 8),
        })
    }
}

/// One row of the item-qualifier query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierEdge {
    /// Parent edge id.
    pub edge_id: String,
    pub node1: String,
    pub qual_id: String,
    pub qual_relationship: String,
    pub qual_node2: String,
    pub qual_relationship_label: Option<String>,
    pub qual_node2_label: Option<String>,
    pub qual_node2_description: Option<String>,
}

impl FromRow for QualifierEdge {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "node1",
        "qual_id",
        "qual_relationship",
        "qual_node2",
        "qual_relationship_label",
        "qual_node2_label",
        "qual_node2_description",
    ];

    fn from_row(cells: &[Option<&str>]) -> Result<Self> {
        Ok(Self {
            edge_id: required(cells, 0, "id")?,
            node1: required(cells, 1, "node1")?,
            qual_id: required(cells, 2, "qual_id")?,
            qual_relationship: required(cells, 3, "qual_relationship")?,
            qual_node2: required(cells, 4, "qual_node2")?,
            qual_relationship_label: optional(cells, 5),
            qual_node2_label: optional(cells, 6),
            qual_node2_description: optional(cells, 7),
        })
    }
}
