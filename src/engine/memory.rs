//! In-memory query engine.
//!
//! This is the reference implementation of `QueryEngine`. Each logical graph
//! is an append-only edge list with hash indexes on `node1`, `node2`, `id`
//! and `label`, all behind one `RwLock`.
//!
//! Joins are nested loops in insertion order, so results come back in the
//! same order a SQL engine returns them when ordered by rowid. Optional
//! joins that find nothing contribute a single null cell.
//!
//! Use this engine for:
//! - Testing the collector, assembler and HTTP layer
//! - Embedding small graphs that don't need a cache file

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::trace;

use super::{
    effective_limit, EdgeQuery, EdgeSink, EngineCapabilities, GraphSchema, GraphTable,
    LabelPattern, Query, QueryEngine, DEFAULT_MAX_RESULTS, LANGUAGE_ANY,
};
use crate::classify::language_tag;
use crate::frame::{row, Frame, Row};
use crate::model::{Direction, Edge};
use crate::Result;

// ============================================================================
// MemoryEngine
// ============================================================================

/// In-memory KGTK graph cache.
pub struct MemoryEngine {
    inner: Arc<MemoryInner>,
    schema: GraphSchema,
    max_results: usize,
}

struct MemoryInner {
    tables: RwLock<HashMap<GraphTable, EdgeTable>>,
}

#[derive(Default)]
struct EdgeTable {
    edges: Vec<Edge>,
    by_node1: HashMap<String, Vec<usize>>,
    by_node2: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, Vec<usize>>,
    by_label: HashMap<String, Vec<usize>>,
}

#[derive(Clone, Copy)]
enum Key {
    Node1,
    Node2,
    Id,
    Label,
}

impl EdgeTable {
    fn push(&mut self, edge: Edge) {
        let at = self.edges.len();
        self.by_node1.entry(edge.node1.clone()).or_default().push(at);
        self.by_node2.entry(edge.node2.clone()).or_default().push(at);
        self.by_id.entry(edge.id.clone()).or_default().push(at);
        self.by_label.entry(edge.label.clone()).or_default().push(at);
        self.edges.push(edge);
    }

    fn index(&self, key: Key) -> &HashMap<String, Vec<usize>> {
        match key {
            Key::Node1 => &self.by_node1,
            Key::Node2 => &self.by_node2,
            Key::Id => &self.by_id,
            Key::Label => &self.by_label,
        }
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_schema(GraphSchema::default(), DEFAULT_MAX_RESULTS)
    }

    pub fn with_schema(schema: GraphSchema, max_results: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(HashMap::new()),
            }),
            schema,
            max_results,
        }
    }

    /// Number of edges loaded into one graph.
    pub fn edge_count(&self, graph: GraphTable) -> usize {
        self.inner.tables.read().get(&graph).map_or(0, |t| t.edges.len())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeSink for MemoryEngine {
    fn insert_edges(&self, graph: GraphTable, edges: &[Edge]) -> Result<()> {
        let mut tables = self.inner.tables.write();
        let table = tables.entry(graph).or_default();
        for edge in edges {
            table.push(edge.clone());
        }
        trace!(?graph, count = edges.len(), "loaded edges");
        Ok(())
    }
}

// ============================================================================
// QueryEngine impl
// ============================================================================

impl QueryEngine for MemoryEngine {
    fn execute(&self, query: &Query) -> Result<Frame> {
        let tables = self.inner.tables.read();
        let view = View { tables: &tables, schema: &self.schema };
        let s = &self.schema;

        let (mut rows, limit) = match query {
            Query::NodeLabels { node, lang } => {
                (view.node_values(GraphTable::Labels, &s.label_label, node, Some(lang)), 0)
            }
            Query::MatchItemExactly { node, lang, limit } => (
                view.node_values(GraphTable::Labels, &s.label_label, node, Some(lang)),
                *limit,
            ),
            Query::NodeAliases { node, lang } => {
                (view.node_values(GraphTable::Aliases, &s.alias_label, node, Some(lang)), 0)
            }
            Query::NodeDescriptions { node, lang } => (
                view.node_values(GraphTable::Descriptions, &s.description_label, node, Some(lang)),
                0,
            ),
            Query::NodeImages { node } => {
                (view.node_values(GraphTable::Edges, &s.image_label, node, None), 0)
            }
            Query::NodeEdges(q) => (view.node_edges(q, Direction::Outgoing), 0),
            Query::NodeInverseEdges(q) => (view.node_edges(q, Direction::Incoming), 0),
            Query::NodeEdgeQualifiers(q) => (view.node_edge_qualifiers(q, Direction::Outgoing), 0),
            Query::NodeInverseEdgeQualifiers(q) => {
                (view.node_edge_qualifiers(q, Direction::Incoming), 0)
            }
            Query::ItemEdges { node, lang, limit } => {
                (view.item_edges(node, lang, Direction::Outgoing), *limit)
            }
            Query::ItemInverseEdges { node, lang, limit } => {
                (view.item_edges(node, lang, Direction::Incoming), *limit)
            }
            Query::ItemQualifiers { node, lang, limit } => {
                let edges = view.lookup(GraphTable::Edges, Key::Node1, node);
                (view.item_qualifiers(edges, lang), *limit)
            }
            Query::ItemQualifiersByEdge { edge_id, lang, limit } => {
                let edges = view.lookup(GraphTable::Edges, Key::Id, edge_id);
                (view.item_qualifiers(edges, lang), *limit)
            }
            Query::ItemQualifiersIn { edge_ids, lang, limit } => {
                let keys: Vec<&str> = edge_ids.iter().map(String::as_str).collect();
                let edges = view.lookup_any(GraphTable::Edges, Key::Id, &keys);
                (view.item_qualifiers(edges, lang), *limit)
            }
            Query::FormatterTemplate { relationship } => (
                view.node_values(GraphTable::Edges, &s.formatter_label, relationship, None)
                    .into_iter()
                    .take(1)
                    .map(|r| row([r[1].as_deref()]))
                    .collect(),
                1,
            ),
            Query::SubpropertyRelationships { lang } => (view.subproperties(lang), 0),
            Query::LanguageLabels { code, lang } => (view.language_labels(code, lang), 0),
            Query::MatchLabelExactly { label, lang, ignore_case, limit } => (
                view.match_labels(&LabelPattern::exact(label, lang), lang, *ignore_case),
                *limit,
            ),
            Query::MatchLabelPrefix { prefix, lang, ignore_case, limit } => (
                view.match_labels(&LabelPattern::prefix(prefix), lang, *ignore_case),
                *limit,
            ),
            Query::MatchItemPrefix { prefix, lang, limit } => {
                (view.match_item_prefix(prefix, lang), *limit)
            }
        };

        rows.truncate(effective_limit(limit, self.max_results));
        Frame::new(query.kind().header().iter().copied(), rows)
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            concurrent_readers: true,
            max_results: self.max_results,
        }
    }

    fn schema(&self) -> &GraphSchema {
        &self.schema
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A read-locked snapshot of every table.
struct View<'a> {
    tables: &'a HashMap<GraphTable, EdgeTable>,
    schema: &'a GraphSchema,
}

fn in_language(value: &str, lang: &str) -> bool {
    lang == LANGUAGE_ANY || language_tag(value) == Some(lang)
}

/// Left-join semantics: no match still yields one null cell.
fn or_null(values: Vec<&str>) -> Vec<Option<&str>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.into_iter().map(Some).collect()
    }
}

impl<'a> View<'a> {
    fn lookup(&self, graph: GraphTable, key: Key, value: &str) -> Vec<&'a Edge> {
        let Some(table) = self.tables.get(&graph) else {
            return Vec::new();
        };
        table
            .index(key)
            .get(value)
            .map(|at| at.iter().map(|&i| &table.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Edges matching any of `values`, in table order, each at most once.
    fn lookup_any(&self, graph: GraphTable, key: Key, values: &[&str]) -> Vec<&'a Edge> {
        let Some(table) = self.tables.get(&graph) else {
            return Vec::new();
        };
        let index = table.index(key);
        let mut at: Vec<usize> = values
            .iter()
            .filter_map(|v| index.get(*v))
            .flatten()
            .copied()
            .collect();
        at.sort_unstable();
        at.dedup();
        at.into_iter().map(|i| &table.edges[i]).collect()
    }

    fn anchored(&self, graph: GraphTable, node: &str, direction: Direction) -> Vec<&'a Edge> {
        match direction {
            Direction::Outgoing => self.lookup(graph, Key::Node1, node),
            Direction::Incoming => self.lookup(graph, Key::Node2, node),
        }
    }

    /// `node2` of every `(node)-[label]->` edge, optionally language-filtered.
    fn values(&self, graph: GraphTable, label: &str, node: &str, lang: Option<&str>) -> Vec<&'a str> {
        self.lookup(graph, Key::Node1, node)
            .into_iter()
            .filter(|e| e.label == label)
            .filter(|e| lang.map_or(true, |l| in_language(&e.node2, l)))
            .map(|e| e.node2.as_str())
            .collect()
    }

    fn node_values(&self, graph: GraphTable, label: &str, node: &str, lang: Option<&str>) -> Vec<Row> {
        self.values(graph, label, node, lang)
            .into_iter()
            .map(|v| row([Some(node), Some(v)]))
            .collect()
    }

    fn labels(&self, node: &str, lang: &str) -> Vec<Option<&'a str>> {
        or_null(self.values(GraphTable::Labels, &self.schema.label_label, node, Some(lang)))
    }

    fn descriptions(&self, node: &str, lang: &str) -> Vec<Option<&'a str>> {
        or_null(self.values(
            GraphTable::Descriptions,
            &self.schema.description_label,
            node,
            Some(lang),
        ))
    }

    /// Append `edge` once per combination of its target's label, image and
    /// fan-out.
    fn decorate(&self, rows: &mut Vec<Row>, edge: &Edge, target: &str, q: &EdgeQuery) {
        let s = self.schema;
        let labels = self.labels(target, &q.lang);
        let images = if q.images {
            or_null(self.values(GraphTable::Edges, &s.image_label, target, None))
        } else {
            vec![None]
        };
        let fanouts = if q.fanouts {
            or_null(self.values(GraphTable::Metadata, &s.fanout_label, target, None))
        } else {
            vec![None]
        };
        for label in &labels {
            for image in &images {
                for fanout in &fanouts {
                    rows.push(row([
                        Some(edge.id.as_str()),
                        Some(edge.node1.as_str()),
                        Some(edge.label.as_str()),
                        Some(edge.node2.as_str()),
                        *label,
                        *image,
                        *fanout,
                    ]));
                }
            }
        }
    }

    fn node_edges(&self, q: &EdgeQuery, direction: Direction) -> Vec<Row> {
        let mut rows = Vec::new();
        for edge in self.anchored(GraphTable::Edges, &q.node, direction) {
            self.decorate(&mut rows, edge, edge.far_end(direction), q);
        }
        rows
    }

    fn node_edge_qualifiers(&self, q: &EdgeQuery, direction: Direction) -> Vec<Row> {
        let mut rows = Vec::new();
        for edge in self.anchored(GraphTable::Edges, &q.node, direction) {
            for qual in self.lookup(GraphTable::Qualifiers, Key::Node1, &edge.id) {
                self.decorate(&mut rows, qual, &qual.node2, q);
            }
        }
        rows
    }

    /// One row per edge, carrying the first label, description and datatype
    /// of each position.
    fn item_edges(&self, node: &str, lang: &str, direction: Direction) -> Vec<Row> {
        let s = self.schema;
        self.anchored(GraphTable::Edges, node, direction)
            .into_iter()
            .map(|e| {
                let target = e.far_end(direction);
                let first_label = |n: &str| {
                    self.values(GraphTable::Labels, &s.label_label, n, Some(lang)).first().copied()
                };
                row([
                    Some(e.id.as_str()),
                    Some(e.node1.as_str()),
                    Some(e.label.as_str()),
                    Some(e.node2.as_str()),
                    first_label(&e.label),
                    Some(target),
                    first_label(target),
                    self.values(GraphTable::Descriptions, &s.description_label, target, Some(lang))
                        .first()
                        .copied(),
                    self.values(GraphTable::Datatypes, &s.datatype_label, &e.label, None)
                        .first()
                        .copied(),
                ])
            })
            .collect()
    }

    fn item_qualifiers(&self, edges: Vec<&'a Edge>, lang: &str) -> Vec<Row> {
        let mut rows = Vec::new();
        for e in edges {
            for q in self.lookup(GraphTable::Qualifiers, Key::Node1, &e.id) {
                let rel_labels = self.labels(&q.label, lang);
                let node_labels = self.labels(&q.node2, lang);
                let node_descriptions = self.descriptions(&q.node2, lang);
                for rl in &rel_labels {
                    for nl in &node_labels {
                        for nd in &node_descriptions {
                            rows.push(row([
                                Some(e.id.as_str()),
                                Some(e.node1.as_str()),
                                Some(q.id.as_str()),
                                Some(q.label.as_str()),
                                Some(q.node2.as_str()),
                                *rl,
                                *nl,
                                *nd,
                            ]));
                        }
                    }
                }
            }
        }
        rows
    }

    fn subproperties(&self, lang: &str) -> Vec<Row> {
        let mut rows = Vec::new();
        for e in self.lookup(GraphTable::Edges, Key::Label, &self.schema.subproperty_label) {
            for label in self.labels(&e.node1, lang) {
                rows.push(row([Some(e.node1.as_str()), Some(e.node2.as_str()), label]));
            }
        }
        rows
    }

    /// Labels of language items whose code is `code`, stored either as a
    /// KGTK string or as a bare symbol.
    fn language_labels(&self, code: &str, lang: &str) -> Vec<Row> {
        let s = self.schema;
        let quoted = format!("\"{code}\"");
        let mut rows = Vec::new();
        for e in self.lookup_any(GraphTable::Edges, Key::Node2, &[quoted.as_str(), code]) {
            if e.label != s.language_code_label {
                continue;
            }
            let classes = self
                .lookup(GraphTable::Edges, Key::Node1, &e.node1)
                .into_iter()
                .filter(|isa| {
                    isa.label == s.instance_of_label && s.language_classes.contains(&isa.node2)
                })
                .count();
            for _ in 0..classes {
                for label in self.labels(&e.node1, lang) {
                    rows.push(row([Some(e.node1.as_str()), label]));
                }
            }
        }
        rows
    }

    fn match_labels(&self, pattern: &LabelPattern, lang: &str, ignore_case: bool) -> Vec<Row> {
        let mut hits: Vec<(usize, &Edge)> = self
            .label_edges()
            .filter(|(_, e)| pattern.matches(&e.node2, ignore_case) && in_language(&e.node2, lang))
            .collect();
        sort_by_node(&mut hits);
        hits.into_iter()
            .map(|(_, e)| row([Some(e.node1.as_str()), Some(e.node2.as_str())]))
            .collect()
    }

    fn match_item_prefix(&self, prefix: &str, lang: &str) -> Vec<Row> {
        let mut hits: Vec<(usize, &Edge)> = self
            .label_edges()
            .filter(|(_, e)| e.node1.starts_with(prefix) && in_language(&e.node2, lang))
            .collect();
        sort_by_node(&mut hits);
        hits.into_iter()
            .map(|(_, e)| row([Some(e.node1.as_str()), Some(e.node2.as_str())]))
            .collect()
    }

    /// Every `label` edge of the labels graph with its position.
    fn label_edges(&self) -> impl Iterator<Item = (usize, &'a Edge)> + 'a {
        let table = self.tables.get(&GraphTable::Labels);
        let at: &'a [usize] = table
            .and_then(|t| t.by_label.get(&self.schema.label_label))
            .map_or(&[], Vec::as_slice);
        at.iter()
            .filter_map(move |&i| table.map(|t| (i, &t.edges[i])))
    }
}

/// Shorter node ids first, then lexical, then table order.
fn sort_by_node(hits: &mut [(usize, &Edge)]) {
    hits.sort_by(|(ia, a), (ib, b)| {
        a.node1
            .chars()
            .count()
            .cmp(&b.node1.chars().count())
            .then_with(|| a.node1.cmp(&b.node1))
            .then_with(|| ia.cmp(ib))
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine
            .insert_edges(
                GraphTable::Edges,
                &[
                    Edge::new("e1", "Q1", "P31", "Q5"),
                    Edge::new("e2", "Q1", "P31", "Q6"),
                    Edge::new("e3", "Q7", "P166", "Q1"),
                    Edge::new("e4", "Q1", "P18", "\"Portrait.jpg\""),
                    Edge::new("e5", "Q1860", "P424", "\"en\""),
                    Edge::new("e6", "Q1860", "P31", "Q34770"),
                    Edge::new("e7", "P1001", "P1647", "P1"),
                ],
            )
            .unwrap();
        engine
            .insert_edges(
                GraphTable::Labels,
                &[
                    Edge::new("l1", "Q1", "label", "'Universe'@en"),
                    Edge::new("l2", "Q1", "label", "'Univers'@fr"),
                    Edge::new("l3", "Q5", "label", "'human'@en"),
                    Edge::new("l4", "Q1860", "label", "'English'@en"),
                    Edge::new("l5", "Q15", "label", "'universe model'@en"),
                    Edge::new("l6", "Q2", "label", "'Universe'@en-gb"),
                ],
            )
            .unwrap();
        engine
            .insert_edges(GraphTable::Qualifiers, &[Edge::new("e1-q1", "e1", "P580", "^2000-01-01T00:00:00Z/11")])
            .unwrap();
        engine
    }

    fn edge_query(node: &str) -> EdgeQuery {
        EdgeQuery { node: node.into(), lang: "en".into(), images: true, fanouts: false }
    }

    #[test]
    fn test_labels_filtered_by_full_tag() {
        let f = engine()
            .execute(&Query::NodeLabels { node: "Q2".into(), lang: "en".into() })
            .unwrap();
        assert!(f.is_empty());
        let f = engine()
            .execute(&Query::NodeLabels { node: "Q1".into(), lang: "any".into() })
            .unwrap();
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_node_edges_left_join_nulls() {
        let f = engine().execute(&Query::NodeEdges(edge_query("Q1"))).unwrap();
        assert_eq!(f.columns().len(), 7);
        assert_eq!(f.len(), 3);
        let labels = f.column("node_label").unwrap();
        assert_eq!(labels, vec![Some("'human'@en"), None, None]);
        assert!(f.column("node_fanout").unwrap().iter().all(Option::is_none));
    }

    #[test]
    fn test_inverse_edges_join_on_node1() {
        let f = engine().execute(&Query::NodeInverseEdges(edge_query("Q1"))).unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.rows()[0][1].as_deref(), Some("Q7"));
    }

    #[test]
    fn test_item_qualifiers_by_node() {
        let f = engine()
            .execute(&Query::ItemQualifiers { node: "Q1".into(), lang: "en".into(), limit: 0 })
            .unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.rows()[0][2].as_deref(), Some("e1-q1"));
    }

    #[test]
    fn test_item_edges_one_row_per_edge() {
        let e = engine();
        e.insert_edges(GraphTable::Labels, &[Edge::new("l9", "Q5", "label", "'person'@en")])
            .unwrap();
        let f = e
            .execute(&Query::ItemEdges { node: "Q1".into(), lang: "en".into(), limit: 2 })
            .unwrap();
        assert_eq!(f.values("id").unwrap(), vec!["e1", "e2"]);
        assert_eq!(f.column("target_label").unwrap(), vec![Some("'human'@en"), None]);
    }

    #[test]
    fn test_limit_caps_rows() {
        let f = engine()
            .execute(&Query::ItemEdges { node: "Q1".into(), lang: "en".into(), limit: 2 })
            .unwrap();
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_label_prefix_sorted_by_node_length() {
        let f = engine()
            .execute(&Query::MatchLabelPrefix {
                prefix: "univ".into(),
                lang: "en".into(),
                ignore_case: true,
                limit: 20,
            })
            .unwrap();
        assert_eq!(f.values("node1").unwrap(), vec!["Q1", "Q15"]);
    }

    #[test]
    fn test_language_labels_require_language_class() {
        let f = engine()
            .execute(&Query::LanguageLabels { code: "en".into(), lang: "en".into() })
            .unwrap();
        assert_eq!(f.values("node1_label").unwrap(), vec!["'English'@en"]);
    }

    #[test]
    fn test_formatter_and_subproperties() {
        let e = engine();
        let f = e
            .execute(&Query::FormatterTemplate { relationship: "P1".into() })
            .unwrap();
        assert!(f.is_empty());
        let f = e
            .execute(&Query::SubpropertyRelationships { lang: "en".into() })
            .unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.rows()[0][2], None);
    }
}
