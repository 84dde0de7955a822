//! Qualifier fetch, grouping and rendering.
//!
//! Qualifiers are fetched for the edges that survived property
//! downsampling. Small edge sets are fetched by id, either with one `IN`
//! query or one query per id; larger sets fall back to a single query by
//! item, filtered to the same set. All three strategies yield the same
//! qualifiers for the same edge set.

use hashbrown::{HashMap, HashSet};
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use super::downsample::downsample_properties;
use super::priority::QualifierPriority;
use crate::classify::{unstringify_or, LabelSource, ValueContext, ValueRenderer};
use crate::engine::QueryEngine;
use crate::model::{PropertyEntry, QualifierEdge, ValueEntry};
use crate::session::Session;
use crate::Result;

/// How qualifiers of a known edge set are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QualifierFetch {
    /// Largest edge set fetched by id.
    pub id_search_threshold: usize,
    /// Fetch by id with one `IN` query rather than one query per id.
    pub id_search_using_in: bool,
}

impl Default for QualifierFetch {
    fn default() -> Self {
        Self { id_search_threshold: 40, id_search_using_in: false }
    }
}

impl QualifierFetch {
    pub fn fetch<E>(
        &self,
        session: &Session<'_, E>,
        item: &str,
        edge_ids: &[&str],
        lang: &str,
        limit: usize,
    ) -> Result<Vec<QualifierEdge>>
    where
        E: QueryEngine + ?Sized,
    {
        if edge_ids.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = if edge_ids.len() <= self.id_search_threshold {
            if self.id_search_using_in {
                session.item_qualifiers_in(edge_ids, lang, limit)?
            } else {
                let mut all = Vec::new();
                for id in edge_ids {
                    all.extend(session.item_qualifiers_by_edge(id, lang, limit)?);
                }
                all
            }
        } else {
            let wanted: HashSet<&str> = edge_ids.iter().copied().collect();
            let mut all = session.item_qualifiers(item, lang, limit)?;
            all.retain(|q| wanted.contains(q.edge_id.as_str()));
            all
        };
        debug!(item, edges = edge_ids.len(), qualifiers = fetched.len(), "fetched qualifiers");
        Ok(fetched)
    }
}

/// Group qualifier rows by parent edge. Within an edge, rows are ordered by
/// (qualifier priority, relationship label, value label) so values of one
/// qualifier relationship are adjacent.
pub fn group_by_edge(
    qualifiers: Vec<QualifierEdge>,
    priority: &QualifierPriority,
) -> HashMap<String, Vec<QualifierEdge>> {
    let mut grouped: HashMap<String, Vec<QualifierEdge>> = HashMap::new();
    for q in qualifiers {
        grouped.entry(q.edge_id.clone()).or_default().push(q);
    }
    for rows in grouped.values_mut() {
        rows.sort_by_cached_key(|q| {
            (
                priority.get(&q.qual_relationship),
                non_empty_or(q.qual_relationship_label.as_deref(), &q.qual_relationship),
                non_empty_or(q.qual_node2_label.as_deref(), &q.qual_node2),
            )
        });
    }
    grouped
}

fn non_empty_or(label: Option<&str>, fallback: &str) -> String {
    match label {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => fallback.to_string(),
    }
}

/// Limits applied to one edge's qualifier list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifierCaps {
    pub proplist_max_len: usize,
    pub valuelist_max_len: usize,
}

/// Render one edge's sorted qualifier rows into property entries. Rows
/// repeating a qualifier id (one per joined label) render once.
pub fn render_qualifiers<S, R>(
    renderer: &ValueRenderer<'_, S>,
    rows: &[QualifierEdge],
    lang: &str,
    caps: QualifierCaps,
    rng: &mut R,
) -> Result<Vec<PropertyEntry>>
where
    S: LabelSource + ?Sized,
    R: Rng + ?Sized,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries: Vec<PropertyEntry> = Vec::new();

    for q in rows {
        if !seen.insert(&q.qual_id) {
            continue;
        }
        let value = renderer.render(
            &q.qual_node2,
            &ValueContext {
                relationship: &q.qual_relationship,
                wikidatatype: None,
                label: q.qual_node2_label.as_deref(),
                description: q.qual_node2_description.as_deref(),
                lang,
            },
        )?;
        match entries.last_mut() {
            Some(current) if current.relationship == q.qual_relationship => {
                current.values.push(ValueEntry::new(value));
            }
            _ => entries.push(PropertyEntry {
                relationship: q.qual_relationship.clone(),
                property: unstringify_or(q.qual_relationship_label.as_deref(), &q.qual_relationship),
                kind: value.kind(),
                values: vec![ValueEntry::new(value)],
            }),
        }
    }

    downsample_properties(&mut entries, caps.proplist_max_len, caps.valuelist_max_len, rng);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ValueCaches;
    use crate::engine::{EdgeSink, GraphTable, MemoryEngine};
    use crate::model::{Edge, ValueKind};
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn qual(edge: &str, id: &str, rel: &str, node2: &str, rel_label: Option<&str>) -> QualifierEdge {
        QualifierEdge {
            edge_id: edge.into(),
            node1: "Q30".into(),
            qual_id: id.into(),
            qual_relationship: rel.into(),
            qual_node2: node2.into(),
            qual_relationship_label: rel_label.map(String::from),
            qual_node2_label: None,
            qual_node2_description: None,
        }
    }

    fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        let edges: Vec<Edge> = (0..5)
            .map(|i| Edge::new(format!("e{i}"), "Q30", "P1082", format!("{}", 1000 + i)))
            .collect();
        engine.insert_edges(GraphTable::Edges, &edges).unwrap();
        let quals: Vec<Edge> = (0..5)
            .flat_map(|i| {
                [
                    Edge::new(format!("q{i}a"), format!("e{i}"), "P585", "^2000-01-01T00:00:00Z/9"),
                    Edge::new(format!("q{i}b"), format!("e{i}"), "P459", "Q1"),
                ]
            })
            .collect();
        engine.insert_edges(GraphTable::Qualifiers, &quals).unwrap();
        engine
    }

    fn ids(mut qs: Vec<QualifierEdge>) -> Vec<String> {
        let mut v: Vec<String> = qs.drain(..).map(|q| q.qual_id).collect();
        v.sort();
        v
    }

    #[test]
    fn test_fetch_strategies_agree() {
        let engine = engine();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        let wanted = ["e1", "e3"];

        let per_id = QualifierFetch { id_search_threshold: 10, id_search_using_in: false };
        let using_in = QualifierFetch { id_search_threshold: 10, id_search_using_in: true };
        let by_item = QualifierFetch { id_search_threshold: 1, id_search_using_in: false };

        let a = ids(per_id.fetch(&session, "Q30", &wanted, "en", 0).unwrap());
        let b = ids(using_in.fetch(&session, "Q30", &wanted, "en", 0).unwrap());
        let c = ids(by_item.fetch(&session, "Q30", &wanted, "en", 0).unwrap());
        assert_eq!(a, vec!["q1a", "q1b", "q3a", "q3b"]);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_empty_edge_set_issues_no_query() {
        let engine = engine();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        let fetched = QualifierFetch::default().fetch(&session, "Q30", &[], "en", 0).unwrap();
        assert!(fetched.is_empty());
    }

    #[test]
    fn test_group_orders_priority_first() {
        let priority = QualifierPriority::new(&["P580".into(), "P582".into()]);
        let grouped = group_by_edge(
            vec![
                qual("e1", "a", "P459", "Q1", Some("'determination method'@en")),
                qual("e1", "b", "P582", "^2001", Some("'end time'@en")),
                qual("e1", "c", "P580", "^2000", Some("'start time'@en")),
                qual("e2", "d", "P585", "^1999", None),
            ],
            &priority,
        );
        let order: Vec<&str> = grouped["e1"].iter().map(|q| q.qual_relationship.as_str()).collect();
        assert_eq!(order, vec!["P580", "P582", "P459"]);
        assert_eq!(grouped["e2"].len(), 1);
    }

    #[test]
    fn test_render_groups_adjacent_and_skips_repeats() {
        let engine = MemoryEngine::new();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        let caches = ValueCaches::new(8);
        let renderer = ValueRenderer::new(&session, &caches);
        let rows = vec![
            qual("e1", "a", "P585", "^1970-00-00T00:00:00Z/9", Some("'point in time'@en")),
            qual("e1", "a", "P585", "^1970-00-00T00:00:00Z/9", Some("'point in time'@en")),
            qual("e1", "b", "P1545", "\"2\"", None),
            qual("e1", "c", "P1545", "\"3\"", None),
        ];
        let caps = QualifierCaps { proplist_max_len: 0, valuelist_max_len: 0 };
        let mut rng = StdRng::seed_from_u64(0);
        let entries = render_qualifiers(&renderer, &rows, "en", caps, &mut rng).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].property, "point in time");
        assert_eq!(entries[0].kind, ValueKind::Time);
        assert_eq!(entries[0].values.len(), 1);
        assert_eq!(entries[0].values[0].value.text(), "1970");
        assert_eq!(entries[1].property, "P1545");
        assert_eq!(entries[1].values.len(), 2);
    }
}
