//! Engine sessions.
//!
//! A `Session` is the handle every top-level operation works through. When
//! the engine cannot serve concurrent readers, opening a session takes the
//! browser-wide engine lock and holds it until the session drops, so one
//! operation's queries never interleave with another's.
//!
//! Sessions also check that each frame carries the header promised for its
//! query kind, and decode item rows into typed edges.

use parking_lot::{Mutex, MutexGuard};
use tracing::{trace, trace_span};

use crate::classify::LabelSource;
use crate::engine::{EdgeQuery, Query, QueryEngine};
use crate::frame::{decode, Frame};
use crate::model::{ItemEdge, QualifierEdge};
use crate::{Error, Result};

/// Serialized access to a `QueryEngine` for one operation.
pub struct Session<'b, E: QueryEngine + ?Sized> {
    engine: &'b E,
    _guard: Option<MutexGuard<'b, ()>>,
}

impl<'b, E: QueryEngine + ?Sized> Session<'b, E> {
    pub fn open(engine: &'b E, lock: &'b Mutex<()>) -> Self {
        let guard = if engine.capabilities().concurrent_readers {
            None
        } else {
            Some(lock.lock())
        };
        Self { engine, _guard: guard }
    }

    pub fn engine(&self) -> &E {
        self.engine
    }

    /// Run a query and check the result header.
    pub fn execute(&self, query: &Query) -> Result<Frame> {
        let kind = query.kind();
        let _span = trace_span!("query", name = kind.name()).entered();
        let frame = self.engine.execute(query)?;
        let expected = self.engine.result_header(kind);
        if frame.columns().iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(Error::QueryEngine(format!(
                "{} returned columns {:?}, expected {:?}",
                kind.name(),
                frame.columns(),
                expected
            )));
        }
        trace!(rows = frame.len(), "query done");
        Ok(frame)
    }

    // ========================================================================
    // Node-data queries
    // ========================================================================

    pub fn node_labels(&self, node: &str, lang: &str) -> Result<Frame> {
        self.execute(&Query::NodeLabels { node: node.into(), lang: lang.into() })
    }

    pub fn node_aliases(&self, node: &str, lang: &str) -> Result<Frame> {
        self.execute(&Query::NodeAliases { node: node.into(), lang: lang.into() })
    }

    pub fn node_descriptions(&self, node: &str, lang: &str) -> Result<Frame> {
        self.execute(&Query::NodeDescriptions { node: node.into(), lang: lang.into() })
    }

    pub fn node_images(&self, node: &str) -> Result<Frame> {
        self.execute(&Query::NodeImages { node: node.into() })
    }

    pub fn node_edges(&self, q: &EdgeQuery) -> Result<Frame> {
        self.execute(&Query::NodeEdges(q.clone()))
    }

    pub fn node_inverse_edges(&self, q: &EdgeQuery) -> Result<Frame> {
        self.execute(&Query::NodeInverseEdges(q.clone()))
    }

    pub fn node_edge_qualifiers(&self, q: &EdgeQuery) -> Result<Frame> {
        self.execute(&Query::NodeEdgeQualifiers(q.clone()))
    }

    pub fn node_inverse_edge_qualifiers(&self, q: &EdgeQuery) -> Result<Frame> {
        self.execute(&Query::NodeInverseEdgeQualifiers(q.clone()))
    }

    // ========================================================================
    // Item queries
    // ========================================================================

    pub fn item_edges(&self, node: &str, lang: &str, limit: usize) -> Result<Vec<ItemEdge>> {
        decode(&self.execute(&Query::ItemEdges { node: node.into(), lang: lang.into(), limit })?)
    }

    pub fn item_inverse_edges(&self, node: &str, lang: &str, limit: usize) -> Result<Vec<ItemEdge>> {
        decode(&self.execute(&Query::ItemInverseEdges {
            node: node.into(),
            lang: lang.into(),
            limit,
        })?)
    }

    pub fn item_qualifiers(&self, node: &str, lang: &str, limit: usize) -> Result<Vec<QualifierEdge>> {
        decode(&self.execute(&Query::ItemQualifiers { node: node.into(), lang: lang.into(), limit })?)
    }

    pub fn item_qualifiers_by_edge(
        &self,
        edge_id: &str,
        lang: &str,
        limit: usize,
    ) -> Result<Vec<QualifierEdge>> {
        decode(&self.execute(&Query::ItemQualifiersByEdge {
            edge_id: edge_id.into(),
            lang: lang.into(),
            limit,
        })?)
    }

    pub fn item_qualifiers_in(
        &self,
        edge_ids: &[&str],
        lang: &str,
        limit: usize,
    ) -> Result<Vec<QualifierEdge>> {
        decode(&self.execute(&Query::ItemQualifiersIn {
            edge_ids: edge_ids.iter().map(|s| s.to_string()).collect(),
            lang: lang.into(),
            limit,
        })?)
    }

    /// `(child, parent, child label)` rows of the subproperty hierarchy.
    pub fn subproperty_relationships(&self, lang: &str) -> Result<Frame> {
        self.execute(&Query::SubpropertyRelationships { lang: lang.into() })
    }
}

impl<E: QueryEngine + ?Sized> LabelSource for Session<'_, E> {
    fn node_label(&self, node: &str, lang: &str) -> Result<Option<String>> {
        let frame = self.node_labels(node, lang)?;
        Ok(frame.first_value("node_label")?.map(str::to_string))
    }

    fn language_label(&self, code: &str, lang: &str) -> Result<Option<String>> {
        let frame = self.execute(&Query::LanguageLabels { code: code.into(), lang: lang.into() })?;
        Ok(frame.first_value("node1_label")?.map(str::to_string))
    }

    fn formatter_template(&self, relationship: &str) -> Result<Option<String>> {
        let frame = self.execute(&Query::FormatterTemplate { relationship: relationship.into() })?;
        Ok(frame.first_value("node2")?.map(str::to_string))
    }
}
