//! # Node Data Collector
//!
//! Runs the fixed per-node query set and folds the frames into one
//! `NodeData` bundle.
//!
//! | Query | Always | With `inverse` |
//! |-------|--------|----------------|
//! | node labels, aliases, descriptions, images | yes | |
//! | node edges, edge qualifiers | yes | |
//! | inverse edges, inverse-edge qualifiers | | yes |
//!
//! Edge label labels are fetched with one query per distinct relationship;
//! the engine's own caching is relied on to amortize that.
//!
//! The label dictionary unions every place a node can appear: the node
//! itself, every relationship, every edge and qualifier target, and the
//! subject of every inverse edge.

use tracing::debug;

use crate::engine::{EdgeQuery, QueryEngine, NODE_MATCH_HEADER};
use crate::frame::{Column, Frame, FromRow};
use crate::model::Edge;
use crate::session::Session;
use crate::Result;

/// Parameters of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRequest {
    pub node: String,
    pub lang: String,
    /// Images of edge targets. The node's own images are always fetched.
    pub images: bool,
    pub fanouts: bool,
    pub inverse: bool,
}

impl NodeRequest {
    fn edge_query(&self) -> EdgeQuery {
        EdgeQuery {
            node: self.node.clone(),
            lang: self.lang.clone(),
            images: self.images,
            fanouts: self.fanouts,
        }
    }
}

/// Everything known about one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub node: String,
    pub labels: Frame,
    pub aliases: Frame,
    pub descriptions: Frame,
    pub images: Frame,
    /// `(id, node1, label, node2)`, outgoing then inverse, deduplicated.
    pub edges: Frame,
    /// Qualifier edges in the same shape; `node1` is the parent edge id.
    pub qualifiers: Frame,
    /// `(node1, node_label)` for every referenced node.
    pub all_labels: Frame,
    pub all_images: Option<Frame>,
    pub all_fanouts: Option<Frame>,
}

/// Collect all data for `req.node`, or `None` if the graph knows nothing
/// about it.
pub fn collect_node_data<E>(session: &Session<'_, E>, req: &NodeRequest) -> Result<Option<NodeData>>
where
    E: QueryEngine + ?Sized,
{
    let lang = req.lang.as_str();
    let labels = session.node_labels(&req.node, lang)?;
    let aliases = session.node_aliases(&req.node, lang)?;
    let descriptions = session.node_descriptions(&req.node, lang)?;
    let images = session.node_images(&req.node)?;

    let q = req.edge_query();
    let edges = session.node_edges(&q)?;
    let quals = session.node_edge_qualifiers(&q)?;
    let (inv_edges, inv_quals) = if req.inverse {
        (
            Some(session.node_inverse_edges(&q)?),
            Some(session.node_inverse_edge_qualifiers(&q)?),
        )
    } else {
        (None, None)
    };

    if labels.is_empty()
        && aliases.is_empty()
        && descriptions.is_empty()
        && edges.is_empty()
        && inv_edges.as_ref().map_or(true, Frame::is_empty)
    {
        debug!(node = %req.node, "unknown node");
        return Ok(None);
    }

    let inv_edges = inv_edges.as_ref();
    let inv_quals = inv_quals.as_ref();

    let all_edges = union_or_empty(
        [collect_edges(Some(&edges))?, collect_edges(inv_edges)?],
        Edge::COLUMNS,
    )?;
    let all_quals = union_or_empty(
        [collect_edges(Some(&quals))?, collect_edges(inv_quals)?],
        Edge::COLUMNS,
    )?;

    let label_parts = [
        edge_label_labels(session, Some(&edges), lang)?,
        edge_label_labels(session, inv_edges, lang)?,
        edge_label_labels(session, Some(&quals), lang)?,
        edge_label_labels(session, inv_quals, lang)?,
        target_column(Some(&edges), false, "node_label")?,
        target_column(inv_edges, true, "node_label")?,
        target_column(Some(&quals), false, "node_label")?,
        target_column(inv_quals, false, "node_label")?,
    ];
    let all_labels = labels.union(label_parts.iter().map(Option::as_ref))?;

    let all_images = if req.images {
        let parts = [
            target_column(Some(&edges), false, "node_image")?,
            target_column(inv_edges, true, "node_image")?,
            target_column(Some(&quals), false, "node_image")?,
            target_column(inv_quals, false, "node_image")?,
        ];
        Some(images.union(parts.iter().map(Option::as_ref))?)
    } else {
        None
    };

    let all_fanouts = if req.fanouts {
        let parts = [
            target_column(Some(&edges), false, "node_fanout")?,
            target_column(inv_edges, true, "node_fanout")?,
            target_column(Some(&quals), false, "node_fanout")?,
            target_column(inv_quals, false, "node_fanout")?,
        ];
        Frame::union_all(parts.iter().map(Option::as_ref))?
    } else {
        None
    };

    debug!(
        node = %req.node,
        edges = all_edges.len(),
        qualifiers = all_quals.len(),
        labels = all_labels.len(),
        "collected node data"
    );

    Ok(Some(NodeData {
        node: req.node.clone(),
        labels,
        aliases,
        descriptions,
        images,
        edges: all_edges,
        qualifiers: all_quals,
        all_labels,
        all_images,
        all_fanouts,
    }))
}

fn union_or_empty<const N: usize>(parts: [Option<Frame>; N], header: &[&str]) -> Result<Frame> {
    Ok(Frame::union_all(parts.iter().map(Option::as_ref))?
        .unwrap_or_else(|| Frame::with_header(header)))
}

/// Core edge columns, deduplicated.
fn collect_edges(frame: Option<&Frame>) -> Result<Option<Frame>> {
    let Some(frame) = frame else {
        return Ok(None);
    };
    let columns: Vec<Column<'_>> = Edge::COLUMNS.iter().map(|&c| Column::Name(c)).collect();
    Ok(Some(frame.project(&columns)?.drop_duplicates()))
}

/// Labels of every distinct relationship in `frame`.
fn edge_label_labels<E>(
    session: &Session<'_, E>,
    frame: Option<&Frame>,
    lang: &str,
) -> Result<Option<Frame>>
where
    E: QueryEngine + ?Sized,
{
    let Some(frame) = frame else {
        return Ok(None);
    };
    let relationships = frame.project(&["label".into()])?.drop_duplicates();
    let fetched = relationships
        .values("label")?
        .into_iter()
        .map(|rel| session.node_labels(rel, lang))
        .collect::<Result<Vec<Frame>>>()?;
    let lazy = Frame::from_lazy(
        NODE_MATCH_HEADER.iter().copied(),
        fetched.into_iter().flat_map(Frame::into_rows),
    );
    Ok(Some(lazy.materialize()?))
}

/// `(target, column)` pairs with nulls removed. The target is `node1` for
/// inverse edges and `node2` otherwise.
fn target_column(frame: Option<&Frame>, inverse: bool, column: &str) -> Result<Option<Frame>> {
    let Some(frame) = frame else {
        return Ok(None);
    };
    let target = if inverse { "node1" } else { "node2" };
    Ok(Some(
        frame
            .project(&[target.into(), column.into()])?
            .drop_nulls()
            .drop_duplicates(),
    ))
}
