//! # Response Formatter
//!
//! Turns collected `NodeData` into the JSON-LD flavored
//! `kgtk_object_collection` envelope served by `get_all_node_data`.
//!
//! Literals keep their KGTK encoding (quotes, language tags, `^` and `@`
//! prefixes) so clients can decode them themselves. Edge columns are
//! renamed to `@id`/`s`/`p`/`o`; qualifiers nest under the edge whose id
//! is their `s`.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::Serialize;
use tracing::warn;

use crate::collect::NodeData;
use crate::frame::{decode, Frame};
use crate::model::Edge;
use crate::Result;

pub const SCHEMA_VERSION: &str = "2021-08-19";
pub const CONTEXT_URL: &str = "https://github.com/usc-isi-i2/kgtk-browser/kgtk_objects.jsonld";

/// A node-data encoding.
pub trait NodeDataFormat: Send + Sync {
    /// Name used in cache keys.
    fn name(&self) -> &'static str;

    fn format_node_data(&self, data: &NodeData) -> Result<KgtkObjectCollection>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KgtkObjectCollection {
    #[serde(rename = "@type")]
    pub object_type: &'static str,
    #[serde(rename = "@context")]
    pub context: Vec<&'static str>,
    pub meta: MetaInfo,
    pub objects: Vec<KgtkObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaInfo {
    #[serde(rename = "@type")]
    pub object_type: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum KgtkObject {
    #[serde(rename = "kgtk_node")]
    Node(NodeObject),
    #[serde(rename = "kgtk_object_labels")]
    Labels {
        #[serde(rename = "@id")]
        id: String,
        labels: BTreeMap<String, Vec<String>>,
    },
    #[serde(rename = "kgtk_object_images")]
    Images {
        #[serde(rename = "@id")]
        id: String,
        images: BTreeMap<String, Vec<String>>,
    },
    #[serde(rename = "kgtk_object_fanouts")]
    Fanouts {
        #[serde(rename = "@id")]
        id: String,
        fanouts: BTreeMap<String, i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeObject {
    #[serde(rename = "@id")]
    pub id: String,
    pub label: Vec<String>,
    pub alias: Vec<String>,
    pub description: Vec<String>,
    pub image: Vec<String>,
    pub edges: Vec<JsonEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonEdge {
    #[serde(rename = "@type")]
    pub object_type: &'static str,
    #[serde(rename = "@id")]
    pub id: String,
    pub s: String,
    pub p: String,
    pub o: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<JsonEdge>,
}

impl From<Edge> for JsonEdge {
    fn from(e: Edge) -> Self {
        Self {
            object_type: "kgtk_edge",
            id: e.id,
            s: e.node1,
            p: e.label,
            o: e.node2,
            qualifiers: Vec::new(),
        }
    }
}

/// Edges as `s`/`p`/`o` triples with nested qualifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTripleFormat;

impl JsonTripleFormat {
    fn core(&self, data: &NodeData) -> Result<NodeObject> {
        let strings = |frame: &Frame, column: &str| -> Result<Vec<String>> {
            Ok(frame.values(column)?.into_iter().map(str::to_string).collect())
        };

        let mut edges: Vec<JsonEdge> = decode::<Edge>(&data.edges)?
            .into_iter()
            .map(JsonEdge::from)
            .collect();
        let index: HashMap<String, usize> =
            edges.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();
        for qual in decode::<Edge>(&data.qualifiers)? {
            match index.get(&qual.node1) {
                Some(&i) => edges[i].qualifiers.push(qual.into()),
                None => warn!(node = %data.node, qualifier = %qual.id, edge = %qual.node1, "dangling qualifier"),
            }
        }

        Ok(NodeObject {
            id: data.node.clone(),
            label: strings(&data.labels, "node_label")?,
            alias: strings(&data.aliases, "node_alias")?,
            description: strings(&data.descriptions, "node_description")?,
            image: strings(&data.images, "node_image")?,
            edges,
        })
    }
}

impl NodeDataFormat for JsonTripleFormat {
    fn name(&self) -> &'static str {
        "json-triple"
    }

    fn format_node_data(&self, data: &NodeData) -> Result<KgtkObjectCollection> {
        let node = &data.node;
        let mut objects = vec![
            KgtkObject::Node(self.core(data)?),
            KgtkObject::Labels {
                id: format!("kgtk_object_labels_{node}"),
                labels: data.all_labels.to_values_dict()?,
            },
        ];
        if let Some(images) = &data.all_images {
            objects.push(KgtkObject::Images {
                id: format!("kgtk_object_images_{node}"),
                images: images.to_values_dict()?,
            });
        }
        if let Some(fanouts) = &data.all_fanouts {
            objects.push(KgtkObject::Fanouts {
                id: format!("kgtk_object_fanouts_{node}"),
                fanouts: fanout_counts(node, fanouts)?,
            });
        }

        Ok(KgtkObjectCollection {
            object_type: "kgtk_object_collection",
            context: vec![CONTEXT_URL],
            meta: MetaInfo { object_type: "kgtk_meta_info", version: SCHEMA_VERSION },
            objects,
        })
    }
}

/// Fanouts coerced to integers. Non-numeric counts are dropped.
fn fanout_counts(node: &str, fanouts: &Frame) -> Result<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    for (target, raw) in fanouts.to_value_dict()? {
        match raw.parse::<i64>() {
            Ok(n) => {
                counts.insert(target, n);
            }
            Err(_) => warn!(node, target = %target, value = %raw, "non-numeric fanout"),
        }
    }
    Ok(counts)
}
