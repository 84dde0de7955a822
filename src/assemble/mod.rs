//! # Property/Qualifier Assembler
//!
//! Builds the flat item document served by `/kb/item` and
//! `/kb/related_items` from item-edge rows:
//!
//! 1. fetch and truncate edges, collapse repeated edge ids
//! 2. sort by (relationship priority, relationship label, target label, row)
//! 3. split off sitelinks, group runs of one relationship into property
//!    entries, route external-id entries to `xrefs`
//! 4. downsample properties, then fetch and nest qualifiers for the
//!    surviving values
//! 5. apply sort metadata
//!
//! Edge ids ride along in `PendingValue` only while qualifiers are
//! attached; the public `ValueEntry` never carries them.

pub mod downsample;
pub mod priority;
pub mod qualifiers;
pub mod sort;

pub use downsample::{downsample, downsample_properties};
pub use priority::{PriorityMap, PriorityTable, QualifierPriority, Subproperty, DEFAULT_PRIORITY};
pub use qualifiers::{QualifierCaps, QualifierFetch};
pub use sort::{SortMetadata, SortOrder, SortSpec};

use hashbrown::HashSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{lex, unstringify, ValueCaches, ValueContext, ValueRenderer};
use crate::classify::Literal;
use crate::engine::QueryEngine;
use crate::frame::Frame;
use crate::model::{
    GalleryImage, ItemDocument, ItemEdge, PropertyEntry, Sitelink, TypedValue, ValueEntry,
    ValueKind,
};
use crate::session::Session;
use crate::Result;

const COMMONS_THUMB_URL: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/";
const THUMBNAIL_WIDTH: u32 = 300;

/// Size limits of one item request. Zero disables a downsampling cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemLimits {
    pub proplist_max_len: usize,
    pub valuelist_max_len: usize,
    pub qual_proplist_max_len: usize,
    pub qual_valuelist_max_len: usize,
    pub query_limit: usize,
    pub qual_query_limit: usize,
}

impl Default for ItemLimits {
    fn default() -> Self {
        Self {
            proplist_max_len: 2000,
            valuelist_max_len: 20,
            qual_proplist_max_len: 50,
            qual_valuelist_max_len: 20,
            query_limit: 300_000,
            qual_query_limit: 300_000,
        }
    }
}

impl ItemLimits {
    fn qualifier_caps(&self) -> QualifierCaps {
        QualifierCaps {
            proplist_max_len: self.qual_proplist_max_len,
            valuelist_max_len: self.qual_valuelist_max_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemRequest {
    pub node: String,
    pub lang: String,
    pub limits: ItemLimits,
}

/// Process-wide assembly settings.
#[derive(Debug, Clone, Default)]
pub struct AssemblySettings {
    pub qualifier_priority: QualifierPriority,
    pub qualifier_fetch: QualifierFetch,
    pub sitelinks: Vec<String>,
    pub sort_metadata: Option<SortMetadata>,
}

struct PendingValue {
    edge_id: String,
    entry: ValueEntry,
}

struct PendingProperty {
    relationship: String,
    property: String,
    kind: ValueKind,
    values: Vec<PendingValue>,
}

impl PendingProperty {
    fn finish(self) -> PropertyEntry {
        PropertyEntry {
            relationship: self.relationship,
            property: self.property,
            kind: self.kind,
            values: self.values.into_iter().map(|v| v.entry).collect(),
        }
    }
}

/// One assembly run over a session.
pub struct Assembler<'s, 'b, E: QueryEngine + ?Sized> {
    session: &'s Session<'b, E>,
    caches: &'s ValueCaches,
    settings: &'s AssemblySettings,
    priorities: &'s PriorityMap,
}

impl<'s, 'b, E: QueryEngine + ?Sized> Assembler<'s, 'b, E> {
    pub fn new(
        session: &'s Session<'b, E>,
        caches: &'s ValueCaches,
        settings: &'s AssemblySettings,
        priorities: &'s PriorityMap,
    ) -> Self {
        Self { session, caches, settings, priorities }
    }

    fn renderer(&self) -> ValueRenderer<'s, Session<'b, E>> {
        ValueRenderer::new(self.session, self.caches)
    }

    /// The full item document.
    pub fn item_document<R: Rng + ?Sized>(&self, req: &ItemRequest, rng: &mut R) -> Result<ItemDocument> {
        let limits = &req.limits;
        let mut edges = self.session.item_edges(&req.node, &req.lang, limits.query_limit)?;
        if limits.query_limit > 0 {
            edges.truncate(limits.query_limit);
        }
        debug!(node = %req.node, edges = edges.len(), "fetched item edges");

        let (text, description) = self.header(&req.node, &req.lang)?;
        let gallery = self.gallery(&edges, &text);

        let sorted = self.sort_edges(edges);
        let (sitelink_edges, sorted): (Vec<ItemEdge>, Vec<ItemEdge>) = sorted
            .into_iter()
            .partition(|e| self.settings.sitelinks.contains(&e.relationship));
        let sitelinks = self.sitelinks(&sitelink_edges, &req.lang)?;

        let (mut properties, xrefs) = self.group(&sorted, &req.lang, true)?;
        downsample(&mut properties, limits.proplist_max_len, rng);
        for p in properties.iter_mut() {
            downsample(&mut p.values, limits.valuelist_max_len, rng);
        }
        self.attach_qualifiers(&req.node, &mut properties, req, rng)?;

        let mut properties: Vec<PropertyEntry> =
            properties.into_iter().map(PendingProperty::finish).collect();
        if let Some(meta) = &self.settings.sort_metadata {
            meta.sort_properties(&mut properties);
        }

        Ok(ItemDocument {
            node: req.node.clone(),
            text,
            description,
            properties,
            xrefs: xrefs.into_iter().map(PendingProperty::finish).collect(),
            sitelinks,
            gallery,
        })
    }

    /// Items pointing at `req.node`, grouped by relationship. Values are the
    /// subjects of the inverse edges; there are no qualifiers.
    pub fn related_items<R: Rng + ?Sized>(&self, req: &ItemRequest, rng: &mut R) -> Result<ItemDocument> {
        let limits = &req.limits;
        let mut edges = self.session.item_inverse_edges(&req.node, &req.lang, limits.query_limit)?;
        if limits.query_limit > 0 {
            edges.truncate(limits.query_limit);
        }
        debug!(node = %req.node, edges = edges.len(), "fetched inverse item edges");

        let (text, description) = self.header(&req.node, &req.lang)?;
        let sorted = self.sort_edges(edges);
        let (mut properties, _) = self.group(&sorted, &req.lang, false)?;
        downsample(&mut properties, limits.proplist_max_len, rng);
        for p in properties.iter_mut() {
            downsample(&mut p.values, limits.valuelist_max_len, rng);
        }

        Ok(ItemDocument {
            node: req.node.clone(),
            text,
            description,
            properties: properties.into_iter().map(PendingProperty::finish).collect(),
            xrefs: Vec::new(),
            sitelinks: Vec::new(),
            gallery: Vec::new(),
        })
    }

    /// Display text and description, each defaulting to the node id.
    fn header(&self, node: &str, lang: &str) -> Result<(String, String)> {
        let first = |frame: Frame, column: &str| -> Result<String> {
            Ok(frame.first_value(column)?.map_or_else(|| node.to_string(), unstringify))
        };
        let text = first(self.session.node_labels(node, lang)?, "node_label")?;
        let description = first(self.session.node_descriptions(node, lang)?, "node_description")?;
        Ok((text, description))
    }

    /// Collapse repeated edge ids, then order for grouping.
    fn sort_edges(&self, edges: Vec<ItemEdge>) -> Vec<ItemEdge> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut keyed: Vec<((u32, String, String, usize), ItemEdge)> = edges
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .enumerate()
            .map(|(idx, e)| {
                let key = (
                    self.priorities.get(&e.relationship),
                    e.relationship_label.as_deref().unwrap_or("").to_lowercase(),
                    e.target_label.as_deref().unwrap_or(&e.target_node).to_lowercase(),
                    idx,
                );
                (key, e)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, e)| e).collect()
    }

    /// Group runs of one relationship. With `split_xrefs`, a run whose first
    /// edge is an external id goes to the second list.
    fn group(
        &self,
        edges: &[ItemEdge],
        lang: &str,
        split_xrefs: bool,
    ) -> Result<(Vec<PendingProperty>, Vec<PendingProperty>)> {
        let renderer = self.renderer();
        let mut properties: Vec<PendingProperty> = Vec::new();
        let mut xrefs: Vec<PendingProperty> = Vec::new();
        // Which list the current run lives in.
        let mut in_xrefs = false;
        let mut current: Option<&str> = None;

        for e in edges {
            let value = renderer.render(
                &e.target_node,
                &ValueContext {
                    relationship: &e.relationship,
                    wikidatatype: e.wikidatatype.as_deref(),
                    label: e.target_label.as_deref(),
                    description: e.target_description.as_deref(),
                    lang,
                },
            )?;

            if current != Some(e.relationship.as_str()) {
                current = Some(e.relationship.as_str());
                in_xrefs = split_xrefs && e.is_external_id();
                let entry = PendingProperty {
                    relationship: e.relationship.clone(),
                    property: match e.relationship_label.as_deref() {
                        Some(label) => unstringify(label),
                        None => e.relationship.clone(),
                    },
                    kind: value.kind(),
                    values: Vec::new(),
                };
                if in_xrefs {
                    xrefs.push(entry);
                } else {
                    properties.push(entry);
                }
            }

            let target = if in_xrefs { xrefs.last_mut() } else { properties.last_mut() };
            if let Some(p) = target {
                p.values.push(PendingValue { edge_id: e.id.clone(), entry: ValueEntry::new(value) });
            }
        }
        Ok((properties, xrefs))
    }

    fn attach_qualifiers<R: Rng + ?Sized>(
        &self,
        item: &str,
        properties: &mut [PendingProperty],
        req: &ItemRequest,
        rng: &mut R,
    ) -> Result<()> {
        let edge_ids: Vec<&str> = {
            let mut seen: HashSet<&str> = HashSet::new();
            properties
                .iter()
                .flat_map(|p| p.values.iter())
                .map(|v| v.edge_id.as_str())
                .filter(|id| seen.insert(id))
                .collect()
        };

        let fetched = self.settings.qualifier_fetch.fetch(
            self.session,
            item,
            &edge_ids,
            &req.lang,
            req.limits.qual_query_limit,
        )?;
        let grouped = qualifiers::group_by_edge(fetched, &self.settings.qualifier_priority);

        let renderer = self.renderer();
        let caps = req.limits.qualifier_caps();
        let mut bare = 0usize;
        for value in properties.iter_mut().flat_map(|p| p.values.iter_mut()) {
            match grouped.get(&value.edge_id) {
                Some(rows) => {
                    value.entry.qualifiers =
                        qualifiers::render_qualifiers(&renderer, rows, &req.lang, caps, rng)?;
                }
                None => bare += 1,
            }
        }
        debug!(item, qualified = grouped.len(), bare, "attached qualifiers");
        Ok(())
    }

    fn sitelinks(&self, edges: &[ItemEdge], lang: &str) -> Result<Vec<Sitelink>> {
        let renderer = self.renderer();
        edges
            .iter()
            .map(|e| {
                let value = renderer.render(
                    &e.target_node,
                    &ValueContext {
                        relationship: &e.relationship,
                        wikidatatype: e.wikidatatype.as_deref(),
                        label: e.target_label.as_deref(),
                        description: e.target_description.as_deref(),
                        lang,
                    },
                )?;
                Ok(sitelink(&e.relationship, &value))
            })
            .collect()
    }

    /// Thumbnails of every image-valued edge, in fetch order.
    fn gallery(&self, edges: &[ItemEdge], text: &str) -> Vec<GalleryImage> {
        let image_label = &self.session.engine().schema().image_label;
        edges
            .iter()
            .filter(|e| &e.relationship == image_label)
            .filter(|e| matches!(lex(&e.node2), Literal::String(_) | Literal::LanguageString { .. }))
            .map(|e| GalleryImage {
                url: commons_thumbnail(&unstringify(&e.node2), THUMBNAIL_WIDTH),
                text: text.to_string(),
            })
            .collect()
    }
}

fn sitelink(relationship: &str, value: &TypedValue) -> Sitelink {
    Sitelink {
        relationship: relationship.to_string(),
        text: value.text().to_string(),
        url: value.url().map(str::to_string),
    }
}

/// A scaled Wikimedia Commons rendition of `image`. Commons shards files
/// by the MD5 of the underscored name: `<d[0]>/<d[0..2]>/`.
pub fn commons_thumbnail(image: &str, width: u32) -> String {
    let image = image.replace(' ', "_");
    let digest = format!("{:x}", md5::compute(image.as_bytes()));
    format!("{COMMONS_THUMB_URL}{}/{}/{image}/{width}px-{image}", &digest[..1], &digest[..2])
}
