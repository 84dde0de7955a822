//! # kgtk-browser: Read-only Knowledge Graph Browsing API
//!
//! Serves labels, edges, qualifiers and item documents out of a KGTK graph
//! cache (Wikidata-style edge tables) to a browser UI.
//!
//! ## Layers
//!
//! 1. **Engine**: `QueryEngine` answers a fixed set of named queries with
//!    a `Frame` whose header is fixed per query kind
//! 2. **Collector**: runs the per-node query set and folds the frames
//! 3. **Classifier**: lexes KGTK literals into typed display values
//! 4. **Assembler**: builds the flat item document with priorities,
//!    downsampling and nested qualifiers
//! 5. **Formatter**: renders node data as a `kgtk_object_collection`
//!
//! `Browser` ties them together behind bounded LRU caches; `server` puts
//! it on HTTP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kgtk_browser::{Browser, BrowserConfig, MemoryEngine, NodeRequest};
//!
//! # fn example() -> kgtk_browser::Result<()> {
//! let browser = Browser::new(MemoryEngine::new(), BrowserConfig::default())?;
//! let data = browser.get_all_node_data(&NodeRequest {
//!     node: "Q42".into(),
//!     lang: "en".into(),
//!     images: false,
//!     fanouts: false,
//!     inverse: false,
//! })?;
//! if let Some(data) = data {
//!     println!("{}", serde_json::to_string_pretty(&*data)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Engines
//!
//! | Engine | Feature | Description |
//! |--------|---------|-------------|
//! | Memory | (always) | In-memory edge tables for testing/embedding |
//! | SQLite | `sqlite` (default) | KGTK graph cache file via rusqlite |

// ============================================================================
// Modules
// ============================================================================

pub mod frame;
pub mod model;
pub mod classify;
pub mod engine;
pub mod session;
pub mod collect;
pub mod assemble;
pub mod format;
pub mod cache;
pub mod search;
pub mod config;
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use assemble::{ItemLimits, ItemRequest};
pub use collect::{NodeData, NodeRequest};
pub use config::BrowserConfig;
pub use engine::{GraphSchema, MemoryEngine, Query, QueryEngine, LANGUAGE_ANY};
#[cfg(feature = "sqlite")]
pub use engine::SqliteEngine;
pub use format::{KgtkObjectCollection, NodeDataFormat};
pub use frame::Frame;
pub use model::{ItemDocument, SearchResponse, TypedValue, ValueKind};
pub use search::SearchRequest;

// ============================================================================
// Browser
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::assemble::{Assembler, AssemblySettings, PriorityMap, PriorityTable, Subproperty};
use crate::cache::{ItemKey, NodeDataKey, ResponseCaches};
use crate::classify::ValueCaches;
use crate::engine::EdgeQuery;
use crate::format::JsonTripleFormat;
use crate::frame::decode;
use crate::session::Session;

/// The browsing service: one engine, its lock, and every cache in front of
/// it. Cheap to share behind an `Arc`.
pub struct Browser<E: QueryEngine> {
    engine: E,
    lock: Mutex<()>,
    config: BrowserConfig,
    settings: AssemblySettings,
    priorities: PriorityTable,
    values: ValueCaches,
    responses: ResponseCaches,
    format: JsonTripleFormat,
}

impl<E: QueryEngine> Browser<E> {
    /// Validate `config` and load its sort metadata.
    pub fn new(engine: E, config: BrowserConfig) -> Result<Self> {
        config.validate()?;
        let settings = config.assembly_settings()?;
        Ok(Self::with_settings(engine, config, settings))
    }

    pub fn with_settings(engine: E, config: BrowserConfig, settings: AssemblySettings) -> Self {
        let capacity = config.browser.max_cache_size;
        Self {
            engine,
            lock: Mutex::new(()),
            priorities: PriorityTable::new(config.browser.property_priority.clone()),
            values: ValueCaches::new(capacity),
            responses: ResponseCaches::new(capacity),
            format: JsonTripleFormat,
            settings,
            config,
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn caches(&self) -> &ResponseCaches {
        &self.responses
    }

    /// Open a session; holds the engine lock if the engine needs it.
    pub fn session(&self) -> Session<'_, E> {
        Session::open(&self.engine, &self.lock)
    }

    /// Map a request language to the engine's form. Missing means the
    /// default language; the configured "any" code means no filter.
    pub fn resolve_lang(&self, lang: Option<&str>) -> String {
        match lang.map(str::trim) {
            None | Some("") => self.config.browser.default_language.clone(),
            Some(l) if l == self.config.browser.language_any => LANGUAGE_ANY.to_string(),
            Some(l) => l.to_string(),
        }
    }

    /// Drop every cached response and rendered value.
    pub fn clear_caches(&self) {
        self.responses.clear();
        self.values.clear();
    }

    // ========================================================================
    // Node data
    // ========================================================================

    /// Everything about one node as a `kgtk_object_collection`, or `None`
    /// for an unknown node.
    pub fn get_all_node_data(&self, req: &NodeRequest) -> Result<Option<Arc<KgtkObjectCollection>>> {
        let key = NodeDataKey {
            node: req.node.clone(),
            lang: req.lang.clone(),
            images: req.images,
            fanouts: req.fanouts,
            inverse: req.inverse,
            formatter: self.format.name(),
        };
        self.responses.node_data.get_or_try_insert(key, || {
            let session = self.session();
            match collect::collect_node_data(&session, req)? {
                Some(data) => Ok(Some(Arc::new(self.format.format_node_data(&data)?))),
                None => Ok(None),
            }
        })
    }

    /// One raw node-data frame, uncached.
    pub fn node_frame(&self, query: NodeFrameQuery, req: &NodeRequest) -> Result<Frame> {
        let session = self.session();
        let q = EdgeQuery {
            node: req.node.clone(),
            lang: req.lang.clone(),
            images: req.images,
            fanouts: req.fanouts,
        };
        match query {
            NodeFrameQuery::Labels => session.node_labels(&req.node, &req.lang),
            NodeFrameQuery::Aliases => session.node_aliases(&req.node, &req.lang),
            NodeFrameQuery::Descriptions => session.node_descriptions(&req.node, &req.lang),
            NodeFrameQuery::Images => session.node_images(&req.node),
            NodeFrameQuery::Edges => session.node_edges(&q),
            NodeFrameQuery::InverseEdges => session.node_inverse_edges(&q),
            NodeFrameQuery::EdgeQualifiers => session.node_edge_qualifiers(&q),
            NodeFrameQuery::InverseEdgeQualifiers => session.node_inverse_edge_qualifiers(&q),
        }
    }

    // ========================================================================
    // Item documents
    // ========================================================================

    pub fn get_item(&self, req: &ItemRequest) -> Result<Arc<ItemDocument>> {
        self.item_document(req, false)
    }

    pub fn get_related_items(&self, req: &ItemRequest) -> Result<Arc<ItemDocument>> {
        self.item_document(req, true)
    }

    fn item_document(&self, req: &ItemRequest, related: bool) -> Result<Arc<ItemDocument>> {
        let l = &req.limits;
        let key = ItemKey {
            node: req.node.clone(),
            lang: req.lang.clone(),
            related,
            proplist_max_len: l.proplist_max_len,
            valuelist_max_len: l.valuelist_max_len,
            qual_proplist_max_len: l.qual_proplist_max_len,
            qual_valuelist_max_len: l.qual_valuelist_max_len,
            query_limit: l.query_limit,
            qual_query_limit: l.qual_query_limit,
        };
        self.responses.items.get_or_try_insert(key, || {
            let session = self.session();
            let priorities = self.priorities(&session)?;
            let assembler = Assembler::new(&session, &self.values, &self.settings, &priorities);
            let mut rng = rand::thread_rng();
            let doc = if related {
                assembler.related_items(req, &mut rng)?
            } else {
                assembler.item_document(req, &mut rng)?
            };
            Ok(Arc::new(doc))
        })
    }

    /// The relationship priority table, built on first use from the
    /// subproperty hierarchy labelled in the default language.
    fn priorities(&self, session: &Session<'_, E>) -> Result<Arc<PriorityMap>> {
        self.priorities.get_or_build(|| {
            let frame = session.subproperty_relationships(&self.config.browser.default_language)?;
            let rows: Vec<Subproperty> = decode(&frame)?;
            debug!(rows = rows.len(), "fetched subproperty relationships");
            Ok(rows)
        })
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub fn search(&self, req: &SearchRequest) -> Result<Arc<SearchResponse>> {
        self.responses.search.get_or_try_insert(req.cache_key(), || {
            let session = self.session();
            Ok(Arc::new(search::search(&session, req)?))
        })
    }
}

/// The raw frames exposed for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFrameQuery {
    Labels,
    Aliases,
    Descriptions,
    Images,
    Edges,
    InverseEdges,
    EdgeQualifiers,
    InverseEdgeQualifiers,
}

impl NodeFrameQuery {
    pub const ALL: [NodeFrameQuery; 8] = [
        NodeFrameQuery::Labels,
        NodeFrameQuery::Aliases,
        NodeFrameQuery::Descriptions,
        NodeFrameQuery::Images,
        NodeFrameQuery::Edges,
        NodeFrameQuery::InverseEdges,
        NodeFrameQuery::EdgeQualifiers,
        NodeFrameQuery::InverseEdgeQualifiers,
    ];

    /// Route name, e.g. `get_node_edges`.
    pub fn route(&self) -> &'static str {
        match self {
            NodeFrameQuery::Labels => "get_node_labels",
            NodeFrameQuery::Aliases => "get_node_aliases",
            NodeFrameQuery::Descriptions => "get_node_descriptions",
            NodeFrameQuery::Images => "get_node_images",
            NodeFrameQuery::Edges => "get_node_edges",
            NodeFrameQuery::InverseEdges => "get_node_inverse_edges",
            NodeFrameQuery::EdgeQualifiers => "get_node_edge_qualifiers",
            NodeFrameQuery::InverseEdgeQualifiers => "get_node_inverse_edge_qualifiers",
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Incompatible frames: expected {expected} columns, got {got}")]
    IncompatibleFrame { expected: usize, got: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Query engine error: {0}")]
    QueryEngine(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
