//! # Browser Data Model
//!
//! Plain DTOs shared by the engine, the assembler and the HTTP layer.
//! Node identity is the node's string id; there is no node object.
//!
//! Design rule: this module is pure data. No I/O, no locks, no engine calls.

pub mod edge;
pub mod value;
pub mod document;

pub use edge::{Direction, Edge, ItemEdge, QualifierEdge};
pub use value::{TypedValue, ValueKind};
pub use document::{
    GalleryImage, ItemDocument, PropertyEntry, SearchMatch, SearchResponse, Sitelink, ValueEntry,
};
