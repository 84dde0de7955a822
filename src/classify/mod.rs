//! # Value Classifier
//!
//! Raw KGTK cells are lexed into a `Literal` and rendered into a
//! `TypedValue`. Lexing is a pure function. Rendering may issue secondary
//! lookups (unit labels, language names, formatter templates) through a
//! `LabelSource`; their results are memoized in `ValueCaches`.
//!
//! | Shape | Example | Kind |
//! |-------|---------|------|
//! | symbol `P…`/`Q…` | `Q42` | `/w/item` |
//! | language-qualified string | `'Paris'@fr` | `/w/text` |
//! | string | `"abc"` | `/w/string` |
//! | number / quantity | `+1.5[+1.4,+1.6]Q11573` | `/w/quantity` |
//! | date and time | `^1970-00-00T00:00:00Z/9` | `/w/time` |
//! | location | `@43.26/10.92` | `/w/geo` |
//! | anything else | `True` | `/w/unknown` |
//!
//! Edges whose relationship has the `external-id` datatype are rendered as
//! external ids whatever their shape.

pub mod literal;
mod render;

pub use literal::{lex, language_tag, stringify, unstringify, unstringify_or, Literal};
pub use render::{
    format_dms, format_time, sniff_url, LabelSource, ValueCaches, ValueContext, ValueRenderer,
};
