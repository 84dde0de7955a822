//! `/kb/query` matching.
//!
//! Four match categories run in a fixed order, each optional:
//!
//! 1. exact node id
//! 2. exact label
//! 3. node id prefix
//! 4. label prefix
//!
//! A node appears at most once, in the first category that found it.
//! Within a category, hits are ordered by node id with the numeric part
//! compared as a number, so `Q42` comes before `Q102`.

use hashbrown::HashSet;
use tracing::debug;

use crate::cache::SearchKey;
use crate::classify::unstringify;
use crate::engine::{Query, QueryEngine, LANGUAGE_ANY};
use crate::frame::Frame;
use crate::model::{SearchMatch, SearchResponse};
use crate::session::Session;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub q: String,
    pub lang: String,
    pub match_item_exactly: bool,
    pub match_label_exactly: bool,
    pub match_item_prefixes: bool,
    pub match_item_prefixes_limit: usize,
    pub match_label_prefixes: bool,
    pub match_label_prefixes_limit: usize,
    pub match_label_ignore_case: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            q: String::new(),
            lang: "en".into(),
            match_item_exactly: true,
            match_label_exactly: true,
            match_item_prefixes: true,
            match_item_prefixes_limit: 20,
            match_label_prefixes: true,
            match_label_prefixes_limit: 20,
            match_label_ignore_case: true,
        }
    }
}

impl SearchRequest {
    pub fn new(q: &str, lang: &str) -> Self {
        Self { q: strip_glob(q), lang: lang.to_string(), ..Self::default() }
    }

    pub fn cache_key(&self) -> SearchKey {
        SearchKey {
            q: self.q.clone(),
            lang: self.lang.clone(),
            flags: [
                self.match_item_exactly,
                self.match_label_exactly,
                self.match_item_prefixes,
                self.match_label_prefixes,
                self.match_label_ignore_case,
            ],
            item_prefix_limit: self.match_item_prefixes_limit,
            label_prefix_limit: self.match_label_prefixes_limit,
        }
    }
}

/// Remove the glob metacharacters `*`, `[` and `?`.
pub fn strip_glob(q: &str) -> String {
    q.chars().filter(|c| !matches!(c, '*' | '[' | '?')).collect()
}

pub fn search<E>(session: &Session<'_, E>, req: &SearchRequest) -> Result<SearchResponse>
where
    E: QueryEngine + ?Sized,
{
    let mut collector = Collector::default();
    if req.q.is_empty() {
        return Ok(collector.finish());
    }
    let node = req.q.to_uppercase();
    let lang = req.lang.clone();

    if req.match_item_exactly {
        collector.add(&session.execute(&Query::MatchItemExactly {
            node: node.clone(),
            lang: lang.clone(),
            limit: 0,
        })?)?;
    }
    if req.match_label_exactly {
        // With any language the tag is open, so the match is bounded like a
        // prefix search.
        let limit = if req.lang == LANGUAGE_ANY { req.match_label_prefixes_limit } else { 0 };
        collector.add(&session.execute(&Query::MatchLabelExactly {
            label: req.q.clone(),
            lang: lang.clone(),
            ignore_case: req.match_label_ignore_case,
            limit,
        })?)?;
    }
    if req.match_item_prefixes {
        collector.add(&session.execute(&Query::MatchItemPrefix {
            prefix: node,
            lang: lang.clone(),
            limit: req.match_item_prefixes_limit,
        })?)?;
    }
    if req.match_label_prefixes {
        collector.add(&session.execute(&Query::MatchLabelPrefix {
            prefix: req.q.clone(),
            lang,
            ignore_case: req.match_label_ignore_case,
            limit: req.match_label_prefixes_limit,
        })?)?;
    }

    let response = collector.finish();
    debug!(q = %req.q, matches = response.matches.len(), "search done");
    Ok(response)
}

#[derive(Default)]
struct Collector {
    seen: HashSet<String>,
    matches: Vec<SearchMatch>,
}

impl Collector {
    /// Append one category's `(node1, node_label)` hits.
    fn add(&mut self, frame: &Frame) -> Result<()> {
        let mut hits: Vec<(&str, Option<&str>)> = Vec::with_capacity(frame.len());
        for (node, label) in frame.column("node1")?.into_iter().zip(frame.column("node_label")?) {
            if let Some(node) = node {
                hits.push((node, label));
            }
        }
        hits.sort_by_cached_key(|(node, _)| node_order_key(node));

        for (node, label) in hits {
            if !self.seen.insert(node.to_string()) {
                continue;
            }
            self.matches.push(SearchMatch {
                node: node.to_string(),
                text: node.to_string(),
                description: label.map(unstringify).unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn finish(self) -> SearchResponse {
        SearchResponse { matches: self.matches }
    }
}

/// `Q42` -> `("Q", 2, "42")`: letters, then the digits compared by length
/// first so they order numerically.
fn node_order_key(node: &str) -> (String, usize, String) {
    let split = node.find(|c: char| c.is_ascii_digit()).unwrap_or(node.len());
    let (prefix, digits) = node.split_at(split);
    let digits = digits.trim_start_matches('0');
    (prefix.to_string(), digits.len(), digits.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EdgeSink, GraphTable, MemoryEngine};
    use crate::model::Edge;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine
            .insert_edges(
                GraphTable::Labels,
                &[
                    Edge::new("l1", "Q102", "label", "'Douglas'@en"),
                    Edge::new("l2", "Q42", "label", "'Douglas Adams'@en"),
                    Edge::new("l3", "Q4", "label", "'douglas'@en"),
                    Edge::new("l4", "Q420", "label", "'Q42 fan club'@en"),
                ],
            )
            .unwrap();
        engine
    }

    fn refs(r: &SearchResponse) -> Vec<&str> {
        r.matches.iter().map(|m| m.node.as_str()).collect()
    }

    #[test]
    fn test_categories_in_order_without_repeats() {
        let engine = engine();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        let r = search(&session, &SearchRequest::new("q42", "en")).unwrap();
        // Exact item first, then the item prefix hit.
        assert_eq!(refs(&r), vec!["Q42", "Q420"]);
        assert_eq!(r.matches[0].text, "Q42");
        assert_eq!(r.matches[0].description, "Douglas Adams");
    }

    #[test]
    fn test_label_matches_ignore_case_and_sort_numerically() {
        let engine = engine();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        let req = SearchRequest {
            match_item_exactly: false,
            match_item_prefixes: false,
            ..SearchRequest::new("douglas", "en")
        };
        let r = search(&session, &req).unwrap();
        assert_eq!(refs(&r), vec!["Q4", "Q102", "Q42"]);
    }

    #[test]
    fn test_case_sensitive_exact_label() {
        let engine = engine();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        let req = SearchRequest {
            match_item_exactly: false,
            match_item_prefixes: false,
            match_label_prefixes: false,
            match_label_ignore_case: false,
            ..SearchRequest::new("Douglas", "en")
        };
        let r = search(&session, &req).unwrap();
        assert_eq!(refs(&r), vec!["Q102"]);
    }

    #[test]
    fn test_glob_characters_removed() {
        assert_eq!(strip_glob("Q4*2?["), "Q42");
        assert_eq!(SearchRequest::new("Dou*glas", "en").q, "Douglas");
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let engine = engine();
        let lock = Mutex::new(());
        let session = Session::open(&engine, &lock);
        assert!(search(&session, &SearchRequest::new("*", "en")).unwrap().matches.is_empty());
    }

    #[test]
    fn test_node_order_key() {
        let mut ids = vec!["Q102", "P31", "Q42", "Q7"];
        ids.sort_by_key(|id| node_order_key(id));
        assert_eq!(ids, vec!["P31", "Q7", "Q42", "Q102"]);
    }
}
