//! Shared fixture graph: a small slice of Wikidata around Douglas Adams.

#![allow(dead_code)]

use kgtk_browser::engine::{EdgeSink, GraphTable};
use kgtk_browser::model::Edge;
use kgtk_browser::{Browser, BrowserConfig, MemoryEngine};

pub fn fixture_edges() -> Vec<(GraphTable, Vec<Edge>)> {
    vec![
        (
            GraphTable::Edges,
            vec![
                Edge::new("Q42-P31-Q5", "Q42", "P31", "Q5"),
                Edge::new("Q42-P69-Q691283", "Q42", "P69", "Q691283"),
                Edge::new("Q42-P69-Q4961791", "Q42", "P69", "Q4961791"),
                Edge::new("Q42-P18-1", "Q42", "P18", "\"Douglas adams portrait cropped.jpg\""),
                Edge::new("Q42-P569-1", "Q42", "P569", "^1952-03-11T00:00:00Z/11"),
                Edge::new("Q42-P214-1", "Q42", "P214", "\"113230702\""),
                Edge::new("Q42-P800-Q25338", "Q42", "P800", "Q25338"),
                Edge::new(
                    "Q42-sitelink-en",
                    "Q42",
                    "wikipedia_sitelink",
                    "\"https://en.wikipedia.org/wiki/Douglas_Adams\"",
                ),
                Edge::new("Q25338-P50-Q42", "Q25338", "P50", "Q42"),
                Edge::new("Q25338-P31-Q7725634", "Q25338", "P31", "Q7725634"),
            ],
        ),
        (
            GraphTable::Qualifiers,
            vec![
                Edge::new("Q42-P69-Q691283-q1", "Q42-P69-Q691283", "P512", "Q1765120"),
                Edge::new("Q42-P69-Q691283-q2", "Q42-P69-Q691283", "P582", "^1974-00-00T00:00:00Z/9"),
                Edge::new("Q42-P69-Q691283-q3", "Q42-P69-Q691283", "P580", "^1971-00-00T00:00:00Z/9"),
                Edge::new("Q25338-P50-Q42-q1", "Q25338-P50-Q42", "P1545", "\"1\""),
            ],
        ),
        (
            GraphTable::Labels,
            vec![
                Edge::new("l-Q42-en", "Q42", "label", "'Douglas Adams'@en"),
                Edge::new("l-Q42-fr", "Q42", "label", "'Douglas Adams'@fr"),
                Edge::new("l-Q5", "Q5", "label", "'human'@en"),
                Edge::new("l-Q691283", "Q691283", "label", "'Saint Johns College'@en"),
                Edge::new("l-Q4961791", "Q4961791", "label", "'Brentwood School'@en"),
                Edge::new("l-Q25338", "Q25338", "label", "'The Hitchhikers Guide to the Galaxy'@en"),
                Edge::new("l-Q1765120", "Q1765120", "label", "'Bachelor of Arts'@en"),
                Edge::new("l-Q7725634", "Q7725634", "label", "'literary work'@en"),
                Edge::new("l-Q420", "Q420", "label", "'Q42 fan club'@en"),
                Edge::new("l-Q102", "Q102", "label", "'douglas'@en"),
                Edge::new("l-P31", "P31", "label", "'instance of'@en"),
                Edge::new("l-P69", "P69", "label", "'educated at'@en"),
                Edge::new("l-P18", "P18", "label", "'image'@en"),
                Edge::new("l-P569", "P569", "label", "'date of birth'@en"),
                Edge::new("l-P214", "P214", "label", "'VIAF ID'@en"),
                Edge::new("l-P800", "P800", "label", "'notable work'@en"),
                Edge::new("l-P50", "P50", "label", "'author'@en"),
                Edge::new("l-P580", "P580", "label", "'start time'@en"),
                Edge::new("l-P582", "P582", "label", "'end time'@en"),
                Edge::new("l-P512", "P512", "label", "'academic degree'@en"),
            ],
        ),
        (
            GraphTable::Aliases,
            vec![Edge::new("a-Q42", "Q42", "alias", "'Douglas Noel Adams'@en")],
        ),
        (
            GraphTable::Descriptions,
            vec![Edge::new("d-Q42", "Q42", "description", "'English writer and humorist'@en")],
        ),
        (
            GraphTable::Metadata,
            vec![
                Edge::new("m-Q5", "Q5", "count_distinct_properties", "120"),
                Edge::new("m-Q25338", "Q25338", "count_distinct_properties", "35"),
            ],
        ),
        (
            GraphTable::Datatypes,
            vec![
                Edge::new("dt-P214", "P214", "datatype", "external-id"),
                Edge::new("dt-P569", "P569", "datatype", "time"),
            ],
        ),
    ]
}

pub fn load<S: EdgeSink>(sink: &S) {
    for (graph, edges) in fixture_edges() {
        sink.insert_edges(graph, &edges).unwrap();
    }
}

pub fn memory_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    load(&engine);
    engine
}

pub fn browser() -> Browser<MemoryEngine> {
    Browser::new(memory_engine(), BrowserConfig::default()).unwrap()
}
