//! End-to-end tests for the item and related-items documents.
//!
//! Each test builds a `Browser` over the fixture graph in a `MemoryEngine`
//! and checks the flat document served by `/kb/item`.

mod common;

use std::sync::Arc;

use kgtk_browser::assemble::{AssemblySettings, QualifierFetch, QualifierPriority, SortMetadata};
use kgtk_browser::assemble::priority::default_qualifier_order;
use kgtk_browser::engine::{EdgeSink, GraphTable};
use kgtk_browser::model::Edge;
use kgtk_browser::{Browser, BrowserConfig, ItemLimits, ItemRequest, MemoryEngine, ValueKind};
use pretty_assertions::assert_eq;
use serde_json::json;

fn request(node: &str) -> ItemRequest {
    ItemRequest { node: node.into(), lang: "en".into(), limits: ItemLimits::default() }
}

fn relationships(props: &[kgtk_browser::model::PropertyEntry]) -> Vec<&str> {
    props.iter().map(|p| p.relationship.as_str()).collect()
}

// ============================================================================
// 1. Header, property order, xrefs, sitelinks, gallery
// ============================================================================

#[test]
fn test_item_document_layout() {
    let browser = common::browser();
    let doc = browser.get_item(&request("Q42")).unwrap();

    assert_eq!(doc.node, "Q42");
    assert_eq!(doc.text, "Douglas Adams");
    assert_eq!(doc.description, "English writer and humorist");

    // P31 is seeded first; the rest follow by relationship label.
    assert_eq!(relationships(&doc.properties), vec!["P31", "P569", "P69", "P18", "P800"]);
    assert_eq!(doc.properties[0].property, "instance of");
    assert_eq!(doc.properties[0].kind, ValueKind::Item);
    assert_eq!(doc.properties[0].values[0].value.node_ref(), Some("Q5"));
    assert_eq!(doc.properties[0].values[0].value.text(), "human");

    assert_eq!(doc.properties[1].kind, ValueKind::Time);
    assert_eq!(doc.properties[1].values[0].value.text(), "1952-03-11");

    assert_eq!(relationships(&doc.xrefs), vec!["P214"]);
    assert_eq!(doc.xrefs[0].kind, ValueKind::ExternalId);
    assert_eq!(doc.xrefs[0].values[0].value.text(), "113230702");

    assert_eq!(doc.sitelinks.len(), 1);
    assert_eq!(
        doc.sitelinks[0].url.as_deref(),
        Some("https://en.wikipedia.org/wiki/Douglas_Adams")
    );

    assert_eq!(doc.gallery.len(), 1);
    assert_eq!(
        doc.gallery[0].url,
        "https://upload.wikimedia.org/wikipedia/commons/thumb/c/c0/Douglas_adams_portrait_cropped.jpg/300px-Douglas_adams_portrait_cropped.jpg"
    );
    assert_eq!(doc.gallery[0].text, "Douglas Adams");
}

// ============================================================================
// 2. Qualifiers nest under their value, priority relationships first
// ============================================================================

#[test]
fn test_qualifiers_nested_in_priority_order() {
    let browser = common::browser();
    let doc = browser.get_item(&request("Q42")).unwrap();

    let educated = &doc.properties[2];
    assert_eq!(educated.property, "educated at");
    let targets: Vec<&str> = educated.values.iter().map(|v| v.value.text()).collect();
    assert_eq!(targets, vec!["Brentwood School", "Saint Johns College"]);

    assert!(educated.values[0].qualifiers.is_empty());
    let quals = &educated.values[1].qualifiers;
    assert_eq!(relationships(quals), vec!["P580", "P582", "P512"]);
    assert_eq!(quals[0].property, "start time");
    assert_eq!(quals[0].values[0].value.text(), "1971");
    assert_eq!(quals[1].values[0].value.text(), "1974");
    assert_eq!(quals[2].values[0].value.text(), "Bachelor of Arts");
}

#[test]
fn test_wire_form() {
    let browser = common::browser();
    let doc = browser.get_item(&request("Q42")).unwrap();
    let value = serde_json::to_value(doc.as_ref()).unwrap();

    assert_eq!(value["ref"], json!("Q42"));
    assert_eq!(value["properties"][0]["ref"], json!("P31"));
    assert_eq!(value["properties"][0]["type"], json!("/w/item"));
    assert_eq!(value["properties"][0]["values"][0]["ref"], json!("Q5"));
    assert!(value["properties"][0]["values"][0].get("qualifiers").is_none());
    assert_eq!(
        value["properties"][2]["values"][1]["qualifiers"][0]["ref"],
        json!("P580")
    );
}

// ============================================================================
// 3. Limits, caching, unknown items, language
// ============================================================================

#[test]
fn test_valuelist_cap() {
    let browser = common::browser();
    let req = ItemRequest {
        limits: ItemLimits { valuelist_max_len: 1, ..ItemLimits::default() },
        ..request("Q42")
    };
    let doc = browser.get_item(&req).unwrap();
    assert!(doc.properties.iter().all(|p| p.values.len() == 1));
}

#[test]
fn test_proplist_cap() {
    let browser = common::browser();
    let req = ItemRequest {
        limits: ItemLimits { proplist_max_len: 2, ..ItemLimits::default() },
        ..request("Q42")
    };
    let doc = browser.get_item(&req).unwrap();
    assert_eq!(doc.properties.len(), 2);
    // Survivors keep their relative order.
    let all = ["P31", "P569", "P69", "P18", "P800"];
    let kept = relationships(&doc.properties);
    let positions: Vec<usize> =
        kept.iter().map(|r| all.iter().position(|a| a == r).unwrap()).collect();
    assert!(positions[0] < positions[1]);
}

#[test]
fn test_repeat_request_is_cached() {
    let browser = common::browser();
    let a = browser.get_item(&request("Q42")).unwrap();
    let b = browser.get_item(&request("Q42")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(browser.caches().items.len(), 1);

    let c = browser
        .get_item(&ItemRequest {
            limits: ItemLimits { valuelist_max_len: 5, ..ItemLimits::default() },
            ..request("Q42")
        })
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_unknown_item_is_empty_document() {
    let browser = common::browser();
    let doc = browser.get_item(&request("Q999")).unwrap();
    assert_eq!(doc.text, "Q999");
    assert_eq!(doc.description, "Q999");
    assert!(doc.properties.is_empty());
    assert!(doc.xrefs.is_empty());
    assert!(doc.gallery.is_empty());
}

#[test]
fn test_other_language_falls_back_to_ids() {
    let browser = common::browser();
    let doc = browser
        .get_item(&ItemRequest { lang: "fr".into(), ..request("Q42") })
        .unwrap();
    assert_eq!(doc.text, "Douglas Adams");
    assert_eq!(doc.description, "Q42");
    assert_eq!(doc.properties[0].property, "P31");
}

// ============================================================================
// 4. Related items
// ============================================================================

#[test]
fn test_related_items() {
    let browser = common::browser();
    let doc = browser.get_related_items(&request("Q42")).unwrap();
    assert_eq!(doc.text, "Douglas Adams");
    assert_eq!(relationships(&doc.properties), vec!["P50"]);
    assert_eq!(doc.properties[0].property, "author");
    let v = &doc.properties[0].values[0];
    assert_eq!(v.value.node_ref(), Some("Q25338"));
    assert_eq!(v.value.text(), "The Hitchhikers Guide to the Galaxy");
    assert!(v.qualifiers.is_empty());
    assert!(doc.sitelinks.is_empty());
    assert!(doc.gallery.is_empty());

    // Cached separately from the item document.
    browser.get_item(&request("Q42")).unwrap();
    assert_eq!(browser.caches().items.len(), 2);
}

// ============================================================================
// 5. Subproperty priorities
// ============================================================================

#[test]
fn test_subproperties_follow_their_anchor() {
    let engine = MemoryEngine::new();
    engine
        .insert_edges(
            GraphTable::Edges,
            &[
                Edge::new("e1", "Q1", "P27", "Q30"),
                Edge::new("e2", "Q1", "P1327", "Q2"),
                Edge::new("e3", "Q1", "P1038", "Q3"),
                Edge::new("e4", "Q1", "P31", "Q5"),
                Edge::new("sp1", "P1327", "P1647", "P1038"),
            ],
        )
        .unwrap();
    engine
        .insert_edges(
            GraphTable::Labels,
            &[
                Edge::new("l1", "P27", "label", "'country of citizenship'@en"),
                Edge::new("l2", "P1327", "label", "'partner in business'@en"),
                Edge::new("l3", "P1038", "label", "'relative'@en"),
            ],
        )
        .unwrap();
    let browser = Browser::new(engine, BrowserConfig::default()).unwrap();
    let doc = browser.get_item(&request("Q1")).unwrap();
    assert_eq!(relationships(&doc.properties), vec!["P31", "P1038", "P1327", "P27"]);
}

// ============================================================================
// 6. Sort metadata
// ============================================================================

fn population_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine
        .insert_edges(
            GraphTable::Edges,
            &[
                Edge::new("pop1", "Q30", "P1082", "300"),
                Edge::new("pop2", "Q30", "P1082", "330"),
                Edge::new("pop3", "Q30", "P1082", "280"),
            ],
        )
        .unwrap();
    engine
        .insert_edges(
            GraphTable::Qualifiers,
            &[
                Edge::new("pop1-t", "pop1", "P585", "^1990-00-00T00:00:00Z/9"),
                Edge::new("pop2-t", "pop2", "P585", "^2020-00-00T00:00:00Z/9"),
                Edge::new("pop3-t", "pop3", "P585", "^1980-00-00T00:00:00Z/9"),
            ],
        )
        .unwrap();
    engine
}

fn population_texts(browser: &Browser<MemoryEngine>) -> Vec<String> {
    let doc = browser.get_item(&request("Q30")).unwrap();
    doc.properties[0].values.iter().map(|v| v.value.text().to_string()).collect()
}

#[test]
fn test_values_default_to_target_order() {
    let browser = Browser::new(population_engine(), BrowserConfig::default()).unwrap();
    assert_eq!(population_texts(&browser), vec!["280", "300", "330"]);
}

#[test]
fn test_sort_metadata_orders_by_qualifier() {
    let settings = AssemblySettings {
        qualifier_priority: QualifierPriority::new(&default_qualifier_order()),
        qualifier_fetch: QualifierFetch::default(),
        sitelinks: Vec::new(),
        sort_metadata: Some(
            SortMetadata::from_json(
                r#"{"ajax_properties": {"P1082": {"qualifier": "P585", "qualifier_datatype": "time"}}}"#,
            )
            .unwrap(),
        ),
    };
    let browser = Browser::with_settings(population_engine(), BrowserConfig::default(), settings);
    // Newest first: time qualifiers default to descending.
    assert_eq!(population_texts(&browser), vec!["330", "300", "280"]);
}
