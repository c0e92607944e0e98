//! End-to-end wikitext-to-HTML scenarios over the full pipeline, driven
//! with an in-memory data-access collaborator.

use crate::{
    config::SiteConfig,
    dom::{Document, NodeId},
    env::{DataAccess, Env, EnvOptions, PageConfig},
    pipeline::{self, Result},
};
use std::collections::HashMap;

/// An in-memory template store.
struct MapDataAccess {
    /// Template sources by title.
    templates: HashMap<String, String>,
}

impl MapDataAccess {
    /// Creates a store from `(title, source)` pairs.
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            templates: entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl DataAccess for MapDataAccess {
    fn template_source(&self, title: &str) -> Result<Option<String>> {
        Ok(self.templates.get(title).cloned())
    }
}

/// Runs the full pipeline with the standard `echo` template registered.
fn parse(source: &str) -> Document {
    let _ = env_logger::try_init();
    let conf = SiteConfig::wmf();
    let data = MapDataAccess::new(&[("Template:Echo", "{{{1}}}")]);
    let env = Env::new(
        &conf,
        &data,
        PageConfig {
            title: "Test Page".to_string(),
            source: source.to_string(),
            ..PageConfig::default()
        },
        EnvOptions::default(),
    );
    pipeline::parse_document(&env).expect("pipeline should succeed")
}

/// Collects every node matching a predicate, in document order.
fn find_all(doc: &Document, pred: &dyn Fn(&Document, NodeId) -> bool) -> Vec<NodeId> {
    fn walk(
        doc: &Document,
        node: NodeId,
        pred: &dyn Fn(&Document, NodeId) -> bool,
        out: &mut Vec<NodeId>,
    ) {
        if pred(doc, node) {
            out.push(node);
        }
        for child in doc.children(node) {
            walk(doc, child, pred, out);
        }
    }
    let mut out = vec![];
    walk(doc, doc.root(), pred, &mut out);
    out
}

/// Elements carrying a transclusion or parameter `typeof`.
fn wrappers(doc: &Document) -> Vec<NodeId> {
    find_all(doc, &|doc, n| {
        !doc.is_element_named(n, "meta")
            && (doc.has_typeof(n, "mw:Transclusion") || doc.has_typeof(n, "mw:Param"))
    })
}

/// Marker metas that survived the pipeline. Must always be empty.
fn marker_metas(doc: &Document) -> Vec<NodeId> {
    find_all(doc, &|doc, n| {
        doc.is_element_named(n, "meta")
            && doc.attr(n, "typeof").is_some_and(|t| {
                t.starts_with("mw:Transclusion") || t.starts_with("mw:Param")
            })
    })
}

/// The parsed `data-mw` of a node.
fn data_mw(doc: &Document, node: NodeId) -> serde_json::Value {
    serde_json::from_str(doc.attr(node, "data-mw").expect("data-mw attribute")).unwrap()
}

#[test]
fn scenario_1_plain_heading() {
    let doc = parse("=Test 1 2 3=");
    let headings = find_all(&doc, &|doc, n| doc.is_element_named(n, "h1"));
    assert_eq!(headings.len(), 1);
    let h = headings[0];
    assert_eq!(doc.attr(h, "id"), Some("Test_1_2_3"));
    let fallbacks = find_all(&doc, &|doc, n| doc.has_typeof(n, "mw:FallbackId"));
    assert!(fallbacks.is_empty());
}

#[test]
fn scenario_2_non_ascii_heading_fallback() {
    let doc = parse("=Références=");
    let headings = find_all(&doc, &|doc, n| doc.is_element_named(n, "h1"));
    assert_eq!(headings.len(), 1);
    let h = headings[0];
    assert_eq!(doc.attr(h, "id"), Some("Références"));

    let span = doc
        .children(h)
        .into_iter()
        .find(|&c| doc.has_typeof(c, "mw:FallbackId"))
        .expect("fallback span");
    assert_eq!(doc.attr(span, "id"), Some("R.C3.A9f.C3.A9rences"));
}

#[test]
fn scenario_3_duplicate_headings() {
    let doc = parse("=a=\n=a=");
    let headings = find_all(&doc, &|doc, n| doc.is_element_named(n, "h1"));
    assert_eq!(headings.len(), 2);
    assert_eq!(doc.attr(headings[0], "id"), Some("a"));
    assert_eq!(doc.attr(headings[1], "id"), Some("a_2"));
}

#[test]
fn scenario_4_simple_transclusion() {
    let doc = parse("{{echo|foo}}");

    let wrappers = wrappers(&doc);
    assert_eq!(wrappers.len(), 1, "exactly one wrapper");
    let wrapper = wrappers[0];
    assert!(doc.has_typeof(wrapper, "mw:Transclusion"));
    assert_eq!(doc.attr(wrapper, "about"), Some("#mwt1"));
    assert_eq!(doc.text_content(wrapper), "foo");

    let mw = data_mw(&doc, wrapper);
    let parts = mw["parts"].as_array().expect("parts array");
    assert_eq!(parts.len(), 1);
    let template = &parts[0]["template"];
    assert_eq!(template["target"]["wt"], "echo");
    assert_eq!(template["params"]["1"]["wt"], "foo");

    assert!(marker_metas(&doc).is_empty());
}

#[test]
fn scenario_5_transclusion_inside_table() {
    let source = "{|\n{{echo|foo}}\n|}";
    let doc = parse(source);

    let wrappers = wrappers(&doc);
    assert_eq!(wrappers.len(), 1, "exactly one wrapper");
    let wrapper = wrappers[0];
    assert_eq!(doc.attr(wrapper, "about"), Some("#mwt1"));
    assert!(marker_metas(&doc).is_empty());

    // The range DSR anchors at the transclusion's source position. The
    // fostered single-part range zero-widths its end.
    let dsr = doc.dp(wrapper).dsr.expect("wrapper DSR");
    assert_eq!(dsr.start, Some(3));

    // A table still exists and foo still renders.
    assert_eq!(
        find_all(&doc, &|doc, n| doc.is_element_named(n, "table")).len(),
        1
    );
    assert_eq!(doc.text_content(wrapper), "foo");
}

#[test]
fn scenario_6_two_transclusions_one_fostering() {
    let doc = parse("{{echo|<table>}}{{echo|<div>}}");

    // The ranges stay disjoint here: the second transclusion's content is
    // fostered ahead of the first one's table, so each keeps its own
    // wrapper and about-id.
    let wrappers = wrappers(&doc);
    assert_eq!(wrappers.len(), 2, "two distinct wrappers");
    assert_eq!(doc.attr(wrappers[0], "about"), Some("#mwt1"));
    assert_eq!(doc.attr(wrappers[1], "about"), Some("#mwt2"));
    assert!(marker_metas(&doc).is_empty());
}

#[test]
fn nested_transclusions_fold_into_one_wrapper() {
    let _ = env_logger::try_init();
    let conf = SiteConfig::wmf();
    let data = MapDataAccess::new(&[
        ("Template:Echo", "{{{1}}}"),
        ("Template:Outer", "a{{echo|b}}c"),
    ]);
    let env = Env::new(
        &conf,
        &data,
        PageConfig {
            title: "Test Page".to_string(),
            source: "{{outer}}".to_string(),
            ..PageConfig::default()
        },
        EnvOptions::default(),
    );
    let doc = pipeline::parse_document(&env).unwrap();

    let wrappers = wrappers(&doc);
    assert_eq!(wrappers.len(), 1, "no separate wrapper for the nested call");
    let mw = data_mw(&doc, wrappers[0]);
    let parts = mw["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2, "outer and nested argument descriptions");
    assert_eq!(parts[0]["template"]["target"]["wt"], "outer");
    assert_eq!(parts[1]["template"]["target"]["wt"], "echo");
    assert_eq!(doc.text_content(wrappers[0]), "abc");
    assert!(marker_metas(&doc).is_empty());
}

#[test]
fn body_classes_and_rdfa_prefixes() {
    let doc = parse("hello");

    let html = doc
        .children(doc.root())
        .into_iter()
        .find(|&n| doc.is_element_named(n, "html"))
        .unwrap();
    let prefix = doc.attr(html, "prefix").unwrap();
    assert!(prefix.contains("dc:"));
    assert!(prefix.contains("mw:"));

    let body = doc.body().unwrap();
    let classes = doc.attr(body, "class").unwrap();
    for class in ["mediawiki", "mw-parser-output", "mw-body-content"] {
        assert!(classes.split_whitespace().any(|c| c == class), "{class}");
    }
}

#[test]
fn dsr_respects_source_bounds() {
    let source = "=Test 1 2 3=\n\nsome ''styled'' text\n";
    let doc = parse(source);
    let all = find_all(&doc, &|doc, n| doc.dp(n).dsr.is_some());
    for node in all {
        let dsr = doc.dp(node).dsr.unwrap();
        if let (Some(start), Some(end)) = (dsr.start, dsr.end) {
            assert!(start <= end, "dsr start past end");
            assert!(end <= source.len(), "dsr past source end");
        }
    }
}

#[test]
fn page_bundle_has_no_dangling_ids() {
    let doc = parse("{{echo|foo}} and =x=\n");
    let bundle = doc.bundle.as_ref().expect("bundle");
    assert!(!bundle.parsoid.is_empty());

    let id_set: std::collections::HashSet<String> =
        find_all(&doc, &|doc, n| doc.attr(n, "id").is_some())
            .into_iter()
            .filter_map(|n| doc.attr(n, "id").map(str::to_string))
            .collect();
    for key in bundle.parsoid.keys().chain(bundle.mw.keys()) {
        assert!(id_set.contains(key), "dangling id {key}");
    }
}

#[test]
fn missing_template_renders_a_link() {
    let doc = parse("{{nosuch}}");
    let links = find_all(&doc, &|doc, n| {
        doc.is_element_named(n, "a")
            && doc.attr(n, "href") == Some("./Template:Nosuch")
    });
    assert_eq!(links.len(), 1);
}

#[test]
fn unexpanded_parameter_wraps_as_param() {
    let doc = parse("{{{1}}}");
    let wrappers = find_all(&doc, &|doc, n| {
        !doc.is_element_named(n, "meta") && doc.has_typeof(n, "mw:Param")
    });
    assert_eq!(wrappers.len(), 1);
    assert_eq!(doc.text_content(wrappers[0]), "{{{1}}}");
    assert!(marker_metas(&doc).is_empty());
}
