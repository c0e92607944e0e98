//! Heading anchor generation and id deduplication.

use crate::{
    common::{anchor_encode, anchor_encode_legacy},
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// The heading element names.
const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// True for `h1`–`h6`.
fn is_heading(doc: &Document, node: NodeId) -> bool {
    doc.element(node)
        .is_some_and(|e| HEADINGS.contains(&e.name.as_str()))
}

/// Collects headings in document order.
pub(crate) fn collect_headings(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if is_heading(doc, node) {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_headings(doc, child, out);
    }
}

/// Assigns anchor ids to headings. Non-ASCII headings also get a fallback
/// span carrying the legacy escaped id.
pub(crate) fn generate_anchors(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut headings = vec![];
    collect_headings(doc, body, &mut headings);

    for heading in headings {
        if doc.attr(heading, "id").is_some() {
            continue;
        }
        let text = doc.text_content(heading);
        let id = anchor_encode(&text);
        if id.is_empty() {
            continue;
        }
        let legacy = anchor_encode_legacy(&text);
        doc.set_attr(heading, "id", id.clone());

        if legacy != id {
            let span = doc.create_element("span");
            doc.set_attr(span, "typeof", "mw:FallbackId");
            doc.set_attr(span, "id", legacy);
            if let Some(first) = doc.first_child(heading) {
                doc.insert_before(first, span);
            } else {
                doc.append(heading, span);
            }
        }
    }
    Ok(())
}

/// Deduplicates heading ids document-wide: a second occurrence of a base id
/// becomes `id_2`, a third `id_3`, and so on.
pub(crate) fn dedupe_heading_ids(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut headings = vec![];
    collect_headings(doc, body, &mut headings);

    let mut seen = env.seen_ids.borrow_mut();
    for heading in headings {
        let Some(id) = doc.attr(heading, "id").map(str::to_string) else {
            continue;
        };
        if seen.insert(id.clone()) {
            continue;
        }
        let mut suffix = 2;
        let unique = loop {
            let candidate = format!("{id}_{suffix}");
            if seen.insert(candidate.clone()) {
                break candidate;
            }
            suffix += 1;
        };
        doc.set_attr(heading, "id", unique);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
        pipeline::PipelineOpts,
    };

    fn fixture() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        (doc, body)
    }

    #[test]
    fn ascii_heading_has_no_fallback() {
        let (mut doc, body) = fixture();
        let h = doc.create_element("h1");
        let t = doc.create_text("Test 1 2 3");
        doc.append(body, h);
        doc.append(h, t);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        generate_anchors(&mut doc, &env, &PipelineOpts::default(), true).unwrap();
        assert_eq!(doc.attr(h, "id"), Some("Test_1_2_3"));
        assert!(doc.children(h).iter().all(|&c| !doc.is_element_named(c, "span")));
    }

    #[test]
    fn non_ascii_heading_gets_fallback_span() {
        let (mut doc, body) = fixture();
        let h = doc.create_element("h1");
        let t = doc.create_text("Références");
        doc.append(body, h);
        doc.append(h, t);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        generate_anchors(&mut doc, &env, &PipelineOpts::default(), true).unwrap();
        assert_eq!(doc.attr(h, "id"), Some("Références"));
        let span = doc.first_child(h).unwrap();
        assert!(doc.has_typeof(span, "mw:FallbackId"));
        assert_eq!(doc.attr(span, "id"), Some("R.C3.A9f.C3.A9rences"));
    }

    #[test]
    fn duplicate_ids_get_suffixes() {
        let (mut doc, body) = fixture();
        for _ in 0..3 {
            let h = doc.create_element("h1");
            let t = doc.create_text("a");
            doc.append(body, h);
            doc.append(h, t);
        }

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        generate_anchors(&mut doc, &env, &PipelineOpts::default(), true).unwrap();
        dedupe_heading_ids(&mut doc, &env, &PipelineOpts::default(), true).unwrap();

        let mut headings = vec![];
        collect_headings(&doc, body, &mut headings);
        let ids: Vec<_> = headings
            .iter()
            .filter_map(|&h| doc.attr(h, "id"))
            .collect();
        assert_eq!(ids, vec!["a", "a_2", "a_3"]);
    }
}
