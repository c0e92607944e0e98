//! Marker-meta migration, indent-pre normalization, and trailing-newline
//! migration.

use crate::{
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};
use regex::Regex;
use std::sync::LazyLock;

/// Matches transclusion marker typeof values, start or end.
static MARKER_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^mw:(Transclusion|Param)(/\S+)?$").unwrap());

/// True if the node is a transclusion marker meta; `end` selects which
/// kind.
pub(crate) fn is_marker_meta(doc: &Document, node: NodeId, end: bool) -> bool {
    doc.is_element_named(node, "meta")
        && doc.attr(node, "typeof").is_some_and(|t| {
            MARKER_TYPE.is_match(t) && t.ends_with("/End") == end
        })
}

/// Moves marker metas that landed as the first or last child of an element
/// out of it, so they do not confuse first/last-child reasoning later.
/// A start marker that is a first child climbs before its parent; an end
/// marker that is a last child climbs after it.
pub(crate) fn migrate_template_marker_metas(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut metas = vec![];
    collect_markers(doc, body, &mut metas);

    for meta in metas {
        let end = is_marker_meta(doc, meta, true);
        loop {
            let Some(parent) = doc.parent(meta) else {
                break;
            };
            if parent == body {
                break;
            }
            if !end && doc.first_child(parent) == Some(meta) {
                doc.insert_before(parent, meta);
            } else if end && doc.last_child(parent) == Some(meta) {
                doc.insert_after(parent, meta);
            } else {
                break;
            }
        }
    }
    Ok(())
}

/// Collects transclusion marker metas in document order.
fn collect_markers(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if is_marker_meta(doc, node, false) || is_marker_meta(doc, node, true) {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_markers(doc, child, out);
    }
}

/// Strips the customary newline right after a `<pre>` open.
pub(crate) fn normalize_pres(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut pres = vec![];
    collect_named(doc, body, "pre", &mut pres);
    for pre in pres {
        if let Some(first) = doc.first_child(pre)
            && let Some(text) = doc.text(first)
            && let Some(stripped) = text.strip_prefix('\n')
        {
            let stripped = stripped.to_string();
            if stripped.is_empty() {
                doc.detach(first);
            } else {
                doc.set_text(first, stripped);
            }
        }
    }
    Ok(())
}

/// Collects elements with the given name in document order.
fn collect_named(doc: &Document, node: NodeId, name: &str, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, name) {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_named(doc, child, name, out);
    }
}

/// Moves trailing newline text at the end of a block element out to after
/// it, where the serializer expects separator whitespace to live.
pub(crate) fn migrate_trailing_newlines(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };
    migrate_in(doc, body, body);
    Ok(())
}

/// Bottom-up migration of trailing newlines within one subtree.
fn migrate_in(doc: &mut Document, node: NodeId, body: NodeId) {
    for child in doc.children(node) {
        migrate_in(doc, child, body);
    }

    if node == body || !doc.is_element(node) || doc.is_element_named(node, "pre") {
        return;
    }

    if let Some(last) = doc.last_child(node)
        && let Some(text) = doc.text(last)
        && text.ends_with('\n')
    {
        let trimmed = text.trim_end_matches('\n').to_string();
        let newlines = text[trimmed.len()..].to_string();
        if trimmed.is_empty() {
            doc.detach(last);
            doc.insert_after(node, last);
        } else {
            doc.set_text(last, trimmed);
            let moved = doc.create_text(newlines);
            doc.insert_after(node, moved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        dom::serialize::inner_html,
        env::{EnvOptions, NullDataAccess, PageConfig},
    };

    fn env_fixture(conf: &SiteConfig) -> Env<'_> {
        Env::new(
            conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        )
    }

    #[test]
    fn end_marker_climbs_out() {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        let p = doc.create_element("p");
        doc.append(body, p);
        let t = doc.create_text("x");
        doc.append(p, t);
        let meta = doc.create_element("meta");
        doc.set_attr(meta, "typeof", "mw:Transclusion/End");
        doc.append(p, meta);

        let conf = SiteConfig::wmf();
        let env = env_fixture(&conf);
        migrate_template_marker_metas(
            &mut doc,
            &env,
            &crate::pipeline::PipelineOpts::default(),
            true,
        )
        .unwrap();
        assert_eq!(
            inner_html(&doc, body),
            "<p>x</p><meta typeof=\"mw:Transclusion/End\">"
        );
    }

    #[test]
    fn trailing_newline_moves_out() {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        let p = doc.create_element("p");
        doc.append(body, p);
        let t = doc.create_text("x\n");
        doc.append(p, t);

        let conf = SiteConfig::wmf();
        let env = env_fixture(&conf);
        migrate_trailing_newlines(
            &mut doc,
            &env,
            &crate::pipeline::PipelineOpts::default(),
            true,
        )
        .unwrap();
        assert_eq!(inner_html(&doc, body), "<p>x</p>\n");
    }
}
