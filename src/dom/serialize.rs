//! DOM to HTML serialization and `<head>` metadata finalization.

use super::{Document, NodeId, NodeKind};
use crate::{config::VOID_TAGS, env::Env};
use core::fmt::Write as _;

/// Serializes a full document, with doctype.
pub(crate) fn serialize_document(doc: &Document) -> String {
    let mut out = String::from("<!DOCTYPE html>\n");
    for child in doc.children(doc.root()) {
        serialize_node(doc, child, &mut out);
    }
    out
}

/// Serializes the children of `node` without its own tags.
pub(crate) fn inner_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(node) {
        serialize_node(doc, child, &mut out);
    }
    out
}

/// Serializes one node and its subtree.
fn serialize_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        NodeKind::Document => {
            for child in doc.children(node) {
                serialize_node(doc, child, out);
            }
        }
        NodeKind::Element(e) => {
            let _ = write!(out, "<{}", e.name);
            for (k, v) in &e.attrs {
                let _ = write!(
                    out,
                    " {k}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(v)
                );
            }
            out.push('>');
            if VOID_TAGS.contains(&e.name) {
                return;
            }
            for child in doc.children(node) {
                serialize_node(doc, child, out);
            }
            let _ = write!(out, "</{}>", e.name);
        }
        NodeKind::Text(t) => {
            out.push_str(&html_escape::encode_text(t));
        }
        NodeKind::Comment(t) => {
            let _ = write!(out, "<!--{t}-->");
        }
    }
}

/// Builds `<head>` from page metadata and stamps the RDFa prefixes,
/// language, direction, and content classes required of the output.
///
/// Runs once, after all top-level passes.
pub(crate) fn finalize_metadata(doc: &mut Document, env: &Env<'_>) {
    let Some(html) = doc
        .children(doc.root())
        .into_iter()
        .find(|&n| doc.is_element_named(n, "html"))
    else {
        return;
    };

    doc.set_attr(
        html,
        "prefix",
        "dc: http://purl.org/dc/terms/ mw: http://mediawiki.org/rdf/",
    );

    let head = doc.create_element("head");
    let first = doc.first_child(html);
    if let Some(first) = first {
        doc.insert_before(first, head);
    } else {
        doc.append(html, head);
    }
    let redirect_prefix = format!("mwr: {}Special:Redirect/", env.conf.base_uri);
    doc.set_attr(head, "prefix", redirect_prefix);

    let charset = doc.create_element("meta");
    doc.set_attr(charset, "charset", "utf-8");
    doc.append(head, charset);

    if env.has_switch("noindex") {
        let robots = doc.create_element("meta");
        doc.set_attr(robots, "name", "robots");
        doc.set_attr(robots, "content", "noindex");
        doc.append(head, robots);
    }

    if let Some(rev) = env.page.revision_id {
        let rev_meta = doc.create_element("meta");
        doc.set_attr(rev_meta, "property", "mw:revisionId");
        doc.set_attr(rev_meta, "content", rev.to_string());
        doc.append(head, rev_meta);
    }

    let title = doc.create_element("title");
    let title_text = doc.create_text(env.page.title.clone());
    doc.append(title, title_text);
    doc.append(head, title);

    let base = doc.create_element("base");
    doc.set_attr(base, "href", env.conf.base_uri.clone());
    doc.append(head, base);

    for module in env.conf.modules {
        let link = doc.create_element("link");
        doc.set_attr(link, "rel", "stylesheet");
        doc.set_attr(link, "href", format!("/w/load.php?modules={module}"));
        doc.append(head, link);
    }

    let dir = env.page.dir.unwrap_or(env.conf.dir).as_str();
    let lang = env
        .page
        .lang
        .clone()
        .unwrap_or_else(|| env.conf.lang.clone());
    if let Some(body) = doc.body() {
        doc.set_attr(body, "lang", lang);
        doc.set_attr(body, "dir", dir);
        doc.set_attr(
            body,
            "class",
            format!("mw-content-{dir} sitedir-{dir} {dir} mediawiki mw-body-content mw-parser-output"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        doc.set_attr(a, "href", "./A\"B");
        let t = doc.create_text("x < y & z");
        doc.append(root, a);
        doc.append(a, t);
        assert_eq!(
            inner_html(&doc, root),
            "<a href=\"./A&quot;B\">x &lt; y &amp; z</a>"
        );
    }

    #[test]
    fn void_tags_do_not_close() {
        let mut doc = Document::new();
        let root = doc.root();
        let meta = doc.create_element("meta");
        doc.set_attr(meta, "typeof", "mw:Transclusion");
        doc.append(root, meta);
        assert_eq!(inner_html(&doc, root), "<meta typeof=\"mw:Transclusion\">");
    }
}
