//! DOM source range computation.
//!
//! A bottom-up walk that assigns `[contentStart, contentEnd, openWidth,
//! closeWidth]` to every node from the token source ranges the tree
//! builder preserved. A cursor tracks the running offset through each
//! child list; template-generated content (between transclusion markers)
//! invalidates the cursor, and unknown offsets stay `null` so downstream
//! passes never extrapolate past them.

use super::migrate::is_marker_meta;
use crate::{
    dom::{Document, Dsr, NodeId, NodeKind},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Element names whose recorded source range covers the entire construct,
/// with generated children that never map back to the source.
fn is_source_atomic(doc: &Document, node: NodeId) -> bool {
    let Some(name) = doc.node_name(node) else {
        return false;
    };
    matches!(name, "a" | "figure" | "meta" | "link" | "hr" | "img" | "br")
        || doc
            .attr(node, "typeof")
            .is_some_and(|t| t.starts_with("mw:"))
}

/// Computes DSR for the whole document. Top level only; sub-pipelines
/// inherit whatever their content carries.
pub(crate) fn compute_dsr(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };
    let len = env.page.source.len();
    doc.dp_mut(body).dsr = Some(Dsr::new(0, len, 0, 0));
    walk_children(doc, body, Some(0), len);
    Ok(())
}

/// Walks one child list with a running cursor, returning nothing; each
/// child’s DSR lands on the child. `limit` caps offsets at the source
/// length so invariants hold even on inconsistent input.
fn walk_children(doc: &mut Document, node: NodeId, cursor: Option<usize>, limit: usize) {
    let mut cursor = cursor;
    let mut in_template: Option<String> = None;

    for child in doc.children(node) {
        // Template output occupies no top-level source of its own; the
        // cursor goes dark between the markers and the end marker restores
        // it.
        if let Some(about) = in_template.clone() {
            let end = walk_node(doc, child, None, limit);
            if is_marker_meta(doc, child, true)
                && doc.attr(child, "about") == Some(about.as_str())
            {
                in_template = None;
                cursor = end;
            }
            continue;
        }

        if is_marker_meta(doc, child, false) {
            let end = walk_node(doc, child, cursor, limit);
            in_template = doc.attr(child, "about").map(str::to_string);
            // The start marker’s range covers the whole transclusion, so
            // the cursor resumes after it once the end marker is seen.
            cursor = end;
            continue;
        }

        cursor = walk_node(doc, child, cursor, limit);
    }
}

/// Computes the DSR of one node. Returns the offset just past the node
/// when known, which becomes the cursor for the following sibling.
fn walk_node(doc: &mut Document, node: NodeId, cursor: Option<usize>, limit: usize) -> Option<usize> {
    match doc.kind(node) {
        NodeKind::Text(text) => {
            let len = text.len();
            if let Some(start) = cursor
                && start + len <= limit
            {
                doc.dp_mut(node).dsr = Some(Dsr {
                    start: Some(start),
                    end: Some(start + len),
                    open_width: None,
                    close_width: None,
                });
                Some(start + len)
            } else {
                None
            }
        }
        NodeKind::Comment(text) => {
            let len = text.len() + "<!--".len() + "-->".len();
            if let Some(start) = cursor
                && start + len <= limit
            {
                doc.dp_mut(node).dsr = Some(Dsr {
                    start: Some(start),
                    end: Some(start + len),
                    open_width: None,
                    close_width: None,
                });
                Some(start + len)
            } else {
                None
            }
        }
        NodeKind::Element(_) => walk_element(doc, node, cursor, limit),
        NodeKind::Document => None,
    }
}

/// Computes the DSR of one element and its subtree.
fn walk_element(
    doc: &mut Document,
    node: NodeId,
    cursor: Option<usize>,
    limit: usize,
) -> Option<usize> {
    let tsr = doc.dp(node).tsr;
    let end_tsr = doc.dp(node).tmp.end_tsr;

    if let Some(tsr) = tsr
        && is_source_atomic(doc, node)
    {
        // The range covers the whole construct; children are generated.
        walk_children(doc, node, None, limit);
        if tsr.end <= limit {
            doc.dp_mut(node).dsr = Some(Dsr {
                start: Some(tsr.start),
                end: Some(tsr.end),
                open_width: None,
                close_width: None,
            });
            return Some(tsr.end);
        }
        return None;
    }

    let start = tsr.map(|t| t.start).or(cursor);
    let open_width = tsr.map(|t| t.len());
    let content_start = tsr.map(|t| t.end).or(cursor);

    walk_children(doc, node, content_start, limit);

    let content_end = doc
        .last_child(node)
        .and_then(|last| doc.dp(last).dsr)
        .and_then(|dsr| dsr.end)
        .or(content_start.filter(|_| doc.first_child(node).is_none()));

    let (end, close_width) = if let Some(end_tsr) = end_tsr {
        (Some(end_tsr.end), Some(end_tsr.len()))
    } else {
        (content_end, content_end.map(|_| 0))
    };

    let valid = match (start, end) {
        (Some(s), Some(e)) => s <= e && e <= limit,
        _ => true,
    };
    if !valid {
        log::trace!(target: "trace/dsr", "inconsistent offsets, leaving DSR unknown");
        return None;
    }

    if start.is_some() || end.is_some() {
        doc.dp_mut(node).dsr = Some(Dsr {
            start,
            end,
            open_width,
            close_width,
        });
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
        pipeline::PipelineOpts,
        tokens::Tsr,
    };

    fn env_for<'a>(conf: &'a SiteConfig, source: &str) -> Env<'a> {
        Env::new(
            conf,
            &NullDataAccess,
            PageConfig {
                source: source.to_string(),
                ..PageConfig::default()
            },
            EnvOptions::default(),
        )
    }

    #[test]
    fn heading_offsets() {
        // Simulates the tree for "=Test 1 2 3=".
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        let h = doc.create_element("h1");
        doc.dp_mut(h).tsr = Some(Tsr::new(0, 1));
        doc.dp_mut(h).tmp.end_tsr = Some(Tsr::new(11, 12));
        doc.append(body, h);
        let t = doc.create_text("Test 1 2 3");
        doc.append(h, t);

        let conf = SiteConfig::wmf();
        let env = env_for(&conf, "=Test 1 2 3=");
        compute_dsr(&mut doc, &env, &PipelineOpts::default(), true).unwrap();

        assert_eq!(doc.dp(h).dsr, Some(Dsr::new(0, 12, 1, 1)));
        assert_eq!(
            doc.dp(t).dsr,
            Some(Dsr {
                start: Some(1),
                end: Some(11),
                open_width: None,
                close_width: None,
            })
        );
    }

    #[test]
    fn template_content_stays_unknown() {
        // Simulates "{{echo|foo}}": marker, generated p, end marker.
        let source = "{{echo|foo}}";
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);

        let start = doc.create_element("meta");
        doc.set_attr(start, "typeof", "mw:Transclusion");
        doc.set_attr(start, "about", "#mwt1");
        doc.dp_mut(start).tsr = Some(Tsr::new(0, 12));
        doc.append(body, start);

        let p = doc.create_element("p");
        doc.append(body, p);
        let t = doc.create_text("foo");
        doc.append(p, t);

        let end = doc.create_element("meta");
        doc.set_attr(end, "typeof", "mw:Transclusion/End");
        doc.set_attr(end, "about", "#mwt1");
        doc.dp_mut(end).tsr = Some(Tsr::new(12, 12));
        doc.append(body, end);

        let conf = SiteConfig::wmf();
        let env = env_for(&conf, source);
        compute_dsr(&mut doc, &env, &PipelineOpts::default(), true).unwrap();

        // The markers know their range; the generated content does not.
        assert_eq!(doc.dp(start).dsr.and_then(|d| d.start), Some(0));
        assert_eq!(doc.dp(start).dsr.and_then(|d| d.end), Some(12));
        assert_eq!(doc.dp(p).dsr, None);
        assert_eq!(doc.dp(end).dsr.and_then(|d| d.end), Some(12));
    }
}
