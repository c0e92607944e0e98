//! Paragraph fix-ups: stray inline content that reached the body without a
//! paragraph (mostly via fostering or fragment splicing) gets wrapped.

use crate::{
    dom::{Document, NodeId, NodeKind},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Element names that terminate an inline run.
fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "table" | "ul" | "ol" | "dl" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "pre"
            | "blockquote" | "div" | "hr" | "center" | "figure" | "section"
    )
}

/// True for nodes that neither join nor break an inline run.
fn is_transparent(doc: &Document, node: NodeId) -> bool {
    match doc.kind(node) {
        NodeKind::Comment(_) => true,
        NodeKind::Text(t) => t.trim().is_empty(),
        NodeKind::Element(e) => matches!(e.name.as_str(), "meta" | "link"),
        NodeKind::Document => true,
    }
}

/// Wraps runs of bare inline children of `<body>` in `<p>`.
pub(crate) fn wrap_stray_inline(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut run: Vec<NodeId> = vec![];
    for child in doc.children(body) {
        let breaks = match doc.kind(child) {
            NodeKind::Element(e) => is_block(&e.name),
            _ => false,
        };

        if breaks {
            wrap_run(doc, &mut run);
        } else if !is_transparent(doc, child) {
            run.push(child);
        } else if run.is_empty() {
            // Transparent nodes before a run stay put; inside a run they
            // ride along so the paragraph stays contiguous.
        } else {
            run.push(child);
        }
    }
    wrap_run(doc, &mut run);
    Ok(())
}

/// Wraps one collected run, dropping trailing transparent nodes back out.
fn wrap_run(doc: &mut Document, run: &mut Vec<NodeId>) {
    while let Some(&last) = run.last() {
        if is_transparent(doc, last) {
            run.pop();
        } else {
            break;
        }
    }
    if run.is_empty() {
        return;
    }

    let p = doc.create_element("p");
    doc.insert_before(run[0], p);
    for node in run.drain(..) {
        doc.append(p, node);
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

    #[test]
    fn wraps_bare_text() {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        let t = doc.create_text("stray");
        doc.append(body, t);
        let table = doc.create_element("table");
        doc.append(body, table);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        wrap_stray_inline(&mut doc, &env, &crate::pipeline::PipelineOpts::default(), true)
            .unwrap();
        assert_eq!(inner_html(&doc, body), "<p>stray</p><table></table>");
    }
}
