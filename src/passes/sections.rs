//! Section wrapping: the lead and each heading-introduced section get
//! `<section data-mw-section-id>` wrappers, nested by heading level.

use crate::{
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// The outline level of a heading element, or `None`.
fn heading_level(doc: &Document, node: NodeId) -> Option<u8> {
    let name = doc.node_name(node)?;
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Wraps body content into sections.
pub(crate) fn wrap_sections(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    if !env.options.wrap_sections {
        return Ok(());
    }
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let children = doc.children(body);
    if children.is_empty() {
        return Ok(());
    }

    // The lead section is always present, id 0.
    let lead = doc.create_element("section");
    doc.set_attr(lead, "data-mw-section-id", "0");
    doc.append(body, lead);

    // (level, section) of open sections; the lead behaves like level 0.
    let mut stack: Vec<(u8, NodeId)> = vec![(0, lead)];
    let mut next_id = 1u32;

    for child in children {
        if child == lead {
            continue;
        }
        if let Some(level) = heading_level(doc, child) {
            while stack.len() > 1 && stack.last().is_some_and(|&(l, _)| l >= level) {
                stack.pop();
            }
            let section = doc.create_element("section");
            doc.set_attr(section, "data-mw-section-id", next_id.to_string());
            next_id += 1;
            let parent = stack.last().expect("lead never pops").1;
            if parent == lead {
                // Top-level sections are body children after the lead.
                doc.append(body, section);
            } else {
                doc.append(parent, section);
            }
            doc.append(section, child);
            stack.push((level, section));
        } else {
            let target = stack.last().expect("lead never pops").1;
            doc.append(target, child);
        }
    }

    Ok(())
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
    fn wraps_lead_and_heading_sections() {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);

        let p = doc.create_element("p");
        let t = doc.create_text("lead");
        doc.append(body, p);
        doc.append(p, t);
        let h = doc.create_element("h2");
        let ht = doc.create_text("One");
        doc.append(body, h);
        doc.append(h, ht);
        let p2 = doc.create_element("p");
        let t2 = doc.create_text("content");
        doc.append(body, p2);
        doc.append(p2, t2);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        wrap_sections(&mut doc, &env, &crate::pipeline::PipelineOpts::default(), true).unwrap();
        assert_eq!(
            inner_html(&doc, body),
            "<section data-mw-section-id=\"0\"><p>lead</p></section>\
             <section data-mw-section-id=\"1\"><h2>One</h2><p>content</p></section>"
        );
    }
}
