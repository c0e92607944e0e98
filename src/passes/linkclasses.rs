//! External-link class addition and red-link annotation.

use crate::{
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Appends a class to an element’s class attribute.
fn add_class(doc: &mut Document, node: NodeId, class: &str) {
    let merged = match doc.attr(node, "class") {
        Some(existing) if !existing.is_empty() => {
            if existing.split_ascii_whitespace().any(|c| c == class) {
                return;
            }
            format!("{existing} {class}")
        }
        _ => class.to_string(),
    };
    doc.set_attr(node, "class", merged);
}

/// Collects anchors carrying the given rel value.
fn collect_rel(doc: &Document, node: NodeId, rel: &str, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, "a")
        && doc
            .attr(node, "rel")
            .is_some_and(|r| r.split_ascii_whitespace().any(|v| v == rel))
    {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_rel(doc, child, rel, out);
    }
}

/// Adds `external text` / `external autonumber` classes to external links.
pub(crate) fn add_external_link_classes(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut links = vec![];
    collect_rel(doc, body, "mw:ExtLink", &mut links);
    for link in links {
        if doc.first_child(link).is_some() {
            add_class(doc, link, "external");
            add_class(doc, link, "text");
        } else {
            add_class(doc, link, "external");
            add_class(doc, link, "autonumber");
        }
    }
    Ok(())
}

/// Annotates wiki links whose targets do not exist with the `new` class.
/// Resolution happens in one batch through the data-access collaborator.
pub(crate) fn add_red_links(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    if !env.options.red_links {
        return Ok(());
    }
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut links = vec![];
    collect_rel(doc, body, "mw:WikiLink", &mut links);
    if links.is_empty() {
        return Ok(());
    }

    let titles: Vec<String> = links
        .iter()
        .filter_map(|&l| doc.attr(l, "href"))
        .map(|href| href.trim_start_matches("./").to_string())
        .collect();
    let existing = env.data.page_exists(&titles)?;

    for link in links {
        let Some(title) = doc
            .attr(link, "href")
            .map(|href| href.trim_start_matches("./").to_string())
        else {
            continue;
        };
        if !existing.get(&title).copied().unwrap_or(true) {
            add_class(doc, link, "new");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
    };

    #[test]
    fn labelled_and_autonumber_classes() {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);

        let labelled = doc.create_element("a");
        doc.set_attr(labelled, "rel", "mw:ExtLink");
        let t = doc.create_text("label");
        doc.append(body, labelled);
        doc.append(labelled, t);

        let bare = doc.create_element("a");
        doc.set_attr(bare, "rel", "mw:ExtLink");
        doc.append(body, bare);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        add_external_link_classes(&mut doc, &env, &crate::pipeline::PipelineOpts::default(), true)
            .unwrap();
        assert_eq!(doc.attr(labelled, "class"), Some("external text"));
        assert_eq!(doc.attr(bare, "class"), Some("external autonumber"));
    }
}
