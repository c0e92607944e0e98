//! Final cleanup: stray marker removal, empty-element pruning, and
//! side-table serialization into the [`PageBundle`].

use crate::{
    dom::{Document, NodeId, PageBundle, TempData},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Removes any marker metas that survived encapsulation (the failure path
/// leaves the output clean) along with other tree-builder internals.
pub(crate) fn strip_marker_metas(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut strays = vec![];
    collect_strays(doc, body, &mut strays);
    for node in strays {
        log::debug!("stripping stray marker meta");
        doc.detach(node);
    }
    Ok(())
}

/// Collects metas that must never reach the output.
fn collect_strays(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, "meta")
        && doc.attr(node, "typeof").is_some_and(|t| {
            t.starts_with("mw:Transclusion")
                || t.starts_with("mw:Param")
                || t.starts_with("mw:TreeBuilder/")
                || t == "mw:DOMFragment"
        })
    {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_strays(doc, child, out);
    }
}

/// Prunes empty leftovers, clears scratch state, assigns node ids, and
/// serializes the side-tables.
pub(crate) fn cleanup_and_save(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    // Empty spans left by encapsulation attempts that went nowhere.
    let mut empties = vec![];
    collect_empty_spans(doc, body, &mut empties);
    for node in empties {
        doc.detach(node);
    }

    if !at_top_level {
        return Ok(());
    }

    let mut bundle = PageBundle::default();
    let mut counter = 0u32;
    save_node(doc, body, &mut bundle, &mut counter)?;
    doc.bundle = Some(bundle);
    Ok(())
}

/// Collects attribute-less empty spans.
fn collect_empty_spans(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    for child in doc.children(node) {
        collect_empty_spans(doc, child, out);
    }
    if doc.is_element_named(node, "span")
        && doc.first_child(node).is_none()
        && doc.element(node).is_some_and(|e| e.attrs.is_empty())
    {
        out.push(node);
    }
}

/// Serializes one node’s records into the bundle, clearing pass scratch,
/// and recurses. `data-mw` is inlined as an attribute; `data-parsoid` only
/// ever lives in the bundle.
fn save_node(
    doc: &mut Document,
    node: NodeId,
    bundle: &mut PageBundle,
    counter: &mut u32,
) -> Result {
    if doc.is_element(node) {
        {
            let dp = doc.dp_mut(node);
            dp.tmp = TempData::default();
            dp.tsr = None;
        }

        let parsoid = serde_json::to_value(doc.dp(node))?;
        let mw = doc.data_mw(node).cloned();
        let has_parsoid = parsoid.as_object().is_some_and(|o| !o.is_empty());

        if has_parsoid || mw.is_some() {
            let id = match doc.attr(node, "id") {
                Some(id) => id.to_string(),
                None => {
                    *counter += 1;
                    let id = format!("mw{counter}");
                    doc.set_attr(node, "id", id.clone());
                    id
                }
            };
            if has_parsoid {
                bundle.parsoid.insert(id.clone(), parsoid);
            }
            if let Some(mw) = mw {
                doc.set_attr(node, "data-mw", mw.to_string());
                bundle.mw.insert(id, mw);
            }
        }
    }

    for child in doc.children(node) {
        save_node(doc, child, bundle, counter)?;
    }
    Ok(())
}
