//! Tree-builder fixups and DOM normalization.

use crate::{
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Repairs artifacts of tree construction: empty text nodes vanish and
/// attribute-less empty paragraphs synthesized around markup are removed.
pub(crate) fn tree_builder_fixups(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut empties = vec![];
    collect_empties(doc, body, &mut empties);
    for node in empties {
        doc.detach(node);
    }
    Ok(())
}

/// Collects removable nodes: empty text and bare empty `<p>`.
fn collect_empties(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    for child in doc.children(node) {
        collect_empties(doc, child, out);
    }

    if doc.text(node).is_some_and(str::is_empty) {
        out.push(node);
    } else if doc.is_element_named(node, "p")
        && doc.first_child(node).is_none()
        && doc.element(node).is_some_and(|e| e.attrs.is_empty())
    {
        out.push(node);
    }
}

/// Merges adjacent text node siblings throughout the tree.
pub(crate) fn normalize(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    merge_text(doc, doc.root());
    Ok(())
}

/// Merges adjacent text children of `node`, recursively.
fn merge_text(doc: &mut Document, node: NodeId) {
    let mut child = doc.first_child(node);
    while let Some(current) = child {
        let next = doc.next_sibling(current);
        if let (Some(_), Some(next_id)) = (doc.text(current), next)
            && let Some(next_text) = doc.text(next_id)
        {
            let merged = format!("{}{}", doc.text(current).unwrap_or(""), next_text);
            doc.set_text(current, merged);
            doc.detach(next_id);
            // Stay on the current node; there may be more to merge.
            continue;
        }
        merge_text(doc, current);
        child = next;
    }
}
