//! Marks content the tree builder foster-parented out of a table.
//!
//! The tree builder drops a shadow meta at the insertion point where each
//! `<table>` begins. Anything sitting between that shadow and the table
//! element can only have arrived there by fostering; it is flagged and the
//! shadow removed. The flag is what lets template-range encapsulation
//! recognize overlap that originates in the tree builder rather than the
//! wikitext.

use crate::{
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// The typeof value of the tree builder’s table shadow metas.
pub(crate) const TABLE_SHADOW: &str = "mw:TreeBuilder/TableShadow";

/// Flags fostered nodes and removes the shadow metas.
pub(crate) fn mark_fostered_content(
    doc: &mut Document,
    _env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut tables = vec![];
    collect_tables(doc, body, &mut tables);

    for table in tables {
        let mut shadow = None;
        let mut between = vec![];
        let mut cursor = doc.prev_sibling(table);
        while let Some(node) = cursor {
            if doc.has_typeof(node, TABLE_SHADOW) {
                shadow = Some(node);
                break;
            }
            between.push(node);
            cursor = doc.prev_sibling(node);
        }

        let Some(shadow) = shadow else {
            // The shadow itself was displaced (nested fostering); nothing
            // to mark against.
            continue;
        };

        for node in between {
            doc.dp_mut(node).fostered = true;
            log::trace!(target: "trace/tplwrap", "marked fostered node before table");
        }
        doc.detach(shadow);
    }

    // Shadows whose tables were orphaned still need removing.
    let mut leftovers = vec![];
    collect_shadows(doc, body, &mut leftovers);
    for shadow in leftovers {
        doc.detach(shadow);
    }

    Ok(())
}

/// Collects every table in document order.
fn collect_tables(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, "table") {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_tables(doc, child, out);
    }
}

/// Collects remaining shadow metas.
fn collect_shadows(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.has_typeof(node, TABLE_SHADOW) {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_shadows(doc, child, out);
    }
}
