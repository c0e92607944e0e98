//! Link-neighbour absorption and DOM-fragment unpacking.
//!
//! Runs before the per-extension post-processors so extensions see their
//! content spliced into the real tree.

use crate::{
    dom::{Document, Dsr, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Splices tunnelled DOM fragments in place of their placeholder metas and
/// pulls link trails that ended up as bare text back into their links.
pub(crate) fn unpack_dom_fragments(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    absorb_link_trails(doc, env, body);

    let mut placeholders = vec![];
    collect_placeholders(doc, body, &mut placeholders);

    for meta in placeholders {
        let Some(id) = doc.attr(meta, "html").map(str::to_string) else {
            doc.detach(meta);
            continue;
        };
        let Some(fragment) = env.take_fragment(&id) else {
            log::warn!("missing DOM fragment {id}");
            doc.detach(meta);
            continue;
        };

        let source = fragment.body().unwrap_or(fragment.root());
        let meta_dsr = doc.dp(meta).tsr.map(|t| Dsr::new(t.start, t.end, 0, 0));
        let mut first = true;
        for child in fragment.children(source) {
            let copied = doc.adopt_subtree(&fragment, child);
            doc.insert_before(meta, copied);
            if first
                && doc.is_element(copied)
                && doc.dp(copied).dsr.is_none()
                && let Some(dsr) = meta_dsr
            {
                doc.dp_mut(copied).dsr = Some(dsr);
            }
            first = false;
        }
        doc.detach(meta);
    }
    Ok(())
}

/// Collects fragment placeholder metas in document order.
fn collect_placeholders(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, "meta") && doc.has_typeof(node, "mw:DOMFragment") {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_placeholders(doc, child, out);
    }
}

/// Moves a leading link trail from the text node right after a wiki link
/// into the link. Trails attached during tokenizing make this a no-op; it
/// exists for trails that only become adjacent after expansion.
fn absorb_link_trails(doc: &mut Document, env: &Env<'_>, body: NodeId) {
    let mut links = vec![];
    collect_wikilinks(doc, body, &mut links);

    for link in links {
        let Some(next) = doc.next_sibling(link) else {
            continue;
        };
        let Some(text) = doc.text(next) else {
            continue;
        };
        let trail_len = text
            .chars()
            .take_while(|&c| env.conf.is_link_trail_char(c))
            .map(char::len_utf8)
            .sum::<usize>();
        if trail_len == 0 {
            continue;
        }

        let trail = text[..trail_len].to_string();
        let rest = text[trail_len..].to_string();
        if rest.is_empty() {
            doc.detach(next);
        } else {
            doc.set_text(next, rest);
        }
        let moved = doc.create_text(trail);
        doc.append(link, moved);
    }
}

/// Collects `a[rel~="mw:WikiLink"]` elements in document order.
fn collect_wikilinks(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, "a")
        && doc
            .attr(node, "rel")
            .is_some_and(|r| r.split_ascii_whitespace().any(|v| v == "mw:WikiLink"))
    {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_wikilinks(doc, child, out);
    }
}
