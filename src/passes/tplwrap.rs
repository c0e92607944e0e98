//! Template range encapsulation.
//!
//! Finds the minimal DOM subtree covering each transclusion’s output,
//! resolves nesting and overlap between ranges, and rewrites one element
//! per surviving range with the transclusion’s `typeof`, `about`, and
//! `data-mw.parts`. Marker metas never survive this pass, wrapping failure
//! included.
//!
//! Three phases, run in order:
//! * Phase A pairs marker metas and computes the minimal range per pair.
//! * Phase B resolves nesting and overlap down to top-level ranges.
//! * Phase C stamps about-ids and attaches `data-mw` to the target.

use super::migrate::is_marker_meta;
use crate::{
    dom::{Document, Dsr, NodeId, NodeKind},
    env::Env,
    pipeline::{Error, PipelineOpts, Result},
    tokens::{ArgInfo, FileMap, PartKind},
};
use std::collections::{HashMap, HashSet};

/// One wrappable transclusion range.
#[derive(Debug)]
struct TplRange {
    /// Index into the ranges vector, used for coverage tagging.
    idx: u32,
    /// The transclusion about-id.
    about: String,
    /// The start marker meta.
    start_elem: NodeId,
    /// The end marker meta.
    end_elem: NodeId,
    /// The first DOM node of the range, a child of the common ancestor.
    start: NodeId,
    /// The last DOM node of the range, a sibling of `start`.
    end: NodeId,
    /// The source offset of the start marker, for textual ordering.
    start_offset: Option<usize>,
    /// Document-order tiebreak for ranges without offsets.
    order: usize,
    /// The end marker was foster-parented before the start marker.
    flipped: bool,
}

/// Wraps every transclusion in the document. Top level only.
pub(crate) fn wrap_templates(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut ranges = find_wrappable_template_ranges(doc, body);
    if ranges.is_empty() {
        return Ok(());
    }
    log::trace!(target: "trace/tplwrap", "found {} candidate ranges", ranges.len());

    let (top_level, compound) = find_top_level_non_overlapping_ranges(doc, &mut ranges)?;
    encapsulate_templates(doc, env, &ranges, &top_level, &compound)?;
    Ok(())
}

// -- Phase A ----------------------------------------------------------------

/// Collects marker metas in document order as `(node, about, is_end)`.
fn collect_metas(doc: &Document, node: NodeId, out: &mut Vec<(NodeId, String, bool)>) {
    if let Some(about) = doc.attr(node, "about") {
        if is_marker_meta(doc, node, false) {
            out.push((node, about.to_string(), false));
        } else if is_marker_meta(doc, node, true) {
            out.push((node, about.to_string(), true));
        }
    }
    for child in doc.children(node) {
        collect_metas(doc, child, out);
    }
}

/// Pairs markers by about-id and computes the minimal DOM range for each
/// pair.
fn find_wrappable_template_ranges(doc: &mut Document, body: NodeId) -> Vec<TplRange> {
    let mut metas = vec![];
    collect_metas(doc, body, &mut metas);

    let mut pending: HashMap<String, NodeId> = HashMap::new();
    let mut pairs: Vec<(NodeId, NodeId, String, usize)> = vec![];
    let mut orphans: Vec<NodeId> = vec![];

    for (order, (node, about, is_end)) in metas.into_iter().enumerate() {
        if !is_end {
            if pending.insert(about.clone(), node).is_some() {
                log::warn!(target: "warn/template", "duplicate start marker for {about}");
            }
        } else if let Some(start) = pending.remove(&about) {
            pairs.push((start, node, about, order));
        } else {
            // The end marker was fostered ahead of its start; it serves as
            // both endpoints and the late start marker is just stripped.
            log::warn!(
                target: "warn/template",
                "end marker for {about} precedes its start marker"
            );
            pairs.push((node, node, about, order));
            orphans.push(node);
        }
    }

    for (about, start) in pending {
        log::warn!(target: "warn/template", "unterminated transclusion {about}");
        doc.detach(start);
    }
    // A start marker whose end was consumed as a fostered self-pair is an
    // orphan; detach it when it shows up later in document order.
    let orphan_abouts: HashSet<String> = orphans
        .iter()
        .filter_map(|&n| doc.attr(n, "about").map(str::to_string))
        .collect();
    let mut stray_starts = vec![];
    collect_stray_starts(doc, body, &orphan_abouts, &orphans, &mut stray_starts);
    for stray in stray_starts {
        doc.detach(stray);
    }

    let mut ranges = vec![];
    for (idx, (start_elem, end_elem, about, order)) in pairs.into_iter().enumerate() {
        let (start, end, flipped) =
            compute_dom_range(doc, body, start_elem, end_elem);
        let start_offset = doc.dp(start_elem).dsr.and_then(|d| d.start);
        ranges.push(TplRange {
            idx: u32::try_from(idx).unwrap(),
            about,
            start_elem,
            end_elem,
            start,
            end,
            start_offset,
            order,
            flipped,
        });
    }
    ranges
}

/// Collects start markers whose about-id already resolved through a
/// fostered end marker.
fn collect_stray_starts(
    doc: &Document,
    node: NodeId,
    orphan_abouts: &HashSet<String>,
    keep: &[NodeId],
    out: &mut Vec<NodeId>,
) {
    if is_marker_meta(doc, node, false)
        && !keep.contains(&node)
        && doc
            .attr(node, "about")
            .is_some_and(|a| orphan_abouts.contains(a))
    {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_stray_starts(doc, child, orphan_abouts, keep, out);
    }
}

/// Computes the `(start, end, flipped)` DOM endpoints for one marker pair:
/// the children of the common ancestor on each marker’s path, adjusted so
/// the range has a wrappable start.
fn compute_dom_range(
    doc: &mut Document,
    body: NodeId,
    start_elem: NodeId,
    end_elem: NodeId,
) -> (NodeId, NodeId, bool) {
    // Common ancestor: the start’s ancestor set, probed from the end.
    let mut start_chain = vec![start_elem];
    start_chain.extend(doc.ancestors(start_elem));
    let start_set: HashSet<NodeId> = start_chain.iter().copied().collect();

    let mut ancestor = end_elem;
    let mut end_path_child = end_elem;
    while !start_set.contains(&ancestor) {
        end_path_child = ancestor;
        ancestor = doc.parent(ancestor).unwrap_or(body);
    }
    let ca = ancestor;

    let mut start = if ca == start_elem {
        start_elem
    } else {
        // The child of the common ancestor on the start path.
        *start_chain
            .iter()
            .take_while(|&&n| n != ca)
            .last()
            .unwrap_or(&start_elem)
    };
    let mut end = if ca == end_elem { end_elem } else { end_path_child };

    // An empty range between adjacent markers gets a span to wrap.
    if start == end && start_elem == end_elem {
        let span = doc.create_element("span");
        doc.dp_mut(span).dsr = doc.dp(start_elem).dsr;
        doc.insert_before(start, span);
        start = span;
        end = span;
    } else if doc.next_sibling(start) == Some(end)
        && start == start_elem
        && end == end_elem
        && !in_fosterable_position(doc, start)
    {
        let span = doc.create_element("span");
        doc.dp_mut(span).dsr = doc.dp(start_elem).dsr;
        doc.insert_after(start, span);
    }

    let (adjusted_start, adjusted_end) = adjust_fosterable_start(doc, start, end);
    start = adjusted_start;
    end = adjusted_end;

    // A non-element start in an unfosterable position gets wrapped so the
    // range has an element target.
    if !doc.is_element(start) {
        let span = doc.create_element("span");
        doc.dp_mut(span).dsr = doc.dp(start_elem).dsr;
        doc.insert_before(start, span);
        doc.append(span, start);
        if end == start {
            end = span;
        }
        start = span;
    }

    // A range starting at a table reaches back over the content the tree
    // builder fostered out of it.
    if doc.is_element_named(start, "table") {
        while let Some(prev) = doc.prev_sibling(start) {
            if doc.dp(prev).fostered {
                start = prev;
            } else {
                break;
            }
        }
    }

    // Sibling order decides flippedness.
    let mut flipped = false;
    if start != end && doc.parent(start) == doc.parent(end) {
        let mut found = false;
        let mut cursor = Some(start);
        while let Some(n) = cursor {
            if n == end {
                found = true;
                break;
            }
            cursor = doc.next_sibling(n);
        }
        if !found {
            flipped = true;
            core::mem::swap(&mut start, &mut end);
        }
    }

    (start, end, flipped)
}

/// A fosterable non-element range start tries to push leading whitespace
/// or a comment into the following row; otherwise the range climbs to the
/// parent. Element starts and unfosterable positions pass through.
fn adjust_fosterable_start(
    doc: &mut Document,
    start: NodeId,
    end: NodeId,
) -> (NodeId, NodeId) {
    if doc.is_element(start) || !in_fosterable_position(doc, start) {
        return (start, end);
    }

    let pushable = match doc.kind(start) {
        NodeKind::Text(t) => t.chars().all(char::is_whitespace),
        NodeKind::Comment(_) => true,
        _ => false,
    };
    if pushable
        && let Some(row) = doc.next_sibling(start).filter(|&n| {
            doc.is_element_named(n, "tr") || doc.is_element_named(n, "tbody")
        })
    {
        let moved = start;
        if let Some(first) = doc.first_child(row) {
            doc.insert_before(first, moved);
        } else {
            doc.append(row, moved);
        }
        return (row, end);
    }

    if let Some(parent) = doc.parent(start) {
        if doc.parent(end) != doc.parent(parent) {
            // Keep endpoints siblings; the parent swallows both sides.
            return (parent, parent);
        }
        return (parent, end);
    }
    (start, end)
}

/// True when a node sits directly inside table markup, where the tree
/// builder would foster arbitrary content.
fn in_fosterable_position(doc: &Document, node: NodeId) -> bool {
    doc.parent(node).is_some_and(|p| {
        matches!(doc.node_name(p), Some("table" | "tbody" | "thead" | "tfoot" | "tr"))
    })
}

// -- Phase B ----------------------------------------------------------------

/// The sibling run of a range, inclusive.
fn range_nodes(doc: &Document, range: &TplRange) -> Vec<NodeId> {
    let mut out = vec![range.start];
    if range.start == range.end {
        return out;
    }
    let mut cursor = doc.next_sibling(range.start);
    while let Some(n) = cursor {
        out.push(n);
        if n == range.end {
            break;
        }
        cursor = doc.next_sibling(n);
    }
    out
}

/// Resolves nesting and overlap. Returns the top-level range indices in
/// textual order and the compound argument array per surviving range.
fn find_top_level_non_overlapping_ranges(
    doc: &mut Document,
    ranges: &mut [TplRange],
) -> Result<(Vec<u32>, HashMap<u32, Vec<ArgInfo>>)> {
    // 1. Tag coverage.
    for range in ranges.iter() {
        for node in range_nodes(doc, range) {
            doc.dp_mut(node).tmp.range_ids.push(range.idx);
        }
    }

    // 2. Nesting: an ancestor carrying someone else’s range id subsumes us;
    // the outermost (smallest start offset) encloser wins.
    let mut subsumed: HashMap<u32, u32> = HashMap::new();
    for range in ranges.iter() {
        let mut enclosing: Vec<u32> = vec![];
        for ancestor in doc.ancestors(range.start) {
            for &id in &doc.dp(ancestor).tmp.range_ids {
                if id != range.idx {
                    enclosing.push(id);
                }
            }
        }
        if let Some(&outermost) = enclosing.iter().min_by_key(|&&id| {
            let r = &ranges[id as usize];
            (r.start_offset.unwrap_or(usize::MAX), r.order)
        }) {
            insert_subsumption(&mut subsumed, range.idx, outermost)?;
        }
    }

    // 3. Ranges sharing both endpoints: the later one is subsumed.
    for a in 0..ranges.len() {
        for b in (a + 1)..ranges.len() {
            let (ra, rb) = (&ranges[a], &ranges[b]);
            if ra.start == rb.start && ra.end == rb.end {
                let key_a = (ra.start_offset.unwrap_or(usize::MAX), ra.order);
                let key_b = (rb.start_offset.unwrap_or(usize::MAX), rb.order);
                let (inner, outer) = if key_a <= key_b {
                    (rb.idx, ra.idx)
                } else {
                    (ra.idx, rb.idx)
                };
                insert_subsumption(&mut subsumed, inner, outer)?;
            }
        }
    }

    // 4. Textual order.
    let mut order: Vec<usize> = (0..ranges.len()).collect();
    order.sort_by_key(|&i| (ranges[i].start_offset.unwrap_or(usize::MAX), ranges[i].order));

    // 5. Emit, merging overlap into the previous range.
    let mut top_level: Vec<u32> = vec![];
    let mut compound: HashMap<u32, Vec<ArgInfo>> = HashMap::new();
    let mut prev: Option<usize> = None;

    for &i in &order {
        let arg_info = doc.dp(ranges[i].start_elem).tmp.tpl_arg_info.clone();
        let arg_info = arg_info.unwrap_or_else(|| missing_arg_info(&ranges[i].about));

        if let Some(&target) = subsumed.get(&ranges[i].idx) {
            // Nested: fold into the outermost encloser.
            let mut target = target;
            while let Some(&next) = subsumed.get(&target) {
                target = next;
            }
            let (start_elem, end_elem) = (ranges[i].start_elem, ranges[i].end_elem);
            doc.detach(start_elem);
            doc.detach(end_elem);
            compound.entry(target).or_default().push(arg_info);
            continue;
        }

        if let Some(p) = prev
            && overlaps(doc, &ranges[p], &ranges[i])
        {
            if ranges[i].flipped {
                return Err(Error::Internal(
                    "flipped range reached the overlap merge".to_string(),
                ));
            }
            // The merged range adopts this end marker; this start marker
            // and the previous end marker are stripped outright.
            let (new_end, new_end_elem) = (ranges[i].end, ranges[i].end_elem);
            doc.detach(ranges[i].start_elem);
            doc.detach(ranges[p].end_elem);
            ranges[p].end = new_end;
            ranges[p].end_elem = new_end_elem;
            compound.entry(ranges[p].idx).or_default().push(arg_info);
            continue;
        }

        compound.entry(ranges[i].idx).or_default().push(arg_info);
        top_level.push(ranges[i].idx);
        prev = Some(i);
    }

    Ok((top_level, compound))
}

/// Adds `subsumed[inner] = outer`, refusing cycles.
fn insert_subsumption(
    subsumed: &mut HashMap<u32, u32>,
    inner: u32,
    outer: u32,
) -> Result {
    let mut cursor = outer;
    loop {
        if cursor == inner {
            return Err(Error::Internal(format!(
                "cycle in template range subsumption: {inner} <-> {outer}"
            )));
        }
        match subsumed.get(&cursor) {
            Some(&next) => cursor = next,
            None => break,
        }
    }
    subsumed.entry(inner).or_insert(outer);
    Ok(())
}

/// Overlap between a previously-emitted range and the next candidate:
/// the candidate’s start falls inside the previous sibling span.
fn overlaps(doc: &Document, prev: &TplRange, next: &TplRange) -> bool {
    if doc.parent(prev.start) != doc.parent(next.start) {
        return false;
    }
    range_nodes(doc, prev).contains(&next.start)
}

/// A stand-in argument record for markers that lost their payload.
fn missing_arg_info(about: &str) -> ArgInfo {
    log::warn!(target: "warn/template", "marker {about} carries no argument info");
    ArgInfo {
        kind: PartKind::Template,
        target: crate::tokens::ArgTarget {
            wt: String::new(),
            href: None,
        },
        params: indexmap::IndexMap::new(),
        param_infos: vec![],
        dsr: None,
    }
}

// -- Phase C ----------------------------------------------------------------

/// Stamps about-ids, attaches `data-mw`, and removes the markers for each
/// top-level range.
fn encapsulate_templates(
    doc: &mut Document,
    env: &Env<'_>,
    ranges: &[TplRange],
    top_level: &[u32],
    compound: &HashMap<u32, Vec<ArgInfo>>,
) -> Result {
    for &idx in top_level {
        let range = &ranges[idx as usize];
        if range.flipped {
            log::warn!(
                target: "warn/template",
                "flipped range {} reached encapsulation",
                range.about
            );
        }

        let nodes = range_nodes(doc, range);

        // 1. Stamp the about-id; wrap unfosterable non-elements so they can
        // carry it.
        let mut stamped = vec![];
        for node in &nodes {
            let node = *node;
            if node == range.start_elem || node == range.end_elem {
                continue;
            }
            if doc.is_element(node) {
                doc.set_attr(node, "about", range.about.clone());
                stamped.push(node);
            } else if !in_fosterable_position(doc, node) {
                let span = doc.create_element("span");
                doc.set_attr(span, "about", range.about.clone());
                doc.dp_mut(span).dsr = doc.dp(node).dsr;
                doc.insert_before(node, span);
                doc.append(span, node);
                stamped.push(span);
            }
            // Fosterable non-elements stay bare; the tree builder already
            // kept non-whitespace text out of here.
        }

        // 2. The encapsulation target: the first stamped element that is
        // not a marker meta.
        let Some(&target) = stamped.first() else {
            let position = doc
                .dp(range.start_elem)
                .dsr
                .and_then(|d| d.start)
                .map(|offset| {
                    let lc = FileMap::new(&env.page.source).find_line_col(offset);
                    format!(" at {}:{}", lc.line, lc.column)
                })
                .unwrap_or_default();
            log::error!(
                target: "warn/template",
                "cannot encapsulate transclusion {}{position}: no element target",
                range.about
            );
            let (start_elem, end_elem) = (range.start_elem, range.end_elem);
            doc.detach(start_elem);
            doc.detach(end_elem);
            continue;
        };

        // 3. The marker’s type merges ahead of any pre-existing types.
        let marker_type = doc
            .attr(range.start_elem, "typeof")
            .map(|t| t.trim_end_matches("/End").to_string())
            .unwrap_or_else(|| "mw:Transclusion".to_string());
        doc.add_typeof(target, &marker_type);

        // 4. The range DSR.
        let start_dsr = doc.dp(range.start).dsr;
        let end_dsr = doc.dp(range.end).dsr;
        let mut range_dsr = resolve_range_dsr(doc, range, start_dsr, end_dsr);

        // 6. Fostered single-part content cannot round-trip usefully.
        let parts_count = compound.get(&range.idx).map_or(0, Vec::len);
        if doc.dp(range.start).fostered
            && parts_count == 1
            && let Some(dsr) = &mut range_dsr
        {
            dsr.end = dsr.start;
        }

        if let Some(dsr) = range_dsr {
            doc.dp_mut(target).dsr = Some(dsr);
        } else {
            log::error!(
                target: "warn/template",
                "transclusion {} has no usable DSR; skipping data-mw",
                range.about
            );
        }

        // 5. Assemble data-mw.parts with interstitial wikitext for gaps.
        let (parts, leading_gap) = build_parts(
            env,
            compound.get(&range.idx).map_or(&[][..], Vec::as_slice),
            range_dsr,
        )?;
        doc.set_data_mw(target, serde_json::json!({ "parts": parts }));

        let mut param_infos = vec![];
        for info in compound.get(&range.idx).map_or(&[][..], Vec::as_slice) {
            if !info.param_infos.is_empty() {
                param_infos.push(info.param_infos.clone());
            }
        }
        doc.dp_mut(target).pi = param_infos;

        if leading_gap {
            // The serializer resolves its newline constraints against the
            // first templated DOM node.
            let name = doc.node_name(target).map(str::to_string);
            doc.dp_mut(target).first_wikitext_node = name;
        }

        // 7. The markers go away.
        let (start_elem, end_elem) = (range.start_elem, range.end_elem);
        doc.detach(start_elem);
        doc.detach(end_elem);
    }
    Ok(())
}

/// Applies the range DSR rules: prefer the end’s later edge, and let a
/// table that reaches back before the start (or a fostered start) pull the
/// range start down.
fn resolve_range_dsr(
    doc: &Document,
    range: &TplRange,
    start_dsr: Option<Dsr>,
    end_dsr: Option<Dsr>,
) -> Option<Dsr> {
    let start_dsr = start_dsr?;
    let (mut s, mut e) = (start_dsr.start, start_dsr.end);

    if let Some(end_dsr) = end_dsr {
        if let (Some(se), Some(ee)) = (e, end_dsr.end)
            && ee > se
        {
            e = Some(ee);
        }
        if doc.is_element_named(range.end, "table")
            && let Some(te) = end_dsr.start
            && (s.is_none_or(|s| te < s) || doc.dp(range.start).fostered)
        {
            s = Some(te);
        }
    }

    // A range is valid only when both edges are known.
    if s.is_none() || e.is_none() {
        return None;
    }
    Some(Dsr {
        start: s,
        end: e,
        open_width: None,
        close_width: None,
    })
}

/// Builds the ordered `data-mw.parts` array, inserting literal wikitext
/// runs for any source gaps between the compound entries. Also reports
/// whether a leading gap run was prepended.
fn build_parts(
    env: &Env<'_>,
    infos: &[ArgInfo],
    range_dsr: Option<Dsr>,
) -> Result<(Vec<serde_json::Value>, bool)> {
    let source = &env.page.source;
    let mut parts = vec![];
    let mut leading_gap = false;
    let mut cursor = range_dsr.and_then(|d| d.start);

    for info in infos {
        if let (Some(c), Some(dsr)) = (cursor, info.dsr)
            && dsr.start > c
            && dsr.start <= source.len()
        {
            if parts.is_empty() {
                leading_gap = true;
            }
            parts.push(serde_json::Value::String(
                source[c..dsr.start].to_string(),
            ));
        }

        let key = match info.kind {
            PartKind::Template => "template",
            PartKind::TemplateArg => "templatearg",
        };
        let mut body = serde_json::Map::new();
        body.insert("target".to_string(), serde_json::to_value(&info.target)?);
        body.insert("params".to_string(), serde_json::to_value(&info.params)?);
        let mut part = serde_json::Map::new();
        part.insert(key.to_string(), serde_json::Value::Object(body));
        parts.push(serde_json::Value::Object(part));

        cursor = info.dsr.map(|d| d.end).or(cursor);
    }

    if let (Some(c), Some(end)) = (cursor, range_dsr.and_then(|d| d.end))
        && end > c
        && end <= source.len()
    {
        parts.push(serde_json::Value::String(source[c..end].to_string()));
    }

    Ok((parts, leading_gap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
        pipeline::PipelineOpts,
        tokens::ArgTarget,
    };

    fn fixture() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        (doc, body)
    }

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

    fn marker(doc: &mut Document, about: &str, end: bool) -> NodeId {
        let meta = doc.create_element("meta");
        let type_name = if end {
            "mw:Transclusion/End"
        } else {
            "mw:Transclusion"
        };
        doc.set_attr(meta, "typeof", type_name);
        doc.set_attr(meta, "about", about);
        meta
    }

    fn arg_info(wt: &str) -> ArgInfo {
        ArgInfo {
            kind: PartKind::Template,
            target: ArgTarget {
                wt: wt.to_string(),
                href: None,
            },
            params: indexmap::IndexMap::new(),
            param_infos: vec![],
            dsr: None,
        }
    }

    fn surviving_markers(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
        if is_marker_meta(doc, node, false) || is_marker_meta(doc, node, true) {
            out.push(node);
        }
        for child in doc.children(node) {
            surviving_markers(doc, child, out);
        }
    }

    #[test]
    fn endpoint_sharing_subsumes_the_later_range() {
        // Both marker pairs resolve to the same (div1, div2) endpoints; the
        // range with the larger start offset folds into the other.
        let (mut doc, body) = fixture();
        let div1 = doc.create_element("div");
        let div2 = doc.create_element("div");
        doc.append(body, div1);
        doc.append(body, div2);

        let m1s = marker(&mut doc, "#mwt1", false);
        let m2s = marker(&mut doc, "#mwt2", false);
        let m2e = marker(&mut doc, "#mwt2", true);
        let m1e = marker(&mut doc, "#mwt1", true);
        doc.append(div1, m1s);
        doc.append(div1, m2s);
        doc.append(div2, m2e);
        doc.append(div2, m1e);

        doc.dp_mut(m1s).dsr = Some(Dsr::new(0, 12, 0, 0));
        doc.dp_mut(m1s).tmp.tpl_arg_info = Some(arg_info("one"));
        doc.dp_mut(m2s).dsr = Some(Dsr::new(2, 10, 0, 0));
        doc.dp_mut(m2s).tmp.tpl_arg_info = Some(arg_info("two"));

        let conf = SiteConfig::wmf();
        let env = env_for(&conf, "0123456789ab");
        wrap_templates(&mut doc, &env, &PipelineOpts::default(), true).unwrap();

        assert!(doc.has_typeof(div1, "mw:Transclusion"));
        assert!(!doc.has_typeof(div2, "mw:Transclusion"));
        assert_eq!(doc.attr(div1, "about"), Some("#mwt1"));
        assert_eq!(doc.attr(div2, "about"), Some("#mwt1"));

        let mw = doc.data_mw(div1).expect("data-mw on the target");
        let parts = mw["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["template"]["target"]["wt"], "one");
        assert_eq!(parts[1]["template"]["target"]["wt"], "two");

        let mut markers = vec![];
        surviving_markers(&doc, body, &mut markers);
        assert!(markers.is_empty());
    }

    #[test]
    fn subsumption_refuses_cycles() {
        let mut subsumed = HashMap::new();
        insert_subsumption(&mut subsumed, 1, 2).unwrap();
        insert_subsumption(&mut subsumed, 2, 3).unwrap();
        assert!(matches!(
            insert_subsumption(&mut subsumed, 3, 1),
            Err(Error::Internal(_))
        ));
        // The earlier entries survive the refused insertion.
        assert_eq!(subsumed.get(&1), Some(&2));
        assert_eq!(subsumed.get(&2), Some(&3));
    }

    #[test]
    fn flipped_range_never_reaches_the_overlap_merge() {
        let (mut doc, body) = fixture();
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        let c = doc.create_element("p");
        doc.append(body, a);
        doc.append(body, b);
        doc.append(body, c);
        let m1s = marker(&mut doc, "#mwt1", false);
        let m1e = marker(&mut doc, "#mwt1", true);
        let m2s = marker(&mut doc, "#mwt2", false);
        let m2e = marker(&mut doc, "#mwt2", true);
        doc.append(body, m1s);
        doc.append(body, m1e);
        doc.append(body, m2s);
        doc.append(body, m2e);

        let mut ranges = vec![
            TplRange {
                idx: 0,
                about: "#mwt1".to_string(),
                start_elem: m1s,
                end_elem: m1e,
                start: a,
                end: c,
                start_offset: Some(0),
                order: 0,
                flipped: false,
            },
            TplRange {
                idx: 1,
                about: "#mwt2".to_string(),
                start_elem: m2s,
                end_elem: m2e,
                start: b,
                end: b,
                start_offset: Some(4),
                order: 1,
                flipped: true,
            },
        ];

        assert!(matches!(
            find_top_level_non_overlapping_ranges(&mut doc, &mut ranges),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn table_range_reaches_back_over_fostered_content() {
        // The start marker sits in a cell, so the range starts at the
        // table; fostered siblings in front of the table join the range.
        let (mut doc, body) = fixture();
        let fostered = doc.create_element("span");
        doc.dp_mut(fostered).fostered = true;
        doc.append(body, fostered);

        let table = doc.create_element("table");
        let tr = doc.create_element("tr");
        let td = doc.create_element("td");
        doc.append(body, table);
        doc.append(table, tr);
        doc.append(tr, td);
        let m1s = marker(&mut doc, "#mwt1", false);
        doc.append(td, m1s);
        let m1e = marker(&mut doc, "#mwt1", true);
        doc.append(body, m1e);

        let ranges = find_wrappable_template_ranges(&mut doc, body);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, fostered);
        assert_eq!(ranges[0].end, m1e);
        assert!(!ranges[0].flipped);
    }

    #[test]
    fn fosterable_prefix_pushes_whitespace_and_comments_into_the_row() {
        // A leading comment in table position moves into the following row
        // and the range starts at the row.
        let (mut doc, body) = fixture();
        let table = doc.create_element("table");
        doc.append(body, table);
        let comment = doc.create_comment(" boundary ");
        doc.append(table, comment);
        let tr = doc.create_element("tr");
        doc.append(table, tr);

        let (start, end) = adjust_fosterable_start(&mut doc, comment, tr);
        assert_eq!(start, tr);
        assert_eq!(end, tr);
        assert_eq!(doc.first_child(tr), Some(comment));

        // Leading whitespace behaves the same way.
        let (mut doc, body) = fixture();
        let table = doc.create_element("table");
        doc.append(body, table);
        let ws = doc.create_text("\n  ");
        doc.append(table, ws);
        let tr = doc.create_element("tr");
        doc.append(table, tr);

        let (start, _end) = adjust_fosterable_start(&mut doc, ws, tr);
        assert_eq!(start, tr);
        assert_eq!(doc.first_child(tr), Some(ws));

        // Unpushable content widens the range to the parent instead.
        let (mut doc, body2) = fixture();
        let table = doc.create_element("table");
        doc.append(body2, table);
        let text = doc.create_text("stray");
        doc.append(table, text);
        let tr = doc.create_element("tr");
        doc.append(table, tr);

        let (start, end) = adjust_fosterable_start(&mut doc, text, tr);
        assert_eq!(start, table);
        assert_eq!(end, table);
    }
}
