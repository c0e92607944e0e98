//! List-item and table-cell fix-ups plus inline-style deduplication, run as
//! a single traverser.

use crate::{
    dom::{Document, traverse::{DomTraverser, TraverseAction}},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Collapses redundant whitespace in a `style` attribute value.
fn dedupe_style(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out.trim().to_string()
}

/// Runs the li/td fix-ups and style deduplication traverser.
pub(crate) fn fix_lists_tables_styles(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut traverser = DomTraverser::new();

    // Leading space in a wikitext cell or item is delimiter padding, not
    // content.
    for tag in ["li", "td", "th", "dd", "dt"] {
        traverser.add(Some(tag), |doc, node, _env| {
            if let Some(first) = doc.first_child(node)
                && let Some(text) = doc.text(first)
                && let Some(stripped) = text.strip_prefix(' ')
            {
                let stripped = stripped.to_string();
                if stripped.is_empty() {
                    doc.detach(first);
                } else {
                    doc.set_text(first, stripped);
                    // Keep the text node’s source range in step with the
                    // stripped delimiter padding.
                    if let Some(dsr) = &mut doc.dp_mut(first).dsr
                        && let Some(start) = &mut dsr.start
                    {
                        *start += 1;
                    }
                }
            }
            Ok(TraverseAction::Descend)
        });
    }

    traverser.add(None, |doc, node, _env| {
        if let Some(style) = doc.attr(node, "style").map(str::to_string) {
            let deduped = dedupe_style(&style);
            if deduped.is_empty() {
                doc.remove_attr(node, "style");
            } else if deduped != style {
                doc.set_attr(node, "style", deduped);
            }
        }
        if doc.attr(node, "class").is_some_and(str::is_empty) {
            doc.remove_attr(node, "class");
        }
        Ok(TraverseAction::Descend)
    });

    traverser.traverse(doc, body, env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_whitespace_collapses() {
        assert_eq!(dedupe_style("color:  red ;\n width: 1px "), "color: red ; width: 1px");
    }
}
