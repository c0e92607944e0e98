//! Language variant conversion.
//!
//! A traverser parameterized by the target variant and the site’s
//! replacement machine. `<code>`, `<script>`, `<pre>`, and `<cite>`
//! subtrees are skipped; text runs are transliterated; wiki-link titles and
//! hrefs are converted; `title` and `alt` attributes are converted unless
//! they look like URLs. Conversions the machine cannot invert keep the
//! original in `data-mw-variant-orig` for round-trip.

use crate::{
    config::{LANGCONV_SKIP_TAGS, ReplacementMachine},
    dom::{Document, NodeId, NodeKind},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// True when an attribute value is URL-shaped and must not be converted.
fn looks_like_url(value: &str) -> bool {
    value.contains("://") || value.starts_with("mailto:") || value.starts_with("//")
}

/// Converts the document to the requested variant.
pub(crate) fn convert_variants(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(variant) = env.options.variant.clone() else {
        return Ok(());
    };
    let Some(machine) = env.conf.variant_machine.as_deref() else {
        log::warn!("variant {variant} requested but no replacement machine is configured");
        return Ok(());
    };
    if !machine.variants().iter().any(|v| v == &variant) {
        log::warn!("variant {variant} is not supported by the replacement machine");
        return Ok(());
    }
    let Some(body) = doc.body() else {
        return Ok(());
    };

    convert_node(doc, body, &variant, machine);
    Ok(())
}

/// Recursive conversion of one subtree.
fn convert_node(
    doc: &mut Document,
    node: NodeId,
    variant: &str,
    machine: &dyn ReplacementMachine,
) {
    if let Some(name) = doc.node_name(node) {
        if LANGCONV_SKIP_TAGS.contains(name) {
            return;
        }

        // Explicit variant markup resolves through its own table.
        if doc.has_typeof(node, "mw:LanguageVariant") {
            convert_variant_span(doc, node, variant);
            return;
        }

        if matches!(name, "p" | "body") {
            let source = machine.guess_variant(&doc.text_content(node));
            if let Some(source) = source {
                doc.set_attr(node, "data-mw-variant-lang", source);
            }
        }

        let is_wikilink = doc
            .attr(node, "rel")
            .is_some_and(|r| r.split_ascii_whitespace().any(|v| v == "mw:WikiLink"));
        let is_extlink = doc
            .attr(node, "rel")
            .is_some_and(|r| r.split_ascii_whitespace().any(|v| v == "mw:ExtLink"));

        for attr in ["title", "alt"] {
            if let Some(value) = doc.attr(node, attr).map(str::to_string)
                && !looks_like_url(&value)
                && let Some(converted) = machine.convert(&value, variant)
                && converted != value
            {
                doc.set_attr(node, attr, converted);
            }
        }

        if is_wikilink
            && !is_extlink
            && let Some(href) = doc.attr(node, "href").map(str::to_string)
            && let Some(title) = href.strip_prefix("./").map(str::to_string)
            && let Some(converted) = machine.convert(&title, variant)
            && converted != title
        {
            doc.set_attr(node, "href", format!("./{converted}"));
        }
    }

    for child in doc.children(node) {
        if let NodeKind::Text(text) = doc.kind(child) {
            let text = text.clone();
            if let Some(converted) = machine.convert(&text, variant)
                && converted != text
            {
                // When the machine cannot take the output back to the
                // source, keep the original for round-trip.
                let invertible = machine
                    .guess_variant(&text)
                    .and_then(|source| machine.convert(&converted, &source))
                    .is_some_and(|back| back == text);
                if !invertible && let Some(parent) = doc.parent(child) {
                    doc.set_attr(
                        parent,
                        "data-mw-variant-orig",
                        serde_json::json!({ "t": text }).to_string(),
                    );
                }
                doc.set_text(child, converted);
            }
        } else {
            convert_node(doc, child, variant, machine);
        }
    }
}

/// Resolves a `mw:LanguageVariant` span against its stored variant table.
fn convert_variant_span(doc: &mut Document, node: NodeId, variant: &str) {
    let Some(data) = doc
        .attr(node, "data-mw-variant")
        .and_then(|v| serde_json::from_str::<serde_json::Value>(v).ok())
    else {
        return;
    };
    let Some(twoway) = data.get("twoway").and_then(|t| t.as_array()) else {
        return;
    };
    let Some(text) = twoway
        .iter()
        .find(|e| e.get("l").and_then(|l| l.as_str()) == Some(variant))
        .and_then(|e| e.get("t"))
        .and_then(|t| t.as_str())
    else {
        return;
    };

    let text = text.to_string();
    for child in doc.children(node) {
        doc.detach(child);
    }
    let replacement = doc.create_text(text);
    doc.append(node, replacement);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
    };

    /// Uppercases text for the `x-upper` variant.
    struct UpperMachine {
        variants: Vec<String>,
    }

    impl ReplacementMachine for UpperMachine {
        fn variants(&self) -> &[String] {
            &self.variants
        }

        fn guess_variant(&self, text: &str) -> Option<String> {
            text.chars()
                .all(|c| !c.is_uppercase())
                .then(|| "x-lower".to_string())
        }

        fn convert(&self, text: &str, variant: &str) -> Option<String> {
            match variant {
                "x-upper" => Some(text.to_uppercase()),
                "x-lower" => Some(text.to_lowercase()),
                _ => None,
            }
        }
    }

    #[test]
    fn converts_text_and_skips_code() {
        let mut conf = SiteConfig::wmf();
        conf.variant_machine = Some(Box::new(UpperMachine {
            variants: vec!["x-upper".to_string(), "x-lower".to_string()],
        }));
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions {
                variant: Some("x-upper".to_string()),
                ..EnvOptions::default()
            },
        );

        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let body = doc.create_element("body");
        doc.append(html, body);
        let p = doc.create_element("p");
        doc.append(body, p);
        let t = doc.create_text("hello");
        doc.append(p, t);
        let code = doc.create_element("code");
        doc.append(body, code);
        let ct = doc.create_text("keep");
        doc.append(code, ct);

        convert_variants(&mut doc, &env, &crate::pipeline::PipelineOpts::default(), true)
            .unwrap();
        assert_eq!(doc.text_content(p), "HELLO");
        assert_eq!(doc.text_content(code), "keep");
        assert_eq!(doc.attr(p, "data-mw-variant-lang"), Some("x-lower"));
    }
}
