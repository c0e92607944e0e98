//! Stage-2 extension tag handling.
//!
//! Dispatch goes through the site-config registry. A native implementation
//! returns a DOM subtree, which is tunnelled through the token stream as a
//! DOM-fragment token and spliced into the main tree by the fragment
//! unpacking pass. Unrecognized tags fall back to a best-effort wikitext
//! re-parse of their inner content.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    common::decode_html,
    config::ExtensionCall,
    dom::Document,
    env::Env,
    pipeline::{PipelineOpts, Recipe, Result},
    tokens::{DataAttribs, Kv, TagData, Token},
};

/// Normalizes extension tag options: whitespace collapsed, entities
/// decoded, empty options dropped.
fn normalize_options(attrs: &[Kv]) -> Vec<Kv> {
    attrs
        .iter()
        .filter(|kv| !kv.k.starts_with("mw:"))
        .filter_map(|kv| {
            let k = kv.k.trim().to_ascii_lowercase();
            if k.is_empty() {
                return None;
            }
            let v = decode_html(kv.v.trim())
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            Some(Kv {
                k,
                v,
                key_offsets: kv.key_offsets,
                value_offsets: kv.value_offsets,
            })
        })
        .collect()
}

/// Builds the `data-mw` record of an extension invocation.
fn extension_data_mw(name: &str, attrs: &[Kv], body: Option<&str>) -> serde_json::Value {
    let mut attr_map = serde_json::Map::new();
    for kv in attrs {
        attr_map.insert(kv.k.clone(), serde_json::Value::String(kv.v.clone()));
    }
    let mut out = serde_json::Map::new();
    out.insert("name".to_string(), serde_json::Value::String(name.to_string()));
    out.insert("attrs".to_string(), serde_json::Value::Object(attr_map));
    if let Some(body) = body {
        out.insert(
            "body".to_string(),
            serde_json::json!({ "extsrc": body }),
        );
    }
    serde_json::Value::Object(out)
}

/// Expands `extension` tokens into DOM-fragment tokens.
pub(crate) struct ExtensionHandler;

impl ExtensionHandler {
    /// Renders an unrecognized extension tag by re-parsing its body as
    /// wikitext inside a typed wrapper.
    fn fallback_dom(
        &self,
        ctx: &TransformCtx<'_, '_>,
        name: &str,
        attrs: &[Kv],
        body: Option<&str>,
    ) -> Result<Document> {
        let opts = PipelineOpts {
            is_include: ctx.opts.is_include,
            expand_templates: ctx.opts.expand_templates,
            in_template: ctx.opts.in_template,
            ext_tag: Some(name.to_string()),
            ..PipelineOpts::default()
        };
        let mut pipeline = ctx.env.checkout_pipeline(Recipe::Dom, &opts);
        let result = pipeline.run_to_dom(ctx.env, ctx.frame, body.unwrap_or(""), false);
        ctx.env.checkin_pipeline(pipeline);
        let parsed = result?;

        let mut fragment = Document::new();
        let root = fragment.root();
        let wrapper = fragment.create_element("div");
        fragment.set_attr(wrapper, "typeof", format!("mw:Extension/{name}"));
        fragment.set_data_mw(wrapper, extension_data_mw(name, attrs, body));
        fragment.append(root, wrapper);
        let source = parsed.body().unwrap_or(parsed.root());
        for child in parsed.children(source) {
            let copied = fragment.adopt_subtree(&parsed, child);
            fragment.append(wrapper, copied);
        }
        Ok(fragment)
    }
}

impl TokenHandler for ExtensionHandler {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["extension"])
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let name = tag.attr("mw:name").unwrap_or("").to_string();
        let body = tag.attr("mw:body").map(str::to_string);
        let attrs = normalize_options(&tag.attrs);

        let call = ExtensionCall {
            name: &name,
            attrs: &attrs,
            body: body.as_deref(),
        };

        let fragment = if let Some(native) = ctx.env.conf.native_extension(&name) {
            (native.to_dom)(ctx.env, &call)?
        } else {
            log::warn!("no native implementation for <{name}>, re-parsing body");
            self.fallback_dom(ctx, &name, &attrs, body.as_deref())?
        };

        let id = ctx.env.add_fragment(fragment);
        let mut out = TagData::new("dom-fragment", DataAttribs::default());
        out.data.tsr = tag.data.tsr;
        out.set_attr("id", id);
        Ok(Transformed::Replaced(vec![Token::SelfClosing(out)]))
    }
}

/// Converts DOM-fragment tokens into the placeholder metas the tree builder
/// can hold until the unpacking pass splices the fragment in.
pub(crate) struct DomFragmentBuilder;

impl TokenHandler for DomFragmentBuilder {
    fn name(&self) -> &'static str {
        "dom-fragment-builder"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["dom-fragment"])
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let mut meta = TagData::new("meta", DataAttribs::default());
        meta.data.tsr = tag.data.tsr;
        meta.set_attr("typeof", "mw:DOMFragment");
        if let Some(id) = tag.attr("id") {
            meta.set_attr("html", id);
        }
        Ok(Transformed::Replaced(vec![Token::SelfClosing(meta)]))
    }
}

/// The `<nowiki>` native implementation: the body renders as literal text.
pub(crate) fn ext_nowiki(_env: &Env<'_>, call: &ExtensionCall<'_>) -> Result<Document> {
    let mut fragment = Document::new();
    let root = fragment.root();
    let span = fragment.create_element("span");
    fragment.set_attr(span, "typeof", "mw:Nowiki");
    fragment.append(root, span);
    if let Some(body) = call.body {
        let text = fragment.create_text(body);
        fragment.append(span, text);
    }
    Ok(fragment)
}

/// The `<pre>` native implementation: a preformatted block with the body as
/// literal text, minus the customary leading newline.
pub(crate) fn ext_pre(_env: &Env<'_>, call: &ExtensionCall<'_>) -> Result<Document> {
    let mut fragment = Document::new();
    let root = fragment.root();
    let pre = fragment.create_element("pre");
    fragment.set_attr(pre, "typeof", "mw:Extension/pre");
    fragment.set_data_mw(pre, extension_data_mw("pre", call.attrs, call.body));
    fragment.append(root, pre);
    if let Some(body) = call.body {
        let text = fragment.create_text(body.strip_prefix('\n').unwrap_or(body));
        fragment.append(pre, text);
    }
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_normalized() {
        let attrs = vec![
            Kv::new("mw:name", "ref"),
            Kv::new("Group", "  a   b "),
            Kv::new("", "dropped"),
            Kv::new("amp", "x&amp;y"),
        ];
        let normalized = normalize_options(&attrs);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].k, "group");
        assert_eq!(normalized[0].v, "a b");
        assert_eq!(normalized[1].v, "x&y");
    }
}
