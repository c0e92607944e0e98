//! Stage-2 handler for `-{ … }-` language conversion markup.
//!
//! The token carries the raw inside of the construct; this handler shapes
//! it into a typed span holding the parsed variant table in
//! `data-mw-variant`, which the variant conversion pass consumes.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token},
};

/// Parses the inside of a `-{ … }-` into the variant description JSON.
/// `a:x;b:y` is a two-way table; anything else is a disabled-conversion
/// run.
fn parse_variants(source: &str) -> (serde_json::Value, String) {
    let mut entries = vec![];
    for part in source.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lang, text)) = part.split_once(':')
            && !lang.trim().is_empty()
            && lang.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            entries.push((lang.trim().to_string(), text.trim().to_string()));
        } else {
            // Not a variant table after all.
            entries.clear();
            break;
        }
    }

    if entries.is_empty() {
        (
            serde_json::json!({ "disabled": { "t": source } }),
            source.to_string(),
        )
    } else {
        let display = entries[0].1.clone();
        let twoway: Vec<serde_json::Value> = entries
            .into_iter()
            .map(|(l, t)| serde_json::json!({ "l": l, "t": t }))
            .collect();
        (serde_json::json!({ "twoway": twoway }), display)
    }
}

/// Rewrites `language-variant` tokens into typed spans.
pub(crate) struct LanguageVariantHandler;

impl TokenHandler for LanguageVariantHandler {
    fn name(&self) -> &'static str {
        "language-variant"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["language-variant"])
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let source = tag.attr("source").unwrap_or("");
        let (variant, display) = parse_variants(source);

        let mut span = TagData::new("span", DataAttribs::default());
        span.data.tsr = tag.data.tsr;
        span.set_attr("typeof", "mw:LanguageVariant");
        span.set_attr("data-mw-variant", variant.to_string());

        Ok(Transformed::Replaced(vec![
            Token::StartTag(span),
            Token::Text(display),
            Token::EndTag(TagData::new("span", DataAttribs::default())),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twoway_table() {
        let (json, display) = parse_variants("zh-hans:简;zh-hant:繁");
        assert_eq!(display, "简");
        assert_eq!(
            json,
            serde_json::json!({
                "twoway": [
                    { "l": "zh-hans", "t": "简" },
                    { "l": "zh-hant", "t": "繁" },
                ]
            })
        );
    }

    #[test]
    fn disabled_run() {
        let (json, display) = parse_variants("just text");
        assert_eq!(display, "just text");
        assert_eq!(json, serde_json::json!({ "disabled": { "t": "just text" } }));
    }
}
