//! Stage-2 attribute expansion.
//!
//! Runs after template expansion so attribute values in unused template
//! branches are never expanded. Any tag attribute still carrying `{{…}}`
//! markup is expanded through a tokens sub-pipeline and flattened back to a
//! plain string.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::{PipelineOpts, Recipe, Result},
    tokens::{TagData, Token},
};

/// Flattens an expanded token stream to the plain text an attribute value
/// can hold. Markup that survives expansion is dropped with a warning.
fn flatten_to_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(t) => out.push_str(t),
            Token::Newline(_) => out.push(' '),
            Token::Comment { .. } | Token::Eof => {}
            other => {
                log::warn!("dropping non-text token in attribute value: {other:?}");
            }
        }
    }
    out
}

/// Expands template markup inside tag attribute values.
pub(crate) struct AttributeExpander;

impl AttributeExpander {
    /// Expands every attribute of `tag` that still contains transclusion
    /// markup.
    fn expand_tag(&self, tag: &mut TagData, ctx: &TransformCtx<'_, '_>) -> Result {
        for index in 0..tag.attrs.len() {
            if !tag.attrs[index].v.contains("{{") {
                continue;
            }
            let value = tag.attrs[index].v.clone();
            let opts = PipelineOpts {
                is_include: ctx.opts.is_include,
                expand_templates: ctx.opts.expand_templates,
                in_template: ctx.opts.in_template,
                attr_expansion: true,
                inline_context: true,
                ..PipelineOpts::default()
            };
            let mut pipeline = ctx.env.checkout_pipeline(Recipe::Tokens, &opts);
            let result = pipeline.run_to_tokens(ctx.env, ctx.frame, &value);
            ctx.env.checkin_pipeline(pipeline);
            tag.attrs[index].v = flatten_to_text(&result?);
            tag.attrs[index].value_offsets = None;
        }
        Ok(())
    }
}

impl TokenHandler for AttributeExpander {
    fn name(&self) -> &'static str {
        "attribute-expander"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        Ok(match token {
            Token::StartTag(mut tag) => {
                self.expand_tag(&mut tag, ctx)?;
                Transformed::Unchanged(Token::StartTag(tag))
            }
            Token::SelfClosing(mut tag) => {
                self.expand_tag(&mut tag, ctx)?;
                Transformed::Unchanged(Token::SelfClosing(tag))
            }
            other => Transformed::Unchanged(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_drops_markup() {
        let tokens = vec![
            Token::Text("a".to_string()),
            Token::Newline(crate::tokens::DataAttribs::default()),
            Token::Text("b".to_string()),
            Token::Eof,
        ];
        assert_eq!(flatten_to_text(&tokens), "a b");
    }
}
