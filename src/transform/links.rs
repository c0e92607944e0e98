//! Stage-2 wiki-link and external-link handlers.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    common::{decode_html, normalize_title, title_href},
    pipeline::{PipelineOpts, Recipe, Result},
    tokens::{DataAttribs, TagData, Token},
};

/// Expands the raw wikitext of a link caption through a tokens
/// sub-pipeline.
fn expand_caption(ctx: &TransformCtx<'_, '_>, source: &str) -> Result<Vec<Token>> {
    let opts = PipelineOpts {
        is_include: ctx.opts.is_include,
        expand_templates: ctx.opts.expand_templates,
        in_template: ctx.opts.in_template,
        inline_context: true,
        ..PipelineOpts::default()
    };
    let mut pipeline = ctx.env.checkout_pipeline(Recipe::Tokens, &opts);
    let result = pipeline.run_to_tokens(ctx.env, ctx.frame, source);
    ctx.env.checkin_pipeline(pipeline);
    let mut tokens = result?;
    if matches!(tokens.last(), Some(Token::Eof)) {
        tokens.pop();
    }
    Ok(tokens)
}

/// Rewrites `wikilink` tokens into anchors, category page-props, or media
/// figures.
pub(crate) struct WikiLinkHandler;

impl WikiLinkHandler {
    /// Builds the token run for a media link.
    fn media_tokens(
        tag: &TagData,
        title: &str,
        caption: Option<Vec<Token>>,
    ) -> Vec<Token> {
        let mut figure = TagData::new("figure", DataAttribs::default());
        figure.data.tsr = tag.data.tsr;
        figure.set_attr("typeof", "mw:Image");

        let mut anchor = TagData::new("a", DataAttribs::default());
        anchor.set_attr("href", title_href(title));

        let mut img = TagData::new("img", DataAttribs::default());
        img.set_attr("resource", title_href(title));

        let mut out = vec![
            Token::StartTag(figure),
            Token::StartTag(anchor),
            Token::SelfClosing(img),
            Token::EndTag(TagData::new("a", DataAttribs::default())),
        ];
        if let Some(caption) = caption {
            out.push(Token::StartTag(TagData::new(
                "figcaption",
                DataAttribs::default(),
            )));
            out.extend(caption);
            out.push(Token::EndTag(TagData::new(
                "figcaption",
                DataAttribs::default(),
            )));
        }
        out.push(Token::EndTag(TagData::new("figure", DataAttribs::default())));
        out
    }
}

impl TokenHandler for WikiLinkHandler {
    fn name(&self) -> &'static str {
        "wikilink"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["wikilink"])
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let raw_target = decode_html(tag.attr("href").unwrap_or("")).into_owned();
        let target = raw_target.trim();
        if target.is_empty() {
            return Ok(Transformed::Replaced(vec![Token::Text(format!(
                "[[{raw_target}]]"
            ))]));
        }

        let content = tag.attr("mw:maybeContent").map(str::to_string);
        let trail = tag.attr("trail").map(str::to_string);

        let lower = target.to_ascii_lowercase();
        if let Some(name) = lower
            .strip_prefix("category:")
            .map(|_| &target["category:".len()..])
        {
            ctx.env.add_category(name);
            let mut link = TagData::new("link", DataAttribs::default());
            link.data.tsr = tag.data.tsr;
            link.set_attr("rel", "mw:PageProp/Category");
            link.set_attr("href", title_href(&format!("Category:{}", normalize_title(name))));
            return Ok(Transformed::Replaced(vec![Token::SelfClosing(link)]));
        }

        if lower.starts_with("file:") || lower.starts_with("image:") {
            let title = normalize_title(target);
            let caption = content
                .as_deref()
                // The last pipe-separated field of a media link is its
                // caption; the rest are rendering options.
                .and_then(|c| c.split('|').next_back())
                .map(|c| expand_caption(ctx, c))
                .transpose()?;
            return Ok(Transformed::Replaced(Self::media_tokens(
                tag, &title, caption,
            )));
        }

        let page = target.strip_prefix(':').unwrap_or(target);
        let title = normalize_title(page);

        let mut anchor = TagData::new("a", DataAttribs::default());
        anchor.data.tsr = tag.data.tsr;
        anchor.set_attr("rel", "mw:WikiLink");
        anchor.set_attr("href", title_href(&title));
        anchor.set_attr("title", title.replace('_', " "));

        let mut out = vec![Token::StartTag(anchor)];
        match content {
            Some(caption) => out.extend(expand_caption(ctx, &caption)?),
            None => out.push(Token::Text(page.to_string())),
        }
        if let Some(trail) = trail {
            out.push(Token::Text(trail));
        }
        out.push(Token::EndTag(TagData::new("a", DataAttribs::default())));
        Ok(Transformed::Replaced(out))
    }
}

/// Rewrites `extlink` tokens into anchors. Unlabelled links are numbered by
/// CSS counters, so they render with empty content.
pub(crate) struct ExternalLinkHandler {
    /// How many unlabelled links have been emitted, for tracing only.
    ordinal: u32,
}

impl ExternalLinkHandler {
    /// Creates the handler.
    pub fn new() -> Self {
        Self { ordinal: 0 }
    }
}

impl TokenHandler for ExternalLinkHandler {
    fn name(&self) -> &'static str {
        "extlink"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["extlink"])
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let href = tag.attr("href").unwrap_or("").to_string();
        let content = tag.attr("mw:content").map(str::to_string);

        let mut anchor = TagData::new("a", DataAttribs::default());
        anchor.data.tsr = tag.data.tsr;
        anchor.set_attr("rel", "mw:ExtLink");
        anchor.set_attr("href", href);

        let mut out = vec![Token::StartTag(anchor)];
        match content {
            Some(caption) => out.extend(expand_caption(ctx, &caption)?),
            None => {
                self.ordinal += 1;
                log::trace!("unlabelled external link #{}", self.ordinal);
            }
        }
        out.push(Token::EndTag(TagData::new("a", DataAttribs::default())));
        Ok(Transformed::Replaced(out))
    }

    fn reset(&mut self) {
        self.ordinal = 0;
    }
}
