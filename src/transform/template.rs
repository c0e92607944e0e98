//! Stage-2 template and template-parameter expansion.
//!
//! A `template` token is resolved through the data-access collaborator,
//! expanded in a sub-pipeline under a child frame, and re-enqueued into the
//! calling stream bracketed by `<meta>` marker tokens that carry the
//! transclusion’s about-id and argument info. The markers are the anchors
//! the encapsulation pass later wraps.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    common::normalize_title,
    env::Frame,
    pipeline::{Error, PipelineOpts, Recipe, Result},
    tokens::{ArgInfo, ArgTarget, DataAttribs, Kv, ParamInfo, ParamValue, PartKind, TagData, Token, Tsr},
};
use indexmap::IndexMap;

/// Reconstructs the wikitext of an unexpanded template token. Whitespace
/// around delimiters is not preserved; callers only use this on the
/// fallback paths.
fn reconstruct(tag: &TagData) -> String {
    let mut out = String::from("{{");
    for (index, kv) in tag.attrs.iter().enumerate() {
        if index == 0 {
            out.push_str(&kv.v);
        } else if kv.k.is_empty() {
            out.push('|');
            out.push_str(&kv.v);
        } else {
            out.push('|');
            out.push_str(&kv.k);
            out.push('=');
            out.push_str(&kv.v);
        }
    }
    out.push_str("}}");
    out
}

/// Emits a recoverable error as an inline error span.
fn error_span(message: &str) -> Vec<Token> {
    let mut span = TagData::new("span", DataAttribs::default());
    span.set_attr("class", "error");
    span.set_attr("typeof", "mw:Error");
    vec![
        Token::StartTag(span),
        Token::Text(message.to_string()),
        Token::EndTag(TagData::new("span", DataAttribs::default())),
    ]
}

/// Splits a template token’s attributes into ordered `data-mw` params,
/// frame arguments, and per-parameter source offsets.
fn collect_args(
    tag: &TagData,
    top_level: bool,
) -> (
    IndexMap<String, ParamValue>,
    IndexMap<String, String>,
    Vec<ParamInfo>,
) {
    let mut params = IndexMap::new();
    let mut frame_args = IndexMap::new();
    let mut param_infos = vec![];
    let mut ordinal = 0u32;

    for kv in tag.attrs.iter().skip(1) {
        let (key, frame_value) = if kv.k.is_empty() {
            ordinal += 1;
            (ordinal.to_string(), kv.v.clone())
        } else {
            // Named argument values are trimmed; positional ones are not.
            (kv.k.trim().to_string(), kv.v.trim().to_string())
        };
        params.insert(key.clone(), ParamValue { wt: kv.v.clone() });
        frame_args.insert(key.clone(), frame_value);
        param_infos.push(ParamInfo {
            k: key,
            offsets: if top_level { kv.value_offsets } else { None },
        });
    }

    (params, frame_args, param_infos)
}

/// Builds the start and end marker metas for one transclusion.
fn marker_metas(
    kind: PartKind,
    about: &str,
    tsr: Option<Tsr>,
    arg_info: ArgInfo,
) -> (Token, Token) {
    let type_name = match kind {
        PartKind::Template => "mw:Transclusion",
        PartKind::TemplateArg => "mw:Param",
    };

    let mut start = TagData::new("meta", DataAttribs::default());
    start.set_attr("typeof", type_name);
    start.set_attr("about", about);
    start.data.tsr = tsr;
    start.data.tpl_arg_info = Some(arg_info);

    let mut end = TagData::new("meta", DataAttribs::default());
    end.set_attr("typeof", format!("{type_name}/End"));
    end.set_attr("about", about);
    end.data.tsr = tsr.map(|t| Tsr::new(t.end, t.end));

    (Token::SelfClosing(start), Token::SelfClosing(end))
}

/// Expands `source` through a stage-1/2 sub-pipeline under `frame` and
/// returns the stream with offsets cleared and the trailing EOF removed.
fn expand_to_tokens(
    ctx: &TransformCtx<'_, '_>,
    frame: &std::rc::Rc<Frame>,
    source: &str,
) -> Result<Vec<Token>> {
    let opts = PipelineOpts {
        is_include: true,
        expand_templates: true,
        in_template: true,
        ..PipelineOpts::default()
    };
    let mut pipeline = ctx.env.checkout_pipeline(Recipe::Tokens, &opts);
    let result = pipeline.run_to_tokens(ctx.env, frame, source);
    ctx.env.checkin_pipeline(pipeline);

    let mut tokens = result?;
    if matches!(tokens.last(), Some(Token::Eof)) {
        tokens.pop();
    }
    for token in &mut tokens {
        token.clear_tsr();
    }
    Ok(tokens)
}

/// Expands `template` tokens.
pub(crate) struct TemplateHandler;

impl TokenHandler for TemplateHandler {
    fn name(&self) -> &'static str {
        "template"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["template"])
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        if !ctx.opts.expand_templates {
            return Ok(Transformed::Replaced(vec![Token::Text(reconstruct(tag))]));
        }

        let target_raw = tag.attr("target").unwrap_or("").to_string();
        let target = target_raw.trim();
        if target.is_empty() || target.contains("{{") || target.starts_with('#') {
            log::warn!(target: "warn/template", "unresolvable template target {target:?}");
            return Ok(Transformed::Replaced(vec![Token::Text(reconstruct(tag))]));
        }

        // Leading ':' transcludes a main-namespace page; a namespace prefix
        // is kept; anything else lands in the template namespace.
        let title = if let Some(rest) = target.strip_prefix(':') {
            normalize_title(rest)
        } else if target.contains(':') {
            normalize_title(target)
        } else {
            format!("Template:{}", normalize_title(target))
        };

        let Some(source) = ctx.env.data.template_source(&title)? else {
            log::warn!(target: "warn/template", "missing template {title}");
            let mut link = TagData::new("wikilink", DataAttribs::default());
            link.set_attr("href", title);
            return Ok(Transformed::Replaced(vec![Token::SelfClosing(link)]));
        };

        let (params, frame_args, param_infos) =
            collect_args(tag, !ctx.opts.in_template);

        let child = match ctx.frame.push(title.clone(), frame_args) {
            Ok(child) => child,
            Err(err @ (Error::StackOverflow(_) | Error::TemplateRecursion(_))) => {
                log::warn!(target: "warn/template", "{err}");
                return Ok(Transformed::Replaced(error_span(&err.to_string())));
            }
            Err(err) => return Err(err),
        };

        let expanded = expand_to_tokens(ctx, &child, &source)?;

        let about = ctx.env.new_about_id();
        let arg_info = ArgInfo {
            kind: PartKind::Template,
            target: ArgTarget {
                wt: target_raw.clone(),
                href: Some(crate::common::title_href(&normalize_title(&title))),
            },
            params,
            param_infos,
            // Offsets from nested expansions live in the template source’s
            // offset space and must not leak into top-level gap math.
            dsr: tag.data.tsr.filter(|_| !ctx.opts.in_template),
        };
        let (start, end) = marker_metas(PartKind::Template, &about, tag.data.tsr, arg_info);

        let mut out = Vec::with_capacity(expanded.len() + 2);
        out.push(start);
        out.extend(expanded);
        out.push(end);
        Ok(Transformed::Requeued(out))
    }
}

/// Expands `templatearg` (`{{{…}}}`) tokens.
pub(crate) struct TemplateArgHandler;

impl TokenHandler for TemplateArgHandler {
    fn name(&self) -> &'static str {
        "templatearg"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["templatearg"])
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let name_raw = tag.attr("name").unwrap_or("").to_string();
        let name = name_raw.trim();
        let default = tag.attr("default").map(str::to_string);

        if ctx.opts.in_template {
            if let Some(value) = ctx.frame.arg(name).map(str::to_string) {
                // The argument text belongs to the caller’s source, so it
                // expands under the parent frame.
                let parent = ctx.frame.parent.clone().unwrap_or_else(|| ctx.frame.clone());
                return Ok(Transformed::Requeued(expand_to_tokens(ctx, &parent, &value)?));
            }
            if let Some(default) = default {
                return Ok(Transformed::Requeued(expand_to_tokens(
                    ctx, ctx.frame, &default,
                )?));
            }
            let raw = match &default {
                Some(d) => format!("{{{{{{{name_raw}|{d}}}}}}}"),
                None => format!("{{{{{{{name_raw}}}}}}}"),
            };
            return Ok(Transformed::Replaced(vec![Token::Text(raw)]));
        }

        // An unexpanded parameter at top level is wrapped as mw:Param so the
        // serializer can round-trip it.
        let mut params = IndexMap::new();
        let mut param_infos = vec![];
        if let Some(default) = &default {
            params.insert("1".to_string(), ParamValue { wt: default.clone() });
            param_infos.push(ParamInfo {
                k: "1".to_string(),
                offsets: None,
            });
        }
        let arg_info = ArgInfo {
            kind: PartKind::TemplateArg,
            target: ArgTarget {
                wt: name_raw.clone(),
                href: None,
            },
            params,
            param_infos,
            dsr: tag.data.tsr,
        };
        let about = ctx.env.new_about_id();
        let (start, end) = marker_metas(PartKind::TemplateArg, &about, tag.data.tsr, arg_info);
        let raw = match &default {
            Some(d) => format!("{{{{{{{name_raw}|{d}}}}}}}"),
            None => format!("{{{{{{{name_raw}}}}}}}"),
        };
        Ok(Transformed::Requeued(vec![
            start,
            Token::Text(raw),
            end,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstructs_source() {
        let mut tag = TagData::new("template", DataAttribs::default());
        tag.attrs.push(Kv::new("target", "echo"));
        tag.attrs.push(Kv::new("", "foo"));
        tag.attrs.push(Kv::new("k", "v"));
        assert_eq!(reconstruct(&tag), "{{echo|foo|k=v}}");
    }

    #[test]
    fn collects_ordered_args() {
        let mut tag = TagData::new("template", DataAttribs::default());
        tag.attrs.push(Kv::new("target", "t"));
        tag.attrs.push(Kv {
            k: String::new(),
            v: "a".to_string(),
            key_offsets: None,
            value_offsets: Some(Tsr::new(4, 5)),
        });
        tag.attrs.push(Kv::new("name", " b "));
        let (params, frame_args, infos) = collect_args(&tag, true);
        assert_eq!(params.get_index(0).unwrap().0, "1");
        assert_eq!(params["1"].wt, "a");
        assert_eq!(params["name"].wt, " b ");
        assert_eq!(frame_args["name"], "b");
        assert_eq!(frame_args["1"], "a");
        assert_eq!(infos[0].offsets, Some(Tsr::new(4, 5)));
    }
}
