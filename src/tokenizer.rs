//! The tokenizer adapter.
//!
//! The grammar itself is a black box to the rest of the pipeline: the
//! adapter feeds it wikitext and streams out flat [`Token`]s with source
//! ranges attached. Wikitext constructs that need expansion come out as
//! self-closing tokens (`template`, `wikilink`, `extension`, …) for the
//! transform stages to rewrite.

use crate::{
    common::{decode_entity, normalize_title, title_href},
    config::{HTML5_TAGS, SiteConfig, VOID_TAGS},
    tokens::{DataAttribs, Kv, TagData, Token, Tsr},
};
use std::cell::Cell;

/// A tokenizer error.
pub(crate) type Error = peg::error::ParseError<peg::str::LineCol>;

/// The result of tokenizing one document or fragment.
#[derive(Debug)]
pub(crate) struct TokenizerOutput {
    /// The token stream, terminated by [`Token::Eof`].
    pub tokens: Vec<Token>,
    /// An `<onlyinclude>` tag was seen somewhere in the input. The include
    /// directive handler needs this up front so it can default to skipping
    /// instead of pre-scanning the stream.
    pub has_onlyinclude: bool,
}

/// Mutable grammar context.
struct Ctx<'a> {
    /// The site configuration, for extension tag and behavior switch names.
    config: &'a SiteConfig,
    /// Wikitext table nesting depth. Row and cell lines only tokenize as
    /// table markup while inside a table.
    table_depth: Cell<i32>,
    /// Set when an `<onlyinclude>` tag is seen.
    has_onlyinclude: Cell<bool>,
}

/// Streams tokens from the grammar.
pub(crate) struct Tokenizer<'a> {
    /// The site configuration.
    config: &'a SiteConfig,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer with the given configuration.
    pub fn new(config: &'a SiteConfig) -> Self {
        Self { config }
    }

    /// Tokenizes `source` into a flat stream ending with [`Token::Eof`].
    pub fn tokenize(&self, source: &str) -> Result<TokenizerOutput, Error> {
        let ctx = Ctx {
            config: self.config,
            table_depth: Cell::new(0),
            has_onlyinclude: Cell::new(false),
        };
        let mut tokens = wikitext::document(source, &ctx)?;
        tokens.push(Token::Eof);
        Ok(TokenizerOutput {
            tokens,
            has_onlyinclude: ctx.has_onlyinclude.get(),
        })
    }
}

/// Parses an HTML-ish attribute string from table or tag markup into
/// key-value pairs. `offset` is the byte position of `text` in the source,
/// used to attach value offsets.
fn parse_attr_string(text: &str, offset: usize) -> Vec<Kv> {
    let bytes = text.as_bytes();
    let mut out = vec![];
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        if i == key_start {
            i += 1;
            continue;
        }
        let key = &text[key_start..i];
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            let (value_start, value_end) = if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                let end = i;
                if i < bytes.len() {
                    i += 1;
                }
                (start, end)
            } else {
                let start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                (start, i)
            };
            out.push(Kv {
                k: key.to_string(),
                v: text[value_start..value_end].to_string(),
                key_offsets: Some(Tsr::new(offset + key_start, offset + key_start + key.len())),
                value_offsets: Some(Tsr::new(offset + value_start, offset + value_end)),
            });
        } else {
            out.push(Kv {
                k: key.to_string(),
                v: String::new(),
                key_offsets: Some(Tsr::new(offset + key_start, offset + key_start + key.len())),
                value_offsets: None,
            });
        }
    }
    out
}

/// Builds the heading token run for one `=…=` line.
fn build_heading(
    start: usize,
    open: &str,
    content: Vec<Token>,
    close_start: usize,
    close: &str,
    end: usize,
) -> Vec<Token> {
    let level = open.len().min(close.len()).min(6);
    let name = format!("h{level}");

    let mut out = Vec::with_capacity(content.len() + 2);
    out.push(Token::StartTag(TagData::new(
        name.clone(),
        DataAttribs::from_tsr(start, start + level),
    )));
    if open.len() > level {
        out.push(Token::Text("=".repeat(open.len() - level)));
    }
    out.extend(content);
    let close_extra = close.len() - level;
    if close_extra > 0 {
        out.push(Token::Text("=".repeat(close_extra)));
    }
    out.push(Token::EndTag(TagData::new(
        name,
        DataAttribs::from_tsr(close_start + close_extra, end),
    )));
    out
}

peg::parser! {
    /// The wikitext grammar. Line constructs are anchored by the `document`
    /// rule; everything else is inline.
    grammar wikitext(tk: &Ctx<'_>) for str {
        // A boolean side-condition lookahead: `&assert_cond(cond)` matches
        // (consuming no input) iff `cond` is true. This is how this peg
        // version expresses a predicate assertion.
        rule assert_cond(cond: bool)
            = #{|_, pos| if cond { ::peg::RuleResult::Matched(pos, ()) } else { ::peg::RuleResult::Failed }}

        pub rule document() -> Vec<Token>
            = first:line() rest:(n:newline() l:line() { (n, l) })* {
                let mut out = first;
                for (n, l) in rest {
                    out.push(n);
                    out.extend(l);
                }
                out
            }

        rule newline() -> Token
            = s:position!() "\r"? "\n" e:position!() {
                Token::Newline(DataAttribs::from_tsr(s, e))
            }

        rule line() -> Vec<Token>
            = redirect_line()
            / heading()
            / table_start_line()
            / table_end_line()
            / table_row_line()
            / table_caption_line()
            / table_cell_line()
            / list_line()
            / hr_line()
            / inline_line()

        rule inline_line() -> Vec<Token>
            = ts:inline()* { ts }

        // -- redirects ------------------------------------------------------

        rule redirect_line() -> Vec<Token>
            = s:position!() &assert_cond(s == 0) ("#REDIRECT" / "#redirect" / "#Redirect") ws()*
              "[[" target:$((!"|" !"]]" not_eol())*) ("|" (!"]]" not_eol())*)? "]]"
              e:position!() rest:inline()* {
                let mut link = TagData::new("link", DataAttribs::from_tsr(s, e));
                link.set_attr("rel", "mw:PageProp/redirect");
                link.set_attr("href", title_href(&normalize_title(target)));
                let mut out = vec![Token::SelfClosing(link)];
                out.extend(rest);
                out
            }

        // -- headings -------------------------------------------------------

        rule heading() -> Vec<Token>
            = s:position!() open:$("="*<1,6>)
              content:(!heading_close() t:inline() { t })+
              cs:position!() close:$("="*<1,6>) ws()* e:position!() &eol() {
                build_heading(s, open, content, cs, close, e)
            }

        rule heading_close()
            = "="*<1,6> ws()* eol()

        // -- tables ---------------------------------------------------------

        rule table_start_line() -> Vec<Token>
            = s:position!() "{|" a:position!() attrs:$(not_eol()*) e:position!() {
                tk.table_depth.set(tk.table_depth.get() + 1);
                let mut tag = TagData::new("table", DataAttribs::from_tsr(s, e));
                tag.attrs = parse_attr_string(attrs, a);
                vec![Token::StartTag(tag)]
            }

        rule table_end_line() -> Vec<Token>
            = s:position!() &assert_cond(tk.table_depth.get() > 0) "|}" e:position!() rest:inline()* {
                tk.table_depth.set(tk.table_depth.get() - 1);
                let mut out = vec![Token::EndTag(TagData::new(
                    "table",
                    DataAttribs::from_tsr(s, e),
                ))];
                out.extend(rest);
                out
            }

        rule table_row_line() -> Vec<Token>
            = s:position!() &assert_cond(tk.table_depth.get() > 0) "|-" "-"*
              a:position!() attrs:$(not_eol()*) e:position!() {
                let mut tag = TagData::new("tr", DataAttribs::from_tsr(s, e));
                tag.attrs = parse_attr_string(attrs, a);
                vec![Token::StartTag(tag)]
            }

        rule table_caption_line() -> Vec<Token>
            = s:position!() &assert_cond(tk.table_depth.get() > 0) "|+" e:position!() content:inline()* {
                let mut out = vec![Token::StartTag(TagData::new(
                    "caption",
                    DataAttribs::from_tsr(s, e),
                ))];
                out.extend(content);
                out.push(Token::EndTag(TagData::new("caption", DataAttribs::default())));
                out
            }

        rule table_cell_line() -> Vec<Token>
            = &assert_cond(tk.table_depth.get() > 0) first:table_first_cell() rest:table_extra_cell()* {
                let mut out = first;
                for cell in rest {
                    out.extend(cell);
                }
                out
            }

        rule table_first_cell() -> Vec<Token>
            = s:position!() c:['|' | '!'] e:position!() content:cell_content() {
                let name = if c == '!' { "th" } else { "td" };
                let mut out = vec![Token::StartTag(TagData::new(
                    name,
                    DataAttribs::from_tsr(s, e),
                ))];
                out.extend(content);
                out
            }

        rule table_extra_cell() -> Vec<Token>
            = s:position!() d:$("||" / "!!") e:position!() content:cell_content() {
                let name = if d == "!!" { "th" } else { "td" };
                let mut out = vec![Token::StartTag(TagData::new(
                    name,
                    DataAttribs::from_tsr(s, e),
                ))];
                out.extend(content);
                out
            }

        rule cell_content() -> Vec<Token>
            = ts:(!("||" / "!!") t:inline() { t })* { ts }

        // -- lists and rules ------------------------------------------------

        rule list_line() -> Vec<Token>
            = s:position!() bullets:$(['*' | '#' | ';' | ':']+) e:position!() content:inline()* {
                let mut tag = TagData::new("listitem", DataAttribs::from_tsr(s, e));
                tag.set_attr("bullets", bullets);
                let mut out = vec![Token::SelfClosing(tag)];
                out.extend(content);
                out
            }

        rule hr_line() -> Vec<Token>
            = s:position!() "----" "-"* e:position!() content:inline()* {
                let mut out = vec![Token::SelfClosing(TagData::new(
                    "hr",
                    DataAttribs::from_tsr(s, e),
                ))];
                out.extend(content);
                out
            }

        // -- inline constructs ----------------------------------------------

        rule inline() -> Token
            = comment()
            / include_tag()
            / extension_tag()
            / html_end_tag()
            / html_start_tag()
            / template_arg()
            / template()
            / wikilink()
            / external_link()
            / entity()
            / behavior_switch()
            / quote_run()
            / lang_variant()
            / text_run()
            / fallback_char()

        rule comment() -> Token
            = s:position!() "<!--" text:$((!"-->" [_])*) ("-->" / ![_]) e:position!() {
                Token::Comment {
                    text: text.to_string(),
                    data: DataAttribs::from_tsr(s, e),
                }
            }

        rule tag_name() -> &'input str
            = $(['a'..='z' | 'A'..='Z'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '-']*)

        rule include_name() -> &'input str
            = $("noinclude" / "includeonly" / "onlyinclude")

        rule include_tag() -> Token
            = s:position!() "</" name:include_name() ws()* ">" e:position!() {
                Token::EndTag(TagData::new(name, DataAttribs::from_tsr(s, e)))
            }
            / s:position!() "<" name:include_name() ws()* sc:$("/"?) ">" e:position!() {
                if name == "onlyinclude" {
                    tk.has_onlyinclude.set(true);
                }
                let tag = TagData::new(name, DataAttribs::from_tsr(s, e));
                if sc.is_empty() {
                    Token::StartTag(tag)
                } else {
                    Token::SelfClosing(tag)
                }
            }

        rule extension_tag() -> Token
            = s:position!() "<" name:tag_name()
              &assert_cond(tk.config.is_extension_tag(&name.to_ascii_lowercase()))
              attrs:html_attrs() ws()*
              body:(
                  "/>" { None }
                / ">" b:$((!close_tag_named(name) [_])*) close_tag_named(name) { Some(b) }
              )
              e:position!() {
                let mut tag = TagData::new("extension", DataAttribs::from_tsr(s, e));
                tag.attrs.push(Kv::new("mw:name", name.to_ascii_lowercase()));
                if let Some(body) = body {
                    tag.attrs.push(Kv::new("mw:body", body));
                }
                tag.attrs.extend(attrs);
                Token::SelfClosing(tag)
            }

        rule close_tag_named(name: &str)
            = "</" n:tag_name() ws()* ">" &assert_cond(n.eq_ignore_ascii_case(name))

        rule html_start_tag() -> Token
            = s:position!() "<" name:tag_name()
              &assert_cond(HTML5_TAGS.contains(&name.to_ascii_lowercase()[..]))
              attrs:html_attrs() ws()* sc:$("/"?) ">" e:position!() {
                let name = name.to_ascii_lowercase();
                let self_closing = !sc.is_empty() || VOID_TAGS.contains(&name[..]);
                let mut tag = TagData::new(name, DataAttribs::from_tsr(s, e));
                tag.data.stx = Some("html");
                tag.attrs = attrs;
                if self_closing {
                    Token::SelfClosing(tag)
                } else {
                    Token::StartTag(tag)
                }
            }

        rule html_end_tag() -> Token
            = s:position!() "</" name:tag_name()
              &assert_cond(HTML5_TAGS.contains(&name.to_ascii_lowercase()[..]))
              ws()* ">" e:position!() {
                let mut tag = TagData::new(name.to_ascii_lowercase(), DataAttribs::from_tsr(s, e));
                tag.data.stx = Some("html");
                Token::EndTag(tag)
            }

        rule html_attrs() -> Vec<Kv>
            = kvs:(ws()+ kv:html_attr() { kv })* { kvs }

        rule html_attr() -> Kv
            = ks:position!() k:$(attr_name_char()+) ke:position!() v:html_attr_value()? {
                Kv {
                    k: k.to_ascii_lowercase(),
                    v: v.as_ref().map(|(v, _)| v.clone()).unwrap_or_default(),
                    key_offsets: Some(Tsr::new(ks, ke)),
                    value_offsets: v.map(|(_, t)| t),
                }
            }

        rule attr_name_char()
            = ['a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | ':']

        rule html_attr_value() -> (String, Tsr)
            = ws()* "=" ws()* v:(
                  "\"" s:position!() v:$((!"\"" not_eol())*) e:position!() "\"" { (v, s, e) }
                / "'" s:position!() v:$((!"'" not_eol())*) e:position!() "'" { (v, s, e) }
                / s:position!() v:$((![' ' | '\t' | '>' | '\n' | '\r'] !"/>" [_])+) e:position!() { (v, s, e) }
              ) {
                (v.0.to_string(), Tsr::new(v.1, v.2))
            }

        // -- transclusions --------------------------------------------------

        rule tplarg_nest()
            = "{{{" (tplarg_nest() / tpl_nest() / link_nest() / (!"}}}" [_]))* "}}}"

        rule tpl_nest()
            = "{{" (tplarg_nest() / tpl_nest() / link_nest() / (!"}}" [_]))* "}}"

        rule link_nest()
            = "[[" (link_nest() / tpl_nest() / (!"]]" [_]))* "]]"

        rule target_atom()
            = tplarg_nest() / tpl_nest() / link_nest() / (!"|" !"}}" [_])

        rule key_atom()
            = tplarg_nest() / tpl_nest() / link_nest() / (!"=" !"|" !"}}" [_])

        rule arg_atom()
            = tplarg_nest() / tpl_nest() / link_nest() / (!"|" !"}}" [_])

        rule tplarg_atom()
            = tplarg_nest() / tpl_nest() / link_nest() / (!"|" !"}}}" [_])

        rule template() -> Token
            = s:position!() "{{" ts:position!() target:$(target_atom()*)
              args:tpl_arg_kv()* "}}" e:position!() {
                let mut tag = TagData::new("template", DataAttribs::from_tsr(s, e));
                tag.attrs.push(Kv {
                    k: "target".to_string(),
                    v: target.to_string(),
                    key_offsets: None,
                    value_offsets: Some(Tsr::new(ts, ts + target.len())),
                });
                tag.attrs.extend(args);
                Token::SelfClosing(tag)
            }

        rule tpl_arg_kv() -> Kv
            = "|" ks:position!() k:$(key_atom()+) "=" vs:position!() v:$(arg_atom()*) ve:position!() {
                Kv {
                    k: k.to_string(),
                    v: v.to_string(),
                    key_offsets: Some(Tsr::new(ks, ks + k.len())),
                    value_offsets: Some(Tsr::new(vs, ve)),
                }
            }
            / "|" vs:position!() v:$(arg_atom()*) ve:position!() {
                Kv {
                    k: String::new(),
                    v: v.to_string(),
                    key_offsets: None,
                    value_offsets: Some(Tsr::new(vs, ve)),
                }
            }

        rule template_arg() -> Token
            = s:position!() "{{{" ns:position!() name:$(tplarg_atom()*)
              default:("|" ds:position!() d:$(tplarg_atom()*) { (ds, d) })?
              "}}}" e:position!() {
                let mut tag = TagData::new("templatearg", DataAttribs::from_tsr(s, e));
                tag.attrs.push(Kv {
                    k: "name".to_string(),
                    v: name.to_string(),
                    key_offsets: None,
                    value_offsets: Some(Tsr::new(ns, ns + name.len())),
                });
                if let Some((ds, d)) = default {
                    tag.attrs.push(Kv {
                        k: "default".to_string(),
                        v: d.to_string(),
                        key_offsets: None,
                        value_offsets: Some(Tsr::new(ds, ds + d.len())),
                    });
                }
                Token::SelfClosing(tag)
            }

        // -- links ----------------------------------------------------------

        rule wikilink() -> Token
            = s:position!() "[[" target:$((!"|" !"]]" (tpl_nest() / not_eol()))*)
              content:("|" c:$((link_nest() / tpl_nest() / (!"]]" [_]))*) { c })?
              "]]" trail:$(link_trail_char()*) e:position!() {
                let mut tag = TagData::new("wikilink", DataAttribs::from_tsr(s, e));
                tag.set_attr("href", target);
                if let Some(content) = content {
                    tag.set_attr("mw:maybeContent", content);
                }
                if !trail.is_empty() {
                    tag.set_attr("trail", trail);
                }
                Token::SelfClosing(tag)
            }

        rule link_trail_char()
            = [c if tk.config.is_link_trail_char(c)]

        rule external_link() -> Token
            = s:position!() "[" target:$(([^ ' ' | '\t' | ']' | '\n' | '\r'])+)
              &assert_cond(tk.config.has_protocol(target))
              content:(ws()+ c:$((!"]" not_eol())*) { c })?
              "]" e:position!() {
                let mut tag = TagData::new("extlink", DataAttribs::from_tsr(s, e));
                tag.set_attr("href", target);
                if let Some(content) = content {
                    tag.set_attr("mw:content", content);
                }
                Token::SelfClosing(tag)
            }

        // -- the small stuff ------------------------------------------------

        rule entity() -> Token
            = s:position!() "&" name:$(
                  "#" ['x' | 'X']? ['0'..='9' | 'a'..='f' | 'A'..='F']+
                / ['a'..='z' | 'A'..='Z' | '0'..='9']+
              ) ";" e:position!() &assert_cond(decode_entity(name).is_some()) {
                let mut tag = TagData::new("entity", DataAttribs::from_tsr(s, e));
                tag.set_attr("value", decode_entity(name).unwrap().to_string());
                Token::SelfClosing(tag)
            }

        rule behavior_switch() -> Token
            = s:position!() "__" name:$(['a'..='z' | 'A'..='Z']+) "__" e:position!()
              &assert_cond(tk.config.is_behavior_switch(name)) {
                let mut tag = TagData::new("behavior-switch", DataAttribs::from_tsr(s, e));
                tag.set_attr("name", name.to_ascii_lowercase());
                Token::SelfClosing(tag)
            }

        rule quote_run() -> Token
            = s:position!() q:$("''" "'"*) e:position!() {
                let mut tag = TagData::new("mw-quote", DataAttribs::from_tsr(s, e));
                tag.set_attr("value", q);
                Token::SelfClosing(tag)
            }

        rule lang_variant() -> Token
            = s:position!() "-{" inner:$((!"}-" [_])*) "}-" e:position!() {
                let mut tag = TagData::new("language-variant", DataAttribs::from_tsr(s, e));
                tag.set_attr("source", inner);
                Token::SelfClosing(tag)
            }

        rule text_run() -> Token
            = t:$([^ '\n' | '\r' | '[' | ']' | '{' | '}' | '<' | '&' | '\'' | '_' | '-' | '|' | '!' | '=']+) {
                Token::Text(t.to_string())
            }

        rule fallback_char() -> Token
            = c:$(not_eol()) { Token::Text(c.to_string()) }

        rule ws()
            = [' ' | '\t']

        rule not_eol()
            = [^ '\n' | '\r']

        rule eol()
            = ['\n' | '\r'] / ![_]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        let conf = SiteConfig::wmf();
        Tokenizer::new(&conf).tokenize(source).unwrap().tokens
    }

    #[test]
    fn heading_tokens() {
        let tokens = tokenize("=Test 1 2 3=");
        assert!(matches!(&tokens[0], Token::StartTag(t) if t.name == "h1"));
        assert!(matches!(&tokens[0], Token::StartTag(t) if t.data.tsr == Some(Tsr::new(0, 1))));
        let text: String = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Test 1 2 3");
        assert!(matches!(&tokens[tokens.len() - 2], Token::EndTag(t) if t.name == "h1"));
        assert!(matches!(tokens.last(), Some(Token::Eof)));
    }

    #[test]
    fn template_token() {
        let tokens = tokenize("{{echo|foo}}");
        let Token::SelfClosing(tag) = &tokens[0] else {
            panic!("expected template token, got {tokens:?}");
        };
        assert_eq!(tag.name, "template");
        assert_eq!(tag.attr("target"), Some("echo"));
        assert_eq!(tag.attrs[1].v, "foo");
        assert_eq!(tag.data.tsr, Some(Tsr::new(0, 12)));
    }

    #[test]
    fn nested_template_args_stay_raw() {
        let tokens = tokenize("{{a|{{b|c}}|k={{d}}}}");
        let Token::SelfClosing(tag) = &tokens[0] else {
            panic!("expected template token");
        };
        assert_eq!(tag.attrs[1].v, "{{b|c}}");
        assert_eq!(tag.attrs[2].k, "k");
        assert_eq!(tag.attrs[2].v, "{{d}}");
    }

    #[test]
    fn table_tokens() {
        let tokens = tokenize("{|\n|-\n|cell\n|}");
        let names: Vec<_> = tokens
            .iter()
            .filter_map(|t| t.tag_name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["table", "tr", "td", "table"]);
    }

    #[test]
    fn cell_lines_outside_tables_are_text() {
        let tokens = tokenize("|not a cell");
        assert!(tokens.iter().all(|t| !matches!(t.tag_name(), Some("td"))));
    }

    #[test]
    fn wikilink_with_trail() {
        let tokens = tokenize("[[Foo|bar]]s rest");
        let Token::SelfClosing(tag) = &tokens[0] else {
            panic!("expected wikilink");
        };
        assert_eq!(tag.name, "wikilink");
        assert_eq!(tag.attr("href"), Some("Foo"));
        assert_eq!(tag.attr("mw:maybeContent"), Some("bar"));
        assert_eq!(tag.attr("trail"), Some("s"));
    }

    #[test]
    fn extension_tag_with_body() {
        let tokens = tokenize("<nowiki>''raw''</nowiki>");
        let Token::SelfClosing(tag) = &tokens[0] else {
            panic!("expected extension token");
        };
        assert_eq!(tag.name, "extension");
        assert_eq!(tag.attr("mw:name"), Some("nowiki"));
        assert_eq!(tag.attr("mw:body"), Some("''raw''"));
    }

    #[test]
    fn onlyinclude_flag() {
        let conf = SiteConfig::wmf();
        let out = Tokenizer::new(&conf)
            .tokenize("a<onlyinclude>b</onlyinclude>c")
            .unwrap();
        assert!(out.has_onlyinclude);
    }

    #[test]
    fn quotes_and_switches() {
        let tokens = tokenize("''i'' __TOC__");
        assert!(matches!(&tokens[0], Token::SelfClosing(t) if t.name == "mw-quote"));
        assert!(
            tokens
                .iter()
                .any(|t| matches!(t, Token::SelfClosing(tag) if tag.name == "behavior-switch"))
        );
    }

    #[test]
    fn redirect_page_prop() {
        let tokens = tokenize("#REDIRECT [[Main Page]]");
        let Token::SelfClosing(tag) = &tokens[0] else {
            panic!("expected redirect link");
        };
        assert_eq!(tag.name, "link");
        assert_eq!(tag.attr("rel"), Some("mw:PageProp/redirect"));
        assert_eq!(tag.attr("href"), Some("./Main_Page"));
    }

    #[test]
    fn unclosed_comment_runs_to_eof() {
        let tokens = tokenize("a<!-- no end");
        assert!(
            tokens
                .iter()
                .any(|t| matches!(t, Token::Comment { text, .. } if text == " no end"))
        );
    }
}
