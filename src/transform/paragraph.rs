//! Stage-3 paragraph wrapping.
//!
//! Top-level inline runs get wrapped in `<p>`; a blank line starts a new
//! paragraph. Comments, metas, and category links are start-of-line
//! transparent: they buffer with the pending newlines and never open a
//! paragraph on their own.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token},
};

/// Tags that close an open paragraph and are never wrapped in one.
fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "table" | "tr" | "td" | "th" | "caption" | "ul" | "ol" | "dl" | "li" | "dt"
            | "dd" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "pre" | "blockquote" | "div"
            | "hr" | "center" | "figure" | "section"
    )
}

/// True for tokens that are transparent at start-of-line.
fn is_sol_transparent(token: &Token) -> bool {
    match token {
        Token::Comment { .. } => true,
        Token::SelfClosing(tag) => matches!(tag.name.as_str(), "meta" | "link"),
        Token::Text(text) => text.chars().all(|c| c == ' ' || c == '\t'),
        _ => false,
    }
}

/// Wraps stray inline content in paragraphs.
pub(crate) struct ParagraphWrapper {
    /// A paragraph is open.
    in_p: bool,
    /// Nesting depth of block elements; content inside them is not
    /// wrapped.
    block_depth: usize,
    /// Newlines and start-of-line-transparent tokens held until real
    /// content decides where they land.
    pending: Vec<Token>,
}

impl ParagraphWrapper {
    /// Creates the wrapper.
    pub fn new() -> Self {
        Self {
            in_p: false,
            block_depth: 0,
            pending: vec![],
        }
    }

    /// How many newlines are currently pending.
    fn pending_newlines(&self) -> usize {
        self.pending
            .iter()
            .filter(|t| matches!(t, Token::Newline(_)))
            .count()
    }

    /// Closes an open paragraph into `out`.
    fn close_p(&mut self, out: &mut Vec<Token>) {
        if self.in_p {
            out.push(Token::EndTag(TagData::new("p", DataAttribs::default())));
            self.in_p = false;
        }
    }
}

impl TokenHandler for ParagraphWrapper {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        // Inside block markup nothing is wrapped; pass tokens straight
        // through, keeping depth current.
        if self.block_depth > 0 {
            match &token {
                Token::StartTag(tag) if is_block_tag(&tag.name) => self.block_depth += 1,
                Token::EndTag(tag) if is_block_tag(&tag.name) => {
                    self.block_depth = self.block_depth.saturating_sub(1);
                }
                _ => {}
            }
            return Ok(Transformed::Unchanged(token));
        }

        match token {
            Token::StartTag(ref tag) if is_block_tag(&tag.name) => {
                let mut out = vec![];
                self.close_p(&mut out);
                out.append(&mut self.pending);
                self.block_depth += 1;
                out.push(token);
                Ok(Transformed::Replaced(out))
            }
            Token::EndTag(ref tag) if is_block_tag(&tag.name) => {
                let mut out = vec![];
                self.close_p(&mut out);
                out.append(&mut self.pending);
                out.push(token);
                Ok(Transformed::Replaced(out))
            }
            Token::SelfClosing(ref tag) if tag.name == "hr" => {
                let mut out = vec![];
                self.close_p(&mut out);
                out.append(&mut self.pending);
                out.push(token);
                Ok(Transformed::Replaced(out))
            }
            Token::Newline(_) => {
                self.pending.push(token);
                Ok(Transformed::Replaced(vec![]))
            }
            Token::Eof => {
                let mut out = vec![];
                self.close_p(&mut out);
                out.append(&mut self.pending);
                out.push(token);
                Ok(Transformed::Replaced(out))
            }
            token if is_sol_transparent(&token) => {
                if self.in_p && self.pending.is_empty() {
                    // Mid-paragraph metas and comments stay in place.
                    Ok(Transformed::Unchanged(token))
                } else {
                    self.pending.push(token);
                    Ok(Transformed::Replaced(vec![]))
                }
            }
            token => {
                let mut out = vec![];
                let blank = self.pending_newlines() >= 2;
                if self.in_p && blank {
                    self.close_p(&mut out);
                }
                if self.in_p {
                    // A single newline is paragraph-internal.
                    out.append(&mut self.pending);
                } else {
                    out.append(&mut self.pending);
                    out.push(Token::StartTag(TagData::new("p", DataAttribs::default())));
                    self.in_p = true;
                }
                out.push(token);
                Ok(Transformed::Replaced(out))
            }
        }
    }

    fn reset(&mut self) {
        self.in_p = false;
        self.block_depth = 0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tokens: Vec<Token>) -> Vec<String> {
        let mut handler = ParagraphWrapper::new();
        let conf = crate::config::SiteConfig::wmf();
        let env = crate::env::Env::new(
            &conf,
            &crate::env::NullDataAccess,
            crate::env::PageConfig::default(),
            crate::env::EnvOptions::default(),
        );
        let frame = crate::env::Frame::root("Test");
        let ctx = TransformCtx {
            env: &env,
            frame: &frame,
            opts: &crate::pipeline::PipelineOpts::default(),
            has_onlyinclude: false,
        };
        let mut out = vec![];
        for token in tokens {
            match handler.transform(token, &ctx).unwrap() {
                Transformed::Unchanged(t) => out.push(t),
                Transformed::Replaced(ts) | Transformed::Requeued(ts) => out.extend(ts),
            }
        }
        out.iter()
            .map(|t| match t {
                Token::StartTag(tag) => format!("<{}>", tag.name),
                Token::EndTag(tag) => format!("</{}>", tag.name),
                Token::Text(t) => t.clone(),
                Token::Newline(_) => "\\n".to_string(),
                Token::Eof => "EOF".to_string(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn wraps_top_level_text() {
        let out = run(vec![Token::Text("hi".to_string()), Token::Eof]);
        assert_eq!(out, vec!["<p>", "hi", "</p>", "EOF"]);
    }

    #[test]
    fn blank_line_splits_paragraphs() {
        let out = run(vec![
            Token::Text("a".to_string()),
            Token::Newline(DataAttribs::default()),
            Token::Newline(DataAttribs::default()),
            Token::Text("b".to_string()),
            Token::Eof,
        ]);
        assert_eq!(
            out,
            vec!["<p>", "a", "</p>", "\\n", "\\n", "<p>", "b", "</p>", "EOF"]
        );
    }

    #[test]
    fn block_content_is_not_wrapped() {
        let out = run(vec![
            Token::StartTag(TagData::new("h1", DataAttribs::default())),
            Token::Text("t".to_string()),
            Token::EndTag(TagData::new("h1", DataAttribs::default())),
            Token::Eof,
        ]);
        assert_eq!(out, vec!["<h1>", "t", "</h1>", "EOF"]);
    }

    #[test]
    fn metas_do_not_open_paragraphs() {
        let mut meta = TagData::new("meta", DataAttribs::default());
        meta.set_attr("typeof", "mw:Transclusion");
        let out = run(vec![
            Token::SelfClosing(meta),
            Token::Text("foo".to_string()),
            Token::Eof,
        ]);
        assert_eq!(out[1], "<p>".to_string());
        assert_eq!(out[2], "foo".to_string());
    }
}
