//! Stage-3 quote transform: `''` and `'''` runs become italic and bold
//! tags, balanced per line.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token, Tsr},
};

/// Converts quote runs into `<i>`/`<b>`, closing anything left open at each
/// line end.
pub(crate) struct QuoteTransformer {
    /// Tokens of the current line, buffered until the line ends.
    line: Vec<Token>,
    /// Whether the current line has any quote tokens; lines without any are
    /// flushed untouched.
    has_quotes: bool,
}

impl QuoteTransformer {
    /// Creates the transformer.
    pub fn new() -> Self {
        Self {
            line: vec![],
            has_quotes: false,
        }
    }

    /// Balances and flushes the buffered line, appending `end` after it.
    fn flush(&mut self, end: Token) -> Vec<Token> {
        let line = core::mem::take(&mut self.line);
        let mut out = if self.has_quotes {
            balance_line(line)
        } else {
            line
        };
        self.has_quotes = false;
        out.push(end);
        out
    }
}

/// Opens or closes `style`, repairing overlap by closing and reopening
/// intervening styles. The quote run’s source range rides on the principal
/// tag so DSR computation can see the apostrophes.
fn toggle(
    stack: &mut Vec<&'static str>,
    style: &'static str,
    tsr: Option<Tsr>,
    out: &mut Vec<Token>,
) {
    let principal = |name: &'static str| {
        let mut tag = TagData::new(name, DataAttribs::default());
        tag.data.tsr = tsr;
        tag
    };

    if let Some(pos) = stack.iter().rposition(|s| *s == style) {
        // drained[0] is `style` itself; the rest must close before it and
        // reopen after it.
        let drained: Vec<&'static str> = stack.drain(pos..).collect();
        for closed in drained.iter().skip(1).rev() {
            out.push(Token::EndTag(TagData::new(*closed, DataAttribs::default())));
        }
        out.push(Token::EndTag(principal(style)));
        for reopened in drained.into_iter().skip(1) {
            out.push(Token::StartTag(TagData::new(reopened, DataAttribs::default())));
            stack.push(reopened);
        }
    } else {
        stack.push(style);
        out.push(Token::StartTag(principal(style)));
    }
}

/// Rewrites one line’s quote runs into tags.
fn balance_line(line: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(line.len());
    let mut stack: Vec<&'static str> = vec![];

    for token in line {
        let Token::SelfClosing(tag) = &token else {
            out.push(token);
            continue;
        };
        if tag.name != "mw-quote" {
            out.push(token);
            continue;
        }

        let run = tag.attr("value").unwrap_or("").len();
        let tsr = tag.data.tsr;
        match run {
            2 => toggle(&mut stack, "i", tsr, &mut out),
            3 => toggle(&mut stack, "b", tsr, &mut out),
            4 => {
                // A lone apostrophe plus bold.
                out.push(Token::Text("'".to_string()));
                toggle(&mut stack, "b", tsr.map(|t| Tsr::new(t.start + 1, t.end)), &mut out);
            }
            n if n >= 5 => {
                if n > 5 {
                    out.push(Token::Text("'".repeat(n - 5)));
                }
                // Bold-italic; close whichever is open first so nesting
                // stays well-formed.
                let tsr = tsr.map(|t| Tsr::new(t.end.max(5) - 5, t.end));
                if stack.last() == Some(&"i") {
                    toggle(&mut stack, "i", tsr, &mut out);
                    toggle(&mut stack, "b", tsr, &mut out);
                } else {
                    toggle(&mut stack, "b", tsr, &mut out);
                    toggle(&mut stack, "i", tsr, &mut out);
                }
            }
            _ => out.push(Token::Text("'".repeat(run))),
        }
    }

    // A line end implicitly closes any unclosed text style tags.
    for style in stack.into_iter().rev() {
        out.push(Token::EndTag(TagData::new(style, DataAttribs::default())));
    }
    out
}

impl TokenHandler for QuoteTransformer {
    fn name(&self) -> &'static str {
        "quote"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        match token {
            Token::Newline(_) | Token::Eof => Ok(Transformed::Replaced(self.flush(token))),
            Token::SelfClosing(ref tag) if tag.name == "mw-quote" => {
                self.has_quotes = true;
                self.line.push(token);
                Ok(Transformed::Replaced(vec![]))
            }
            other => {
                self.line.push(other);
                Ok(Transformed::Replaced(vec![]))
            }
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.has_quotes = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(run: usize) -> Token {
        let mut tag = TagData::new("mw-quote", DataAttribs::default());
        tag.set_attr("value", "'".repeat(run));
        Token::SelfClosing(tag)
    }

    fn names(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| match t {
                Token::StartTag(tag) => format!("<{}>", tag.name),
                Token::EndTag(tag) => format!("</{}>", tag.name),
                Token::Text(t) => t.clone(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn simple_italic() {
        let out = balance_line(vec![quote(2), Token::Text("x".to_string()), quote(2)]);
        assert_eq!(names(&out), vec!["<i>", "x", "</i>"]);
    }

    #[test]
    fn bold_italic_run() {
        let out = balance_line(vec![quote(5), Token::Text("x".to_string()), quote(5)]);
        assert_eq!(names(&out), vec!["<b>", "<i>", "x", "</i>", "</b>"]);
    }

    #[test]
    fn unclosed_styles_close_at_line_end() {
        let out = balance_line(vec![quote(3), Token::Text("x".to_string())]);
        assert_eq!(names(&out), vec!["<b>", "x", "</b>"]);
    }

    #[test]
    fn overlap_is_repaired() {
        // ''a'''b''c''': italic opens, bold opens, italic closes first.
        let out = balance_line(vec![
            quote(2),
            Token::Text("a".to_string()),
            quote(3),
            Token::Text("b".to_string()),
            quote(2),
            Token::Text("c".to_string()),
            quote(3),
        ]);
        assert_eq!(
            names(&out),
            vec![
                "<i>", "a", "<b>", "b", "</b>", "</i>", "<b>", "c", "</b>"
            ]
        );
    }
}
