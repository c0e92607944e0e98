//! Stage-3 indent-pre handling.
//!
//! A line beginning with a space opens a preformatted block, unless the
//! line is whitespace-only or the stream is inside block markup. Decisions
//! need one line of lookahead, so candidate lines are buffered until their
//! terminating newline.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token},
};

/// Tags whose interior never opens an indent-pre.
fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "table" | "tr" | "td" | "th" | "caption" | "ul" | "ol" | "dl" | "li" | "dt" | "dd"
            | "pre" | "blockquote"
    )
}

/// Where the handler is in its line state machine.
#[derive(Debug)]
enum State {
    /// At start of line, no pre open.
    Sol,
    /// Mid-line, no pre open.
    Normal,
    /// Buffering a space-opened line until its newline decides.
    Candidate(Vec<Token>),
    /// Inside an open indent-pre, at start of line.
    PreSol,
    /// Inside an open indent-pre, mid-line.
    Pre,
}

/// Converts space-indented lines into `<pre>` blocks.
pub(crate) struct PreHandler {
    /// The state machine position.
    state: State,
    /// Nesting depth of block tags, which suppress indent-pre.
    block_depth: usize,
}

impl PreHandler {
    /// Creates the handler.
    pub fn new() -> Self {
        Self {
            state: State::Sol,
            block_depth: 0,
        }
    }

    /// True when everything buffered is whitespace text.
    fn buffer_is_whitespace(buf: &[Token]) -> bool {
        buf.iter().all(|t| match t {
            Token::Text(t) => t.trim().is_empty(),
            Token::Comment { .. } => true,
            _ => false,
        })
    }
}

impl TokenHandler for PreHandler {
    fn name(&self) -> &'static str {
        "pre"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        match &token {
            Token::StartTag(tag) if is_block_tag(&tag.name) => {
                self.block_depth += 1;
            }
            Token::EndTag(tag) if is_block_tag(&tag.name) => {
                self.block_depth = self.block_depth.saturating_sub(1);
            }
            _ => {}
        }

        let state = core::mem::replace(&mut self.state, State::Normal);
        let out = match state {
            State::Sol => match token {
                Token::Text(text)
                    if text.starts_with(' ') && self.block_depth == 0 =>
                {
                    let rest = text[1..].to_string();
                    self.state = State::Candidate(if rest.is_empty() {
                        vec![]
                    } else {
                        vec![Token::Text(rest)]
                    });
                    return Ok(Transformed::Replaced(vec![]));
                }
                Token::Newline(_) => {
                    self.state = State::Sol;
                    Transformed::Unchanged(token)
                }
                Token::Eof => {
                    self.state = State::Sol;
                    Transformed::Unchanged(token)
                }
                other => {
                    self.state = State::Normal;
                    Transformed::Unchanged(other)
                }
            },
            State::Normal => match token {
                Token::Newline(_) => {
                    self.state = State::Sol;
                    Transformed::Unchanged(token)
                }
                other => {
                    self.state = State::Normal;
                    Transformed::Unchanged(other)
                }
            },
            State::Candidate(mut buf) => match token {
                Token::Newline(_) | Token::Eof => {
                    let at_eof = matches!(token, Token::Eof);
                    if Self::buffer_is_whitespace(&buf) {
                        // A whitespace-only indented line does not open a
                        // pre; replay it with the space restored.
                        let mut out = vec![Token::Text(" ".to_string())];
                        out.extend(buf);
                        out.push(token);
                        self.state = State::Sol;
                        Transformed::Replaced(out)
                    } else {
                        let mut pre = TagData::new("pre", DataAttribs::default());
                        pre.data.stx = Some("dented");
                        let mut out = vec![Token::StartTag(pre)];
                        out.extend(buf.drain(..));
                        if at_eof {
                            out.push(Token::EndTag(TagData::new("pre", DataAttribs::default())));
                            out.push(token);
                            self.state = State::Sol;
                        } else {
                            out.push(token);
                            self.state = State::PreSol;
                        }
                        Transformed::Replaced(out)
                    }
                }
                other => {
                    buf.push(other);
                    self.state = State::Candidate(buf);
                    return Ok(Transformed::Replaced(vec![]));
                }
            },
            State::PreSol => match token {
                Token::Text(text) if text.starts_with(' ') => {
                    self.state = State::Pre;
                    Transformed::Unchanged(Token::Text(text[1..].to_string()))
                }
                Token::Newline(_) => {
                    // A blank line inside a pre is preserved.
                    self.state = State::PreSol;
                    Transformed::Unchanged(token)
                }
                other => {
                    self.state = if matches!(other, Token::Eof) {
                        State::Sol
                    } else {
                        State::Normal
                    };
                    let mut out =
                        vec![Token::EndTag(TagData::new("pre", DataAttribs::default()))];
                    out.push(other);
                    Transformed::Replaced(out)
                }
            },
            State::Pre => match token {
                Token::Newline(_) => {
                    self.state = State::PreSol;
                    Transformed::Unchanged(token)
                }
                Token::Eof => {
                    self.state = State::Sol;
                    Transformed::Replaced(vec![
                        Token::EndTag(TagData::new("pre", DataAttribs::default())),
                        token,
                    ])
                }
                other => {
                    self.state = State::Pre;
                    Transformed::Unchanged(other)
                }
            },
        };
        Ok(out)
    }

    fn reset(&mut self) {
        self.state = State::Sol;
        self.block_depth = 0;
    }
}
