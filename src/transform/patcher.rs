//! Stage-3 token stream patching.
//!
//! Catches stream shapes that are only invalid after expansion: list
//! bullets that ended up mid-line revert to plain text, and empty text
//! tokens are dropped.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token},
};

/// Repairs out-of-position tokens after expansion.
pub(crate) struct TokenStreamPatcher {
    /// The stream is at start-of-line.
    sol: bool,
}

impl TokenStreamPatcher {
    /// Creates the patcher.
    pub fn new() -> Self {
        Self { sol: true }
    }
}

impl TokenHandler for TokenStreamPatcher {
    fn name(&self) -> &'static str {
        "token-stream-patcher"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let was_sol = self.sol;
        self.sol = matches!(token, Token::Newline(_));

        match &token {
            Token::Text(text) if text.is_empty() => Ok(Transformed::Replaced(vec![])),
            Token::SelfClosing(tag) if tag.name == "listitem" && !was_sol => {
                let bullets = tag.attr("bullets").unwrap_or("").to_string();
                Ok(Transformed::Replaced(vec![Token::Text(bullets)]))
            }
            Token::SelfClosing(tag) if tag.name == "entity" => {
                // Decoded entities keep their source form recoverable via a
                // typed span.
                let value = tag.attr("value").unwrap_or("").to_string();
                let mut span = TagData::new("span", DataAttribs::default());
                span.data.tsr = tag.data.tsr;
                span.set_attr("typeof", "mw:Entity");
                Ok(Transformed::Replaced(vec![
                    Token::StartTag(span),
                    Token::Text(value),
                    Token::EndTag(TagData::new("span", DataAttribs::default())),
                ]))
            }
            Token::Comment { .. } => {
                // Comments are start-of-line transparent.
                self.sol = was_sol;
                Ok(Transformed::Unchanged(token))
            }
            _ => Ok(Transformed::Unchanged(token)),
        }
    }

    fn reset(&mut self) {
        self.sol = true;
    }
}
