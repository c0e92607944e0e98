//! Stage-1 handler for the inclusion control directives `<noinclude>`,
//! `<includeonly>`, and `<onlyinclude>`.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{pipeline::Result, tokens::Token};

/// An inclusion control mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    /// Content shown only when not transcluded.
    NoInclude,
    /// Content shown only when transcluded.
    IncludeOnly,
    /// Content shown only when transcluded; everything outside behaves as if
    /// wrapped in `<noinclude>`.
    OnlyInclude,
}

impl Mode {
    /// Maps a directive tag name to its mode.
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "noinclude" => Some(Mode::NoInclude),
            "includeonly" => Some(Mode::IncludeOnly),
            "onlyinclude" => Some(Mode::OnlyInclude),
            _ => None,
        }
    }
}

/// Drops token regions excluded by the inclusion control rules and strips
/// the directive tags themselves.
pub(crate) struct IncludeDirectives {
    /// The open directive stack.
    stack: Vec<Mode>,
}

impl IncludeDirectives {
    /// Creates the handler.
    pub fn new() -> Self {
        Self { stack: vec![] }
    }

    /// Whether the current token position is excluded.
    fn skipped(&self, ctx: &TransformCtx<'_, '_>) -> bool {
        let current = self.stack.last().copied();
        if ctx.opts.is_include {
            match current {
                Some(Mode::NoInclude) => true,
                Some(Mode::IncludeOnly | Mode::OnlyInclude) => false,
                // With an <onlyinclude> present, everything outside one is
                // implicitly <noinclude> content.
                None => ctx.has_onlyinclude,
            }
        } else {
            matches!(current, Some(Mode::IncludeOnly))
        }
    }
}

impl TokenHandler for IncludeDirectives {
    fn name(&self) -> &'static str {
        "include-directives"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        match &token {
            Token::StartTag(tag) => {
                if let Some(mode) = Mode::from_name(&tag.name) {
                    self.stack.push(mode);
                    return Ok(Transformed::Replaced(vec![]));
                }
            }
            Token::EndTag(tag) => {
                if let Some(mode) = Mode::from_name(&tag.name) {
                    if self.stack.last() == Some(&mode) {
                        self.stack.pop();
                    } else {
                        log::warn!("unbalanced </{}> directive", tag.name);
                    }
                    return Ok(Transformed::Replaced(vec![]));
                }
            }
            Token::SelfClosing(tag) => {
                // A self-closing directive opens and closes an empty region.
                if Mode::from_name(&tag.name).is_some() {
                    return Ok(Transformed::Replaced(vec![]));
                }
            }
            Token::Eof => {
                // An unterminated directive runs to end of input.
                self.stack.clear();
                return Ok(Transformed::Unchanged(token));
            }
            _ => {}
        }

        if self.skipped(ctx) {
            Ok(Transformed::Replaced(vec![]))
        } else {
            Ok(Transformed::Unchanged(token))
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
    }
}
