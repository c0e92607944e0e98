//! Stage-3 attribute sanitization: event handler attributes and script
//! URLs never reach the DOM.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{TagData, Token},
};

/// True when an attribute value smuggles a script URL, after stripping the
/// whitespace and control characters browsers ignore.
fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:") || compact.starts_with("vbscript:")
}

/// Strips unsafe attributes from tag tokens.
pub(crate) struct Sanitizer;

impl Sanitizer {
    /// Removes unsafe attributes in place.
    fn sanitize(tag: &mut TagData) {
        tag.attrs.retain(|kv| {
            if kv.k.len() > 2 && kv.k.to_ascii_lowercase().starts_with("on") {
                log::warn!("dropping event handler attribute {}", kv.k);
                return false;
            }
            if matches!(kv.k.as_str(), "href" | "src" | "action") && is_script_url(&kv.v) {
                log::warn!("dropping script URL in {}", kv.k);
                return false;
            }
            true
        });
    }
}

impl TokenHandler for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitizer"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        Ok(match token {
            Token::StartTag(mut tag) => {
                Self::sanitize(&mut tag);
                Transformed::Unchanged(Token::StartTag(tag))
            }
            Token::SelfClosing(mut tag) => {
                Self::sanitize(&mut tag);
                Transformed::Unchanged(Token::SelfClosing(tag))
            }
            other => Transformed::Unchanged(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{DataAttribs, Kv};

    #[test]
    fn strips_event_handlers_and_script_urls() {
        let mut tag = TagData::new("a", DataAttribs::default());
        tag.attrs.push(Kv::new("onclick", "alert(1)"));
        tag.attrs.push(Kv::new("href", "java\nscript:alert(1)"));
        tag.attrs.push(Kv::new("title", "fine"));
        Sanitizer::sanitize(&mut tag);
        assert_eq!(tag.attrs.len(), 1);
        assert_eq!(tag.attrs[0].k, "title");
    }
}
