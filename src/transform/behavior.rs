//! Stage-3 behavior switch handling: `__TOC__` and friends are recorded on
//! the environment and replaced with page-property metas.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token},
};

/// Consumes `behavior-switch` tokens.
pub(crate) struct BehaviorSwitchHandler;

impl TokenHandler for BehaviorSwitchHandler {
    fn name(&self) -> &'static str {
        "behavior-switch"
    }

    fn interest(&self) -> Interest {
        Interest::Names(&["behavior-switch"])
    }

    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        let Token::SelfClosing(tag) = &token else {
            return Ok(Transformed::Unchanged(token));
        };

        let name = tag.attr("name").unwrap_or("").to_string();
        ctx.env.set_switch(&name);

        let mut meta = TagData::new("meta", DataAttribs::default());
        meta.data.tsr = tag.data.tsr;
        meta.set_attr("property", format!("mw:PageProp/{name}"));
        Ok(Transformed::Replaced(vec![Token::SelfClosing(meta)]))
    }
}
