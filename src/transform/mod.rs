//! The token transform manager and its three fixed stages.
//!
//! Each stage holds an ordered list of handlers. A handler declares interest
//! in specific token names, in every token, or in end-of-input; for each
//! inbound token the manager runs matching handlers in registration order.
//! A handler returns the token unchanged, a replacement list (which
//! continues through the *remaining* handlers of the stage), or a re-enqueue
//! request (which feeds the replacement back through the stage from the
//! beginning; this is how template expansion re-exposes its output to the
//! other stage-2 handlers).
//!
//! Ordering within a stage is authoritative; reordering changes output.

use crate::{
    env::{Env, Frame},
    pipeline::{PipelineOpts, Result},
    tokens::Token,
};
use std::{collections::VecDeque, rc::Rc};

pub(crate) mod attrs;
pub(crate) mod behavior;
pub(crate) mod extension;
pub(crate) mod include;
pub(crate) mod langvariant;
pub(crate) mod links;
pub(crate) mod lists;
pub(crate) mod paragraph;
pub(crate) mod patcher;
pub(crate) mod pre;
pub(crate) mod quotes;
pub(crate) mod sanitizer;
pub(crate) mod template;

/// What tokens a handler wants to see.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Interest {
    /// Tag tokens with one of these names.
    Names(&'static [&'static str]),
    /// Every token, including end-of-input.
    Any,
    /// Only end-of-input.
    Eof,
}

/// The outcome of one handler invocation.
#[derive(Debug)]
pub(crate) enum Transformed {
    /// The token passes through to the next handler unchanged.
    Unchanged(Token),
    /// The token is replaced; replacements continue with the next handler.
    /// An empty list drops the token.
    Replaced(Vec<Token>),
    /// The token is replaced and the replacements re-enter the stage from
    /// the first handler.
    Requeued(Vec<Token>),
}

/// Read-only context shared by every handler invocation of one pipeline
/// run.
pub(crate) struct TransformCtx<'a, 'e> {
    /// The document environment.
    pub env: &'a Env<'e>,
    /// The template expansion frame.
    pub frame: &'a Rc<Frame>,
    /// The pipeline option vector.
    pub opts: &'a PipelineOpts,
    /// The tokenizer saw an `<onlyinclude>` somewhere in the input.
    pub has_onlyinclude: bool,
}

/// A single token transformer.
pub(crate) trait TokenHandler {
    /// The handler name, for tracing.
    fn name(&self) -> &'static str;

    /// The tokens this handler wants.
    fn interest(&self) -> Interest;

    /// Transforms one token.
    fn transform(&mut self, token: Token, ctx: &TransformCtx<'_, '_>) -> Result<Transformed>;

    /// Clears accumulated state for pool reuse.
    fn reset(&mut self) {}
}

/// Returns true when `interest` covers `token`.
fn interest_matches(interest: Interest, token: &Token) -> bool {
    match interest {
        Interest::Any => true,
        Interest::Eof => matches!(token, Token::Eof),
        Interest::Names(names) => token.tag_name().is_some_and(|n| names.contains(&n)),
    }
}

/// The ordered per-stage handler lists.
pub(crate) struct TokenTransformManager {
    /// Handlers by stage.
    stages: [Vec<Box<dyn TokenHandler>>; 3],
}

impl TokenTransformManager {
    /// Runs one stage over a token buffer.
    pub fn process_stage(
        &mut self,
        tokens: Vec<Token>,
        stage: usize,
        ctx: &TransformCtx<'_, '_>,
    ) -> Result<Vec<Token>> {
        let handlers = &mut self.stages[stage];
        let mut queue: VecDeque<(Token, usize)> =
            tokens.into_iter().map(|t| (t, 0)).collect();
        let mut out = Vec::with_capacity(queue.len());

        while let Some((token, start)) = queue.pop_front() {
            let mut current = Some(token);
            let mut index = start;
            while index < handlers.len() {
                let handler = &mut handlers[index];
                let token = current.take().expect("token consumed without break");
                if !interest_matches(handler.interest(), &token) {
                    current = Some(token);
                    index += 1;
                    continue;
                }

                match handler.transform(token, ctx)? {
                    Transformed::Unchanged(token) => {
                        current = Some(token);
                        index += 1;
                    }
                    Transformed::Replaced(replacements) => {
                        for replacement in replacements.into_iter().rev() {
                            queue.push_front((replacement, index + 1));
                        }
                        break;
                    }
                    Transformed::Requeued(replacements) => {
                        for replacement in replacements.into_iter().rev() {
                            queue.push_front((replacement, 0));
                        }
                        break;
                    }
                }
            }

            if let Some(token) = current {
                out.push(token);
            }
        }

        Ok(out)
    }

    /// Clears all handler state for pool reuse.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            for handler in stage {
                handler.reset();
            }
        }
    }
}

/// Builds the manager for an option vector. Stage assignment is fixed:
/// include directives first, expansion second, stream shaping third.
pub(crate) fn build_manager(opts: &PipelineOpts) -> TokenTransformManager {
    let stage1: Vec<Box<dyn TokenHandler>> = vec![Box::new(include::IncludeDirectives::new())];

    // Attribute expansion runs after template expansion so unused branches
    // are not expanded.
    let stage2: Vec<Box<dyn TokenHandler>> = vec![
        Box::new(template::TemplateArgHandler),
        Box::new(template::TemplateHandler),
        Box::new(extension::ExtensionHandler),
        Box::new(attrs::AttributeExpander),
        Box::new(links::WikiLinkHandler),
        Box::new(links::ExternalLinkHandler::new()),
        Box::new(langvariant::LanguageVariantHandler),
        Box::new(extension::DomFragmentBuilder),
    ];

    let mut stage3: Vec<Box<dyn TokenHandler>> = vec![
        Box::new(patcher::TokenStreamPatcher::new()),
        Box::new(pre::PreHandler::new()),
        Box::new(quotes::QuoteTransformer::new()),
        Box::new(behavior::BehaviorSwitchHandler),
        Box::new(lists::ListHandler::new()),
        Box::new(sanitizer::Sanitizer),
    ];
    if !opts.inline_context {
        stage3.push(Box::new(paragraph::ParagraphWrapper::new()));
    }

    TokenTransformManager {
        stages: [stage1, stage2, stage3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
        tokens::{DataAttribs, TagData},
    };

    /// Replaces every `x` tag with two text tokens.
    struct Doubler;

    impl TokenHandler for Doubler {
        fn name(&self) -> &'static str {
            "doubler"
        }

        fn interest(&self) -> Interest {
            Interest::Names(&["x"])
        }

        fn transform(&mut self, _token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
            Ok(Transformed::Replaced(vec![
                Token::Text("a".to_string()),
                Token::Text("b".to_string()),
            ]))
        }
    }

    /// Upper-cases every text token exactly once.
    struct Upper;

    impl TokenHandler for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn interest(&self) -> Interest {
            Interest::Any
        }

        fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
            Ok(match token {
                Token::Text(t) => Transformed::Unchanged(Token::Text(t.to_uppercase())),
                other => Transformed::Unchanged(other),
            })
        }
    }

    #[test]
    fn replacements_continue_at_the_next_handler() {
        let stage: Vec<Box<dyn TokenHandler>> = vec![Box::new(Doubler), Box::new(Upper)];
        let mut manager = TokenTransformManager {
            stages: [stage, vec![], vec![]],
        };
        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        let frame = Frame::root("Test");
        let ctx = TransformCtx {
            env: &env,
            frame: &frame,
            opts: &PipelineOpts::default(),
            has_onlyinclude: false,
        };

        let tokens = vec![
            Token::SelfClosing(TagData::new("x", DataAttribs::default())),
            Token::Eof,
        ];
        let out = manager.process_stage(tokens, 0, &ctx).unwrap();
        assert_eq!(
            out,
            vec![
                Token::Text("A".to_string()),
                Token::Text("B".to_string()),
                Token::Eof,
            ]
        );
    }
}
