//! Pipeline assembly: error types, the pipeline factory, and the per-key
//! pipeline pool.
//!
//! A pipeline is tokenizer → token transform stages → tree builder →
//! post-processor. Nested expansion contexts (template bodies, extension
//! bodies, attribute values) check pipelines out of a per-document pool
//! keyed on `(recipe, option-hash)` so handler allocations are reused.

use crate::{
    dom::{Document, serialize},
    env::{Env, Frame},
    passes,
    tokens::Token,
    tokenizer::Tokenizer,
    transform::{self, TokenTransformManager, TransformCtx},
    treebuilder,
};
use std::{collections::HashMap, rc::Rc};

/// Maximum number of pooled pipelines per cache key.
const MAX_POOL_SIZE: usize = 100;

/// An error from anywhere in the transformer.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// Malformed input that could not be recovered locally.
    #[error("client error: {0}")]
    Client(String),

    /// Pipeline misconfiguration or a violated invariant. Not recovered;
    /// aborts the document.
    #[error("internal error: {0}")]
    Internal(String),

    /// The tokenizer rejected the input.
    #[error(transparent)]
    Tokenizer(#[from] crate::tokenizer::Error),

    /// A write to a buffer failed.
    #[error("fmt error: {0}")]
    Fmt(#[from] core::fmt::Error),

    /// A side-table record failed to serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A native extension implementation failed.
    #[error(transparent)]
    Extension(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Too many nested template calls.
    #[error("template stack overflow: {0}")]
    StackOverflow(String),

    /// A template transcluded itself.
    ///
    /// Loop detection must not apply to the root page, which is how pages
    /// demonstrate their own template output.
    #[error("template loop detected: {0}")]
    TemplateRecursion(String),

    /// An uncaught error inside a post-process pass. Post-processing stops
    /// and the partial DOM is not emitted.
    #[error("fatal error in pass {pass}: {err}")]
    Pass {
        /// The pass shortcut.
        pass: &'static str,
        /// The underlying error.
        #[source]
        err: Box<Error>,
    },
}

/// The standard result type used by all fallible transformer functions.
pub(crate) type Result<T = (), E = Error> = core::result::Result<T, E>;

/// What a pipeline produces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum Recipe {
    /// Wikitext to an expanded token stream: stages 1 and 2 only. Used for
    /// template bodies and attribute values, whose output re-enters the
    /// caller’s stream.
    Tokens,
    /// Wikitext to a post-processed DOM: all three stages, tree building,
    /// and the nested-capable subset of post-processing passes.
    Dom,
}

/// The option vector a pipeline is specialized on. Part of the cache key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PipelineOpts {
    /// The source is being processed in include (transclusion) mode.
    pub is_include: bool,
    /// Expand templates rather than passing them through as raw text.
    pub expand_templates: bool,
    /// The content is inline; paragraph wrapping is suppressed.
    pub inline_context: bool,
    /// The content is inside an HTML-syntax block element.
    pub in_php_block: bool,
    /// The pipeline is expanding a template body.
    pub in_template: bool,
    /// The pipeline is expanding an attribute value.
    pub attr_expansion: bool,
    /// The pipeline is expanding the body of this extension tag.
    pub ext_tag: Option<String>,
    /// Extension-specific options.
    pub ext_tag_opts: Option<serde_json::Value>,
}

impl PipelineOpts {
    /// The pool key for this option vector.
    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            u8::from(self.is_include),
            u8::from(self.expand_templates),
            u8::from(self.inline_context),
            u8::from(self.in_php_block),
            u8::from(self.in_template),
            u8::from(self.attr_expansion),
            self.ext_tag.as_deref().unwrap_or(""),
            self.ext_tag_opts
                .as_ref()
                .map(serde_json::Value::to_string)
                .unwrap_or_default(),
        )
    }
}

/// One assembled pipeline.
pub(crate) struct Pipeline {
    /// A fresh id per checkout, for tracing.
    id: u32,
    /// What this pipeline produces.
    recipe: Recipe,
    /// The option vector the stages were built for.
    opts: PipelineOpts,
    /// The staged token transform manager.
    manager: TokenTransformManager,
}

impl Pipeline {
    /// Builds a pipeline for the given recipe and options.
    fn new(id: u32, recipe: Recipe, opts: PipelineOpts) -> Self {
        let manager = transform::build_manager(&opts);
        Self {
            id,
            recipe,
            opts,
            manager,
        }
    }

    /// Runs the token stages over `source` and returns the expanded stream.
    /// The trailing [`Token::Eof`] is preserved.
    pub fn run_to_tokens(
        &mut self,
        env: &Env<'_>,
        frame: &Rc<Frame>,
        source: &str,
    ) -> Result<Vec<Token>> {
        log::trace!(
            target: "trace/pipeline",
            "pipeline {} ({:?}) expanding {} bytes",
            self.id,
            self.recipe,
            source.len()
        );
        let output = Tokenizer::new(env.conf).tokenize(source)?;
        let ctx = TransformCtx {
            env,
            frame,
            opts: &self.opts,
            has_onlyinclude: output.has_onlyinclude,
        };
        let tokens = self.manager.process_stage(output.tokens, 0, &ctx)?;
        self.manager.process_stage(tokens, 1, &ctx)
    }

    /// Runs the full pipeline over `source` and returns the DOM.
    pub fn run_to_dom(
        &mut self,
        env: &Env<'_>,
        frame: &Rc<Frame>,
        source: &str,
        at_top_level: bool,
    ) -> Result<Document> {
        let output = Tokenizer::new(env.conf).tokenize(source)?;
        let ctx = TransformCtx {
            env,
            frame,
            opts: &self.opts,
            has_onlyinclude: output.has_onlyinclude,
        };
        let mut tokens = output.tokens;
        for stage in 0..3 {
            tokens = self.manager.process_stage(tokens, stage, &ctx)?;
        }

        let mut doc = treebuilder::build(tokens, at_top_level);
        passes::run(&mut doc, env, &self.opts, at_top_level)?;
        Ok(doc)
    }

    /// Clears handler state for pool reuse.
    fn reset(&mut self) {
        self.manager.reset();
    }
}

/// The per-document pipeline pool.
#[derive(Default)]
pub(crate) struct PipelineCache {
    /// Idle pipelines by cache key.
    pools: HashMap<(Recipe, String), Vec<Pipeline>>,
    /// The next pipeline checkout id.
    next_id: u32,
}

impl PipelineCache {
    /// Checks a pipeline out of the pool, building one on a miss. The
    /// returned pipeline carries a fresh id either way.
    pub fn checkout(&mut self, recipe: Recipe, opts: &PipelineOpts) -> Pipeline {
        self.next_id += 1;
        let key = (recipe, opts.cache_key());
        if let Some(mut pipeline) = self.pools.get_mut(&key).and_then(Vec::pop) {
            pipeline.reset();
            pipeline.id = self.next_id;
            pipeline
        } else {
            Pipeline::new(self.next_id, recipe, opts.clone())
        }
    }

    /// Returns a pipeline to the pool.
    pub fn checkin(&mut self, pipeline: Pipeline) {
        let key = (pipeline.recipe, pipeline.opts.cache_key());
        let pool = self.pools.entry(key).or_default();
        if pool.len() < MAX_POOL_SIZE {
            pool.push(pipeline);
        }
    }
}

/// Parses the environment’s page to a finished document: the top-level
/// entry point of the wikitext-to-HTML direction.
pub(crate) fn parse_document(env: &Env<'_>) -> Result<Document> {
    let opts = PipelineOpts {
        expand_templates: true,
        ..PipelineOpts::default()
    };
    let mut pipeline = env.checkout_pipeline(Recipe::Dom, &opts);
    let frame = Frame::root(env.page.title.clone());
    let source = env.page.source.clone();
    let result = pipeline.run_to_dom(env, &frame, &source, true);
    env.checkin_pipeline(pipeline);
    let mut doc = result?;
    serialize::finalize_metadata(&mut doc, env);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_reuses_pipelines_with_fresh_ids() {
        let mut cache = PipelineCache::default();
        let opts = PipelineOpts::default();
        let first = cache.checkout(Recipe::Tokens, &opts);
        let first_id = first.id;
        cache.checkin(first);
        let second = cache.checkout(Recipe::Tokens, &opts);
        assert_ne!(first_id, second.id);

        let other = cache.checkout(
            Recipe::Tokens,
            &PipelineOpts {
                is_include: true,
                ..PipelineOpts::default()
            },
        );
        assert_ne!(second.id, other.id);
    }
}
