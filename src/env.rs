//! The per-document environment: page configuration, the data-access
//! collaborator, id counters, and cross-pass scratch state.

use crate::{
    config::{Dir, SiteConfig},
    dom::Document,
    pipeline::{Error, Pipeline, PipelineCache, PipelineOpts, Recipe, Result},
};
use indexmap::IndexMap;
use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
};

/// The maximum template expansion depth before a stack overflow error is
/// raised. Mirrors the MediaWiki default.
const MAX_TEMPLATE_DEPTH: u32 = 40;

/// Per-page input configuration.
#[derive(Clone, Debug, Default)]
pub(crate) struct PageConfig {
    /// The page title.
    pub title: String,
    /// The revision being parsed, if known.
    pub revision_id: Option<u64>,
    /// The page content language.
    pub lang: Option<String>,
    /// The page content direction.
    pub dir: Option<Dir>,
    /// The wikitext source of the page.
    pub source: String,
}

/// Media metadata returned by the data-access collaborator.
#[derive(Clone, Debug, Default)]
pub(crate) struct MediaInfo {
    /// The media file URL.
    pub url: String,
    /// Pixel width, when known.
    pub width: Option<u32>,
    /// Pixel height, when known.
    pub height: Option<u32>,
}

/// The result of asking the data-access collaborator to parse wikitext
/// externally, used for extension tags with no native implementation.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExternalParse {
    /// The rendered HTML.
    pub html: String,
    /// Modules the rendering depends on.
    pub modules: Vec<String>,
    /// Style modules the rendering depends on.
    pub modulestyles: Vec<String>,
    /// Categories the rendering added.
    pub categories: Vec<String>,
}

/// The data-access collaborator. Supplies template sources, media metadata,
/// and an external parser for unrecognized extension content.
///
/// All methods are blocking; they are the pipeline’s only suspension points.
pub(crate) trait DataAccess {
    /// Fetches the wikitext source of a template page, or `None` if the page
    /// does not exist.
    fn template_source(&self, title: &str) -> Result<Option<String>>;

    /// Parses wikitext through an external service. `None` means no service
    /// is available and the caller should fall back.
    fn parse_wikitext(&self, _page: &PageConfig, _source: &str) -> Result<Option<ExternalParse>> {
        Ok(None)
    }

    /// Fetches media metadata for a batch of file titles.
    fn media_info(&self, _titles: &[String]) -> Result<HashMap<String, MediaInfo>> {
        Ok(HashMap::new())
    }

    /// Reports which of a batch of page titles exist, for red-link
    /// annotation.
    fn page_exists(&self, _titles: &[String]) -> Result<HashMap<String, bool>> {
        Ok(HashMap::new())
    }
}

/// A data-access implementation with no backing store. Used by the offline
/// CLI; every template resolves to a missing page.
pub(crate) struct NullDataAccess;

impl DataAccess for NullDataAccess {
    fn template_source(&self, _title: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A template expansion stack frame.
///
/// Frames carry the raw wikitext of the arguments passed by the caller so
/// `{{{param}}}` references in the template body can be substituted, and
/// chain to their parent for loop detection.
#[derive(Debug)]
pub(crate) struct Frame {
    /// The title of the page this frame is expanding.
    pub title: String,
    /// Arguments passed by the caller, keyed by name or ordinal.
    pub args: IndexMap<String, String>,
    /// The calling frame.
    pub parent: Option<Rc<Frame>>,
    /// Expansion depth, root = 0.
    pub depth: u32,
}

impl Frame {
    /// Creates the root frame for a page.
    pub fn root(title: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            title: title.into(),
            args: IndexMap::new(),
            parent: None,
            depth: 0,
        })
    }

    /// Creates a child frame for a template call.
    ///
    /// Loop detection does not apply to the root page title, so pages that
    /// demonstrate their own template output keep working.
    pub fn push(
        self: &Rc<Self>,
        title: impl Into<String>,
        args: IndexMap<String, String>,
    ) -> Result<Rc<Self>> {
        let title = title.into();
        if self.depth + 1 > MAX_TEMPLATE_DEPTH {
            return Err(Error::StackOverflow(title));
        }

        let mut frame = Some(self);
        while let Some(f) = frame {
            if f.parent.is_some() && f.title == title {
                return Err(Error::TemplateRecursion(title));
            }
            frame = f.parent.as_ref();
        }

        Ok(Rc::new(Self {
            title,
            args,
            parent: Some(Rc::clone(self)),
            depth: self.depth + 1,
        }))
    }

    /// Looks up an argument by key.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

/// Document-scoped processing options, mostly surfaced from the CLI.
#[derive(Clone, Debug)]
pub(crate) struct EnvOptions {
    /// Wrap sections in `<section>` elements.
    pub wrap_sections: bool,
    /// Normalize wikitext during serialization comparisons.
    pub scrub_wikitext: bool,
    /// Annotate links to missing pages.
    pub red_links: bool,
    /// Convert the document to this language variant.
    pub variant: Option<String>,
    /// Emit per-pass timing trace messages.
    pub trace_time: bool,
    /// Pass shortcuts whose pre/post DOM should be dumped for debugging.
    pub dump: Vec<String>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            wrap_sections: true,
            scrub_wikitext: false,
            red_links: false,
            variant: None,
            trace_time: false,
            dump: vec![],
        }
    }
}

/// The per-document environment threaded through every stage and pass.
///
/// Mutable pieces use interior mutability because the environment is shared
/// immutably across nested pipelines within a single document task.
pub(crate) struct Env<'a> {
    /// The site configuration.
    pub conf: &'a SiteConfig,
    /// The data-access collaborator.
    pub data: &'a dyn DataAccess,
    /// The page being processed.
    pub page: PageConfig,
    /// Processing options.
    pub options: EnvOptions,
    /// The next transclusion about-id ordinal.
    about_counter: Cell<u32>,
    /// The next DOM fragment id ordinal.
    fragment_counter: Cell<u32>,
    /// Built DOM fragments tunnelled through the token stream, keyed by
    /// fragment id.
    fragments: RefCell<HashMap<String, Document>>,
    /// Behavior switches seen on the page, e.g. `notoc`.
    switches: RefCell<HashSet<String>>,
    /// Categories collected from category links, in order.
    categories: RefCell<Vec<String>>,
    /// The per-document pipeline pool.
    pipelines: RefCell<PipelineCache>,
    /// Heading ids assigned so far, for deduplication.
    pub seen_ids: RefCell<HashSet<String>>,
}

impl<'a> Env<'a> {
    /// Creates an environment for one document.
    pub fn new(
        conf: &'a SiteConfig,
        data: &'a dyn DataAccess,
        page: PageConfig,
        options: EnvOptions,
    ) -> Self {
        Self {
            conf,
            data,
            page,
            options,
            about_counter: Cell::new(0),
            fragment_counter: Cell::new(0),
            fragments: RefCell::new(HashMap::new()),
            switches: RefCell::new(HashSet::new()),
            categories: RefCell::new(Vec::new()),
            pipelines: RefCell::new(PipelineCache::default()),
            seen_ids: RefCell::new(HashSet::new()),
        }
    }

    /// Checks a pipeline out of the per-document pool.
    pub fn checkout_pipeline(&self, recipe: Recipe, opts: &PipelineOpts) -> Pipeline {
        self.pipelines.borrow_mut().checkout(recipe, opts)
    }

    /// Returns a pipeline to the per-document pool.
    pub fn checkin_pipeline(&self, pipeline: Pipeline) {
        self.pipelines.borrow_mut().checkin(pipeline);
    }

    /// Allocates the next document-unique transclusion about-id.
    pub fn new_about_id(&self) -> String {
        let next = self.about_counter.get() + 1;
        self.about_counter.set(next);
        format!("#mwt{next}")
    }

    /// Stores a built DOM fragment and returns its tunnelling id.
    pub fn add_fragment(&self, fragment: Document) -> String {
        let next = self.fragment_counter.get() + 1;
        self.fragment_counter.set(next);
        let id = format!("mwf{next}");
        self.fragments.borrow_mut().insert(id.clone(), fragment);
        id
    }

    /// Removes and returns a stored DOM fragment.
    pub fn take_fragment(&self, id: &str) -> Option<Document> {
        self.fragments.borrow_mut().remove(id)
    }

    /// Records a behavior switch.
    pub fn set_switch(&self, name: &str) {
        self.switches.borrow_mut().insert(name.to_ascii_lowercase());
    }

    /// Returns true if a behavior switch was seen on the page.
    pub fn has_switch(&self, name: &str) -> bool {
        self.switches.borrow().contains(name)
    }

    /// Records a category link.
    pub fn add_category(&self, name: &str) {
        self.categories.borrow_mut().push(name.to_string());
    }

    /// The categories collected so far, in document order.
    pub fn categories(&self) -> Vec<String> {
        self.categories.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_loop_detection() {
        let root = Frame::root("Page");
        let a = root.push("Template:A", IndexMap::new()).unwrap();
        let b = a.push("Template:B", IndexMap::new()).unwrap();
        assert!(matches!(
            b.push("Template:A", IndexMap::new()),
            Err(Error::TemplateRecursion(_))
        ));
        // Looping back to the root page is allowed.
        assert!(b.push("Page", IndexMap::new()).is_ok());
    }

    #[test]
    fn frame_depth_limit() {
        let mut frame = Frame::root("Page");
        for depth in 0..MAX_TEMPLATE_DEPTH {
            frame = frame
                .push(format!("Template:D{depth}"), IndexMap::new())
                .unwrap();
        }
        assert!(matches!(
            frame.push("Template:Deep", IndexMap::new()),
            Err(Error::StackOverflow(_))
        ));
    }

    #[test]
    fn about_ids_are_sequential() {
        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );
        assert_eq!(env.new_about_id(), "#mwt1");
        assert_eq!(env.new_about_id(), "#mwt2");
    }
}
