//! Site configuration.
//!
//! Wikitext documents are not self-encapsulated and cannot be parsed without
//! out-of-band configuration data: extension tag names, behavior switch
//! words, URI schemes, link trail rules, namespace names, and the native
//! extension registry. A [`SiteConfig`] bundles all of it; [`SiteConfig::wmf`]
//! builds the default Wikimedia-shaped configuration.

use crate::{
    dom::Document,
    env::Env,
    pipeline::Result,
    tokens::Kv,
    transform::extension::{ext_nowiki, ext_pre},
};
use regex::Regex;

/// HTML5 tags that are allowed to appear literally in wikitext.
pub(crate) static HTML5_TAGS: phf::Set<&str> = phf::phf_set! {
    "a", "abbr", "b", "bdi", "bdo", "big", "blockquote", "br", "caption",
    "center", "cite", "code", "data", "dd", "del", "dfn", "div", "dl", "dt",
    "em", "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "ins", "kbd",
    "li", "link", "mark", "meta", "ol", "p", "pre", "q", "rb", "rp", "rt",
    "rtc", "ruby", "s", "samp", "small", "span", "strike", "strong", "sub",
    "sup", "table", "td", "th", "time", "tr", "tt", "u", "ul", "var", "wbr",
};

/// Void HTML5 tags.
pub(crate) static VOID_TAGS: phf::Set<&str> = phf::phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img",
    "input", "link", "meta", "param", "source",
    "track", "wbr",
};

/// Tags whose subtrees the language variant converter never touches.
pub(crate) static LANGCONV_SKIP_TAGS: phf::Set<&str> = phf::phf_set! {
    "code", "script", "pre", "cite",
};

/// A page direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum Dir {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

impl Dir {
    /// The value used in `dir` attributes and direction-derived class names.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Ltr => "ltr",
            Dir::Rtl => "rtl",
        }
    }
}

/// The call surface handed to a native extension implementation.
pub(crate) struct ExtensionCall<'a> {
    /// The extension tag name, lowercased.
    pub name: &'a str,
    /// The normalized tag attributes.
    pub attrs: &'a [Kv],
    /// The raw tag body, if the tag was not self-closing.
    pub body: Option<&'a str>,
}

/// A native extension implementation: returns a DOM subtree for the tag.
pub(crate) type ToDom = fn(&Env<'_>, &ExtensionCall<'_>) -> Result<Document>;

/// A per-extension DOM post-processor, run after fragment unpacking.
pub(crate) type ExtPostProcessor = fn(&mut Document, &Env<'_>) -> Result;

/// A registered native extension.
///
/// Registration order is meaningful twice over: dispatch tries entries in
/// order, and the post-processing driver runs `post_processor` hooks in the
/// same order.
pub(crate) struct ExtensionRegistration {
    /// The tag name this implementation claims.
    pub name: &'static str,
    /// Builds the DOM subtree for an invocation.
    pub to_dom: ToDom,
    /// Optional DOM post-processor.
    pub post_processor: Option<ExtPostProcessor>,
}

/// A replacement machine for language variant conversion. The machine itself
/// is external; the converter pass only needs transliteration of text runs.
pub(crate) trait ReplacementMachine {
    /// The variant codes this machine can produce.
    fn variants(&self) -> &[String];

    /// Guesses the variant a text run is written in, for `data-mw-variant-lang`
    /// stamping. `None` means undetermined.
    fn guess_variant(&self, text: &str) -> Option<String>;

    /// Transliterates `text` into `variant`. Returns `None` when the machine
    /// cannot convert the run, in which case the original is kept.
    fn convert(&self, text: &str, variant: &str) -> Option<String>;
}

/// Out-of-band configuration for a wiki.
pub(crate) struct SiteConfig {
    /// Names of tags handled through the extension mechanism.
    pub extension_tags: &'static phf::Set<&'static str>,
    /// Double-underscore behavior switch words.
    pub behavior_switches: &'static phf::Set<&'static str>,
    /// Supported external link URI schemes.
    pub protocols: &'static [&'static str],
    /// The link trail pattern, anchored at the start of the text following a
    /// wikilink.
    pub link_trail: Regex,
    /// Registered native extensions, in registration order.
    pub extensions: Vec<ExtensionRegistration>,
    /// The replacement machine for language variant conversion, when the
    /// wiki has one.
    pub variant_machine: Option<Box<dyn ReplacementMachine + Send + Sync>>,
    /// Style modules every page loads.
    pub modules: &'static [&'static str],
    /// The name of the wiki’s main page.
    pub main_page: &'static str,
    /// The base URI used when emitting canonical URIs.
    pub base_uri: String,
    /// The default content language.
    pub lang: String,
    /// The default content direction.
    pub dir: Dir,
}

impl SiteConfig {
    /// Builds the default Wikimedia-shaped configuration.
    pub fn wmf() -> Self {
        static EXTENSION_TAGS: phf::Set<&str> = phf::phf_set! {
            "pre", "nowiki", "gallery", "indicator", "langconvert", "ref",
            "references", "poem", "section", "templatestyles", "templatedata",
            "math", "source", "syntaxhighlight",
        };
        static BEHAVIOR_SWITCHES: phf::Set<&str> = phf::phf_set! {
            "notoc", "nogallery", "forcetoc", "toc", "noeditsection",
            "newsectionlink", "nonewsectionlink", "hiddencat", "index",
            "noindex", "staticredirect", "notitleconvert", "nocontentconvert",
        };
        static PROTOCOLS: &[&str] = &[
            "bitcoin:", "ftp://", "ftps://", "geo:", "git://", "gopher://",
            "http://", "https://", "irc://", "ircs://", "magnet:", "mailto:",
            "mms://", "news:", "nntp://", "redis://", "sftp://", "sip:",
            "sips:", "sms:", "ssh://", "svn://", "tel:", "telnet://", "urn:",
            "worldwind://", "xmpp:", "//",
        ];
        static MODULES: &[&str] = &["mediawiki.skinning.content.parsoid"];

        Self {
            extension_tags: &EXTENSION_TAGS,
            behavior_switches: &BEHAVIOR_SWITCHES,
            protocols: PROTOCOLS,
            // The English default; other wikis supply their own, including
            // Unicode classes, which `regex` handles natively.
            link_trail: Regex::new("^([a-z]+)").unwrap(),
            extensions: vec![
                ExtensionRegistration {
                    name: "nowiki",
                    to_dom: ext_nowiki,
                    post_processor: None,
                },
                ExtensionRegistration {
                    name: "pre",
                    to_dom: ext_pre,
                    post_processor: None,
                },
            ],
            variant_machine: None,
            modules: MODULES,
            main_page: "Main Page",
            base_uri: "https://localhost/wiki/".to_string(),
            lang: "en".to_string(),
            dir: Dir::Ltr,
        }
    }

    /// Returns true if `name` is a registered extension tag.
    pub fn is_extension_tag(&self, name: &str) -> bool {
        self.extension_tags.contains(name)
    }

    /// Finds the native implementation registered for an extension tag.
    pub fn native_extension(&self, name: &str) -> Option<&ExtensionRegistration> {
        self.extensions.iter().find(|ext| ext.name == name)
    }

    /// Returns true if `name` is a recognized behavior switch word.
    pub fn is_behavior_switch(&self, name: &str) -> bool {
        self.behavior_switches.contains(&name.to_ascii_lowercase()[..])
    }

    /// Returns true if `c` can be part of a link trail.
    pub fn is_link_trail_char(&self, c: char) -> bool {
        let mut buf = [0; 4];
        self.link_trail.is_match(c.encode_utf8(&mut buf))
    }

    /// Returns true if `target` starts with a supported URI scheme.
    pub fn has_protocol(&self, target: &str) -> bool {
        self.protocols.iter().any(|proto| {
            target.len() > proto.len()
                && target
                    .get(..proto.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(proto))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_trails() {
        let conf = SiteConfig::wmf();
        assert!(conf.is_link_trail_char('s'));
        assert!(!conf.is_link_trail_char(' '));
        assert!(!conf.is_link_trail_char('S'));
    }

    #[test]
    fn protocols() {
        let conf = SiteConfig::wmf();
        assert!(conf.has_protocol("https://example.org"));
        assert!(conf.has_protocol("HTTP://example.org"));
        assert!(!conf.has_protocol("example.org"));
    }

    #[test]
    fn behavior_switches_are_case_insensitive() {
        let conf = SiteConfig::wmf();
        assert!(conf.is_behavior_switch("TOC"));
        assert!(!conf.is_behavior_switch("NOTATHING"));
    }
}
