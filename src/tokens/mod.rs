//! The token data model.
//!
//! The tokenizer produces a flat stream of these tokens; the transform
//! stages rewrite the stream in place until only HTML-shaped tokens remain,
//! at which point the tree builder turns it into a DOM.
//!
//! Wikitext constructs that need handler attention are represented as
//! self-closing tokens with reserved names (`template`, `templatearg`,
//! `wikilink`, `extlink`, `extension`, `listitem`, `behavior-switch`,
//! `mw-quote`, `language-variant`, `entity`). Everything else uses plain
//! HTML tag names.

use indexmap::IndexMap;
use serde::Serialize;

pub(crate) use source::{FileMap, Tsr};

mod source;

/// A key-value attribute on a tag token.
///
/// Template arguments and tag attributes share this shape; a template
/// argument’s key is its parameter name (or its 1-based ordinal once
/// numbered) and the value is the raw wikitext of the argument.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Kv {
    /// The attribute name.
    pub k: String,
    /// The attribute value.
    pub v: String,
    /// The source range of the name, when it came from the source text.
    pub key_offsets: Option<Tsr>,
    /// The source range of the value, when it came from the source text.
    pub value_offsets: Option<Tsr>,
}

impl Kv {
    /// Creates a synthetic key-value pair with no source offsets.
    pub fn new(k: impl Into<String>, v: impl Into<String>) -> Self {
        Self {
            k: k.into(),
            v: v.into(),
            key_offsets: None,
            value_offsets: None,
        }
    }
}

/// The side-record of source and provenance information carried by a token.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct DataAttribs {
    /// The token source range.
    pub tsr: Option<Tsr>,
    /// The syntax variant that produced the token, e.g. `"html"` for a
    /// literal HTML tag as opposed to wikitext shorthand.
    pub stx: Option<&'static str>,
    /// The token was emitted while recovering fostered content.
    pub from_foster: bool,
    /// The raw source of the construct, for tokens whose source cannot be
    /// recovered from `tsr` alone (template-generated content).
    pub src: Option<String>,
    /// Serialized template-argument information. Only present on the start
    /// marker meta of a transclusion.
    pub tpl_arg_info: Option<ArgInfo>,
}

impl DataAttribs {
    /// Creates a record carrying only a source range.
    pub fn from_tsr(start: usize, end: usize) -> Self {
        Self {
            tsr: Some(Tsr::new(start, end)),
            ..Self::default()
        }
    }
}

/// Which `data-mw` key a transclusion part serializes under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PartKind {
    /// A `{{template}}` invocation; serialized under `template`.
    Template,
    /// An unexpanded `{{{parameter}}}`; serialized under `templatearg`.
    TemplateArg,
}

/// The target of a transclusion as it appears in `data-mw`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ArgTarget {
    /// The raw wikitext of the target.
    pub wt: String,
    /// The resolved target href, when the target named an existing page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// A single parameter value as it appears in `data-mw`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ParamValue {
    /// The raw wikitext of the value.
    pub wt: String,
}

/// Per-parameter source offsets, collected into `data-parsoid.pi` on the
/// encapsulation target for the serializer’s benefit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ParamInfo {
    /// The parameter key.
    pub k: String,
    /// The source range of the parameter value, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Tsr>,
}

/// The serialized description of one transclusion’s arguments. Rides on the
/// start marker meta and is assembled into `data-mw.parts` during
/// encapsulation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ArgInfo {
    /// Whether this is a template or an unexpanded parameter.
    pub kind: PartKind,
    /// The transclusion target.
    pub target: ArgTarget,
    /// Ordered parameters keyed by name or ordinal.
    pub params: IndexMap<String, ParamValue>,
    /// Per-parameter source offsets.
    pub param_infos: Vec<ParamInfo>,
    /// The source range of the whole transclusion in its source document.
    pub dsr: Option<Tsr>,
}

/// The payload shared by start, end, and self-closing tag tokens.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct TagData {
    /// The tag name, lowercased.
    pub name: String,
    /// The tag attributes.
    pub attrs: Vec<Kv>,
    /// The source and provenance side-record.
    pub data: DataAttribs,
}

impl TagData {
    /// Creates a tag with the given name and no attributes.
    pub fn new(name: impl Into<String>, data: DataAttribs) -> Self {
        Self {
            name: name.into(),
            attrs: vec![],
            data,
        }
    }

    /// Returns the value of the attribute with the given name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|kv| kv.k == name)
            .map(|kv| kv.v.as_str())
    }

    /// Sets the value of the attribute with the given name, appending it if
    /// it does not exist yet.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        if let Some(kv) = self.attrs.iter_mut().find(|kv| kv.k == name) {
            kv.v = value.into();
        } else {
            self.attrs.push(Kv::new(name, value));
        }
    }
}

/// A wikitext token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Token {
    /// A start tag.
    StartTag(TagData),
    /// An end tag.
    EndTag(TagData),
    /// A self-closing tag, including all of the synthetic wikitext-construct
    /// tokens awaiting expansion.
    SelfClosing(TagData),
    /// An HTML comment.
    Comment {
        /// The comment text, excluding delimiters.
        text: String,
        /// The source side-record.
        data: DataAttribs,
    },
    /// A context-sensitive newline.
    Newline(DataAttribs),
    /// A run of plain text.
    Text(String),
    /// End of input.
    Eof,
}

impl Token {
    /// The tag name of the token, if it is a tag token.
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Token::StartTag(t) | Token::EndTag(t) | Token::SelfClosing(t) => Some(&t.name),
            _ => None,
        }
    }

    /// The source range of the token, if it carries one.
    pub fn tsr(&self) -> Option<Tsr> {
        match self {
            Token::StartTag(t) | Token::EndTag(t) | Token::SelfClosing(t) => t.data.tsr,
            Token::Comment { data, .. } | Token::Newline(data) => data.tsr,
            Token::Text(_) | Token::Eof => None,
        }
    }

    /// Clears the source range of the token. Applied to expanded template
    /// output, whose offsets are relative to the template source and must
    /// not leak into the top-level document’s offset space.
    pub fn clear_tsr(&mut self) {
        match self {
            Token::StartTag(t) | Token::EndTag(t) | Token::SelfClosing(t) => t.data.tsr = None,
            Token::Comment { data, .. } | Token::Newline(data) => data.tsr = None,
            Token::Text(_) | Token::Eof => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_attr_roundtrip() {
        let mut tag = TagData::new("a", DataAttribs::default());
        tag.set_attr("href", "./Foo");
        tag.set_attr("href", "./Bar");
        assert_eq!(tag.attr("href"), Some("./Bar"));
        assert_eq!(tag.attrs.len(), 1);
    }

    #[test]
    fn clear_tsr() {
        let mut token = Token::StartTag(TagData::new("b", DataAttribs::from_tsr(0, 3)));
        assert_eq!(token.tsr(), Some(Tsr::new(0, 3)));
        token.clear_tsr();
        assert_eq!(token.tsr(), None);
    }
}
