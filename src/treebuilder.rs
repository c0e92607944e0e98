//! The tree builder adapter: a stack machine turning the final token
//! stream into a DOM.
//!
//! This implements the subset of HTML5 tree construction the pipeline
//! exercises: implicit close rules for `p`, list items, and table parts,
//! and foster-parenting of content that is illegal inside table markup.
//! Non-whitespace text and non-table elements (marker metas included, which
//! is how flipped template ranges come to exist) move out to just before
//! the nearest table.

use crate::{
    config::VOID_TAGS,
    dom::{Document, NodeId},
    tokens::{TagData, Token},
};

/// Tags that implicitly close an open `<p>`.
fn closes_p(name: &str) -> bool {
    matches!(
        name,
        "p" | "table" | "ul" | "ol" | "dl" | "li" | "dt" | "dd" | "h1" | "h2" | "h3" | "h4"
            | "h5" | "h6" | "pre" | "blockquote" | "div" | "hr" | "center" | "figure"
            | "section"
    )
}

/// Content legal directly inside `<table>` or `<tr>`.
fn allowed_in_table(name: &str) -> bool {
    matches!(
        name,
        "table" | "tr" | "td" | "th" | "caption" | "col" | "colgroup" | "tbody" | "thead"
            | "tfoot"
    )
}

/// The tokens-to-DOM stack machine.
struct TreeBuilder {
    /// The document being built.
    doc: Document,
    /// Open elements, outermost first. Slot 0 is `<body>`.
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    /// The current insertion point.
    fn current(&self) -> NodeId {
        *self.stack.last().expect("body never pops")
    }

    /// The name of the current insertion point.
    fn current_name(&self) -> &str {
        self.doc.node_name(self.current()).unwrap_or("")
    }

    /// Whether the insertion point is in table context, where arbitrary
    /// content must be fostered out.
    fn in_table_context(&self) -> bool {
        matches!(self.current_name(), "table" | "tr")
    }

    /// The nearest open `<table>`, for fostering.
    fn open_table(&self) -> Option<NodeId> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&n| self.doc.is_element_named(n, "table"))
    }

    /// Inserts a node at the current insertion point, fostering it out of
    /// table context when `fosterable` content is not allowed there.
    fn insert(&mut self, node: NodeId, fosterable: bool) {
        if fosterable
            && self.in_table_context()
            && let Some(table) = self.open_table()
        {
            self.doc.insert_before(table, node);
            return;
        }
        let parent = self.current();
        self.doc.append(parent, node);
    }

    /// Applies the implicit close rules for an incoming start tag.
    fn auto_close(&mut self, name: &str) {
        loop {
            let current = self.current_name();
            let close = match current {
                "p" => closes_p(name),
                "li" => name == "li",
                "dt" | "dd" => matches!(name, "dt" | "dd"),
                "tr" => name == "tr",
                "td" | "th" => matches!(name, "td" | "th" | "tr"),
                "caption" => matches!(name, "td" | "th" | "tr"),
                _ => false,
            };
            if !close {
                break;
            }
            self.pop(true);
        }

        // A cell with no row yet gets one.
        if matches!(name, "td" | "th") && self.current_name() == "table" {
            let tr = self.doc.create_element("tr");
            self.doc.dp_mut(tr).tmp.auto_inserted_end = true;
            self.insert(tr, false);
            self.stack.push(tr);
        }
    }

    /// Pops the current element.
    fn pop(&mut self, implicit: bool) {
        if self.stack.len() > 1 {
            let node = self.stack.pop().expect("checked length");
            if implicit {
                self.doc.dp_mut(node).tmp.auto_inserted_end = true;
            }
        }
    }

    /// Creates an element for a tag token, transferring its side-record.
    fn element_for(&mut self, tag: &TagData) -> NodeId {
        let node = self.doc.create_element(tag.name.clone());
        for kv in &tag.attrs {
            // Reserved handler-internal keys never become DOM attributes.
            if kv.k.starts_with("mw:") {
                continue;
            }
            self.doc.set_attr(node, &kv.k, kv.v.clone());
        }
        let dp = self.doc.dp_mut(node);
        dp.tsr = tag.data.tsr;
        dp.stx = tag.data.stx.map(str::to_string);
        dp.src = tag.data.src.clone();
        dp.tmp.tpl_arg_info = tag.data.tpl_arg_info.clone();
        node
    }

    /// Appends text, merging with a trailing text sibling.
    fn insert_text(&mut self, text: &str) {
        let whitespace = text.chars().all(|c| c.is_ascii_whitespace());
        if self.in_table_context() && !whitespace {
            if let Some(table) = self.open_table() {
                let node = self.doc.create_text(text);
                self.doc.insert_before(table, node);
                return;
            }
        }

        // Inter-element whitespace is legal table content, so it lands at
        // the insertion point like everything else.
        let parent = self.current();
        if let Some(last) = self.doc.last_child(parent)
            && self.doc.text(last).is_some()
        {
            let merged = format!("{}{}", self.doc.text(last).unwrap_or(""), text);
            self.doc.set_text(last, merged);
        } else {
            let node = self.doc.create_text(text);
            self.doc.append(parent, node);
        }
    }

    /// Processes one token.
    fn process(&mut self, token: Token) {
        match token {
            Token::StartTag(tag) => {
                self.auto_close(&tag.name);
                if tag.name == "table" {
                    // A shadow marks where the table began; the fostered
                    // content pass finds displaced nodes between the shadow
                    // and the table itself.
                    let shadow = self.doc.create_element("meta");
                    self.doc
                        .set_attr(shadow, "typeof", "mw:TreeBuilder/TableShadow");
                    self.insert(shadow, false);
                }
                let fosterable = !allowed_in_table(&tag.name);
                let node = self.element_for(&tag);
                self.insert(node, fosterable);
                if !VOID_TAGS.contains(&tag.name[..]) {
                    self.stack.push(node);
                }
            }
            Token::SelfClosing(tag) => {
                let fosterable = !allowed_in_table(&tag.name);
                let node = self.element_for(&tag);
                self.insert(node, fosterable);
            }
            Token::EndTag(tag) => {
                if let Some(pos) = self.stack[1..]
                    .iter()
                    .rposition(|&n| self.doc.is_element_named(n, &tag.name))
                {
                    let target = self.stack[pos + 1];
                    while self.current() != target {
                        self.pop(true);
                    }
                    self.doc.dp_mut(target).tmp.end_tsr = tag.data.tsr;
                    self.pop(false);
                } else {
                    log::debug!("ignoring unmatched </{}>", tag.name);
                }
            }
            Token::Text(text) => {
                if !text.is_empty() {
                    self.insert_text(&text);
                }
            }
            Token::Newline(_) => {
                self.insert_text("\n");
            }
            Token::Comment { text, .. } => {
                let node = self.doc.create_comment(text);
                let parent = self.current();
                self.doc.append(parent, node);
            }
            Token::Eof => {
                while self.stack.len() > 1 {
                    self.pop(true);
                }
            }
        }
    }
}

/// Builds a DOM from the final token stream. The document is rooted at
/// `<html><body>` whether or not it is a top-level parse, so passes can
/// address content uniformly.
pub(crate) fn build(tokens: Vec<Token>, _at_top_level: bool) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    let html = doc.create_element("html");
    doc.append(root, html);
    let body = doc.create_element("body");
    doc.append(html, body);

    let mut builder = TreeBuilder {
        doc,
        stack: vec![body],
    };
    for token in tokens {
        builder.process(token);
    }
    builder.doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dom::serialize::inner_html,
        tokens::{DataAttribs, TagData},
    };

    fn start(name: &str) -> Token {
        Token::StartTag(TagData::new(name, DataAttribs::default()))
    }

    fn end(name: &str) -> Token {
        Token::EndTag(TagData::new(name, DataAttribs::default()))
    }

    #[test]
    fn builds_simple_tree() {
        let doc = build(
            vec![
                start("p"),
                Token::Text("hi".to_string()),
                end("p"),
                Token::Eof,
            ],
            true,
        );
        let body = doc.body().unwrap();
        assert_eq!(inner_html(&doc, body), "<p>hi</p>");
    }

    #[test]
    fn implicit_row_and_cell_closes() {
        let doc = build(
            vec![
                start("table"),
                start("tr"),
                start("td"),
                Token::Text("a".to_string()),
                start("td"),
                Token::Text("b".to_string()),
                start("tr"),
                start("td"),
                Token::Text("c".to_string()),
                end("table"),
                Token::Eof,
            ],
            true,
        );
        let body = doc.body().unwrap();
        assert_eq!(
            inner_html(&doc, body),
            "<meta typeof=\"mw:TreeBuilder/TableShadow\">\
             <table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>"
        );
    }

    #[test]
    fn fosters_content_out_of_tables() {
        let doc = build(
            vec![
                start("table"),
                start("div"),
                Token::Text("stray".to_string()),
                end("div"),
                start("tr"),
                start("td"),
                Token::Text("x".to_string()),
                end("table"),
                Token::Eof,
            ],
            true,
        );
        let body = doc.body().unwrap();
        assert_eq!(
            inner_html(&doc, body),
            "<meta typeof=\"mw:TreeBuilder/TableShadow\">\
             <div>stray</div><table><tr><td>x</td></tr></table>"
        );
    }

    #[test]
    fn whitespace_stays_in_tables() {
        let doc = build(
            vec![
                start("table"),
                Token::Newline(DataAttribs::default()),
                start("tr"),
                start("td"),
                Token::Text("x".to_string()),
                end("table"),
                Token::Eof,
            ],
            true,
        );
        let body = doc.body().unwrap();
        assert_eq!(
            inner_html(&doc, body),
            "<meta typeof=\"mw:TreeBuilder/TableShadow\">\
             <table>\n<tr><td>x</td></tr></table>"
        );
    }
}
