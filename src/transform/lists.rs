//! Stage-3 list building: `listitem` bullet tokens become properly nested
//! `ul`/`ol`/`dl` structure.

use super::{Interest, TokenHandler, Transformed, TransformCtx};
use crate::{
    pipeline::Result,
    tokens::{DataAttribs, TagData, Token},
};

/// The container and item element names for one bullet character.
fn list_kind(bullet: char) -> (&'static str, &'static str) {
    match bullet {
        '#' => ("ol", "li"),
        ';' => ("dl", "dt"),
        ':' => ("dl", "dd"),
        _ => ("ul", "li"),
    }
}

/// One open list level.
#[derive(Clone, Copy, Debug)]
struct Level {
    /// The container element name.
    container: &'static str,
    /// The open item element name.
    item: &'static str,
}

/// Builds nested lists from bullet runs.
pub(crate) struct ListHandler {
    /// Open list levels, outermost first.
    stack: Vec<Level>,
    /// A newline held back until the next token decides whether the list
    /// continues.
    pending_newline: Option<Token>,
}

impl ListHandler {
    /// Creates the handler.
    pub fn new() -> Self {
        Self {
            stack: vec![],
            pending_newline: None,
        }
    }

    /// Emits close tags for every level above `keep`.
    fn close_to(&mut self, keep: usize, out: &mut Vec<Token>) {
        while self.stack.len() > keep {
            let level = self.stack.pop().expect("checked length");
            out.push(Token::EndTag(TagData::new(level.item, DataAttribs::default())));
            out.push(Token::EndTag(TagData::new(
                level.container,
                DataAttribs::default(),
            )));
        }
    }

    /// Rebuilds the stack for a new bullet run.
    fn handle_bullets(&mut self, bullets: &str, tsr: Option<crate::tokens::Tsr>) -> Vec<Token> {
        let mut out = vec![];
        let new: Vec<(&'static str, &'static str)> =
            bullets.chars().map(list_kind).collect();

        // Shared prefix: same container kind at each level.
        let mut common = 0;
        while common < self.stack.len()
            && common < new.len()
            && self.stack[common].container == new[common].0
        {
            common += 1;
        }

        self.close_to(common, &mut out);

        if common == new.len() {
            if let Some(level) = self.stack.last_mut() {
                // A sibling item at the current depth; `;` to `:` switches
                // the item kind inside the same dl.
                let (_, item) = new[common - 1];
                out.push(Token::EndTag(TagData::new(level.item, DataAttribs::default())));
                let mut open = TagData::new(item, DataAttribs::default());
                open.data.tsr = tsr;
                out.push(Token::StartTag(open));
                level.item = item;
            }
        } else {
            for &(container, item) in &new[common..] {
                let mut open_container = TagData::new(container, DataAttribs::default());
                if self.stack.is_empty() {
                    open_container.data.tsr = tsr;
                }
                out.push(Token::StartTag(open_container));
                out.push(Token::StartTag(TagData::new(item, DataAttribs::default())));
                self.stack.push(Level { container, item });
            }
        }

        out
    }
}

impl TokenHandler for ListHandler {
    fn name(&self) -> &'static str {
        "list"
    }

    fn interest(&self) -> Interest {
        Interest::Any
    }

    fn transform(&mut self, token: Token, _ctx: &TransformCtx<'_, '_>) -> Result<Transformed> {
        match token {
            Token::SelfClosing(ref tag) if tag.name == "listitem" => {
                // The newline before a list item is list syntax, not
                // content.
                self.pending_newline = None;
                let bullets = tag.attr("bullets").unwrap_or("*").to_string();
                let out = self.handle_bullets(&bullets, tag.data.tsr);
                Ok(Transformed::Replaced(out))
            }
            Token::Newline(_) if !self.stack.is_empty() => {
                if let Some(held) = self.pending_newline.take() {
                    // A blank line terminates the list.
                    let mut out = vec![];
                    self.close_to(0, &mut out);
                    out.push(held);
                    out.push(token);
                    Ok(Transformed::Replaced(out))
                } else {
                    self.pending_newline = Some(token);
                    Ok(Transformed::Replaced(vec![]))
                }
            }
            Token::Eof => {
                let mut out = vec![];
                self.close_to(0, &mut out);
                if let Some(held) = self.pending_newline.take() {
                    out.push(held);
                }
                out.push(token);
                Ok(Transformed::Replaced(out))
            }
            other => {
                if let Some(held) = self.pending_newline.take() {
                    // A non-list line follows; the list is over.
                    let mut out = vec![];
                    self.close_to(0, &mut out);
                    out.push(held);
                    out.push(other);
                    Ok(Transformed::Replaced(out))
                } else {
                    Ok(Transformed::Unchanged(other))
                }
            }
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.pending_newline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(bullets: &str) -> Token {
        let mut tag = TagData::new("listitem", DataAttribs::default());
        tag.set_attr("bullets", bullets);
        Token::SelfClosing(tag)
    }

    fn run(tokens: Vec<Token>) -> Vec<String> {
        let mut handler = ListHandler::new();
        let conf = crate::config::SiteConfig::wmf();
        let env = crate::env::Env::new(
            &conf,
            &crate::env::NullDataAccess,
            crate::env::PageConfig::default(),
            crate::env::EnvOptions::default(),
        );
        let frame = crate::env::Frame::root("Test");
        let ctx = TransformCtx {
            env: &env,
            frame: &frame,
            opts: &crate::pipeline::PipelineOpts::default(),
            has_onlyinclude: false,
        };
        let mut out = vec![];
        for token in tokens {
            match handler.transform(token, &ctx).unwrap() {
                Transformed::Unchanged(t) => out.push(t),
                Transformed::Replaced(ts) | Transformed::Requeued(ts) => out.extend(ts),
            }
        }
        out.iter()
            .map(|t| match t {
                Token::StartTag(tag) => format!("<{}>", tag.name),
                Token::EndTag(tag) => format!("</{}>", tag.name),
                Token::Text(t) => t.clone(),
                Token::Newline(_) => "\\n".to_string(),
                Token::Eof => "EOF".to_string(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn nested_lists() {
        let out = run(vec![
            item("*"),
            Token::Text("a".to_string()),
            Token::Newline(DataAttribs::default()),
            item("**"),
            Token::Text("b".to_string()),
            Token::Eof,
        ]);
        assert_eq!(
            out,
            vec![
                "<ul>", "<li>", "a", "<ul>", "<li>", "b", "</li>", "</ul>", "</li>", "</ul>",
                "EOF"
            ]
        );
    }

    #[test]
    fn definition_list_switches_item_kind() {
        let out = run(vec![
            item(";"),
            Token::Text("term".to_string()),
            Token::Newline(DataAttribs::default()),
            item(":"),
            Token::Text("def".to_string()),
            Token::Eof,
        ]);
        assert_eq!(
            out,
            vec![
                "<dl>", "<dt>", "term", "</dt>", "<dd>", "def", "</dd>", "</dl>", "EOF"
            ]
        );
    }

    #[test]
    fn blank_line_ends_list() {
        let out = run(vec![
            item("*"),
            Token::Text("a".to_string()),
            Token::Newline(DataAttribs::default()),
            Token::Newline(DataAttribs::default()),
            Token::Text("after".to_string()),
            Token::Eof,
        ]);
        assert_eq!(
            out,
            vec!["<ul>", "<li>", "a", "</li>", "</ul>", "\\n", "\\n", "after", "EOF"]
        );
    }
}
