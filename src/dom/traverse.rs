//! A pre-order DOM traverser with a per-tag handler registry.
//!
//! Handlers run in registration order for every node they match. A handler
//! that mutates the tree around the current node must return
//! [`TraverseAction::ResumeAt`] so traversal does not walk into detached
//! content.

use super::{Document, NodeId};
use crate::{env::Env, pipeline::Result};

/// What the traversal does after a handler runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TraverseAction {
    /// Keep going: descend into children, then siblings.
    Descend,
    /// Skip this node’s children; continue at the next sibling.
    SkipChildren,
    /// Continue at the given node, or stop this subtree when `None`. Used
    /// by handlers that detach or replace the current node.
    ResumeAt(Option<NodeId>),
}

/// A traversal handler.
type Handler<'h> = Box<dyn FnMut(&mut Document, NodeId, &Env<'_>) -> Result<TraverseAction> + 'h>;

/// An ordered set of per-tag handlers run over a subtree.
pub(crate) struct DomTraverser<'h> {
    /// Handlers with an optional tag-name filter. `None` matches every
    /// node, including text and comments.
    handlers: Vec<(Option<&'static str>, Handler<'h>)>,
}

impl<'h> DomTraverser<'h> {
    /// Creates an empty traverser.
    pub fn new() -> Self {
        Self { handlers: vec![] }
    }

    /// Registers a handler. `tag` filters to elements with that name;
    /// `None` matches all nodes.
    pub fn add(
        &mut self,
        tag: Option<&'static str>,
        handler: impl FnMut(&mut Document, NodeId, &Env<'_>) -> Result<TraverseAction> + 'h,
    ) {
        self.handlers.push((tag, Box::new(handler)));
    }

    /// Walks the subtree under `root` in document order, running matching
    /// handlers at each node.
    pub fn traverse(&mut self, doc: &mut Document, root: NodeId, env: &Env<'_>) -> Result {
        let mut cur = doc.first_child(root);
        while let Some(node) = cur {
            let mut action = TraverseAction::Descend;
            for (tag, handler) in &mut self.handlers {
                let matches = match tag {
                    Some(tag) => doc.is_element_named(node, tag),
                    None => true,
                };
                if matches {
                    action = handler(doc, node, env)?;
                    if action != TraverseAction::Descend {
                        break;
                    }
                }
            }

            cur = match action {
                TraverseAction::Descend => doc.next_in_preorder(node, Some(root)),
                TraverseAction::SkipChildren => self.next_skipping_children(doc, node, root),
                TraverseAction::ResumeAt(next) => next,
            };
        }
        Ok(())
    }

    /// The pre-order successor of `node` that is not a descendant of it.
    fn next_skipping_children(
        &self,
        doc: &Document,
        node: NodeId,
        root: NodeId,
    ) -> Option<NodeId> {
        let mut cur = node;
        loop {
            if cur == root {
                return None;
            }
            if let Some(next) = doc.next_sibling(cur) {
                return Some(next);
            }
            cur = doc.parent(cur)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        env::{EnvOptions, NullDataAccess, PageConfig},
    };

    #[test]
    fn visits_in_document_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let p = doc.create_element("p");
        let t = doc.create_text("x");
        doc.append(root, div);
        doc.append(div, p);
        doc.append(p, t);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );

        let mut seen = vec![];
        let mut traverser = DomTraverser::new();
        traverser.add(None, |doc, node, _env| {
            seen.push(doc.node_name(node).unwrap_or("#text").to_string());
            Ok(TraverseAction::Descend)
        });
        traverser.traverse(&mut doc, root, &env).unwrap();
        drop(traverser);
        assert_eq!(seen, vec!["div", "p", "#text"]);
    }

    #[test]
    fn skip_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let inner = doc.create_text("inner");
        let after = doc.create_element("p");
        doc.append(root, div);
        doc.append(div, inner);
        doc.append(root, after);

        let conf = SiteConfig::wmf();
        let env = Env::new(
            &conf,
            &NullDataAccess,
            PageConfig::default(),
            EnvOptions::default(),
        );

        let mut seen = vec![];
        let mut traverser = DomTraverser::new();
        traverser.add(None, |doc, node, _env| {
            seen.push(doc.node_name(node).unwrap_or("#text").to_string());
            Ok(if doc.is_element_named(node, "div") {
                TraverseAction::SkipChildren
            } else {
                TraverseAction::Descend
            })
        });
        traverser.traverse(&mut doc, root, &env).unwrap();
        drop(traverser);
        assert_eq!(seen, vec!["div", "p"]);
    }
}
