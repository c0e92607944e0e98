//! An arena DOM.
//!
//! Nodes are allocated out of a flat vector and addressed by [`NodeId`], so
//! re-parenting is pointer surgery on indices and the data side-table can
//! key records by the same numeric ids without dangling references.

use indexmap::IndexMap;

pub(crate) use data::{DataParsoid, Dsr, NodeData, PageBundle, TempData};

pub(crate) mod data;
pub(crate) mod serialize;
pub(crate) mod traverse;

/// A handle to a node in a [`Document`] arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct NodeId(u32);

impl NodeId {
    /// The arena index of the node.
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The payload of an element node.
#[derive(Clone, Debug, Default)]
pub(crate) struct Element {
    /// The tag name, lowercased.
    pub name: String,
    /// Attributes, in insertion order.
    pub attrs: IndexMap<String, String>,
}

/// A node’s payload.
#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    /// The document root.
    Document,
    /// An element.
    Element(Element),
    /// A text run.
    Text(String),
    /// A comment.
    Comment(String),
}

/// One arena slot: tree links plus payload.
#[derive(Clone, Debug)]
struct Node {
    /// The parent node.
    parent: Option<NodeId>,
    /// The previous sibling.
    prev: Option<NodeId>,
    /// The next sibling.
    next: Option<NodeId>,
    /// The first child.
    first_child: Option<NodeId>,
    /// The last child.
    last_child: Option<NodeId>,
    /// The payload.
    kind: NodeKind,
    /// The node’s side-table record.
    data: NodeData,
}

impl Node {
    /// Creates a detached node with the given payload.
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
            kind,
            data: NodeData::default(),
        }
    }
}

/// A DOM tree plus its data side-table.
#[derive(Debug)]
pub(crate) struct Document {
    /// The node arena. Slot 0 is always the document root.
    nodes: Vec<Node>,
    /// The serialized side-tables, filled in by the cleanup pass.
    pub bundle: Option<PageBundle>,
}

impl Document {
    /// Creates a document containing only a root node. Used both for full
    /// documents and for fragments, whose content hangs off the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Document)],
            bundle: None,
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Finds the `<body>` element, if the tree has one.
    pub fn body(&self) -> Option<NodeId> {
        let html = self
            .children(self.root())
            .into_iter()
            .find(|&n| self.is_element_named(n, "html"))?;
        self.children(html)
            .into_iter()
            .find(|&n| self.is_element_named(n, "body"))
    }

    /// Allocates a detached element.
    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element(Element {
            name: name.into(),
            attrs: IndexMap::new(),
        }))
    }

    /// Allocates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    /// Allocates a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    /// Allocates a slot.
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap());
        self.nodes.push(Node::new(kind));
        id
    }

    // -- navigation ---------------------------------------------------------

    /// The parent of a node.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    /// The previous sibling of a node.
    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].prev
    }

    /// The next sibling of a node.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].next
    }

    /// The first child of a node.
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].first_child
    }

    /// The last child of a node.
    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].last_child
    }

    /// The children of a node, eagerly collected so callers may mutate the
    /// tree while iterating.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut child = self.first_child(node);
        while let Some(c) = child {
            out.push(c);
            child = self.next_sibling(c);
        }
        out
    }

    /// The ancestors of a node, nearest first, ending at the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    // -- payload access -----------------------------------------------------

    /// The payload of a node.
    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.index()].kind
    }

    /// The element payload of a node, if it is an element.
    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    /// True if the node is an element.
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.index()].kind, NodeKind::Element(_))
    }

    /// True if the node is an element with the given tag name.
    pub fn is_element_named(&self, node: NodeId, name: &str) -> bool {
        self.element(node).is_some_and(|e| e.name == name)
    }

    /// The tag name of an element node.
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.name.as_str())
    }

    /// The text content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.index()].kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Replaces the text content of a text node.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        if let NodeKind::Text(t) = &mut self.nodes[node.index()].kind {
            *t = text.into();
        }
    }

    /// The concatenated text content of a subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    /// Accumulates text content depth-first.
    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.text(node) {
            out.push_str(text);
        }
        let mut child = self.first_child(node);
        while let Some(c) = child {
            self.collect_text(c, out);
            child = self.next_sibling(c);
        }
    }

    // -- attributes ---------------------------------------------------------

    /// The value of an attribute.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attrs.get(name).map(String::as_str)
    }

    /// Sets an attribute.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element(e) = &mut self.nodes[node.index()].kind {
            e.attrs.insert(name.to_string(), value.into());
        }
    }

    /// Removes an attribute, returning its old value.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Option<String> {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Element(e) => e.attrs.shift_remove(name),
            _ => None,
        }
    }

    /// True if the space-separated `typeof` attribute contains `value`.
    pub fn has_typeof(&self, node: NodeId, value: &str) -> bool {
        self.attr(node, "typeof")
            .is_some_and(|t| t.split_ascii_whitespace().any(|v| v == value))
    }

    /// Prepends `value` to the `typeof` attribute, preserving existing types.
    pub fn add_typeof(&mut self, node: NodeId, value: &str) {
        let merged = match self.attr(node, "typeof") {
            Some(existing) if !existing.is_empty() => format!("{value} {existing}"),
            _ => value.to_string(),
        };
        self.set_attr(node, "typeof", merged);
    }

    // -- side-table ---------------------------------------------------------

    /// The `data-parsoid` record of a node.
    pub fn dp(&self, node: NodeId) -> &DataParsoid {
        &self.nodes[node.index()].data.parsoid
    }

    /// The mutable `data-parsoid` record of a node.
    pub fn dp_mut(&mut self, node: NodeId) -> &mut DataParsoid {
        &mut self.nodes[node.index()].data.parsoid
    }

    /// The `data-mw` record of a node.
    pub fn data_mw(&self, node: NodeId) -> Option<&serde_json::Value> {
        self.nodes[node.index()].data.mw.as_ref()
    }

    /// Sets the `data-mw` record of a node.
    pub fn set_data_mw(&mut self, node: NodeId, value: serde_json::Value) {
        self.nodes[node.index()].data.mw = Some(value);
    }

    // -- mutation -----------------------------------------------------------

    /// Detaches a node from its parent, leaving its subtree intact.
    pub fn detach(&mut self, node: NodeId) {
        let (parent, prev, next) = {
            let n = &self.nodes[node.index()];
            (n.parent, n.prev, n.next)
        };

        if let Some(prev) = prev {
            self.nodes[prev.index()].next = next;
        } else if let Some(parent) = parent {
            self.nodes[parent.index()].first_child = next;
        }

        if let Some(next) = next {
            self.nodes[next.index()].prev = prev;
        } else if let Some(parent) = parent {
            self.nodes[parent.index()].last_child = prev;
        }

        let n = &mut self.nodes[node.index()];
        n.parent = None;
        n.prev = None;
        n.next = None;
    }

    /// Appends a node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let old_last = self.nodes[parent.index()].last_child;
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[child.index()].prev = old_last;
        if let Some(last) = old_last {
            self.nodes[last.index()].next = Some(child);
        } else {
            self.nodes[parent.index()].first_child = Some(child);
        }
        self.nodes[parent.index()].last_child = Some(child);
    }

    /// Inserts `node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        let (parent, prev) = {
            let s = &self.nodes[sibling.index()];
            (s.parent, s.prev)
        };
        let parent = parent.expect("insert_before target must be attached");

        self.nodes[node.index()].parent = Some(parent);
        self.nodes[node.index()].prev = prev;
        self.nodes[node.index()].next = Some(sibling);
        self.nodes[sibling.index()].prev = Some(node);
        if let Some(prev) = prev {
            self.nodes[prev.index()].next = Some(node);
        } else {
            self.nodes[parent.index()].first_child = Some(node);
        }
    }

    /// Inserts `node` immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        if let Some(next) = self.next_sibling(sibling) {
            self.insert_before(next, node);
        } else {
            let parent = self.parent(sibling).expect("insert_after target must be attached");
            self.append(parent, node);
        }
    }

    /// Deep-copies a subtree from another document into this arena,
    /// returning the new detached root. Data records come along; ids are
    /// freshened by construction since the copies are new slots.
    pub fn adopt_subtree(&mut self, other: &Document, node: NodeId) -> NodeId {
        let new = self.alloc(other.nodes[node.index()].kind.clone());
        self.nodes[new.index()].data = other.nodes[node.index()].data.clone();
        let mut child = other.first_child(node);
        while let Some(c) = child {
            let copied = self.adopt_subtree(other, c);
            self.append(new, copied);
            child = other.next_sibling(c);
        }
        new
    }

    // -- whole-document queries ---------------------------------------------

    /// The next node in pre-order after `node`, not descending below
    /// `stop`’s parent chain.
    pub fn next_in_preorder(&self, node: NodeId, stop: Option<NodeId>) -> Option<NodeId> {
        if let Some(child) = self.first_child(node) {
            return Some(child);
        }
        let mut cur = node;
        loop {
            if Some(cur) == stop {
                return None;
            }
            if let Some(next) = self.next_sibling(cur) {
                return Some(next);
            }
            cur = self.parent(cur)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_navigate() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append(root, div);
        doc.append(div, a);
        doc.append(div, b);

        assert_eq!(doc.children(div), vec![a, b]);
        assert_eq!(doc.parent(a), Some(div));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.prev_sibling(b), Some(a));
        assert_eq!(doc.text_content(div), "ab");
    }

    #[test]
    fn detach_and_insert() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        doc.append(root, a);
        doc.append(root, c);
        doc.insert_before(c, b);
        assert_eq!(doc.children(root), vec![a, b, c]);

        doc.detach(b);
        assert_eq!(doc.children(root), vec![a, c]);
        doc.insert_after(c, b);
        assert_eq!(doc.children(root), vec![a, c, b]);
    }

    #[test]
    fn typeof_merging() {
        let mut doc = Document::new();
        let span = doc.create_element("span");
        doc.set_attr(span, "typeof", "mw:Image");
        doc.add_typeof(span, "mw:Transclusion");
        assert_eq!(doc.attr(span, "typeof"), Some("mw:Transclusion mw:Image"));
        assert!(doc.has_typeof(span, "mw:Image"));
        assert!(doc.has_typeof(span, "mw:Transclusion"));
        assert!(!doc.has_typeof(span, "mw:Param"));
    }

    #[test]
    fn adopt_subtree_copies_data() {
        let mut frag = Document::new();
        let p = frag.create_element("p");
        let t = frag.create_text("hi");
        frag.append(frag.root(), p);
        frag.append(p, t);
        frag.dp_mut(p).fostered = true;

        let mut doc = Document::new();
        let copied = doc.adopt_subtree(&frag, p);
        assert!(doc.is_element_named(copied, "p"));
        assert_eq!(doc.text_content(copied), "hi");
        assert!(doc.dp(copied).fostered);
    }
}
