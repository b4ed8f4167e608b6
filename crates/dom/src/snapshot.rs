use crate::error::{DomError, Result};
use crate::visibility::element_hidden;
use ego_tree::{NodeId, NodeRef};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Child-index chain from the document root down to a node. Stable across
/// re-parses of a document that only grows by appending content, which is
/// what lets anchors survive incremental rebuilds.
pub type NodePath = Vec<usize>;

/// Tags that force a line break between collected text runs.
const BLOCK_BREAK_TAGS: &[&str] = &[
    "p", "div", "li", "tr", "section", "article", "blockquote", "pre", "h1", "h2", "h3", "h4",
    "h5", "h6",
];

/// Compiles a CSS selector string, mapping parse failures into [`DomError`].
pub fn compile_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| DomError::invalid_selector(css, err.to_string()))
}

/// One parsed page: the immutable document tree, the host name it came
/// from, and precomputed document-order offsets for every element.
pub struct PageSnapshot {
    html: Html,
    host: String,
    offsets: HashMap<NodeId, usize>,
    text_len: usize,
}

impl PageSnapshot {
    /// Parses an HTML document. Parsing is lenient and never fails; broken
    /// markup degrades to whatever tree the parser recovers.
    pub fn parse(source: &str, host: impl Into<String>) -> Self {
        let html = Html::parse_document(source);
        let mut offsets = HashMap::new();
        let mut count = 0usize;
        index_offsets(html.tree.root(), &mut count, &mut offsets);
        Self {
            html,
            host: host.into(),
            offsets,
            text_len: count,
        }
    }

    /// Host name of the page this snapshot was taken from.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Total rendered character count of the document.
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// All elements matching the selector, in document order.
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> scraper::html::Select<'a, 'b> {
        self.html.select(selector)
    }

    /// Whether at least one element matches the selector.
    pub fn matches(&self, selector: &Selector) -> bool {
        self.html.select(selector).next().is_some()
    }

    /// Resolves a node id back to an element of this snapshot.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Count of rendered characters strictly before the node in document
    /// order. This is the coordinate space scroll targeting works in.
    pub fn offset_of(&self, id: NodeId) -> Option<usize> {
        self.offsets.get(&id).copied()
    }

    /// Walks a child-index path from the root.
    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeRef<'_, Node>> {
        let mut node = self.html.tree.root();
        for &index in path {
            node = node.children().nth(index)?;
        }
        Some(node)
    }

    /// Like [`Self::node_at_path`] but requires the target to be an element.
    pub fn element_at_path(&self, path: &[usize]) -> Option<ElementRef<'_>> {
        self.node_at_path(path).and_then(ElementRef::wrap)
    }

    /// Finds the element carrying the given `id` attribute, if any. A linear
    /// scan on purpose: ids are page data and need not be valid CSS
    /// identifiers, so a selector lookup would reject some of them.
    pub fn element_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().attr("id") == Some(id))
    }
}

impl std::fmt::Debug for PageSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSnapshot")
            .field("host", &self.host)
            .field("text_len", &self.text_len)
            .finish_non_exhaustive()
    }
}

/// Child-index chain of the node, root-first.
pub fn node_path(node: NodeRef<'_, Node>) -> NodePath {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(parent) = current.parent() {
        path.push(current.prev_siblings().count());
        current = parent;
    }
    path.reverse();
    path
}

/// Rendered text of the element: visible descendants only, whitespace
/// collapsed to single spaces, ends trimmed.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(*element, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            if element.name() == "br" {
                out.push('\n');
                return;
            }
            let hidden = ElementRef::wrap(node).map(element_hidden).unwrap_or(true);
            if hidden {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
            if BLOCK_BREAK_TAGS.contains(&element.name()) {
                out.push('\n');
            }
        }
        _ => {}
    }
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

fn index_offsets(
    node: NodeRef<'_, Node>,
    count: &mut usize,
    offsets: &mut HashMap<NodeId, usize>,
) {
    match node.value() {
        Node::Text(text) => *count += text.chars().count(),
        Node::Element(_) => {
            offsets.insert(node.id(), *count);
            let hidden = ElementRef::wrap(node).map(element_hidden).unwrap_or(true);
            if !hidden {
                for child in node.children() {
                    index_offsets(child, count, offsets);
                }
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                index_offsets(child, count, offsets);
            }
        }
        _ => {}
    }
}
