//! CSS selector queries over the response document.
//!
//! [`Response::css`] parses the decoded text into a DOM once and caches it;
//! matches come back as owned [`Node`] values so they can outlive the lock
//! around the cached document and cross task boundaries freely.

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::{Response, lock};

/// A matched element, detached from the cached document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    html: String,
    inner_html: String,
    text_direct: String,
    text_all: String,
    attrs: Vec<(String, String)>,
}

/// The no-op node returned for out-of-range lookups.
static EMPTY_NODE: Node = Node {
    html: String::new(),
    inner_html: String::new(),
    text_direct: String::new(),
    text_all: String::new(),
    attrs: Vec::new(),
};

impl Node {
    fn from_element(element: ElementRef<'_>) -> Self {
        let text_direct = element
            .children()
            .filter_map(|child| child.value().as_text().map(|text| &**text))
            .collect();
        let text_all = element.text().collect();
        let attrs = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            html: element.html(),
            inner_html: element.inner_html(),
            text_direct,
            text_all,
            attrs,
        }
    }

    /// Direct text-node children only, excluding descendant element text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text_direct
    }

    /// Full recursive text content of the node.
    #[must_use]
    pub fn text_all(&self) -> &str {
        &self.text_all
    }

    /// Attribute value, or `None` when absent.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, or `default` when absent.
    #[must_use]
    pub fn attr_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attr(name).unwrap_or(default)
    }

    /// Outer HTML of the node; empty for the no-op node.
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// True for the no-op node returned by out-of-range lookups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Re-queries within this node, matching descendants only.
    #[must_use]
    pub fn css(&self, selector: &str) -> NodeList {
        if self.inner_html.is_empty() {
            return NodeList::default();
        }
        let Ok(parsed) = Selector::parse(selector) else {
            warn!(selector, "failed to parse CSS selector, matching nothing");
            return NodeList::default();
        };
        // Re-parsing the inner HTML makes every match a descendant of this
        // node; the node itself is never part of the fragment.
        let fragment = Html::parse_fragment(&self.inner_html);
        let nodes = fragment.select(&parsed).map(Node::from_element).collect();
        NodeList { nodes }
    }
}

/// An ordered collection of matched nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    /// The first matched node, or the empty no-op node.
    #[must_use]
    pub fn first(&self) -> &Node {
        self.at(0)
    }

    /// The node at `index`, or the empty no-op node when out of range.
    #[must_use]
    pub fn at(&self, index: usize) -> &Node {
        self.nodes.get(index).unwrap_or(&EMPTY_NODE)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Re-queries within every node of the set, concatenating the matches in
    /// document order per node.
    #[must_use]
    pub fn css(&self, selector: &str) -> NodeList {
        let nodes = self
            .nodes
            .iter()
            .flat_map(|node| node.css(selector).nodes)
            .collect();
        NodeList { nodes }
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl Response {
    /// Returns every node matching the selector, building the DOM from the
    /// decoded text on first use and caching it. The cache is rebuilt when
    /// the active charset changes. Invalid selectors match nothing.
    #[must_use]
    pub fn css(&self, selector: &str) -> NodeList {
        let Ok(parsed) = Selector::parse(selector) else {
            warn!(selector, "failed to parse CSS selector, matching nothing");
            return NodeList::default();
        };

        let (charset, text) = self.decoded_text();
        let mut cache = lock(&self.dom_cache);
        if cache.dom.is_none() || cache.charset != charset {
            cache.dom = Some(Html::parse_document(&text));
            cache.charset = charset;
        }
        let Some(dom) = cache.dom.as_ref() else {
            return NodeList::default();
        };
        let nodes = dom.select(&parsed).map(Node::from_element).collect();
        NodeList { nodes }
    }
}
