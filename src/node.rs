//! Host-independent view of one rendered subtree.
//!
//! The host page owns the real elements. It hands the pipeline a
//! serializable copy of an item's subtree: tag name, attributes, the
//! element's own text, and its children in document order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::util::normalize_whitespace;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    /// Text directly inside this element, before its children.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FeedNode>,
}

impl FeedNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Appends a class to the `class` attribute.
    pub fn with_class(mut self, class: &str) -> Self {
        let classes = self.attrs.entry("class".to_string()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: FeedNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// Concatenated text of this element and all descendants, whitespace-collapsed.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        self.push_text(&mut raw);
        normalize_whitespace(&raw)
    }

    fn push_text(&self, out: &mut String) {
        if !self.text.is_empty() {
            out.push_str(&self.text);
            out.push(' ');
        }
        for child in &self.children {
            child.push_text(out);
        }
    }

    /// All descendants in document (pre-order) order, excluding `self`.
    pub fn descendants(&self) -> Vec<&FeedNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&FeedNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(FeedNode::subtree_len).sum::<usize>()
    }
}
