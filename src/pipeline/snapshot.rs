//! In-memory host over a serialized page tree.
//!
//! Used by the `scan` command and by tests. Every element gets a stable
//! handle when it enters the tree; the page is one row per visible
//! element tall.
use std::collections::{HashMap, HashSet};

use super::host::{FeedHost, HostItem, ItemHandle};
use crate::node::FeedNode;
use crate::selector::Selector;

/// Height of one visible element.
pub const ROW_PX: i64 = 10;

/// Handles mirroring the shape of the node tree.
#[derive(Debug, Clone)]
struct Handles {
    handle: ItemHandle,
    children: Vec<Handles>,
}

#[derive(Debug, Clone)]
pub struct SnapshotHost {
    root: FeedNode,
    handles: Handles,
    next_handle: ItemHandle,
    hidden: HashSet<ItemHandle>,
    years: HashMap<ItemHandle, i32>,
    offset: i64,
    activated: Vec<ItemHandle>,
    location: String,
}

impl SnapshotHost {
    pub fn new(root: FeedNode) -> Self {
        let mut next_handle = 0;
        let handles = assign(&root, &mut next_handle);
        Self {
            root,
            handles,
            next_handle,
            hidden: HashSet::new(),
            years: HashMap::new(),
            offset: 0,
            activated: Vec::new(),
            location: "/".to_string(),
        }
    }

    /// Sets the path reported by [`FeedHost::location_path`].
    pub fn with_location(mut self, path: impl Into<String>) -> Self {
        self.location = path.into();
        self
    }

    pub fn root_handle(&self) -> ItemHandle {
        self.handles.handle
    }

    /// Appends `node` as the last child of `parent`; returns the new handle.
    pub fn append(&mut self, parent: ItemHandle, node: FeedNode) -> Option<ItemHandle> {
        let handles = assign(&node, &mut self.next_handle);
        let new_handle = handles.handle;
        let (target, target_handles) = find_mut(&mut self.root, &mut self.handles, parent)?;
        target.children.push(node);
        target_handles.children.push(handles);
        Some(new_handle)
    }

    pub fn is_hidden(&self, item: ItemHandle) -> bool {
        self.hidden.contains(&item)
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    pub fn year_annotation(&self, item: ItemHandle) -> Option<i32> {
        self.years.get(&item).copied()
    }

    /// Elements clicked so far, in order.
    pub fn activated(&self) -> &[ItemHandle] {
        &self.activated
    }

    /// Nodes and handles from the root down to `target`.
    fn chain(&self, target: ItemHandle) -> Option<Vec<(&FeedNode, &Handles)>> {
        let mut chain = Vec::new();
        locate(&self.root, &self.handles, target, &mut chain).then_some(chain)
    }

    fn visible_rows(&self, node: &FeedNode, handles: &Handles) -> i64 {
        if self.hidden.contains(&handles.handle) {
            return 0;
        }
        1 + node
            .children
            .iter()
            .zip(&handles.children)
            .map(|(n, h)| self.visible_rows(n, h))
            .sum::<i64>()
    }
}

fn assign(node: &FeedNode, next: &mut ItemHandle) -> Handles {
    let handle = *next;
    *next += 1;
    Handles {
        handle,
        children: node.children.iter().map(|c| assign(c, next)).collect(),
    }
}

fn find_mut<'a>(
    node: &'a mut FeedNode,
    handles: &'a mut Handles,
    target: ItemHandle,
) -> Option<(&'a mut FeedNode, &'a mut Handles)> {
    if handles.handle == target {
        return Some((node, handles));
    }
    node.children
        .iter_mut()
        .zip(handles.children.iter_mut())
        .find_map(|(n, h)| find_mut(n, h, target))
}

fn locate<'a>(
    node: &'a FeedNode,
    handles: &'a Handles,
    target: ItemHandle,
    chain: &mut Vec<(&'a FeedNode, &'a Handles)>,
) -> bool {
    chain.push((node, handles));
    if handles.handle == target {
        return true;
    }
    for (child, child_handles) in node.children.iter().zip(&handles.children) {
        if locate(child, child_handles, target, chain) {
            return true;
        }
    }
    chain.pop();
    false
}

fn collect_all<'a>(
    selector: &Selector,
    node: &'a FeedNode,
    handles: &Handles,
    ancestors: &mut Vec<&'a FeedNode>,
    scope: Option<ItemHandle>,
    out: &mut Vec<ItemHandle>,
) {
    let in_scope = scope.map_or(true, |s| s == handles.handle);
    if in_scope && selector.matches(node, ancestors) {
        out.push(handles.handle);
    }
    let child_scope = if in_scope { None } else { scope };
    ancestors.push(node);
    for (child, child_handles) in node.children.iter().zip(&handles.children) {
        collect_all(selector, child, child_handles, ancestors, child_scope, out);
    }
    ancestors.pop();
}

fn collect<'a>(
    selector: &Selector,
    node: &'a FeedNode,
    handles: &Handles,
    ancestors: &mut Vec<&'a FeedNode>,
    scope: Option<ItemHandle>,
    out: &mut Vec<HostItem>,
) {
    let in_scope = scope.map_or(true, |s| s == handles.handle);
    if in_scope && selector.matches(node, ancestors) {
        out.push(HostItem {
            handle: handles.handle,
            node: node.clone(),
        });
        return;
    }
    // Once inside the scope, everything below it is in scope too.
    let child_scope = if in_scope { None } else { scope };
    ancestors.push(node);
    for (child, child_handles) in node.children.iter().zip(&handles.children) {
        collect(selector, child, child_handles, ancestors, child_scope, out);
    }
    ancestors.pop();
}

impl FeedHost for SnapshotHost {
    fn items(&self, selector: &Selector, scope: Option<ItemHandle>) -> Vec<HostItem> {
        let mut out = Vec::new();
        let mut ancestors = Vec::new();
        collect(selector, &self.root, &self.handles, &mut ancestors, scope, &mut out);
        out
    }

    fn set_hidden(&mut self, item: ItemHandle, hidden: bool) {
        if hidden {
            self.hidden.insert(item);
        } else {
            self.hidden.remove(&item);
        }
    }

    fn annotate_year(&mut self, item: ItemHandle, year: i32) {
        self.years.insert(item, year);
    }

    fn scroll_offset(&self) -> i64 {
        self.offset
    }

    fn scroll_to(&mut self, offset: i64) {
        self.offset = offset.max(0);
    }

    fn page_height(&self) -> i64 {
        self.visible_rows(&self.root, &self.handles) * ROW_PX
    }

    fn select_all(&self, selector: &Selector, scope: Option<ItemHandle>) -> Vec<ItemHandle> {
        let mut out = Vec::new();
        let mut ancestors = Vec::new();
        collect_all(selector, &self.root, &self.handles, &mut ancestors, scope, &mut out);
        out
    }

    fn item(&self, handle: ItemHandle) -> Option<HostItem> {
        let chain = self.chain(handle)?;
        let (node, _) = chain.last()?;
        Some(HostItem {
            handle,
            node: (*node).clone(),
        })
    }

    fn element(&self, handle: ItemHandle) -> Option<FeedNode> {
        let chain = self.chain(handle)?;
        let (node, _) = chain.last()?;
        Some(FeedNode {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: node.text.clone(),
            children: Vec::new(),
        })
    }

    fn matches(&self, handle: ItemHandle, selector: &Selector) -> bool {
        let Some(chain) = self.chain(handle) else {
            return false;
        };
        let nodes: Vec<&FeedNode> = chain.iter().map(|(node, _)| *node).collect();
        match nodes.split_last() {
            Some((node, ancestors)) => selector.matches(node, ancestors),
            None => false,
        }
    }

    fn parent(&self, handle: ItemHandle) -> Option<ItemHandle> {
        let chain = self.chain(handle)?;
        let parent = chain.len().checked_sub(2)?;
        Some(chain[parent].1.handle)
    }

    fn next_sibling(&self, handle: ItemHandle) -> Option<ItemHandle> {
        let chain = self.chain(handle)?;
        let parent = chain.len().checked_sub(2)?;
        let siblings = &chain[parent].1.children;
        let index = siblings.iter().position(|h| h.handle == handle)?;
        siblings.get(index + 1).map(|h| h.handle)
    }

    fn activate(&mut self, handle: ItemHandle) {
        if let Some((node, _)) = find_mut(&mut self.root, &mut self.handles, handle) {
            node.attrs.insert("aria-selected".to_string(), "true".to_string());
            self.activated.push(handle);
        }
    }

    fn location_path(&self) -> String {
        self.location.clone()
    }
}
