use crate::filter::FilterConfig;
use crate::node::FeedNode;
use crate::selector::Selector;

/// Opaque, stable identity of an element owned by the host page.
pub type ItemHandle = u64;

/// One item root found on the page, with a copy of its subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct HostItem {
    pub handle: ItemHandle,
    pub node: FeedNode,
}

/// The page the controller works on.
///
/// The host owns the elements. The controller only reads them, toggles
/// their visibility, attaches a year annotation, and moves the scroll
/// position.
pub trait FeedHost {
    /// Outermost elements matching `selector`, in document order.
    ///
    /// With `scope`, only that subtree is searched (the scope element
    /// itself included); ancestors outside it still count for matching.
    fn items(&self, selector: &Selector, scope: Option<ItemHandle>) -> Vec<HostItem>;

    fn set_hidden(&mut self, item: ItemHandle, hidden: bool);

    fn annotate_year(&mut self, item: ItemHandle, year: i32);

    fn scroll_offset(&self) -> i64;

    fn scroll_to(&mut self, offset: i64);

    fn scroll_by(&mut self, delta: i64) {
        let offset = self.scroll_offset();
        self.scroll_to(offset.saturating_add(delta));
    }

    /// Total scrollable height; shrinks when items are hidden.
    fn page_height(&self) -> i64;

    // Tree navigation. A host that cannot walk its tree keeps the
    // defaults; item discovery and the chip bar then find nothing.

    /// Every element matching `selector`, nested ones included, in
    /// document order. `scope` works as in [`FeedHost::items`].
    fn select_all(&self, _selector: &Selector, _scope: Option<ItemHandle>) -> Vec<ItemHandle> {
        Vec::new()
    }

    /// The element and its subtree.
    fn item(&self, _handle: ItemHandle) -> Option<HostItem> {
        None
    }

    /// The element without its children.
    fn element(&self, handle: ItemHandle) -> Option<FeedNode> {
        self.item(handle).map(|item| FeedNode {
            children: Vec::new(),
            ..item.node
        })
    }

    fn matches(&self, _handle: ItemHandle, _selector: &Selector) -> bool {
        false
    }

    fn parent(&self, _handle: ItemHandle) -> Option<ItemHandle> {
        None
    }

    fn next_sibling(&self, _handle: ItemHandle) -> Option<ItemHandle> {
        None
    }

    /// Clicks the element.
    fn activate(&mut self, _handle: ItemHandle) {}

    /// Path component of the page address.
    fn location_path(&self) -> String {
        "/".to_string()
    }
}

/// Nearest element matching `selector`, starting at `handle` itself.
pub(crate) fn closest<H: FeedHost + ?Sized>(
    host: &H,
    handle: ItemHandle,
    selector: &Selector,
) -> Option<ItemHandle> {
    std::iter::successors(Some(handle), |&h| host.parent(h)).find(|&h| host.matches(h, selector))
}

/// Notifications from the host to a running controller.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A subtree was inserted under the given element.
    SubtreeInserted(ItemHandle),
    /// The context's configuration changed.
    ConfigChanged(FilterConfig),
    /// The context is going away; stop immediately.
    ContextDestroyed,
}
