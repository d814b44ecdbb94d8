//! Item roots beyond the source's item selector.
//!
//! Some layouts render tracks in containers the selector does not name.
//! Those are found from a date element inside the track, or from a
//! titled section such as a profile's spotlight.
use std::collections::HashSet;

use super::host::{closest, FeedHost, HostItem, ItemHandle};
use crate::extract::{Discovery, Extractor};

/// Section headers are short; longer text is a description.
const MAX_HEADER_CHARS: usize = 60;

/// Selector matches first, then discovered containers in discovery order.
///
/// A discovered container is dropped when it is, sits inside, or holds a
/// selector match, or sits inside another discovered container.
pub(crate) fn item_roots<H: FeedHost + ?Sized>(
    host: &H,
    extractor: &Extractor,
    scope: Option<ItemHandle>,
) -> Vec<HostItem> {
    let selector = extractor.item_selector();
    let mut roots = host.items(selector, scope);
    if extractor.discovery().is_empty() {
        return roots;
    }

    let mut taken: HashSet<ItemHandle> = HashSet::new();
    for strategy in extractor.discovery() {
        for found in discover(host, strategy, scope) {
            if taken.contains(&found)
                || closest(host, found, selector).is_some()
                || !host.select_all(selector, Some(found)).is_empty()
                || ancestors(host, found).any(|a| taken.contains(&a))
            {
                continue;
            }
            if let Some(item) = host.item(found) {
                taken.insert(found);
                roots.push(item);
            }
        }
    }
    if !taken.is_empty() {
        tracing::trace!(discovered = taken.len(), "Discovered item roots");
    }
    roots
}

fn ancestors<H: FeedHost + ?Sized>(
    host: &H,
    handle: ItemHandle,
) -> impl Iterator<Item = ItemHandle> + '_ {
    std::iter::successors(host.parent(handle), move |&h| host.parent(h))
}

fn discover<H: FeedHost + ?Sized>(
    host: &H,
    strategy: &Discovery,
    scope: Option<ItemHandle>,
) -> Vec<ItemHandle> {
    match strategy {
        Discovery::DateAnchor {
            anchors,
            relative,
            containers,
            marker,
            max_ascent,
            stop_tag,
        } => host
            .select_all(anchors, scope)
            .into_iter()
            .filter(|&anchor| {
                host.element(anchor)
                    .is_some_and(|el| el.tag == "time" || relative.is_match(&el.text))
            })
            .filter_map(|anchor| {
                containers
                    .iter()
                    .find_map(|c| closest(host, anchor, c))
                    .or_else(|| {
                        ancestors(host, anchor)
                            .take(*max_ascent)
                            .take_while(|&a| host.element(a).is_some_and(|el| el.tag != *stop_tag))
                            .find(|&a| !host.select_all(marker, Some(a)).is_empty())
                    })
            })
            .collect(),
        // Sections are only found on whole-page scans.
        Discovery::Section { .. } if scope.is_some() => Vec::new(),
        Discovery::Section {
            headers,
            keywords,
            candidates,
            marker,
        } => {
            let mut out = Vec::new();
            for header in host.select_all(headers, None) {
                let Some(el) = host.element(header) else {
                    continue;
                };
                let text = el.text.trim().to_lowercase();
                if text.is_empty()
                    || text.chars().count() > MAX_HEADER_CHARS
                    || !keywords.iter().any(|k| text.contains(k))
                {
                    continue;
                }
                let Some(block) = section_block(host, header) else {
                    continue;
                };
                let mut picked: Vec<ItemHandle> = Vec::new();
                for candidate in host.select_all(candidates, Some(block)) {
                    if ancestors(host, candidate).any(|a| picked.contains(&a)) {
                        continue;
                    }
                    if host.select_all(marker, Some(candidate)).len() == 1 {
                        picked.push(candidate);
                    }
                }
                out.extend(picked);
            }
            out
        }
    }
}

/// The element after the header, or after its parent or grandparent.
fn section_block<H: FeedHost + ?Sized>(host: &H, header: ItemHandle) -> Option<ItemHandle> {
    std::iter::successors(Some(header), |&h| host.parent(h))
        .take(3)
        .find_map(|h| host.next_sibling(h))
}
