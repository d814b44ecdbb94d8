//! Attribute extraction and classification pipeline for one context.
//!
//! A [`Controller`] drives the [`Extractor`](crate::extract::Extractor)
//! and the filter evaluator over a [`FeedHost`], reacting to
//! [`HostEvent`]s and forcing progressive loading with a
//! [`ConvergenceDriver`].

mod chips;
mod controller;
mod discover;
mod host;
mod scroll;
mod snapshot;

pub use controller::{Controller, ControllerOptions, ItemOutcome, PassReport};
pub use host::{FeedHost, HostEvent, HostItem, ItemHandle};
pub use scroll::{ConvergenceDriver, ScrollOptions, ScrollSummary, StopReason};
pub use snapshot::{SnapshotHost, ROW_PX};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::service::{ContextEvent, Service};

/// Forwards service events for `context_id` to a controller's event channel.
///
/// A reload fetches the context's effective configuration. The task ends
/// when the context is removed, the controller's channel closes, or the
/// service goes away.
pub fn spawn_context_bridge(
    service: &Service,
    context_id: i64,
    events: mpsc::Sender<HostEvent>,
) -> JoinHandle<()> {
    let mut rx = service.subscribe();
    let settings = service.settings().clone();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // A missed event may have been a reload for this context.
                    tracing::warn!(context_id, missed, "Context events lagged");
                    ContextEvent::Reload(context_id)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let forwarded = match event {
                ContextEvent::Reload(id) if id == context_id => {
                    HostEvent::ConfigChanged(settings.get(context_id).await)
                }
                ContextEvent::Removed(id) if id == context_id => {
                    let _ = events.send(HostEvent::ContextDestroyed).await;
                    break;
                }
                _ => continue,
            };
            if events.send(forwarded).await.is_err() {
                break;
            }
        }
    })
}
