//! Change notifications for live listeners.
//!
//! Writers publish a [`ChangeEvent`] after every successful mutation. SSE
//! handlers subscribe, and on each relevant event re-read their snapshot
//! and push it to the client.

use solestore_core::{OrderId, UserId};
use tokio::sync::broadcast;

/// Events buffered per subscriber before it is considered lagging.
const CHANNEL_CAPACITY: usize = 256;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A user's cart lines changed.
    CartChanged(UserId),
    /// An order was placed or updated.
    OrderChanged(OrderId),
    /// The catalog changed (product added, edited, deleted, reviewed or
    /// stock moved).
    ProductsChanged,
}

/// Process-wide broadcast of [`ChangeEvent`]s.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Notify current subscribers. Having none is fine.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(?event, receivers, "change published");
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        let user = UserId::generate();

        feed.publish(ChangeEvent::CartChanged(user));
        feed.publish(ChangeEvent::ProductsChanged);

        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::CartChanged(user));
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::ProductsChanged);
    }

    #[test]
    fn test_publish_without_subscribers() {
        ChangeFeed::new().publish(ChangeEvent::ProductsChanged);
    }
}
