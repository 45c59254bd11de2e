//! Fire-and-forget staleness broadcasts.
//!
//! Mutation pipelines announce which collection changed; consumers re-run the
//! fetch pipeline on their own schedule. There is no ordering guarantee against
//! fetches already in flight.

use tokio::sync::broadcast;

use super::CollectionScope;

const CHANNEL_CAPACITY: usize = 64;

/// A collection whose cached reads are stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub scope: CollectionScope,
}

#[derive(Clone)]
pub struct Invalidations {
    sender: broadcast::Sender<Invalidation>,
}

impl Default for Invalidations {
    fn default() -> Self {
        Self::new()
    }
}

impl Invalidations {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.sender.subscribe()
    }

    pub fn notify(&self, scope: &CollectionScope) {
        // No subscribers is fine; nobody is showing this collection
        let receivers = self
            .sender
            .send(Invalidation {
                scope: scope.clone(),
            })
            .unwrap_or(0);
        tracing::debug!("Invalidated {} ({} subscribers)", scope, receivers);
    }
}
