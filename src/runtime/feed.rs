//! Observation feed backed by a drop-oldest queue.

use std::sync::Arc;

use crate::schema::{FeedError, ObservationEvent, ObservationFeed};

use super::queue::DropOldestQueue;

/// Create a connected producer handle and feed.
pub fn observation_channel(capacity: usize) -> (FeedHandle, QueueFeed) {
    let queue = Arc::new(DropOldestQueue::new(capacity));
    (
        FeedHandle {
            queue: Arc::clone(&queue),
        },
        QueueFeed { queue },
    )
}

/// Producer side: anything that observes the outside world pushes here.
#[derive(Clone)]
pub struct FeedHandle {
    queue: Arc<DropOldestQueue<ObservationEvent>>,
}

impl FeedHandle {
    /// Enqueue an event. Returns false once the feed is closed.
    pub fn push(&self, event: ObservationEvent) -> bool {
        self.queue.push(event)
    }

    /// Signal that no more events will arrive.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Events evicted because the tick loop fell behind.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Consumer side, polled once per tick.
pub struct QueueFeed {
    queue: Arc<DropOldestQueue<ObservationEvent>>,
}

impl ObservationFeed for QueueFeed {
    fn poll_batch(&mut self, max: usize) -> Result<Vec<ObservationEvent>, FeedError> {
        let batch = self.queue.drain(max);
        if batch.is_empty() && self.queue.is_closed() {
            return Err(FeedError::Closed);
        }
        Ok(batch)
    }
}
