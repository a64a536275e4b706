//! Bounded queue that drops its oldest item on overflow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::Mutex;
use tokio::sync::Notify;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer queue connecting the core to its asynchronous collaborators.
///
/// Producers never block: pushing into a full queue evicts the oldest item.
pub struct DropOldestQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Enqueue an item. Returns false if the queue is closed.
    pub fn push(&self, item: T) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.items.len() >= self.capacity {
                state.items.pop_front();
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Queue full ({}), dropped oldest item ({total} total)", self.capacity);
            }
            state.items.push_back(item);
        }
        self.notify.notify_waiters();
        true
    }

    /// Remove up to `max` items, oldest first.
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut state = self.state.lock();
        let n = max.min(state.items.len());
        state.items.drain(..n).collect()
    }

    /// Reject further pushes. Queued items can still be drained.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Wait until the queue holds an item or is closed.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            {
                let state = self.state.lock();
                if !state.items.is_empty() || state.closed {
                    return;
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = DropOldestQueue::new(3);
        for i in 0..5 {
            assert!(queue.push(i));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.drain(2), vec![2, 3]);
        assert_eq!(queue.drain(10), vec![4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_closed_rejects_but_drains() {
        let queue = DropOldestQueue::new(4);
        queue.push("a");
        queue.close();
        assert!(!queue.push("b"));
        assert!(queue.is_closed());
        assert_eq!(queue.drain(usize::MAX), vec!["a"]);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_push_and_close() {
        let queue = Arc::new(DropOldestQueue::new(2));

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.wait().await;
                queue.drain(1)
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(7u32);
        assert_eq!(waiter.await.unwrap(), vec![7]);

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.wait().await })
        };
        queue.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
