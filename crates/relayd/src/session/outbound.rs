//! Bounded per-session outbound queue.
//!
//! Producers (the broadcaster, on behalf of other sessions) call
//! [`OutboundQueue::deliver`], which never waits. The owning session's
//! write loop is the only consumer and awaits [`OutboundQueue::next`].
//!
//! A full queue applies the configured [`OverflowPolicy`], so a slow or
//! stalled reader only loses its own lines and never holds up the sender.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relay_core::OverflowPolicy;
use tokio::sync::Notify;

/// Outcome of a single [`OutboundQueue::deliver`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Line queued with room to spare
    Queued,
    /// Line queued after evicting the oldest pending line
    EvictedOldest,
    /// Queue full; the new line was discarded
    DroppedNewest,
    /// Session is closed; the line was discarded
    Closed,
}

#[derive(Debug, Default)]
struct Lines {
    pending: VecDeque<String>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    lines: Mutex<Lines>,
    ready: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

/// Cheap-to-clone handle to a session's outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    shared: Arc<Shared>,
}

impl OutboundQueue {
    /// Creates an empty queue. A capacity of zero is treated as one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                lines: Mutex::new(Lines {
                    pending: VecDeque::with_capacity(capacity.min(64)),
                    closed: false,
                }),
                ready: Notify::new(),
                capacity,
                policy,
            }),
        }
    }

    /// Appends a line without blocking.
    pub fn deliver(&self, line: String) -> Delivery {
        let outcome = {
            let mut lines = self.lock();
            if lines.closed {
                return Delivery::Closed;
            }

            if lines.pending.len() < self.shared.capacity {
                lines.pending.push_back(line);
                Delivery::Queued
            } else {
                match self.shared.policy {
                    OverflowPolicy::DropOldest => {
                        lines.pending.pop_front();
                        lines.pending.push_back(line);
                        Delivery::EvictedOldest
                    }
                    OverflowPolicy::DropNewest => return Delivery::DroppedNewest,
                }
            }
        };

        self.shared.ready.notify_one();
        outcome
    }

    /// Waits for the next line.
    ///
    /// Returns `None` once the queue is closed; lines still pending at
    /// that point are discarded.
    pub async fn next(&self) -> Option<String> {
        loop {
            {
                let mut lines = self.lock();
                if lines.closed {
                    return None;
                }
                if let Some(line) = lines.pending.pop_front() {
                    return Some(line);
                }
            }
            self.shared.ready.notified().await;
        }
    }

    /// Closes the queue. Later deliveries return [`Delivery::Closed`].
    pub fn close(&self) {
        {
            let mut lines = self.lock();
            lines.closed = true;
            lines.pending.clear();
        }
        self.shared.ready.notify_one();
    }

    /// Number of lines waiting to be written.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Lines are plain data, a panic mid-push cannot leave them inconsistent
    fn lock(&self) -> MutexGuard<'_, Lines> {
        self.shared
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
