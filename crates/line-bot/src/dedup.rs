//! Deduplication store for inbound webhook events

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Guards against double-processing redelivered webhook events.
///
/// Uses the per-event `webhookEventId` as the stable dedup key. The set is
/// process-local and bounded: once `capacity` ids are held, the oldest are
/// evicted. This covers provider redelivery, not multi-replica delivery.
#[derive(Clone)]
pub struct DedupStore {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

struct Inner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                seen: HashSet::new(),
                order: VecDeque::new(),
            })),
            capacity,
        }
    }

    /// Returns `true` if this event id has already been processed.
    pub fn is_duplicate(&self, event_id: &str) -> bool {
        let inner = self.inner.lock().expect("dedup lock");
        if inner.seen.contains(event_id) {
            debug!("Duplicate event detected: {}", event_id);
            return true;
        }
        false
    }

    /// Mark an event id as seen, evicting the oldest id at capacity.
    pub fn mark_seen(&self, event_id: &str) {
        let mut inner = self.inner.lock().expect("dedup lock");
        if !inner.seen.insert(event_id.to_string()) {
            return;
        }
        inner.order.push_back(event_id.to_string());
        if inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
    }
}
