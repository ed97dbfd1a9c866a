//! Per-device bounded feeds for telemetry samples and security alerts
//!
//! Entries are kept in arrival order (no timestamp sorting). Each device has
//! its own ring buffer; when it is full the oldest entry is evicted.

use crate::models::{SecurityAlert, TelemetrySample};
use std::collections::{HashMap, VecDeque};

/// Fixed-capacity FIFO buffer
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append, evicting the oldest entry when full. Returns the evicted entry.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Ring buffers keyed by device id
#[derive(Debug, Clone)]
pub struct Feed<T> {
    buffers: HashMap<String, RingBuffer<T>>,
    capacity: usize,
}

pub type TelemetryFeed = Feed<TelemetrySample>;
pub type AlertFeed = Feed<SecurityAlert>;

impl<T> Feed<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, device_id: &str, item: T) {
        let capacity = self.capacity;
        self.buffers
            .entry(device_id.to_string())
            .or_insert_with(|| RingBuffer::new(capacity))
            .push(item);
    }

    pub fn latest(&self, device_id: &str) -> Option<&T> {
        self.buffers.get(device_id).and_then(RingBuffer::latest)
    }

    /// Entries for a device in arrival order (empty when never fed)
    pub fn entries(&self, device_id: &str) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.buffers.get(device_id).into_iter().flat_map(RingBuffer::iter)
    }

    pub fn len(&self, device_id: &str) -> usize {
        self.buffers.get(device_id).map_or(0, RingBuffer::len)
    }
}

impl<T: PartialEq> Feed<T> {
    /// Append `item` unless it equals the device's latest entry.
    /// Polls return the same latest sample until the device reports again.
    pub fn push_if_new(&mut self, device_id: &str, item: T) -> bool {
        if self.latest(device_id) == Some(&item) {
            return false;
        }
        self.push(device_id, item);
        true
    }

    /// Append every item not already buffered for the device, in the given
    /// order. The alert endpoint returns its whole window on each poll.
    pub fn merge_new(&mut self, device_id: &str, items: impl IntoIterator<Item = T>) -> usize {
        let mut appended = 0;
        for item in items {
            let known = self
                .buffers
                .get(device_id)
                .is_some_and(|buffer| buffer.iter().any(|existing| *existing == item));
            if !known {
                self.push(device_id, item);
                appended += 1;
            }
        }
        appended
    }
}
