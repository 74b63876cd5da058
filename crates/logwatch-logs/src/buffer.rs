use std::collections::VecDeque;

/// Bounded FIFO buffer that evicts the oldest item when full.
///
/// Owned by a single writer; readers see it through snapshots.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    /// Internal storage
    items: VecDeque<T>,

    /// Maximum capacity
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a new buffer with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new item, returning the evicted oldest item if at capacity
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// All items, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
