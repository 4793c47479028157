// src/acquisition/ring_buffer.rs
//! Fixed-capacity eviction ring
//!
//! Unlike a bounded queue, a full ring never rejects a push: the oldest entry
//! is overwritten and handed back to the caller.

/// Overwrite-oldest ring with O(1) push
#[derive(Debug, Clone)]
pub struct SampleRing<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index of the oldest entry once the ring has wrapped
    head: usize,
}

/// Ring construction errors
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("Invalid ring capacity (must be at least 1)")]
    InvalidCapacity,
}

impl<T> SampleRing<T> {
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::InvalidCapacity);
        }

        Ok(Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        })
    }

    /// Append an entry, returning the evicted oldest entry when full
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            return None;
        }

        let evicted = std::mem::replace(&mut self.slots[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn newest(&self) -> Option<&T> {
        if self.slots.len() < self.capacity || self.head == 0 {
            self.slots.last()
        } else {
            self.slots.get(self.head - 1)
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill level (0.0 to 1.0)
    pub fn utilization(&self) -> f32 {
        self.slots.len() as f32 / self.capacity as f32
    }
}

impl<T: Clone> SampleRing<T> {
    /// Owned copy in arrival order
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.slots.len());
        out.extend_from_slice(&self.slots[self.head..]);
        out.extend_from_slice(&self.slots[..self.head]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_below_capacity() {
        let mut ring = SampleRing::new(4).unwrap();
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.to_vec(), vec![1, 2]);
        assert_eq!(ring.newest(), Some(&2));
    }

    #[test]
    fn test_full_ring_evicts_oldest() {
        let mut ring = SampleRing::new(3).unwrap();
        for i in 0..3 {
            ring.push(i);
        }
        assert!(ring.is_full());

        assert_eq!(ring.push(3), Some(0));
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.to_vec(), vec![2, 3, 4]);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.newest(), Some(&4));
    }

    #[test]
    fn test_wraps_back_to_start() {
        let mut ring = SampleRing::new(2).unwrap();
        for i in 0..6 {
            ring.push(i);
        }
        assert_eq!(ring.to_vec(), vec![4, 5]);
        assert_eq!(ring.newest(), Some(&5));
    }

    #[test]
    fn test_utilization_and_clear() {
        let mut ring = SampleRing::new(4).unwrap();
        assert_eq!(ring.utilization(), 0.0);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.utilization(), 0.5);

        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.newest(), None);
    }

    #[test]
    fn test_invalid_capacity() {
        assert_eq!(SampleRing::<i32>::new(0).unwrap_err(), RingError::InvalidCapacity);
        assert!(SampleRing::<i32>::new(3).is_ok());
    }
}
