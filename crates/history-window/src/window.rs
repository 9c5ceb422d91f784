//! Ring-Backed History Window

use crate::HistoryError;

/// Fixed-capacity FIFO of the most recent values
///
/// Storage grows up to `capacity`, after which each push overwrites the
/// oldest slot and hands the overwritten value back to the caller.
#[derive(Debug, Clone)]
pub struct HistoryWindow<T> {
    /// Backing storage, never longer than `capacity`
    storage: Vec<T>,
    /// Maximum number of retained values
    capacity: usize,
    /// Index of the oldest value once the storage is full
    head: usize,
}

impl<T: Copy> HistoryWindow<T> {
    /// Create a new window with the given capacity
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        })
    }

    /// Push a value, returning the evicted oldest value when the window was full
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.storage.len() < self.capacity {
            self.storage.push(value);
            return None;
        }

        let evicted = std::mem::replace(&mut self.storage[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Number of values currently retained
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Maximum number of retained values
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.storage.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// Clear the window
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = 0;
    }
}
