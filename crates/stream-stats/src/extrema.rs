//! Sliding Window Extrema

use std::collections::VecDeque;

/// Monotonic deques tracking the minimum and maximum of a FIFO window
///
/// The min deque is non-decreasing and the max deque non-increasing from
/// front to back, so both extrema sit at the fronts. Eviction never rescans.
#[derive(Debug, Clone, Default)]
pub struct ExtremaDeques {
    min: VecDeque<f64>,
    max: VecDeque<f64>,
}

impl ExtremaDeques {
    /// Create empty deques
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value entering the window
    pub fn push(&mut self, value: f64) {
        while self.min.back().is_some_and(|&back| back > value) {
            self.min.pop_back();
        }
        while self.max.back().is_some_and(|&back| back < value) {
            self.max.pop_back();
        }
        self.min.push_back(value);
        self.max.push_back(value);
    }

    /// Record the oldest value leaving the window
    ///
    /// Must be called in FIFO order with the values passed to [`push`](Self::push).
    pub fn evict(&mut self, value: f64) {
        if self.min.front() == Some(&value) {
            self.min.pop_front();
        }
        if self.max.front() == Some(&value) {
            self.max.pop_front();
        }
    }

    /// Current window minimum
    pub fn min(&self) -> Option<f64> {
        self.min.front().copied()
    }

    /// Current window maximum
    pub fn max(&self) -> Option<f64> {
        self.max.front().copied()
    }

    /// Drop all tracked values
    pub fn clear(&mut self) {
        self.min.clear();
        self.max.clear();
    }
}
