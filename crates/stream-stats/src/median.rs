//! Sliding Window Median
//!
//! Two balanced heaps (max-heap for the lower half, min-heap for the upper
//! half) with lazy deletion. Evicted values are recorded as pending and
//! physically dropped once they surface at a heap top, keeping both insert
//! and removal at O(log H) amortized.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Heap entry ordered by `f64::total_cmp`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample(f64);

impl Eq for Sample {}

impl Ord for Sample {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Sample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fold -0.0 into 0.0 so equal values share one pending key
fn canonical(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Incrementally maintained median of a multiset
#[derive(Debug, Clone, Default)]
pub struct MedianHeaps {
    /// Max-heap holding the lower half
    lower: BinaryHeap<Sample>,
    /// Min-heap holding the upper half
    upper: BinaryHeap<Reverse<Sample>>,
    /// Live entries in `lower`
    lower_len: usize,
    /// Live entries in `upper`
    upper_len: usize,
    /// Removed values still physically present, keyed by bit pattern
    pending: HashMap<u64, usize>,
}

impl MedianHeaps {
    /// Create empty heaps
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.lower_len + self.upper_len
    }

    /// Check if no live values remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a value
    pub fn insert(&mut self, value: f64) {
        let value = canonical(value);
        if self.lower.peek().map_or(true, |top| value <= top.0) {
            self.lower.push(Sample(value));
            self.lower_len += 1;
        } else {
            self.upper.push(Reverse(Sample(value)));
            self.upper_len += 1;
        }
        self.rebalance();
    }

    /// Remove one occurrence of a value previously inserted
    pub fn remove(&mut self, value: f64) {
        let value = canonical(value);
        *self.pending.entry(value.to_bits()).or_insert(0) += 1;

        match self.lower.peek().map(|top| top.0) {
            Some(top) if value <= top => {
                self.lower_len -= 1;
                if value == top {
                    self.prune_lower();
                }
            }
            _ => {
                self.upper_len -= 1;
                if self.upper.peek().map(|top| top.0 .0) == Some(value) {
                    self.prune_upper();
                }
            }
        }

        self.rebalance();
        self.compact_if_bloated();
    }

    /// Current median: top of the larger half, or the mean of both tops
    pub fn median(&self) -> Option<f64> {
        let lower = self.lower.peek().map(|top| top.0)?;
        if self.lower_len > self.upper_len {
            return Some(lower);
        }
        let upper = self.upper.peek().map(|top| top.0 .0)?;
        Some((lower + upper) / 2.0)
    }

    /// Drop all values
    pub fn clear(&mut self) {
        self.lower.clear();
        self.upper.clear();
        self.lower_len = 0;
        self.upper_len = 0;
        self.pending.clear();
    }

    /// Restore `lower_len - upper_len` to 0 or 1
    fn rebalance(&mut self) {
        if self.lower_len > self.upper_len + 1 {
            if let Some(Sample(top)) = self.lower.pop() {
                self.upper.push(Reverse(Sample(top)));
                self.lower_len -= 1;
                self.upper_len += 1;
                self.prune_lower();
            }
        } else if self.upper_len > self.lower_len {
            if let Some(Reverse(Sample(top))) = self.upper.pop() {
                self.lower.push(Sample(top));
                self.upper_len -= 1;
                self.lower_len += 1;
                self.prune_upper();
            }
        }
    }

    /// Consume one pending removal for `value`, if any
    fn take_pending(pending: &mut HashMap<u64, usize>, value: f64) -> bool {
        let key = value.to_bits();
        match pending.get_mut(&key) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    pending.remove(&key);
                }
                true
            }
            None => false,
        }
    }

    fn prune_lower(&mut self) {
        while let Some(&Sample(top)) = self.lower.peek() {
            if !Self::take_pending(&mut self.pending, top) {
                break;
            }
            self.lower.pop();
        }
    }

    fn prune_upper(&mut self) {
        while let Some(&Reverse(Sample(top))) = self.upper.peek() {
            if !Self::take_pending(&mut self.pending, top) {
                break;
            }
            self.upper.pop();
        }
    }

    /// Rebuild both heaps once dead entries outnumber live ones
    ///
    /// Values buried under a heap top (e.g. a steadily rising signal leaves
    /// evicted lows deep in the lower half) would otherwise never surface.
    fn compact_if_bloated(&mut self) {
        let physical = self.lower.len() + self.upper.len();
        if physical <= 2 * self.len() + 16 {
            return;
        }

        let mut pending = std::mem::take(&mut self.pending);
        let lower: Vec<Sample> = self
            .lower
            .drain()
            .filter(|s| !Self::take_pending(&mut pending, s.0))
            .collect();
        let upper: Vec<Reverse<Sample>> = self
            .upper
            .drain()
            .filter(|s| !Self::take_pending(&mut pending, s.0 .0))
            .collect();

        self.lower = BinaryHeap::from(lower);
        self.upper = BinaryHeap::from(upper);
        debug_assert!(pending.is_empty());
        debug_assert_eq!(self.lower.len(), self.lower_len);
        debug_assert_eq!(self.upper.len(), self.upper_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(values: &[f64]) -> f64 {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    #[test]
    fn test_odd_and_even_counts() {
        let mut heaps = MedianHeaps::new();
        heaps.insert(5.0);
        assert_eq!(heaps.median(), Some(5.0));
        heaps.insert(1.0);
        assert_eq!(heaps.median(), Some(3.0));
        heaps.insert(3.0);
        assert_eq!(heaps.median(), Some(3.0));
    }

    #[test]
    fn test_remove_duplicates() {
        let mut heaps = MedianHeaps::new();
        for v in [2.0, 2.0, 2.0, 7.0, 9.0] {
            heaps.insert(v);
        }
        heaps.remove(2.0);
        heaps.remove(2.0);
        assert_eq!(heaps.len(), 3);
        assert_eq!(heaps.median(), Some(7.0));
    }

    #[test]
    fn test_rising_signal_stays_compact() {
        let mut heaps = MedianHeaps::new();
        let window = 10;
        for i in 0..10_000 {
            heaps.insert(i as f64);
            if i >= window {
                heaps.remove((i - window) as f64);
            }
        }
        assert_eq!(heaps.len(), window);
        assert!(heaps.lower.len() + heaps.upper.len() <= 2 * window + 17);

        let live: Vec<f64> = (10_000 - window..10_000).map(|i| i as f64).collect();
        assert_eq!(heaps.median(), Some(oracle(&live)));
    }

    #[test]
    fn test_signed_zero() {
        let mut heaps = MedianHeaps::new();
        heaps.insert(-0.0);
        heaps.insert(1.0);
        heaps.remove(0.0);
        assert_eq!(heaps.median(), Some(1.0));
    }

    #[test]
    fn test_empty_median() {
        let mut heaps = MedianHeaps::new();
        assert_eq!(heaps.median(), None);
        heaps.insert(4.0);
        heaps.remove(4.0);
        assert!(heaps.is_empty());
        assert_eq!(heaps.median(), None);
    }
}
