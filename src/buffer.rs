//! Rolling windows for carrying lag state through a sequential scan.
//!
//! The chart pipeline walks a symbol's rows in ascending date order and keeps
//! only the last few closes it has seen; these buffers hold that state without
//! reallocating per row.

use crate::features::{derive_lags, LagFeatureSet, LAG_COUNT};
use std::collections::VecDeque;

/// A generic rolling buffer with fixed capacity.
///
/// Pushing into a full buffer evicts the oldest element.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create a new rolling buffer with the specified capacity.
    ///
    /// # Example
    /// ```
    /// use stock_inference::RollingBuffer;
    /// let buffer: RollingBuffer<f64> = RollingBuffer::new(3);
    /// assert!(buffer.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a new element, evicting the oldest one when at capacity.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Iterate newest to oldest.
    pub fn iter_recent(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter().rev()
    }
}

impl<T: Clone> RollingBuffer<T> {
    /// All elements, newest first.
    pub fn to_vec_recent(&self) -> Vec<T> {
        self.iter_recent().cloned().collect()
    }
}

/// Trailing closes of the rows already visited in an ascending scan.
///
/// Only actual historical closes enter the window, never predictions.
#[derive(Debug, Clone)]
pub struct LagWindow {
    closes: RollingBuffer<f64>,
}

impl LagWindow {
    pub fn new() -> Self {
        Self {
            closes: RollingBuffer::new(LAG_COUNT),
        }
    }

    /// Lags for the row about to be visited. `current_close` is that row's own
    /// close, used only when no earlier row has been observed.
    pub fn lags(&self, current_close: Option<f64>) -> LagFeatureSet {
        let prior: Vec<f64> = self.closes.to_vec_recent();
        derive_lags(&prior, current_close)
    }

    /// Record a visited row. Rows without a close leave the window unchanged.
    pub fn observe(&mut self, close: Option<f64>) {
        if let Some(c) = close.filter(|c| c.is_finite()) {
            self.closes.push(c);
        }
    }

    /// Number of prior closes currently held.
    pub fn depth(&self) -> usize {
        self.closes.len()
    }
}

impl Default for LagWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_buffer_basic() {
        let mut buffer = RollingBuffer::new(3);
        assert!(buffer.is_empty());

        buffer.push(1);
        buffer.push(2);
        buffer.push(3);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.to_vec_recent(), vec![3, 2, 1]);
    }

    #[test]
    fn test_rolling_buffer_overflow() {
        let mut buffer = RollingBuffer::new(3);

        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        buffer.push(4); // Evicts 1

        assert_eq!(buffer.to_vec_recent(), vec![4, 3, 2]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_rolling_buffer_zero_capacity() {
        let mut buffer = RollingBuffer::new(0);
        buffer.push(1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_lag_window_carries_closes_forward() {
        let mut window = LagWindow::new();

        // First row: no history, falls back to its own close
        let first = window.lags(Some(100.0));
        assert_eq!(first.as_array(), [100.0, 100.0, 100.0]);
        window.observe(Some(100.0));

        let second = window.lags(Some(102.0));
        assert_eq!(second.as_array(), [100.0, 100.0, 100.0]);
        window.observe(Some(102.0));

        let third = window.lags(Some(105.0));
        assert_eq!(third.as_array(), [102.0, 100.0, 100.0]);
        window.observe(Some(105.0));

        let fourth = window.lags(Some(101.0));
        assert_eq!(fourth.as_array(), [105.0, 102.0, 100.0]);
        window.observe(Some(101.0));

        // Window keeps only the last three closes
        assert_eq!(window.depth(), 3);
        assert_eq!(window.lags(None).as_array(), [101.0, 105.0, 102.0]);
    }

    #[test]
    fn test_lag_window_skips_missing_close() {
        let mut window = LagWindow::new();
        window.observe(Some(10.0));
        window.observe(None);
        window.observe(Some(f64::NAN));

        assert_eq!(window.depth(), 1);
        assert_eq!(window.lags(Some(99.0)).as_array(), [10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_lag_window_empty_without_close() {
        let window = LagWindow::default();
        assert_eq!(window.lags(None).as_array(), [1.0, 1.0, 1.0]);
    }
}
