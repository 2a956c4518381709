//! Window predictor built from converged values of previous windows.
//!
//! The history keeps the most recent window first:
//!
//! ```text
//! windows[0]  values of the window in progress (overwritten by `store`)
//! windows[1]  converged values of the previous window
//! ```
//!
//! Moving to the next window pushes the prediction to the front, so the slot
//! that becomes `windows[0]` starts as the predictor and is overwritten once
//! the window produces real values.

use std::collections::VecDeque;

use crate::error::{DataError, Result};

/// Highest supported predictor order.
///
/// Order 2 is reserved: no coefficients are defined for it.
pub const MAX_EXTRAPOLATION_ORDER: usize = 1;

/// Bounded history of per-window values used to predict the next window.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrapolation {
    order: usize,
    windows: VecDeque<Vec<f64>>,
}

impl Extrapolation {
    /// Create a predictor of the given order.
    pub fn new(order: usize) -> Result<Self> {
        if order > MAX_EXTRAPOLATION_ORDER {
            return Err(DataError::UnsupportedExtrapolationOrder(order));
        }
        Ok(Self {
            order,
            windows: VecDeque::with_capacity(order + 1),
        })
    }

    /// Predictor order.
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Maximum number of windows ever held.
    pub const fn capacity(&self) -> usize {
        self.order + 1
    }

    /// Number of windows currently held.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if no window has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Values of the window `age` steps back (0 = current).
    pub fn window(&self, age: usize) -> Option<&[f64]> {
        self.windows.get(age).map(Vec::as_slice)
    }

    /// Reset the history to a single window holding `values`.
    pub fn initialize(&mut self, values: &[f64]) {
        self.windows.clear();
        self.windows.push_front(values.to_vec());
    }

    /// Overwrite the current window's values.
    pub fn store(&mut self, values: &[f64]) {
        match self.windows.front_mut() {
            Some(front) => {
                front.clear();
                front.extend_from_slice(values);
            }
            None => self.windows.push_front(values.to_vec()),
        }
    }

    /// Predicted values for the next window, if anything was stored.
    ///
    /// Order 1 falls back to order 0 until two windows are known.
    pub fn predict(&self) -> Option<Vec<f64>> {
        let latest = self.windows.front()?;
        match (self.order, self.windows.get(1)) {
            (1, Some(previous)) => Some(
                latest
                    .iter()
                    .zip(previous)
                    .map(|(x_n, x_prev)| 2.0 * x_n - x_prev)
                    .collect(),
            ),
            _ => Some(latest.clone()),
        }
    }

    /// Shift the history by one window and return the prediction.
    ///
    /// Returns `None` when nothing was ever stored.
    pub fn move_to_next_window(&mut self) -> Option<Vec<f64>> {
        let prediction = self.predict()?;
        self.windows.push_front(prediction.clone());
        self.windows.truncate(self.capacity());
        Some(prediction)
    }
}
