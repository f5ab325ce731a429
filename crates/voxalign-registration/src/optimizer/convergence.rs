//! Windowed convergence monitoring over the objective-value profile.

use std::collections::VecDeque;

/// Detects flattening of the objective profile.
///
/// Keeps a bounded FIFO of the most recent objective values. Once the window
/// is full, the convergence score is the magnitude of the least-squares
/// linear trend fitted to the energy-normalized window: small means flat,
/// zero means constant. Until the window fills the score is undefined and
/// the optimizer treats the run as not converged.
#[derive(Debug, Clone)]
pub struct WindowConvergenceMonitor {
    window_size: usize,
    values: VecDeque<f64>,
}

impl WindowConvergenceMonitor {
    /// Create a monitor over a window of `window_size` values.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(2),
            values: VecDeque::with_capacity(window_size.max(2)),
        }
    }

    /// Configured window size.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of values currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no values have been observed yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True once the window holds `window_size` values.
    pub fn is_window_full(&self) -> bool {
        self.values.len() == self.window_size
    }

    /// Push an observed objective value, evicting the oldest beyond
    /// capacity.
    pub fn add_value(&mut self, value: f64) {
        if self.values.len() == self.window_size {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Drop all observed values, optionally resizing the window.
    pub fn reset(&mut self, window_size: usize) {
        self.window_size = window_size.max(2);
        self.values.clear();
    }

    /// Convergence score: `None` until the window is full, then the
    /// magnitude of the fitted trend slope. Deterministic for identical
    /// input sequences.
    pub fn convergence_value(&self) -> Option<f64> {
        if !self.is_window_full() {
            return None;
        }

        // Normalize by total absolute energy so the score is scale free.
        let total_energy: f64 = self.values.iter().map(|v| v.abs()).sum();
        if total_energy <= f64::EPSILON {
            return Some(0.0);
        }

        let n = self.window_size as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = self.values.iter().sum::<f64>() / total_energy / n;

        let mut covariance = 0.0;
        let mut x_variance = 0.0;
        for (i, value) in self.values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            covariance += dx * (value / total_energy - y_mean);
            x_variance += dx * dx;
        }

        Some((covariance / x_variance).abs())
    }
}
