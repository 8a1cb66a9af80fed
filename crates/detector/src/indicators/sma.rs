/// Simple moving average over the most recent `period` values.
///
/// Returns `None` until at least `period` values are available.
#[derive(Debug, Clone, Copy)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    /// Compute the SMA of the last `period` values of `values` (oldest first).
    pub fn compute(&self, values: &[f64]) -> Option<f64> {
        if values.len() < self.period {
            return None;
        }
        let window = &values[values.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}
