use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free, monotonic progress value in `[0.0, 1.0]`.
///
/// The value is stored as the bit pattern of an `f32`. For non-negative floats the bit patterns
/// order the same way as the numbers, so `fetch_max` on the bits keeps the progress
/// non-decreasing without a compare-and-swap loop.
#[derive(Debug, Default)]
pub struct Progress {
    bits: AtomicU32,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value. Readers may be one update behind.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Raises the progress to `value` (clamped). Lower values are ignored.
    pub fn advance(&self, value: f32) {
        let value = clamp(value);
        self.bits.fetch_max(value.to_bits(), Ordering::Relaxed);
    }

    /// Computes `done / total` and advances to it. A zero `total` counts as complete.
    pub fn advance_ratio(&self, done: u64, total: u64) {
        if total == 0 {
            self.advance(1.0);
        } else {
            self.advance(done as f32 / total as f32);
        }
    }
}

fn clamp(value: f32) -> f32 {
    // `-0.0` has the sign bit set and would compare above every positive value
    if value.is_nan() || value <= 0.0 {
        0.0
    } else {
        value.min(1.0)
    }
}
