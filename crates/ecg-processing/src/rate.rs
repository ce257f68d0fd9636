//! Beats-per-minute from a peak count

use ecg_core::{EcgError, EcgResult, PeakSet};

/// Converts peak counts over a fixed window into a heart rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEstimator {
    window_len: usize,
    sampling_rate_hz: f64,
}

impl RateEstimator {
    pub fn new(window_len: usize, sampling_rate_hz: f64) -> EcgResult<Self> {
        // Validate once here so `bpm` cannot fail later
        Self::estimate(0, window_len, sampling_rate_hz)?;
        Ok(RateEstimator {
            window_len,
            sampling_rate_hz,
        })
    }

    /// `peak_count * 60 / (window_len / fs)`
    pub fn estimate(peak_count: usize, window_len: usize, sampling_rate_hz: f64) -> EcgResult<f64> {
        if !(sampling_rate_hz > 0.0) || !sampling_rate_hz.is_finite() {
            return Err(EcgError::invalid_parameter(
                "sampling_rate_hz",
                format!("sampling rate must be positive, got {}", sampling_rate_hz),
            ));
        }
        if window_len == 0 {
            return Err(EcgError::invalid_parameter(
                "window_size_samples",
                "rate window must contain at least one sample",
            ));
        }

        let window_seconds = window_len as f64 / sampling_rate_hz;
        Ok(peak_count as f64 * 60.0 / window_seconds)
    }

    pub fn bpm(&self, peaks: &PeakSet) -> f64 {
        let window_seconds = self.window_len as f64 / self.sampling_rate_hz;
        peaks.len() as f64 * 60.0 / window_seconds
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_len as f64 / self.sampling_rate_hz
    }
}
