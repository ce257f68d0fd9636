//! R-peak detection on the enhanced energy signal

use ecg_core::{EcgError, EcgResult, PeakSet};

/// Adaptive-threshold peak picker with a refractory distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetector {
    height_factor: f64,
    min_distance: usize,
}

impl PeakDetector {
    pub const DEFAULT_HEIGHT_FACTOR: f64 = 8.0;

    pub fn new(height_factor: f64, min_distance: usize) -> EcgResult<Self> {
        if !(height_factor > 0.0) || !height_factor.is_finite() {
            return Err(EcgError::invalid_parameter(
                "peak_height_factor",
                format!("height factor must be a positive number, got {}", height_factor),
            ));
        }
        if min_distance == 0 {
            return Err(EcgError::invalid_parameter(
                "peak_min_distance_samples",
                "refractory distance must be at least one sample",
            ));
        }
        Ok(PeakDetector {
            height_factor,
            min_distance,
        })
    }

    /// Default threshold with a half-second refractory distance
    pub fn for_sampling_rate(sampling_rate_hz: f64) -> EcgResult<Self> {
        Self::new(
            Self::DEFAULT_HEIGHT_FACTOR,
            (sampling_rate_hz / 2.0).floor() as usize,
        )
    }

    pub fn height_factor(&self) -> f64 {
        self.height_factor
    }

    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    /// Square `signal` and pick peaks in the resulting energy
    pub fn find_peaks(&self, signal: &[f64]) -> EcgResult<PeakSet> {
        let energy: Vec<f64> = signal.iter().map(|v| v * v).collect();
        self.find_peaks_in_energy(&energy)
    }

    /// Pick peaks in an already non-negative energy signal
    ///
    /// A candidate is a strict local maximum at or above `height_factor` times
    /// the mean energy. Candidates are then visited from the highest down; each
    /// surviving peak suppresses every candidate closer than `min_distance`.
    /// On equal energy the earlier candidate wins.
    pub fn find_peaks_in_energy(&self, energy: &[f64]) -> EcgResult<PeakSet> {
        if energy.len() < 3 {
            return Ok(PeakSet::empty());
        }

        let average = energy.iter().sum::<f64>() / energy.len() as f64;
        if !(average > 0.0) {
            return Ok(PeakSet::empty());
        }
        let threshold = self.height_factor * average;

        let candidates: Vec<usize> = (1..energy.len() - 1)
            .filter(|&i| {
                energy[i] > energy[i - 1] && energy[i] > energy[i + 1] && energy[i] >= threshold
            })
            .collect();

        let mut by_height: Vec<usize> = (0..candidates.len()).collect();
        by_height.sort_by(|&a, &b| {
            energy[candidates[b]]
                .total_cmp(&energy[candidates[a]])
                .then(a.cmp(&b))
        });

        let mut keep = vec![true; candidates.len()];
        for &k in &by_height {
            if !keep[k] {
                continue;
            }
            let position = candidates[k];
            for j in (0..k).rev() {
                if position - candidates[j] >= self.min_distance {
                    break;
                }
                keep[j] = false;
            }
            for j in k + 1..candidates.len() {
                if candidates[j] - position >= self.min_distance {
                    break;
                }
                keep[j] = false;
            }
        }

        let peaks = candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(index, kept)| kept.then_some(index))
            .collect();
        PeakSet::new(peaks)
    }
}
