//! Heart-rate estimate types handed to consumers

use crate::error::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};

/// Ordered R-peak sample indices, strictly increasing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSet(Vec<usize>);

impl PeakSet {
    /// Wrap indices, rejecting any sequence that is not strictly increasing
    pub fn new(indices: Vec<usize>) -> EcgResult<Self> {
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(EcgError::InvalidInput {
                reason: "peak indices must be strictly increasing".to_string(),
            });
        }
        Ok(PeakSet(indices))
    }

    pub fn empty() -> Self {
        PeakSet(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Smallest gap between consecutive peaks, if there are at least two
    pub fn min_gap(&self) -> Option<usize> {
        self.0.windows(2).map(|pair| pair[1] - pair[0]).min()
    }
}

/// Squared magnitude of the band-limited beat signal, never negative
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancedSignal(Vec<f64>);

impl EnhancedSignal {
    /// Square every sample of a reconstructed band signal
    pub fn from_band_signal(signal: &[f64]) -> Self {
        EnhancedSignal(signal.iter().map(|v| v * v).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Result of one completed pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateEstimate {
    /// Beats per minute over the processed window; 0.0 when no beat was found
    pub bpm: f64,
    /// Detected R-peaks as indices into `enhanced_signal`
    pub peak_indices: PeakSet,
    /// Energy signal the peaks were detected on
    pub enhanced_signal: EnhancedSignal,
}

impl HeartRateEstimate {
    pub fn beat_count(&self) -> usize {
        self.peak_indices.len()
    }

    pub fn has_beats(&self) -> bool {
        !self.peak_indices.is_empty()
    }

    pub fn zone(&self) -> RateZone {
        RateZone::from_bpm(self.bpm)
    }
}

/// Coarse heart-rate bucket used by consumers such as a playback selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateZone {
    /// Below 60 BPM (including "no beat detected")
    Low,
    /// 60 to 100 BPM inclusive
    Normal,
    /// Above 100 BPM
    High,
}

impl RateZone {
    pub fn from_bpm(bpm: f64) -> Self {
        if bpm < 60.0 {
            RateZone::Low
        } else if bpm <= 100.0 {
            RateZone::Normal
        } else {
            RateZone::High
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RateZone::Low => "<60",
            RateZone::Normal => "60-100",
            RateZone::High => ">100",
        }
    }
}
