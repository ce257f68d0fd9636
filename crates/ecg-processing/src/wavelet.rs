//! Stationary wavelet beat enhancement
//!
//! The undecimated (à trous) transform keeps every band at the input length,
//! so masking a band removes exactly that scale at every sample position.
//! Boundaries are handled by periodic extension, which makes the transform
//! valid for any non-empty window without padding.

use crate::processor::{ProcessorType, WindowProcessor};
use ecg_core::{transform_error, EcgError, EcgResult, EnhancedSignal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SYM4: [f64; 8] = [
    -0.07576571478927333,
    -0.02963552764599851,
    0.49761866763201545,
    0.8037387518059161,
    0.29785779560527736,
    -0.09921954357684722,
    -0.012603967262037833,
    0.0322231006040427,
];

const DB2: [f64; 4] = [
    0.48296291314469025,
    0.8365163037378079,
    0.22414386804185735,
    -0.12940952255092145,
];

const DB4: [f64; 8] = [
    0.23037781330885523,
    0.7148465705525415,
    0.6308807679295904,
    -0.02798376941698385,
    -0.18703481171888114,
    0.030841381835986965,
    0.032883011666982945,
    -0.010597401784997278,
];

const HAAR: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

/// Orthogonal wavelet families available for beat enhancement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wavelet {
    Haar,
    Db2,
    Db4,
    #[default]
    Sym4,
}

impl Wavelet {
    /// Scaling (low-pass) filter, normalised to unit energy
    pub fn lowpass(&self) -> &'static [f64] {
        match self {
            Wavelet::Haar => &HAAR,
            Wavelet::Db2 => &DB2,
            Wavelet::Db4 => &DB4,
            Wavelet::Sym4 => &SYM4,
        }
    }

    /// Quadrature mirror of the scaling filter: g[k] = (-1)^k h[L-1-k]
    pub fn highpass(&self) -> Vec<f64> {
        let h = self.lowpass();
        h.iter()
            .rev()
            .enumerate()
            .map(|(k, c)| if k % 2 == 0 { *c } else { -c })
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Wavelet::Haar => "haar",
            Wavelet::Db2 => "db2",
            Wavelet::Db4 => "db4",
            Wavelet::Sym4 => "sym4",
        }
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Wavelet {
    type Err = EcgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(Wavelet::Haar),
            "db2" => Ok(Wavelet::Db2),
            "db4" => Ok(Wavelet::Db4),
            "sym4" => Ok(Wavelet::Sym4),
            other => Err(EcgError::invalid_parameter(
                "wavelet",
                format!("unsupported wavelet '{}' (expected haar, db2, db4 or sym4)", other),
            )),
        }
    }
}

/// Per-level (approximation, detail) bands, level 0 being the finest scale
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletBands {
    levels: Vec<(Vec<f64>, Vec<f64>)>,
}

impl WaveletBands {
    pub fn from_levels(levels: Vec<(Vec<f64>, Vec<f64>)>) -> Self {
        WaveletBands { levels }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Length shared by every band, or `None` when empty or inconsistent
    pub fn signal_len(&self) -> Option<usize> {
        let (first, _) = self.levels.first()?;
        let len = first.len();
        self.levels
            .iter()
            .all(|(a, d)| a.len() == len && d.len() == len)
            .then_some(len)
    }

    pub fn approximation(&self, level: usize) -> Option<&[f64]> {
        self.levels.get(level).map(|(a, _)| a.as_slice())
    }

    pub fn detail(&self, level: usize) -> Option<&[f64]> {
        self.levels.get(level).map(|(_, d)| d.as_slice())
    }
}

/// Band-pass by wavelet coefficient masking
///
/// Only the detail bands listed in `keep_levels` survive reconstruction; the
/// approximation (baseline, slow drift) and all other details are zeroed.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatEnhancer {
    wavelet: Wavelet,
    levels: usize,
    keep_levels: Vec<usize>,
    lowpass: Vec<f64>,
    highpass: Vec<f64>,
}

impl BeatEnhancer {
    pub fn new(wavelet: Wavelet, levels: usize, keep_levels: &[usize]) -> EcgResult<Self> {
        if levels == 0 {
            return Err(EcgError::invalid_parameter(
                "wavelet_levels",
                "at least one decomposition level is required",
            ));
        }
        let mut keep_levels = keep_levels.to_vec();
        keep_levels.sort_unstable();
        keep_levels.dedup();

        let Some(&deepest) = keep_levels.last() else {
            return Err(EcgError::invalid_parameter(
                "keep_detail_levels",
                "at least one detail level must be kept",
            ));
        };
        if levels < deepest + 1 {
            return Err(EcgError::invalid_parameter(
                "wavelet_levels",
                format!(
                    "{} levels cannot provide detail level {} (need at least {})",
                    levels,
                    deepest,
                    deepest + 1
                ),
            ));
        }

        Ok(BeatEnhancer {
            wavelet,
            levels,
            keep_levels,
            lowpass: wavelet.lowpass().to_vec(),
            highpass: wavelet.highpass(),
        })
    }

    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn keep_levels(&self) -> &[usize] {
        &self.keep_levels
    }

    /// Undecimated decomposition into `levels` (approximation, detail) pairs
    pub fn decompose(&self, window: &[f64]) -> EcgResult<WaveletBands> {
        if window.is_empty() {
            return Err(EcgError::InvalidInput {
                reason: "cannot decompose an empty window".to_string(),
            });
        }

        let len = window.len();
        let mut approximation = window.to_vec();
        let mut levels = Vec::with_capacity(self.levels);

        for level in 0..self.levels {
            let step = 1usize << level;
            let mut next = vec![0.0; len];
            let mut detail = vec![0.0; len];

            for n in 0..len {
                let (mut a, mut d) = (0.0, 0.0);
                for (k, (h, g)) in self.lowpass.iter().zip(&self.highpass).enumerate() {
                    let x = approximation[(n + (k * step) % len) % len];
                    a += h * x;
                    d += g * x;
                }
                next[n] = a;
                detail[n] = d;
            }

            approximation = next;
            levels.push((approximation.clone(), detail));
        }

        Ok(WaveletBands { levels })
    }

    /// Masked reconstruction: zero the approximation and every detail not in `keep_levels`
    pub fn reconstruct(&self, bands: &WaveletBands, keep_levels: &[usize]) -> EcgResult<Vec<f64>> {
        let len = self.check_bands(bands)?;
        if let Some(level) = keep_levels.iter().find(|&&l| l >= bands.level_count()) {
            return Err(transform_error!(
                "detail level {} requested from a {}-level decomposition",
                level,
                bands.level_count()
            ));
        }

        let zeros = vec![0.0; len];
        let mut approximation = vec![0.0; len];
        for (level, (_, detail)) in bands.levels.iter().enumerate().rev() {
            let detail = if keep_levels.contains(&level) { detail } else { &zeros };
            approximation = self.synthesize(&approximation, detail, 1 << level);
        }
        Ok(approximation)
    }

    /// Full inverse from the coarsest approximation and every detail
    pub fn inverse(&self, bands: &WaveletBands) -> EcgResult<Vec<f64>> {
        self.check_bands(bands)?;

        let Some((coarsest, _)) = bands.levels.last() else {
            return Err(transform_error!("no bands to invert"));
        };
        let mut approximation = coarsest.clone();
        for (level, (_, detail)) in bands.levels.iter().enumerate().rev() {
            approximation = self.synthesize(&approximation, detail, 1 << level);
        }
        Ok(approximation)
    }

    /// Decompose, keep the configured bands and square the result
    pub fn enhance(&self, window: &[f64]) -> EcgResult<EnhancedSignal> {
        let band_signal = self.process(window)?;
        Ok(EnhancedSignal::from_band_signal(&band_signal))
    }

    fn check_bands(&self, bands: &WaveletBands) -> EcgResult<usize> {
        if bands.level_count() != self.levels {
            return Err(transform_error!(
                "expected {} decomposition levels, got {}",
                self.levels,
                bands.level_count()
            ));
        }
        bands
            .signal_len()
            .filter(|&len| len > 0)
            .ok_or_else(|| transform_error!("wavelet bands differ in length"))
    }

    // One synthesis step: a[n] = 1/2 * sum_k h[k] a'[n - k*step] + g[k] d'[n - k*step]
    fn synthesize(&self, approximation: &[f64], detail: &[f64], step: usize) -> Vec<f64> {
        let len = approximation.len();
        let mut output = vec![0.0; len];

        for (k, (h, g)) in self.lowpass.iter().zip(&self.highpass).enumerate() {
            let shift = (k * step) % len;
            for n in 0..len {
                let idx = (n + len - shift) % len;
                output[n] += 0.5 * (h * approximation[idx] + g * detail[idx]);
            }
        }
        output
    }
}

impl WindowProcessor for BeatEnhancer {
    fn process(&self, window: &[f64]) -> EcgResult<Vec<f64>> {
        let bands = self.decompose(window)?;
        self.reconstruct(&bands, &self.keep_levels)
    }

    fn name(&self) -> &str {
        "Stationary Wavelet Enhancer"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Enhancement
    }
}
