//! Butterworth low-pass filtering for ECG windows

use crate::processor::WindowProcessor;
use ecg_core::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// How the low-pass stage is applied to the sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Re-filter the whole window from zero state on every run
    #[default]
    Batch,
    /// Filter each sample once on arrival, carrying state across runs
    Streaming,
}

/// Single biquad section (2nd order), or 1st order when `b2 == a2 == 0`
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadSection {
    // Coefficients: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    b0: f64, b1: f64, b2: f64,
    a1: f64, a2: f64,
}

/// Delay line of one section
#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    x1: f64, x2: f64,
    y1: f64, y2: f64,
}

impl BiquadSection {
    /// Second-order low-pass section with quality factor `q`, `k = tan(pi*fc/fs)`
    fn lowpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;

        BiquadSection {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        }
    }

    /// First-order low-pass section for odd filter orders
    fn first_order_lowpass(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);

        BiquadSection {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    fn process_sample(&self, input: f64, state: &mut SectionState) -> f64 {
        // Direct form I
        let output = self.b0 * input + self.b1 * state.x1 + self.b2 * state.x2
            - self.a1 * state.y1 - self.a2 * state.y2;

        state.x2 = state.x1;
        state.x1 = input;
        state.y2 = state.y1;
        state.y1 = output;

        output
    }
}

/// Causal Butterworth low-pass filter
///
/// The design is a cascade of second-order sections obtained through the
/// bilinear transform of the analog prototype, with one extra first-order
/// section for odd orders. Every section has unity DC gain.
#[derive(Debug, Clone, PartialEq)]
pub struct LowPassFilter {
    cutoff_hz: f64,
    sampling_rate_hz: f64,
    order: usize,
    sections: Vec<BiquadSection>,
}

impl LowPassFilter {
    /// Compute coefficients for the given cutoff, sampling rate and order
    pub fn design(cutoff_hz: f64, sampling_rate_hz: f64, order: usize) -> EcgResult<Self> {
        if !(sampling_rate_hz > 0.0) || !sampling_rate_hz.is_finite() {
            return Err(EcgError::invalid_parameter(
                "sampling_rate_hz",
                format!("sampling rate must be positive, got {}", sampling_rate_hz),
            ));
        }
        if order < 1 {
            return Err(EcgError::invalid_parameter(
                "lowpass_order",
                "filter order must be at least 1",
            ));
        }
        let nyquist = sampling_rate_hz / 2.0;
        if !(cutoff_hz > 0.0) || cutoff_hz >= nyquist {
            return Err(EcgError::invalid_parameter(
                "lowpass_cutoff_hz",
                format!(
                    "cutoff must lie in (0, {}) Hz (Nyquist), got {} Hz",
                    nyquist, cutoff_hz
                ),
            ));
        }

        // Pre-warped analog cutoff
        let k = (PI * cutoff_hz / sampling_rate_hz).tan();

        // Butterworth pole pairs: Q_i = 1 / (2 sin((2i+1) pi / 2N))
        let mut sections: Vec<BiquadSection> = (0..order / 2)
            .map(|i| {
                let angle = PI * (2 * i + 1) as f64 / (2 * order) as f64;
                BiquadSection::lowpass(k, 1.0 / (2.0 * angle.sin()))
            })
            .collect();
        if order % 2 == 1 {
            sections.push(BiquadSection::first_order_lowpass(k));
        }

        Ok(LowPassFilter {
            cutoff_hz,
            sampling_rate_hz,
            order,
            sections,
        })
    }

    /// Filter a whole window forward, starting from zero initial conditions
    pub fn apply(&self, window: &[f64]) -> Vec<f64> {
        let mut states = vec![SectionState::default(); self.sections.len()];
        window
            .iter()
            .map(|&sample| self.run_sections(sample, &mut states))
            .collect()
    }

    /// Stateful per-sample filter sharing this design
    pub fn stream(&self) -> StreamingLowPass {
        StreamingLowPass {
            filter: self.clone(),
            states: vec![SectionState::default(); self.sections.len()],
            primed: false,
        }
    }

    /// Magnitude response at `frequency_hz`, evaluated on the unit circle
    pub fn gain_at(&self, frequency_hz: f64) -> f64 {
        let w = 2.0 * PI * frequency_hz / self.sampling_rate_hz;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        self.sections.iter().fold(1.0, |gain, s| {
            let num_re = s.b0 + s.b1 * c1 + s.b2 * c2;
            let num_im = -(s.b1 * s1 + s.b2 * s2);
            let den_re = 1.0 + s.a1 * c1 + s.a2 * c2;
            let den_im = -(s.a1 * s1 + s.a2 * s2);
            gain * (num_re.hypot(num_im) / den_re.hypot(den_im))
        })
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn run_sections(&self, sample: f64, states: &mut [SectionState]) -> f64 {
        self.sections
            .iter()
            .zip(states.iter_mut())
            .fold(sample, |value, (section, state)| section.process_sample(value, state))
    }
}

impl WindowProcessor for LowPassFilter {
    fn process(&self, window: &[f64]) -> EcgResult<Vec<f64>> {
        Ok(self.apply(window))
    }

    fn name(&self) -> &str {
        "Butterworth Low-pass"
    }
}

/// Per-sample low-pass with state carried between calls
///
/// The delay lines are primed with the first sample so a constant input
/// (e.g. an ADC offset) passes through without a start-up step.
#[derive(Debug, Clone)]
pub struct StreamingLowPass {
    filter: LowPassFilter,
    states: Vec<SectionState>,
    primed: bool,
}

impl StreamingLowPass {
    pub fn process_sample(&mut self, sample: f64) -> f64 {
        if !self.primed {
            // Unity DC gain per section: steady state is x = y = sample everywhere
            for state in &mut self.states {
                *state = SectionState { x1: sample, x2: sample, y1: sample, y2: sample };
            }
            self.primed = true;
        }
        self.filter.run_sections(sample, &mut self.states)
    }

    pub fn reset(&mut self) {
        self.states.fill(SectionState::default());
        self.primed = false;
    }
}
