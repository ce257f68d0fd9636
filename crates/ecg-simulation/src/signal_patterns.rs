//! Heart rhythms and beat morphologies for ECG simulation

use ecg_core::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Instantaneous heart rate over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeartRhythm {
    /// Fixed rate
    Constant { bpm: f64 },
    /// Linear change from `start_bpm` to `end_bpm`, then held
    Ramp {
        start_bpm: f64,
        end_bpm: f64,
        duration_s: f64,
    },
    /// Periodic modulation around a mean, e.g. respiratory variability
    Sinusoidal {
        mean_bpm: f64,
        depth_bpm: f64,
        frequency_hz: f64,
    },
}

impl HeartRhythm {
    pub const MAX_BPM: f64 = 300.0;

    /// Heart rate at `time` seconds
    pub fn bpm_at(&self, time: f64) -> f64 {
        match *self {
            HeartRhythm::Constant { bpm } => bpm,

            HeartRhythm::Ramp { start_bpm, end_bpm, duration_s } => {
                if time >= duration_s {
                    end_bpm
                } else {
                    start_bpm + (end_bpm - start_bpm) * (time / duration_s)
                }
            }

            HeartRhythm::Sinusoidal { mean_bpm, depth_bpm, frequency_hz } => {
                mean_bpm + depth_bpm * (2.0 * PI * frequency_hz * time).sin()
            }
        }
    }

    /// Number of beats (fractional) elapsed after `time` seconds
    pub fn beats_elapsed(&self, time: f64) -> f64 {
        match *self {
            HeartRhythm::Constant { bpm } => bpm * time / 60.0,

            HeartRhythm::Ramp { start_bpm, end_bpm, duration_s } => {
                if time < duration_s {
                    (start_bpm * time + (end_bpm - start_bpm) * time * time / (2.0 * duration_s)) / 60.0
                } else {
                    ((start_bpm + end_bpm) * duration_s / 2.0 + end_bpm * (time - duration_s)) / 60.0
                }
            }

            HeartRhythm::Sinusoidal { mean_bpm, depth_bpm, frequency_hz } => {
                let omega = 2.0 * PI * frequency_hz;
                (mean_bpm * time + depth_bpm * (1.0 - (omega * time).cos()) / omega) / 60.0
            }
        }
    }

    pub fn validate(&self) -> EcgResult<()> {
        let in_range = |bpm: f64| bpm > 0.0 && bpm <= Self::MAX_BPM;
        let valid = match *self {
            HeartRhythm::Constant { bpm } => in_range(bpm),
            HeartRhythm::Ramp { start_bpm, end_bpm, duration_s } => {
                in_range(start_bpm) && in_range(end_bpm) && duration_s > 0.0
            }
            HeartRhythm::Sinusoidal { mean_bpm, depth_bpm, frequency_hz } => {
                depth_bpm >= 0.0
                    && in_range(mean_bpm - depth_bpm)
                    && in_range(mean_bpm + depth_bpm)
                    && frequency_hz > 0.0
            }
        };

        if valid {
            Ok(())
        } else {
            Err(EcgError::SimulationError {
                reason: format!("heart rhythm out of range (0, {}] BPM: {:?}", Self::MAX_BPM, self),
            })
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            HeartRhythm::Constant { .. } => "Constant rate",
            HeartRhythm::Ramp { .. } => "Gradual ramp",
            HeartRhythm::Sinusoidal { .. } => "Breathing variability",
        }
    }

    /// Common rhythms, one per playback zone and a few dynamic ones
    pub fn presets() -> Vec<(&'static str, HeartRhythm)> {
        vec![
            ("Bradycardia", HeartRhythm::Constant { bpm: 48.0 }),
            ("Resting", HeartRhythm::Constant { bpm: 60.0 }),
            ("Normal", HeartRhythm::Constant { bpm: 72.0 }),
            ("Tachycardia", HeartRhythm::Constant { bpm: 110.0 }),
            ("Exercise Warmup", HeartRhythm::Ramp {
                start_bpm: 70.0, end_bpm: 140.0, duration_s: 60.0
            }),
            ("Cooldown", HeartRhythm::Ramp {
                start_bpm: 130.0, end_bpm: 75.0, duration_s: 90.0
            }),
            ("Relaxed Breathing", HeartRhythm::Sinusoidal {
                mean_bpm: 66.0, depth_bpm: 4.0, frequency_hz: 0.25
            }),
        ]
    }
}

impl Default for HeartRhythm {
    fn default() -> Self {
        HeartRhythm::Constant { bpm: 72.0 }
    }
}

/// Morphology of one simulated beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatShape {
    /// Sum of gaussian P, Q, R, S and T waves
    #[default]
    Pqrst,
    /// Single unit impulse on the first sample of each beat
    Pulse,
}

// (amplitude relative to R, offset from R in s, width in s)
const PQRST_WAVES: [(f64, f64, f64); 5] = [
    (0.12, -0.2, 0.025),
    (-0.1, -0.03, 0.01),
    (1.0, 0.0, 0.012),
    (-0.25, 0.03, 0.01),
    (0.3, 0.25, 0.06),
];

/// R-wave position as a fraction of the beat period
pub const R_WAVE_PHASE: f64 = 0.3;

/// Normalised PQRST value `time_in_beat` seconds into a beat of `period_s`
///
/// The R wave peaks at 1.0. Neighbouring beats contribute their tails so the
/// waveform is continuous across beat boundaries.
pub fn pqrst_wave(time_in_beat: f64, period_s: f64) -> f64 {
    let r_time = period_s * R_WAVE_PHASE;
    PQRST_WAVES
        .iter()
        .map(|&(amplitude, offset, width)| {
            (-1..=1)
                .map(|k| {
                    let d = time_in_beat - (r_time + offset) - k as f64 * period_s;
                    amplitude * (-d * d / (2.0 * width * width)).exp()
                })
                .sum::<f64>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_rhythm() {
        let rhythm = HeartRhythm::Constant { bpm: 72.0 };
        assert_eq!(rhythm.bpm_at(13.0), 72.0);
        assert!((rhythm.beats_elapsed(10.0) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_ramp_beats_match_rate() {
        let rhythm = HeartRhythm::Ramp { start_bpm: 60.0, end_bpm: 120.0, duration_s: 60.0 };
        assert_eq!(rhythm.bpm_at(30.0), 90.0);
        assert_eq!(rhythm.bpm_at(100.0), 120.0);
        // average 90 BPM over the first minute, then 120 BPM
        assert!((rhythm.beats_elapsed(60.0) - 90.0).abs() < 1e-9);
        assert!((rhythm.beats_elapsed(90.0) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_sinusoidal_averages_to_mean() {
        let rhythm = HeartRhythm::Sinusoidal { mean_bpm: 66.0, depth_bpm: 4.0, frequency_hz: 0.25 };
        // whole modulation periods cancel out
        assert!((rhythm.beats_elapsed(8.0) - 66.0 * 8.0 / 60.0).abs() < 1e-9);
        assert!((rhythm.bpm_at(1.0) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_rhythm_validation() {
        assert!(HeartRhythm::Constant { bpm: 0.0 }.validate().is_err());
        assert!(HeartRhythm::Constant { bpm: 400.0 }.validate().is_err());
        assert!(HeartRhythm::Sinusoidal { mean_bpm: 10.0, depth_bpm: 20.0, frequency_hz: 0.2 }
            .validate()
            .is_err());
        assert!(HeartRhythm::Ramp { start_bpm: 60.0, end_bpm: 80.0, duration_s: 0.0 }
            .validate()
            .is_err());

        for (name, rhythm) in HeartRhythm::presets() {
            assert!(rhythm.validate().is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_pqrst_peaks_at_r_wave() {
        let period = 1.0;
        let r = pqrst_wave(period * R_WAVE_PHASE, period);
        assert!((r - 1.0).abs() < 0.05);

        // R dominates every other sample of the beat
        for i in 0..100 {
            let t = i as f64 / 100.0;
            assert!(pqrst_wave(t, period) <= r + 1e-12);
        }
    }

    #[test]
    fn test_rhythm_serde_tagging() {
        let json = serde_json::to_string(&HeartRhythm::Constant { bpm: 60.0 }).unwrap();
        assert_eq!(json, r#"{"type":"constant","bpm":60.0}"#);
        let shape: BeatShape = serde_json::from_str("\"pulse\"").unwrap();
        assert_eq!(shape, BeatShape::Pulse);
    }
}
