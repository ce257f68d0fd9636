//! ECG signal simulator producing raw ADC-like readings

use crate::signal_patterns::{pqrst_wave, BeatShape, HeartRhythm};
use ecg_core::{EcgError, EcgResult};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Configuration for ECG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgConfig {
    /// Sampling rate in Hz
    pub sampling_rate_hz: f64,
    /// Heart rate over time
    pub rhythm: HeartRhythm,
    /// Beat morphology
    pub shape: BeatShape,
    /// R-wave height in ADC counts
    pub amplitude: f64,
    /// Constant offset added to every reading (ADC mid-scale)
    pub adc_offset: f64,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Power line interference (50/60Hz)
    pub powerline_hz: Option<f64>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise and corruption sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation in ADC counts (0.0 = no noise)
    pub gaussian_std: f64,
    /// Baseline wander amplitude in ADC counts
    pub baseline_wander: f64,
    /// Baseline wander frequency (respiration)
    pub baseline_wander_hz: f64,
    /// Power line interference amplitude in ADC counts
    pub powerline_amplitude: f64,
    /// Probability of emitting a garbage line next to a reading (0.0 to 1.0)
    pub malformed_line_prob: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 5.0,
            baseline_wander: 20.0,
            baseline_wander_hz: 0.2,
            powerline_amplitude: 10.0,
            malformed_line_prob: 0.0,
        }
    }
}

impl NoiseConfig {
    /// No noise, no wander, no corruption
    pub fn clean() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            baseline_wander_hz: 0.2,
            powerline_amplitude: 0.0,
            malformed_line_prob: 0.0,
        }
    }
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 100.0,
            rhythm: HeartRhythm::default(),
            shape: BeatShape::Pqrst,
            amplitude: 500.0,
            adc_offset: 2000.0,
            noise: NoiseConfig::default(),
            powerline_hz: None,
            seed: None,
        }
    }
}

impl EcgConfig {
    pub fn validate(&self) -> EcgResult<()> {
        if !(self.sampling_rate_hz > 0.0) || !self.sampling_rate_hz.is_finite() {
            return Err(EcgError::SimulationError {
                reason: format!("sampling rate must be positive, got {}", self.sampling_rate_hz),
            });
        }
        if !self.amplitude.is_finite() || !self.adc_offset.is_finite() {
            return Err(EcgError::SimulationError {
                reason: "amplitude and offset must be finite".to_string(),
            });
        }
        if !(self.noise.gaussian_std >= 0.0) || !self.noise.gaussian_std.is_finite() {
            return Err(EcgError::SimulationError {
                reason: format!(
                    "noise standard deviation must be non-negative, got {}",
                    self.noise.gaussian_std
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.noise.malformed_line_prob) {
            return Err(EcgError::SimulationError {
                reason: format!(
                    "malformed line probability must lie in [0, 1], got {}",
                    self.noise.malformed_line_prob
                ),
            });
        }
        self.rhythm.validate()
    }
}

// Lines a noisy serial link produces
const GARBAGE_LINES: [&str; 5] = ["", "ERR", "20#1", "-", "1984.5.2"];

/// ECG signal simulator
///
/// Time advances with every generated sample, so consecutive calls continue
/// the same recording.
pub struct EcgSimulator {
    config: EcgConfig,
    rng: rand::rngs::StdRng,
    normal_dist: Normal<f64>,
    sample_index: u64,
    // Rhythm changes keep the beat count continuous
    rhythm_start_sample: u64,
    beats_before_rhythm: f64,
    last_beat: Option<i64>,
}

impl EcgSimulator {
    /// Create new ECG simulator with configuration
    pub fn new(config: EcgConfig) -> EcgResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal_dist = Self::noise_distribution(&config.noise)?;

        Ok(EcgSimulator {
            config,
            rng,
            normal_dist,
            sample_index: 0,
            rhythm_start_sample: 0,
            beats_before_rhythm: 0.0,
            last_beat: None,
        })
    }

    fn noise_distribution(noise: &NoiseConfig) -> EcgResult<Normal<f64>> {
        Normal::new(0.0, noise.gaussian_std).map_err(|e| EcgError::SimulationError {
            reason: format!("Failed to create normal distribution: {}", e),
        })
    }

    /// Generate readings for the given duration in seconds
    pub fn generate(&mut self, duration_s: f64) -> Vec<f64> {
        let count = (duration_s * self.config.sampling_rate_hz).round().max(0.0) as usize;
        self.generate_samples(count)
    }

    pub fn generate_samples(&mut self, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.next_sample()).collect()
    }

    /// Generate readings formatted like the serial device, one per line
    ///
    /// With a non-zero `malformed_line_prob` extra garbage lines are
    /// interleaved; the number of valid readings is always `count`.
    pub fn generate_lines(&mut self, count: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            if self.config.noise.malformed_line_prob > 0.0
                && self.rng.gen::<f64>() < self.config.noise.malformed_line_prob
            {
                let garbage = GARBAGE_LINES[self.rng.gen_range(0..GARBAGE_LINES.len())];
                lines.push(garbage.to_string());
            }
            lines.push(format!("{:.0}", self.next_sample()));
        }
        lines
    }

    /// Produce the next reading
    pub fn next_sample(&mut self) -> f64 {
        let fs = self.config.sampling_rate_hz;
        let time = self.sample_index as f64 / fs;
        let rhythm_time = (self.sample_index - self.rhythm_start_sample) as f64 / fs;

        let beats = self.beats_before_rhythm + self.config.rhythm.beats_elapsed(rhythm_time);
        let beat_index = beats.floor() as i64;
        let new_beat = self.last_beat != Some(beat_index);
        self.last_beat = Some(beat_index);

        let beat_value = match self.config.shape {
            BeatShape::Pqrst => {
                let period = 60.0 / self.config.rhythm.bpm_at(rhythm_time);
                pqrst_wave(beats.fract() * period, period)
            }
            BeatShape::Pulse => {
                if new_beat {
                    1.0
                } else {
                    0.0
                }
            }
        };

        let mut value = self.config.adc_offset + self.config.amplitude * beat_value;
        value += self.add_noise(time);
        if let Some(powerline_hz) = self.config.powerline_hz {
            value += self.config.noise.powerline_amplitude * (2.0 * PI * powerline_hz * time).sin();
        }

        self.sample_index += 1;
        value
    }

    fn add_noise(&mut self, time: f64) -> f64 {
        let mut noise = 0.0;
        if self.config.noise.gaussian_std > 0.0 {
            noise += self.normal_dist.sample(&mut self.rng);
        }
        noise += self.config.noise.baseline_wander
            * (2.0 * PI * self.config.noise.baseline_wander_hz * time).sin();
        noise
    }

    /// Switch rhythm without a discontinuity in the beat sequence
    pub fn set_rhythm(&mut self, rhythm: HeartRhythm) -> EcgResult<()> {
        rhythm.validate()?;

        let rhythm_time =
            (self.sample_index - self.rhythm_start_sample) as f64 / self.config.sampling_rate_hz;
        self.beats_before_rhythm += self.config.rhythm.beats_elapsed(rhythm_time);
        self.rhythm_start_sample = self.sample_index;
        self.config.rhythm = rhythm;
        Ok(())
    }

    /// Current instantaneous heart rate
    pub fn current_bpm(&self) -> f64 {
        let rhythm_time =
            (self.sample_index - self.rhythm_start_sample) as f64 / self.config.sampling_rate_hz;
        self.config.rhythm.bpm_at(rhythm_time)
    }

    /// Elapsed simulated time in seconds
    pub fn elapsed(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate_hz
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
        self.rhythm_start_sample = 0;
        self.beats_before_rhythm = 0.0;
        self.last_beat = None;
    }

    /// Get current configuration
    pub fn config(&self) -> &EcgConfig {
        &self.config
    }

    /// Update configuration, keeping the simulated time
    pub fn update_config(&mut self, config: EcgConfig) -> EcgResult<()> {
        config.validate()?;
        self.normal_dist = Self::noise_distribution(&config.noise)?;

        let rhythm = config.rhythm;
        self.config = EcgConfig { rhythm: self.config.rhythm, ..config };
        self.set_rhythm(rhythm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_config(bpm: f64, shape: BeatShape) -> EcgConfig {
        EcgConfig {
            rhythm: HeartRhythm::Constant { bpm },
            shape,
            noise: NoiseConfig::clean(),
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_ecg_simulator_basic() {
        let mut simulator = EcgSimulator::new(EcgConfig::default()).unwrap();
        let signal = simulator.generate(1.0);

        assert_eq!(signal.len(), 100);
        assert!((simulator.elapsed() - 1.0).abs() < 1e-12);
        assert!(signal.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EcgConfig::default();
        config.sampling_rate_hz = 0.0;
        assert!(matches!(EcgSimulator::new(config), Err(EcgError::SimulationError { .. })));

        let mut config = EcgConfig::default();
        config.noise.gaussian_std = -1.0;
        assert!(matches!(config.validate(), Err(EcgError::SimulationError { .. })));
        assert!(EcgSimulator::new(config).is_err());

        let mut config = EcgConfig::default();
        config.noise.gaussian_std = f64::NAN;
        assert!(EcgSimulator::new(config).is_err());

        let mut config = EcgConfig::default();
        config.noise.malformed_line_prob = 1.5;
        assert!(EcgSimulator::new(config).is_err());
    }

    #[test]
    fn test_pulse_train_timing() {
        let mut simulator = EcgSimulator::new(clean_config(60.0, BeatShape::Pulse)).unwrap();
        let signal = simulator.generate_samples(1000);

        let pulses: Vec<usize> = signal
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 2250.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(pulses, (0..10).map(|k| k * 100).collect::<Vec<_>>());
    }

    #[test]
    fn test_pqrst_beat_count() {
        let mut simulator = EcgSimulator::new(clean_config(72.0, BeatShape::Pqrst)).unwrap();
        let signal = simulator.generate(10.0);

        // R waves are the only samples above offset + 60% amplitude
        let r_waves = signal
            .windows(3)
            .filter(|w| w[1] > 2300.0 && w[1] >= w[0] && w[1] > w[2])
            .count();
        assert_eq!(r_waves, 12);
    }

    #[test]
    fn test_seed_reproducibility() {
        let config = EcgConfig { seed: Some(42), ..Default::default() };
        let a = EcgSimulator::new(config.clone()).unwrap().generate_samples(300);
        let b = EcgSimulator::new(config).unwrap().generate_samples(300);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_lines_with_garbage() {
        let mut config = clean_config(60.0, BeatShape::Pqrst);
        config.noise.malformed_line_prob = 0.2;
        let mut simulator = EcgSimulator::new(config).unwrap();
        let lines = simulator.generate_lines(500);

        let valid = lines.iter().filter(|l| l.parse::<f64>().is_ok()).count();
        assert_eq!(valid, 500);
        assert!(lines.len() > 500);
    }

    #[test]
    fn test_set_rhythm_keeps_continuity() {
        let mut simulator = EcgSimulator::new(clean_config(60.0, BeatShape::Pulse)).unwrap();
        let first = simulator.generate_samples(250);
        simulator.set_rhythm(HeartRhythm::Constant { bpm: 120.0 }).unwrap();
        let second = simulator.generate_samples(250);

        assert_eq!(first.iter().filter(|v| **v > 2250.0).count(), 3);
        // 2.5 beats done; the next beat arrives after half a 0.5 s period
        let next_pulses: Vec<usize> = second
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 2250.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(next_pulses, vec![25, 75, 125, 175, 225]);
        assert_eq!(simulator.current_bpm(), 120.0);

        assert!(simulator.set_rhythm(HeartRhythm::Constant { bpm: -1.0 }).is_err());
    }

    #[test]
    fn test_reset_time() {
        let mut simulator = EcgSimulator::new(clean_config(72.0, BeatShape::Pqrst)).unwrap();
        let first = simulator.generate_samples(50);
        simulator.reset_time();
        assert_eq!(simulator.elapsed(), 0.0);
        assert_eq!(simulator.generate_samples(50), first);
    }
}
