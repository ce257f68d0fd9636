//! Configuration management for the heart-rate pipeline

use crate::filters::{FilterMode, LowPassFilter};
use crate::peaks::PeakDetector;
use crate::rate::RateEstimator;
use crate::smoothing::Smoother;
use crate::wavelet::{BeatEnhancer, Wavelet};
use ecg_core::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};

const STREAMING_HEIGHT_FACTOR: f64 = 3.0;
const STREAMING_REFRACTORY_S: f64 = 0.35;

/// Static pipeline configuration, fixed for the lifetime of a pipeline
///
/// Missing JSON fields fall back to the defaults, so a file only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sampling rate of the incoming stream (Hz)
    pub sampling_rate_hz: f64,
    /// Sliding window length (samples)
    pub window_size_samples: usize,
    /// Low-pass cutoff (Hz), below Nyquist
    pub lowpass_cutoff_hz: f64,
    /// Butterworth order
    pub lowpass_order: usize,
    /// Whole-window or per-sample low-pass
    pub filter_mode: FilterMode,
    /// Run the low-pass and smoothing stages
    pub preprocess: bool,
    /// Savitzky–Golay span (odd)
    pub smoother_span: usize,
    /// Savitzky–Golay polynomial degree
    pub smoother_degree: usize,
    /// Wavelet family for beat enhancement
    pub wavelet: Wavelet,
    /// Decomposition depth
    pub wavelet_levels: usize,
    /// Detail levels kept, 0 being the finest
    pub keep_detail_levels: Vec<usize>,
    /// Peak threshold as a multiple of the mean energy
    pub peak_height_factor: f64,
    /// Refractory distance; `None` means half a second
    pub peak_min_distance_samples: Option<usize>,
    /// New samples required between two runs
    pub run_interval_samples: usize,
    /// Run automatically on push; otherwise wait for `poll()`
    pub auto_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sampling_rate_hz: 100.0,
            window_size_samples: 1000,
            lowpass_cutoff_hz: 20.0,
            lowpass_order: 5,
            filter_mode: FilterMode::Batch,
            preprocess: true,
            smoother_span: 15,
            smoother_degree: 3,
            wavelet: Wavelet::Sym4,
            wavelet_levels: 4,
            keep_detail_levels: vec![2, 3],
            peak_height_factor: PeakDetector::DEFAULT_HEIGHT_FACTOR,
            peak_min_distance_samples: None,
            run_interval_samples: 1,
            auto_run: true,
        }
    }
}

impl PipelineConfig {
    /// Offline profile for complete recordings: wavelet stage only, 50-sample refractory
    pub fn record_analysis(sampling_rate_hz: f64) -> Self {
        PipelineConfig {
            sampling_rate_hz,
            preprocess: false,
            peak_min_distance_samples: Some(50),
            ..Default::default()
        }
    }

    /// Real-time profile for sources with a DC offset (raw ADC counts)
    ///
    /// Tuned for 40-170 BPM. A half-second refractory distance would cap
    /// detection at 120 BPM, and at fast rates the QRS energy raises the
    /// window mean until `8x mean` exceeds the beats themselves.
    pub fn streaming(sampling_rate_hz: f64) -> Self {
        PipelineConfig {
            sampling_rate_hz,
            window_size_samples: (sampling_rate_hz * 10.0).round() as usize,
            filter_mode: FilterMode::Streaming,
            peak_height_factor: STREAMING_HEIGHT_FACTOR,
            peak_min_distance_samples: Some((sampling_rate_hz * STREAMING_REFRACTORY_S).floor() as usize),
            ..Default::default()
        }
    }

    /// Effective refractory distance in samples
    pub fn min_distance(&self) -> usize {
        self.peak_min_distance_samples
            .unwrap_or_else(|| (self.sampling_rate_hz / 2.0).floor() as usize)
    }

    /// Check every stage can be built from this configuration
    pub fn validate(&self) -> EcgResult<()> {
        RateEstimator::new(self.window_size_samples, self.sampling_rate_hz)?;

        if self.preprocess {
            LowPassFilter::design(self.lowpass_cutoff_hz, self.sampling_rate_hz, self.lowpass_order)?;
            Smoother::new(self.smoother_span, self.smoother_degree)?;
            if self.smoother_span > self.window_size_samples {
                return Err(EcgError::invalid_parameter(
                    "smoother_span",
                    format!(
                        "span {} exceeds window length {}",
                        self.smoother_span, self.window_size_samples
                    ),
                ));
            }
        }

        BeatEnhancer::new(self.wavelet, self.wavelet_levels, &self.keep_detail_levels)?;
        PeakDetector::new(self.peak_height_factor, self.min_distance())?;

        if self.run_interval_samples == 0 {
            return Err(EcgError::invalid_parameter(
                "run_interval_samples",
                "run interval must be at least one sample",
            ));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EcgResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            EcgError::invalid_parameter("config", format!("Failed to serialize configuration: {}", e))
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> EcgResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            EcgError::invalid_parameter("config", format!("Failed to deserialize configuration: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.sampling_rate_hz, 100.0);
        assert_eq!(config.window_size_samples, 1000);
        assert_eq!(config.keep_detail_levels, vec![2, 3]);
        assert_eq!(config.filter_mode, FilterMode::default());
        assert_eq!(config.wavelet, Wavelet::default());
        assert_eq!(config.min_distance(), 50);
        assert!(config.validate().is_ok());

        let odd_rate = PipelineConfig {
            sampling_rate_hz: 125.0,
            ..Default::default()
        };
        assert_eq!(odd_rate.min_distance(), 62);
    }

    #[test]
    fn test_presets() {
        let record = PipelineConfig::record_analysis(360.0);
        assert!(!record.preprocess);
        assert_eq!(record.min_distance(), 50);
        assert!(record.validate().is_ok());

        // Preprocessing is skipped, so a cutoff above Nyquist is irrelevant
        let low_rate = PipelineConfig::record_analysis(30.0);
        assert!(low_rate.validate().is_ok());

        let streaming = PipelineConfig::streaming(250.0);
        assert_eq!(streaming.filter_mode, FilterMode::Streaming);
        assert_eq!(streaming.window_size_samples, 2500);
        assert_eq!(streaming.min_distance(), 87);
        assert_eq!(streaming.peak_height_factor, 3.0);
        assert!(streaming.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();

        config.lowpass_cutoff_hz = 50.0;
        assert!(matches!(
            config.validate(),
            Err(EcgError::InvalidParameter { parameter: "lowpass_cutoff_hz", .. })
        ));

        config = PipelineConfig::default();
        config.smoother_span = 16;
        assert!(config.validate().is_err());

        config = PipelineConfig::default();
        config.window_size_samples = 10;
        assert!(matches!(
            config.validate(),
            Err(EcgError::InvalidParameter { parameter: "smoother_span", .. })
        ));

        config = PipelineConfig::default();
        config.keep_detail_levels = vec![2, 4];
        assert!(matches!(
            config.validate(),
            Err(EcgError::InvalidParameter { parameter: "wavelet_levels", .. })
        ));

        config = PipelineConfig::default();
        config.sampling_rate_hz = 0.0;
        assert!(config.validate().is_err());

        config = PipelineConfig::default();
        config.run_interval_samples = 0;
        assert!(config.validate().is_err());

        config = PipelineConfig::default();
        config.peak_min_distance_samples = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = PipelineConfig::streaming(200.0);
        config.wavelet = Wavelet::Db4;
        config.keep_detail_levels = vec![1, 2];

        let json = config.to_json().unwrap();
        assert!(json.contains("\"streaming\""));
        assert!(json.contains("\"db4\""));
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json(r#"{ "sampling_rate_hz": 250.0, "wavelet": "haar" }"#).unwrap();
        assert_eq!(config.sampling_rate_hz, 250.0);
        assert_eq!(config.wavelet, Wavelet::Haar);
        assert_eq!(config.window_size_samples, 1000);

        assert!(PipelineConfig::from_json("{ not json").is_err());
        assert!(PipelineConfig::from_json(r#"{ "wavelet": "coif1" }"#).is_err());
    }
}
