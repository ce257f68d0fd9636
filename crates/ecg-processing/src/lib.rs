//! ECG-Processing: Heart-rate pipeline for streaming ECG samples
//!
//! Low-pass filtering, Savitzky–Golay smoothing, stationary wavelet beat
//! enhancement, R-peak detection and rate estimation, orchestrated over a
//! sliding sample window.

pub mod processor;
pub mod filters;
pub mod smoothing;
pub mod wavelet;
pub mod peaks;
pub mod rate;
pub mod config;
pub mod pipeline;

pub use processor::{WindowProcessor, ProcessorType, StageMetrics, StageTimer};
pub use filters::{LowPassFilter, StreamingLowPass, FilterMode};
pub use smoothing::Smoother;
pub use wavelet::{BeatEnhancer, Wavelet, WaveletBands};
pub use peaks::PeakDetector;
pub use rate::RateEstimator;
pub use config::PipelineConfig;
pub use pipeline::{
    analyze_record, EstimateConsumer, Pipeline, PipelineState, PipelineStats,
};
