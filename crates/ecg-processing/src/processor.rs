//! Core window processor trait and types

use ecg_core::EcgResult;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A stage that maps one sample window onto a same-length window
///
/// Stages hold only configuration and coefficients derived from it, so
/// `process` takes `&self` and is deterministic for a given input.
pub trait WindowProcessor: Send + Sync {
    /// Process a window and return the same number of samples
    fn process(&self, window: &[f64]) -> EcgResult<Vec<f64>>;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Get processor type for pipeline organization
    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Conditioning
    }

    /// Check if processor can handle the given window
    fn can_process(&self, window: &[f64]) -> bool {
        !window.is_empty()
    }
}

/// Types of window processors for pipeline organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    /// Noise removal ahead of beat isolation (low-pass, smoothing)
    Conditioning,
    /// Beat isolation (wavelet band selection)
    Enhancement,
    /// Peak picking and rate estimation
    Detection,
}

/// Timing and outcome of one stage within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Stage name
    pub stage: String,
    /// Role of the stage in the chain
    pub processor_type: ProcessorType,
    /// Processing time in microseconds
    pub processing_time_us: u64,
    /// Success/failure status
    pub success: bool,
    /// Error message if the stage failed
    pub error_message: Option<String>,
}

impl StageMetrics {
    /// Start timing a stage
    pub fn start_timing(stage: &str, processor_type: ProcessorType) -> StageTimer {
        StageTimer {
            stage: stage.to_string(),
            processor_type,
            start_time: Instant::now(),
        }
    }
}

/// Helper for timing processing stages
pub struct StageTimer {
    stage: String,
    processor_type: ProcessorType,
    start_time: Instant,
}

impl StageTimer {
    /// Finish timing and return metrics
    pub fn finish(self) -> StageMetrics {
        StageMetrics {
            processing_time_us: self.elapsed_us(),
            stage: self.stage,
            processor_type: self.processor_type,
            success: true,
            error_message: None,
        }
    }

    /// Finish with error
    pub fn finish_with_error(self, error: &str) -> StageMetrics {
        StageMetrics {
            processing_time_us: self.elapsed_us(),
            stage: self.stage,
            processor_type: self.processor_type,
            success: false,
            error_message: Some(error.to_string()),
        }
    }

    fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }
}
