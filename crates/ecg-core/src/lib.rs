//! ECG-Core: Foundation types for heart-rate estimation
//!
//! Sample buffering, estimate types and the shared error type used by every
//! crate in the workspace.

pub mod error;
pub mod sample_buffer;
pub mod estimate;

pub use error::{EcgError, EcgResult};
pub use sample_buffer::{Sample, SampleBuffer};
pub use estimate::{EnhancedSignal, HeartRateEstimate, PeakSet, RateZone};
