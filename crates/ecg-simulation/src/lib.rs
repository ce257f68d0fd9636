//! ECG-Simulation: Synthetic ECG sources for testing and development
//!
//! Generates PQRST or pulse-train recordings with a programmable heart
//! rhythm, noise and ADC offset, either in bulk or as a timed line stream
//! that behaves like the serial acquisition device.

pub mod real_time_stream;
pub mod signal_patterns;
pub mod ecg_simulator;

pub use ecg_simulator::*;
pub use real_time_stream::*;
pub use signal_patterns::*;
