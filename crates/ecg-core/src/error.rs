//! Error handling for the ECG workspace
//!
//! One error type is shared by the buffer, every processing stage and the
//! simulator. Variants map onto how the pipeline reacts to them: parameter
//! errors are fatal at construction, parse errors drop a single sample and
//! transform errors skip a single run.

use core::fmt;

/// Result type alias for ECG operations
pub type EcgResult<T> = Result<T, EcgError>;

/// Error type for all ECG operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EcgError {
    /// Invalid static configuration of a stage or of the pipeline
    InvalidParameter {
        /// Name of the offending parameter
        parameter: &'static str,
        /// Description of the violated constraint
        reason: String,
    },

    /// A single raw reading could not be turned into a sample
    ParseError {
        /// The rejected input, as received
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Wavelet decomposition/reconstruction shape mismatch
    TransformError {
        /// Description of the mismatch
        reason: String,
    },

    /// A stage received data it cannot work on
    InvalidInput {
        /// Description of the input problem
        reason: String,
    },

    /// Signal simulator configuration error
    SimulationError {
        /// Simulation error description
        reason: String,
    },
}

impl EcgError {
    /// Shorthand for [`EcgError::InvalidParameter`]
    pub fn invalid_parameter(parameter: &'static str, reason: impl Into<String>) -> Self {
        EcgError::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    /// Whether the pipeline can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EcgError::InvalidParameter { .. } | EcgError::SimulationError { .. })
    }
}

impl fmt::Display for EcgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcgError::InvalidParameter { parameter, reason } => {
                write!(f, "Invalid parameter '{}': {}", parameter, reason)
            }
            EcgError::ParseError { input, reason } => {
                write!(f, "Cannot parse sample {:?}: {}", input, reason)
            }
            EcgError::TransformError { reason } => {
                write!(f, "Wavelet transform error: {}", reason)
            }
            EcgError::InvalidInput { reason } => {
                write!(f, "Invalid input: {}", reason)
            }
            EcgError::SimulationError { reason } => {
                write!(f, "Simulation error: {}", reason)
            }
        }
    }
}

impl std::error::Error for EcgError {}

/// Convenience macro for creating parameter errors
#[macro_export]
macro_rules! parameter_error {
    ($parameter:literal, $($arg:tt)+) => {
        $crate::error::EcgError::InvalidParameter {
            parameter: $parameter,
            reason: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating transform errors
#[macro_export]
macro_rules! transform_error {
    ($($arg:tt)+) => {
        $crate::error::EcgError::TransformError {
            reason: format!($($arg)+),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EcgError::invalid_parameter("lowpass_cutoff_hz", "60 Hz is above Nyquist (50 Hz)");
        let display = format!("{}", error);
        assert!(display.contains("lowpass_cutoff_hz"));
        assert!(display.contains("Nyquist"));

        let error = EcgError::ParseError {
            input: "12a".to_string(),
            reason: "invalid float literal".to_string(),
        };
        assert!(format!("{}", error).contains("\"12a\""));
    }

    #[test]
    fn test_macros() {
        let error = parameter_error!("order", "order must be at least 1, got {}", 0);
        assert_eq!(
            error,
            EcgError::InvalidParameter {
                parameter: "order",
                reason: "order must be at least 1, got 0".to_string(),
            }
        );

        let error = transform_error!("expected {} bands, got {}", 4, 3);
        assert!(matches!(error, EcgError::TransformError { .. }));
    }

    #[test]
    fn test_recoverability() {
        assert!(!EcgError::invalid_parameter("span", "even").is_recoverable());
        assert!(EcgError::TransformError { reason: "len".into() }.is_recoverable());
        assert!(EcgError::ParseError { input: String::new(), reason: "empty".into() }.is_recoverable());
    }
}
