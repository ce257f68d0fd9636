//! Savitzky–Golay smoothing

use crate::processor::WindowProcessor;
use ecg_core::{parameter_error, EcgError, EcgResult};
use nalgebra::DMatrix;

/// Local polynomial smoother
///
/// Interior samples take the value of the least-squares polynomial fitted over
/// the `span` samples centred on them. The first and last `span / 2` samples
/// are evaluated on the polynomial fitted to the first and last full span.
#[derive(Debug, Clone, PartialEq)]
pub struct Smoother {
    span: usize,
    degree: usize,
    center_weights: Vec<f64>,
    // left_weights[i] produces output i; right_weights[i] produces output len - half + i
    left_weights: Vec<Vec<f64>>,
    right_weights: Vec<Vec<f64>>,
}

impl Smoother {
    pub fn new(span: usize, degree: usize) -> EcgResult<Self> {
        if span % 2 == 0 {
            return Err(parameter_error!("smoother_span", "span must be odd, got {}", span));
        }
        if span <= degree {
            return Err(parameter_error!(
                "smoother_span",
                "span {} must exceed polynomial degree {}",
                span,
                degree
            ));
        }

        let half = span / 2;
        let vandermonde = DMatrix::from_fn(span, degree + 1, |row, col| {
            (row as f64 - half as f64).powi(col as i32)
        });
        let projection = vandermonde.pseudo_inverse(f64::EPSILON).map_err(|e| {
            EcgError::invalid_parameter("smoother_degree", format!("least-squares fit failed: {}", e))
        })?;

        // Weights evaluating the fitted polynomial at offset `t` from the span centre
        let weights_at = |t: f64| -> Vec<f64> {
            (0..span)
                .map(|j| (0..=degree).map(|c| t.powi(c as i32) * projection[(c, j)]).sum())
                .collect()
        };

        Ok(Smoother {
            span,
            degree,
            center_weights: weights_at(0.0),
            left_weights: (0..half).map(|i| weights_at(i as f64 - half as f64)).collect(),
            right_weights: (0..half).map(|i| weights_at(i as f64 + 1.0)).collect(),
        })
    }

    /// One-shot smoothing of `window`
    pub fn smooth(window: &[f64], span: usize, degree: usize) -> EcgResult<Vec<f64>> {
        Smoother::new(span, degree)?.apply(window)
    }

    pub fn apply(&self, window: &[f64]) -> EcgResult<Vec<f64>> {
        let len = window.len();
        if self.span > len {
            return Err(EcgError::invalid_parameter(
                "smoother_span",
                format!("span {} exceeds window length {}", self.span, len),
            ));
        }

        let half = self.span / 2;
        let dot = |weights: &[f64], samples: &[f64]| -> f64 {
            weights.iter().zip(samples).map(|(w, x)| w * x).sum()
        };

        let mut output = vec![0.0; len];
        for (i, segment) in window.windows(self.span).enumerate() {
            output[i + half] = dot(&self.center_weights, segment);
        }

        let head = &window[..self.span];
        let tail = &window[len - self.span..];
        for i in 0..half {
            output[i] = dot(&self.left_weights[i], head);
            output[len - half + i] = dot(&self.right_weights[i], tail);
        }

        Ok(output)
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl WindowProcessor for Smoother {
    fn process(&self, window: &[f64]) -> EcgResult<Vec<f64>> {
        self.apply(window)
    }

    fn name(&self) -> &str {
        "Savitzky-Golay Smoother"
    }

    fn can_process(&self, window: &[f64]) -> bool {
        window.len() >= self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_validation() {
        assert!(matches!(
            Smoother::new(14, 3),
            Err(EcgError::InvalidParameter { parameter: "smoother_span", .. })
        ));
        assert!(Smoother::new(3, 3).is_err());
        assert!(Smoother::new(5, 4).is_ok());

        let smoother = Smoother::new(15, 3).unwrap();
        assert!(matches!(
            smoother.apply(&[0.0; 10]),
            Err(EcgError::InvalidParameter { parameter: "smoother_span", .. })
        ));
    }

    #[test]
    fn test_known_quadratic_weights() {
        // Classic 5-point quadratic/cubic smoothing: (-3, 12, 17, 12, -3) / 35
        let smoother = Smoother::new(5, 2).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0].map(|w| w / 35.0);
        for (w, e) in smoother.center_weights.iter().zip(expected) {
            assert!((w - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_polynomials_pass_through_unchanged() {
        // A cubic is reproduced exactly by a degree-3 fit, edges included
        let signal: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64 * 0.1;
                0.5 * x * x * x - 2.0 * x * x + x + 3.0
            })
            .collect();
        let smoothed = Smoother::smooth(&signal, 15, 3).unwrap();

        assert_eq!(smoothed.len(), signal.len());
        for (a, b) in signal.iter().zip(&smoothed) {
            assert!((a - b).abs() < 1e-8, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_reduces_alternating_noise() {
        let signal: Vec<f64> = (0..100)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let smoothed = Smoother::smooth(&signal, 15, 3).unwrap();

        let interior_peak = smoothed[10..90].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(interior_peak < 0.2);
    }

    #[test]
    fn test_span_equal_to_window() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let smoothed = Smoother::smooth(&signal, 5, 1).unwrap();
        for (a, b) in signal.iter().zip(&smoothed) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
