//! Parameter scales: normalization of heterogeneous parameter units.

use nalgebra::DVector;

use crate::error::{RegistrationError, Result};

/// Per-component tolerance for treating a scales vector as identity.
pub const SCALES_IDENTITY_TOLERANCE: f64 = 0.01;

/// Estimates parameter scales and safe step sizes from the attached
/// metric/transform pair.
///
/// Implementations typically sample how much physical-space displacement a
/// unit change of each parameter produces at representative points. The
/// contract only requires determinism for a fixed transform/metric state
/// and strictly positive outputs.
pub trait ParameterScalesEstimator: Send {
    /// Estimate one scale per (local) parameter.
    fn estimate_scales(&mut self) -> Result<DVector<f64>>;

    /// Estimate the physical-space step magnitude a scaled gradient step
    /// would produce. Strictly positive.
    fn estimate_step_scale(&mut self, scaled_gradient: &DVector<f64>) -> Result<f64>;

    /// Estimate the largest step, in physical units, that is safe for the
    /// current metric resolution (typically one grid spacing).
    fn estimate_maximum_step_size(&mut self) -> Result<f64>;
}

/// Validate a scales vector against the metric's local parameter count:
/// the length must match and every entry must be strictly positive.
pub(crate) fn validate_scales(scales: &DVector<f64>, num_local_parameters: usize) -> Result<()> {
    if scales.len() != num_local_parameters {
        return Err(RegistrationError::ScalesLengthMismatch {
            expected: num_local_parameters,
            actual: scales.len(),
        });
    }
    if let Some(bad) = scales.iter().find(|s| !(**s > 0.0 && s.is_finite())) {
        return Err(RegistrationError::configuration(format!(
            "scales must be strictly positive and finite, found {bad}"
        )));
    }
    Ok(())
}

/// Whether every scale component is within tolerance of 1.0, allowing the
/// divide step to be skipped.
pub(crate) fn scales_are_identity(scales: &DVector<f64>, tolerance: f64) -> bool {
    scales.iter().all(|s| (s - 1.0).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scales_accepts_matching_positive() {
        let scales = DVector::from_element(4, 2.5);
        assert!(validate_scales(&scales, 4).is_ok());
    }

    #[test]
    fn test_validate_scales_rejects_length_mismatch() {
        let scales = DVector::from_element(5, 1.0);
        let err = validate_scales(&scales, 4).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::ScalesLengthMismatch {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_validate_scales_rejects_non_positive() {
        let scales = DVector::from_vec(vec![1.0, 0.0, 1.0]);
        assert!(validate_scales(&scales, 3).is_err());
        let scales = DVector::from_vec(vec![1.0, f64::NAN]);
        assert!(validate_scales(&scales, 2).is_err());
    }

    #[test]
    fn test_identity_detection() {
        let near = DVector::from_element(3, 0.999);
        assert!(scales_are_identity(&near, SCALES_IDENTITY_TOLERANCE));
        let far = DVector::from_vec(vec![1.0, 3.19, 1.0]);
        assert!(!scales_are_identity(&far, SCALES_IDENTITY_TOLERANCE));
    }
}
