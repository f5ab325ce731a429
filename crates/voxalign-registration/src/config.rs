//! Optimizer configuration and document-based loading.
//!
//! [`GradientDescentConfig`] mirrors the optimizer's configuration surface
//! as a plain serde-friendly struct. [`GradientDescentConfigReader`]
//! populates one from a hierarchical document: it expects a
//! `gradient-descent` child element with a required `iterations` attribute;
//! every other attribute falls back to the documented default. A missing
//! required element or attribute is a hard error naming the missing node.

use serde::{Deserialize, Serialize};
use voxalign_io::{DocumentError, DocumentReader, DomNode};

use crate::error::{RegistrationError, Result};
use crate::optimizer::GradientDescentOptimizer;

/// Configuration surface of [`GradientDescentOptimizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GradientDescentConfig {
    /// Manual learning rate; overridden by estimation when enabled.
    pub learning_rate: f64,
    /// Maximum step size in physical units for learning-rate estimation.
    pub maximum_step_size_in_physical_units: Option<f64>,
    /// Estimate scales at the start of optimization.
    pub do_estimate_scales: bool,
    /// Estimate the learning rate from the first scaled gradient only.
    pub do_estimate_learning_rate_once: bool,
    /// Estimate the learning rate at every iteration.
    pub do_estimate_learning_rate_at_each_iteration: bool,
    /// Convergence threshold on the window trend score.
    pub minimum_convergence_value: f64,
    /// Number of objective values in the convergence window.
    pub convergence_window_size: usize,
    /// Restore the best observed value and parameters at the end of a run.
    pub return_best_parameters_and_value: bool,
    /// Iteration budget.
    pub number_of_iterations: usize,
    /// Worker count for gradient post-processing.
    pub number_of_threads: usize,
}

impl Default for GradientDescentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            maximum_step_size_in_physical_units: None,
            do_estimate_scales: true,
            do_estimate_learning_rate_once: true,
            do_estimate_learning_rate_at_each_iteration: false,
            minimum_convergence_value: 1e-8,
            convergence_window_size: 50,
            return_best_parameters_and_value: false,
            number_of_iterations: 100,
            number_of_threads: 1,
        }
    }
}

impl GradientDescentConfig {
    /// Check the configuration for values the optimizer would reject.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(RegistrationError::configuration(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if let Some(step) = self.maximum_step_size_in_physical_units {
            if !(step > 0.0 && step.is_finite()) {
                return Err(RegistrationError::configuration(format!(
                    "maximum step size must be positive and finite, got {step}"
                )));
            }
        }
        if self.minimum_convergence_value < 0.0 {
            return Err(RegistrationError::configuration(
                "minimum convergence value must be non-negative",
            ));
        }
        if self.convergence_window_size < 2 {
            return Err(RegistrationError::configuration(
                "convergence window size must be at least 2",
            ));
        }
        if self.number_of_iterations == 0 {
            return Err(RegistrationError::configuration(
                "number of iterations must be at least 1",
            ));
        }
        if self.number_of_threads == 0 {
            return Err(RegistrationError::configuration(
                "number of threads must be at least 1",
            ));
        }
        if self.do_estimate_learning_rate_once && self.do_estimate_learning_rate_at_each_iteration
        {
            return Err(RegistrationError::configuration(
                "once-only and per-iteration learning-rate estimation are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// Validate and copy the configuration onto an optimizer.
    pub fn apply(&self, optimizer: &mut GradientDescentOptimizer) -> Result<()> {
        self.validate()?;
        optimizer.set_learning_rate(self.learning_rate);
        if let Some(step) = self.maximum_step_size_in_physical_units {
            optimizer.set_maximum_step_size_in_physical_units(step);
        }
        optimizer.set_do_estimate_scales(self.do_estimate_scales);
        optimizer.set_do_estimate_learning_rate_once(self.do_estimate_learning_rate_once);
        optimizer.set_do_estimate_learning_rate_at_each_iteration(
            self.do_estimate_learning_rate_at_each_iteration,
        );
        optimizer.set_minimum_convergence_value(self.minimum_convergence_value);
        optimizer.set_convergence_window_size(self.convergence_window_size);
        optimizer
            .set_return_best_parameters_and_value(self.return_best_parameters_and_value);
        optimizer.set_number_of_iterations(self.number_of_iterations);
        optimizer.set_number_of_threads(self.number_of_threads);
        Ok(())
    }
}

/// Reads a [`GradientDescentConfig`] from a document element.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientDescentConfigReader;

impl DocumentReader for GradientDescentConfigReader {
    type Output = GradientDescentConfig;

    fn read(&self, node: &DomNode<'_>) -> std::result::Result<Self::Output, DocumentError> {
        let element = node.child("gradient-descent")?;

        let mut config = GradientDescentConfig {
            number_of_iterations: element.attribute_usize("iterations")?,
            ..GradientDescentConfig::default()
        };

        if let Some(rate) = element.attribute_f64_opt("learning-rate")? {
            config.learning_rate = rate;
        }
        config.maximum_step_size_in_physical_units =
            element.attribute_f64_opt("maximum-step-size")?;
        if let Some(flag) = element.attribute_bool_opt("estimate-scales")? {
            config.do_estimate_scales = flag;
        }
        if let Some(flag) = element.attribute_bool_opt("estimate-learning-rate-once")? {
            config.do_estimate_learning_rate_once = flag;
        }
        if let Some(flag) = element.attribute_bool_opt("estimate-learning-rate-each-iteration")? {
            config.do_estimate_learning_rate_at_each_iteration = flag;
        }
        if let Some(value) = element.attribute_f64_opt("minimum-convergence-value")? {
            config.minimum_convergence_value = value;
        }
        if let Some(size) = element.attribute_usize_opt("convergence-window-size")? {
            config.convergence_window_size = size;
        }
        if let Some(flag) = element.attribute_bool_opt("return-best")? {
            config.return_best_parameters_and_value = flag;
        }
        if let Some(threads) = element.attribute_usize_opt("threads")? {
            config.number_of_threads = threads;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GradientDescentConfig::default();
        assert_eq!(config.learning_rate, 1.0);
        assert_eq!(config.minimum_convergence_value, 1e-8);
        assert_eq!(config.convergence_window_size, 50);
        assert!(config.do_estimate_scales);
        assert!(config.do_estimate_learning_rate_once);
        assert!(!config.do_estimate_learning_rate_at_each_iteration);
        assert!(!config.return_best_parameters_and_value);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = GradientDescentConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = GradientDescentConfig {
            convergence_window_size: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = GradientDescentConfig {
            do_estimate_learning_rate_at_each_iteration: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.do_estimate_learning_rate_once = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reader_requires_element_and_iterations() {
        let reader = GradientDescentConfigReader;

        let err = reader.read_str(r#"{"registration": {}}"#).unwrap_err();
        assert!(err.to_string().contains("gradient-descent"));

        let err = reader
            .read_str(r#"{"registration": {"gradient-descent": {}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn test_reader_populates_from_document() {
        let text = r#"
            {
                "registration": {
                    "gradient-descent": {
                        "iterations": 25,
                        "learning-rate": 0.5,
                        "maximum-step-size": 3.0,
                        "convergence-window-size": 10,
                        "return-best": true
                    }
                }
            }
        "#;
        let config = GradientDescentConfigReader.read_str(text).unwrap();
        assert_eq!(config.number_of_iterations, 25);
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.maximum_step_size_in_physical_units, Some(3.0));
        assert_eq!(config.convergence_window_size, 10);
        assert!(config.return_best_parameters_and_value);
        // untouched fields keep their defaults
        assert!(config.do_estimate_scales);
        assert_eq!(config.number_of_threads, 1);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = GradientDescentConfig {
            number_of_iterations: 10,
            return_best_parameters_and_value: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: GradientDescentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_apply_to_optimizer() {
        let config = GradientDescentConfig {
            learning_rate: 0.25,
            number_of_iterations: 7,
            ..Default::default()
        };
        let mut optimizer = GradientDescentOptimizer::new();
        config.apply(&mut optimizer).unwrap();
        assert_eq!(optimizer.learning_rate(), 0.25);
    }
}
