//! Gradient-descent optimizer over an attached metric.
//!
//! At each iteration the current position is updated according to
//! `p_{n+1} = p_n + learning_rate * dM/dp`, where the derivative has been
//! divided by the parameter scales first. The metric is assumed to return a
//! derivative that improves the objective when *added* to the parameters.
//!
//! Scales and the learning rate can each be set manually or estimated
//! through an attached [`ParameterScalesEstimator`]: scales once at the
//! start of optimization (overriding manual scales), the learning rate
//! either once from the first scaled gradient or at every iteration, so
//! that each step moves points in physical space by at most
//! `maximum_step_size_in_physical_units`.

use std::sync::{Arc, Mutex};

use nalgebra::DVector;
use rayon::prelude::*;

use crate::error::{RegistrationError, Result};
use crate::metric::CostMetric;
use crate::observer::{IterationEvent, IterationObserver, ObserverRegistry, StopHandle};
use crate::optimizer::convergence::WindowConvergenceMonitor;
use crate::optimizer::partition::IndexRange;
use crate::optimizer::scales::{
    scales_are_identity, validate_scales, ParameterScalesEstimator, SCALES_IDENTITY_TOLERANCE,
};

/// Life-cycle state of the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    /// No run started yet.
    Idle,
    /// Validating configuration and estimating scales.
    Initializing,
    /// Stepping; also the paused state between `stop` and `resume`.
    Iterating,
    /// Terminal: the convergence score dropped below the minimum.
    Converged,
    /// Terminal: the iteration budget was exhausted.
    MaxIterationsReached,
    /// Terminal: a stop was requested and honored.
    UserStopped,
    /// Terminal: configuration or metric evaluation failed.
    Failed,
}

impl OptimizerState {
    /// True for states no further stepping can leave without a restart.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converged | Self::MaxIterationsReached | Self::Failed
        )
    }
}

/// Best objective value and parameter snapshot seen so far.
#[derive(Debug, Clone)]
struct BestState {
    value: f64,
    parameters: Vec<f64>,
}

/// Gradient-descent optimizer.
///
/// Owns the iteration state machine; holds a shared handle to the metric
/// (which owns the transform being optimized) and never copies its
/// parameters except for the optional best-state snapshot.
pub struct GradientDescentOptimizer {
    // configuration
    learning_rate: f64,
    maximum_step_size: Option<f64>,
    do_estimate_scales: bool,
    do_estimate_learning_rate_once: bool,
    do_estimate_learning_rate_at_each_iteration: bool,
    minimum_convergence_value: f64,
    convergence_window_size: usize,
    number_of_iterations: usize,
    return_best_parameters_and_value: bool,
    number_of_threads: usize,

    // collaborators
    metric: Option<Arc<Mutex<dyn CostMetric>>>,
    scales_estimator: Option<Box<dyn ParameterScalesEstimator>>,
    observers: ObserverRegistry,
    stop_handle: StopHandle,

    // run state
    state: OptimizerState,
    scales: DVector<f64>,
    scales_are_identity: bool,
    gradient: DVector<f64>,
    num_parameters: usize,
    current_iteration: usize,
    current_value: f64,
    current_convergence_value: Option<f64>,
    best: Option<BestState>,
    monitor: WindowConvergenceMonitor,
}

impl Default for GradientDescentOptimizer {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            maximum_step_size: None,
            do_estimate_scales: true,
            do_estimate_learning_rate_once: true,
            do_estimate_learning_rate_at_each_iteration: false,
            minimum_convergence_value: 1e-8,
            convergence_window_size: 50,
            number_of_iterations: 100,
            return_best_parameters_and_value: false,
            number_of_threads: 1,
            metric: None,
            scales_estimator: None,
            observers: ObserverRegistry::new(),
            stop_handle: StopHandle::new(),
            state: OptimizerState::Idle,
            scales: DVector::zeros(0),
            scales_are_identity: true,
            gradient: DVector::zeros(0),
            num_parameters: 0,
            current_iteration: 0,
            current_value: f64::MAX,
            current_convergence_value: None,
            best: None,
            monitor: WindowConvergenceMonitor::new(50),
        }
    }
}

impl GradientDescentOptimizer {
    /// Create an optimizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    // --- configuration -----------------------------------------------------

    /// Attach the metric to optimize. The metric owns the moving transform;
    /// the caller keeps its own handle alive for the run duration.
    pub fn set_metric(&mut self, metric: Arc<Mutex<dyn CostMetric>>) {
        self.metric = Some(metric);
    }

    /// Attach a scales estimator, enabling automatic scale and learning-rate
    /// estimation.
    pub fn set_scales_estimator(&mut self, estimator: Box<dyn ParameterScalesEstimator>) {
        self.scales_estimator = Some(estimator);
    }

    /// Set the scales manually. Overridden at `start_optimization` when an
    /// estimator is attached and scale estimation is enabled.
    pub fn set_scales(&mut self, scales: DVector<f64>) {
        self.scales = scales;
    }

    /// Set the manual learning rate (default 1.0). Overridden by automatic
    /// estimation when enabled.
    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Set the maximum step size in physical units used by learning-rate
    /// estimation. Defaults to the estimator's own maximum when unset.
    pub fn set_maximum_step_size_in_physical_units(&mut self, step: f64) {
        self.maximum_step_size = Some(step);
    }

    /// Enable or disable scale estimation at the start of optimization.
    pub fn set_do_estimate_scales(&mut self, enabled: bool) {
        self.do_estimate_scales = enabled;
    }

    /// Enable or disable learning-rate estimation at the first iteration
    /// only. Mutually exclusive with per-iteration estimation.
    pub fn set_do_estimate_learning_rate_once(&mut self, enabled: bool) {
        self.do_estimate_learning_rate_once = enabled;
    }

    /// Enable or disable learning-rate estimation at every iteration.
    /// Mutually exclusive with once-only estimation.
    pub fn set_do_estimate_learning_rate_at_each_iteration(&mut self, enabled: bool) {
        self.do_estimate_learning_rate_at_each_iteration = enabled;
    }

    /// Set the convergence threshold on the window trend score.
    pub fn set_minimum_convergence_value(&mut self, value: f64) {
        self.minimum_convergence_value = value;
    }

    /// Set the convergence window size.
    pub fn set_convergence_window_size(&mut self, size: usize) {
        self.convergence_window_size = size;
    }

    /// Set the iteration budget.
    pub fn set_number_of_iterations(&mut self, iterations: usize) {
        self.number_of_iterations = iterations;
    }

    /// Track the best value/parameters seen and restore them at the end of
    /// the run. Costs one parameter-vector copy per improvement.
    pub fn set_return_best_parameters_and_value(&mut self, enabled: bool) {
        self.return_best_parameters_and_value = enabled;
    }

    /// Set the worker count for gradient post-processing. Must be at least 1.
    pub fn set_number_of_threads(&mut self, threads: usize) {
        self.number_of_threads = threads;
    }

    /// Register an iteration observer.
    pub fn add_observer(&mut self, observer: Arc<dyn IterationObserver>) {
        self.observers.add(observer);
    }

    // --- read-only outputs -------------------------------------------------

    /// Current life-cycle state.
    pub fn state(&self) -> OptimizerState {
        self.state
    }

    /// Objective value of the most recent evaluation (or of the best state
    /// after a return-best run).
    pub fn value(&self) -> f64 {
        self.current_value
    }

    /// Number of completed iterations.
    pub fn current_iteration(&self) -> usize {
        self.current_iteration
    }

    /// Learning rate currently in effect.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Scales currently in effect.
    pub fn scales(&self) -> &DVector<f64> {
        &self.scales
    }

    /// Whether the scales were detected as identity at start.
    pub fn scales_are_identity(&self) -> bool {
        self.scales_are_identity
    }

    /// Most recent convergence score, once the window has filled.
    pub fn convergence_value(&self) -> Option<f64> {
        self.current_convergence_value
    }

    /// Copy of the metric's current parameters, when a metric is attached.
    pub fn current_position(&self) -> Option<Vec<f64>> {
        self.metric
            .as_ref()
            .map(|m| m.lock().unwrap().parameters().to_vec())
    }

    /// Cancellation handle; clone it into observer callbacks or other
    /// threads.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Request early termination at the next iteration boundary.
    pub fn stop_optimization(&self) {
        self.stop_handle.request_stop();
    }

    // --- run control -------------------------------------------------------

    /// Validate the configuration, estimate scales, reset the run state and
    /// iterate until a terminal condition.
    ///
    /// Fails with a configuration error when no metric is attached, both
    /// learning-rate estimation modes are enabled, or the scales do not
    /// match the metric's local parameter count; the metric's parameters are
    /// left untouched in every failure case.
    pub fn start_optimization(&mut self) -> Result<()> {
        self.state = OptimizerState::Initializing;
        if let Err(error) = self.initialize() {
            self.state = OptimizerState::Failed;
            self.observers.notify_error(&error.to_string());
            return Err(error);
        }

        self.state = OptimizerState::Iterating;
        self.observers.notify_start();
        self.resume_optimization()
    }

    /// Re-enter the iteration loop from the current iteration count without
    /// resetting the convergence window or the best state. Distinguishes a
    /// paused run (`stop_optimization`) from a finished one.
    pub fn resume_optimization(&mut self) -> Result<()> {
        match self.state {
            OptimizerState::Iterating | OptimizerState::UserStopped => {}
            _ => {
                return Err(RegistrationError::configuration(
                    "resume_optimization requires a started run",
                ))
            }
        }
        let metric = self
            .metric
            .clone()
            .ok_or_else(|| RegistrationError::configuration("no metric attached"))?;

        self.state = OptimizerState::Iterating;
        self.stop_handle.reset();

        loop {
            if self.current_iteration >= self.number_of_iterations {
                self.state = OptimizerState::MaxIterationsReached;
                break;
            }
            if self.stop_handle.is_stop_requested() {
                self.state = OptimizerState::UserStopped;
                break;
            }

            if let Err(error) = self.advance_one_step(&metric) {
                self.state = OptimizerState::Failed;
                self.observers.notify_error(&error.to_string());
                return Err(error);
            }

            self.current_convergence_value = self.monitor.convergence_value();
            if let Some(score) = self.current_convergence_value {
                if score <= self.minimum_convergence_value {
                    tracing::info!(score, "convergence threshold reached");
                    self.state = OptimizerState::Converged;
                    break;
                }
            }
        }

        self.finish_run(&metric)
    }

    /// Estimate the learning rate from the current (scaled) gradient:
    /// `learning_rate = maximum_step_size / estimate_step_scale(gradient)`.
    ///
    /// Calling this without an attached estimator is a configuration error.
    /// A vanishing step scale leaves the rate at 1.0.
    pub fn estimate_learning_rate(&mut self) -> Result<()> {
        let estimator = self.scales_estimator.as_mut().ok_or_else(|| {
            RegistrationError::configuration(
                "learning-rate estimation requires a scales estimator",
            )
        })?;
        let maximum_step_size = self.maximum_step_size.ok_or_else(|| {
            RegistrationError::configuration(
                "learning-rate estimation requires a maximum step size",
            )
        })?;

        let step_scale = estimator.estimate_step_scale(&self.gradient)?;
        if step_scale > f64::EPSILON {
            self.learning_rate = maximum_step_size / step_scale;
        } else {
            self.learning_rate = 1.0;
        }
        tracing::debug!(
            learning_rate = self.learning_rate,
            step_scale,
            "estimated learning rate"
        );
        Ok(())
    }

    // --- internals ---------------------------------------------------------

    fn initialize(&mut self) -> Result<()> {
        let metric = self
            .metric
            .clone()
            .ok_or_else(|| RegistrationError::configuration("no metric attached"))?;

        if self.do_estimate_learning_rate_once
            && self.do_estimate_learning_rate_at_each_iteration
        {
            return Err(RegistrationError::configuration(
                "once-only and per-iteration learning-rate estimation are mutually exclusive",
            ));
        }
        if self.number_of_threads == 0 {
            return Err(RegistrationError::configuration(
                "number of threads must be at least 1",
            ));
        }

        let num_local_parameters;
        {
            let mut m = metric.lock().unwrap();
            m.initialize()?;
            self.num_parameters = m.number_of_parameters();
            num_local_parameters = m.number_of_local_parameters();
        }

        match self.scales_estimator.as_mut() {
            Some(estimator) if self.do_estimate_scales => {
                self.scales = estimator.estimate_scales()?;
                tracing::debug!(scales = ?self.scales.as_slice(), "estimated scales");
            }
            _ => {
                if self.scales.is_empty() {
                    self.scales = DVector::from_element(num_local_parameters, 1.0);
                }
            }
        }
        validate_scales(&self.scales, num_local_parameters)?;
        self.scales_are_identity = scales_are_identity(&self.scales, SCALES_IDENTITY_TOLERANCE);

        if self.maximum_step_size.is_none() {
            if let Some(estimator) = self.scales_estimator.as_mut() {
                self.maximum_step_size = Some(estimator.estimate_maximum_step_size()?);
            }
        }

        self.current_iteration = 0;
        self.current_value = f64::MAX;
        self.current_convergence_value = None;
        self.best = None;
        self.gradient = DVector::zeros(self.num_parameters);
        self.monitor.reset(self.convergence_window_size);
        self.stop_handle.reset();
        Ok(())
    }

    fn advance_one_step(&mut self, metric: &Arc<Mutex<dyn CostMetric>>) -> Result<()> {
        // Evaluate at the current position; capture the parameters the value
        // belongs to before any update touches them.
        let (mut value, mut derivative, num_valid_points, position) = {
            let mut m = metric.lock().unwrap();
            let (value, derivative) = m.value_and_derivative()?;
            let position = self
                .return_best_parameters_and_value
                .then(|| m.parameters().to_vec());
            (value, derivative, m.number_of_valid_points(), position)
        };

        if derivative.len() != self.num_parameters {
            return Err(RegistrationError::evaluation(format!(
                "derivative length {} does not match parameter count {}",
                derivative.len(),
                self.num_parameters
            )));
        }

        if num_valid_points == 0 {
            tracing::warn!(
                iteration = self.current_iteration,
                "metric reported no valid points; taking a zero-gradient step"
            );
            value = f64::MAX;
            derivative.fill(0.0);
        }

        self.current_value = value;
        if let Some(position) = position {
            let improved = self.best.as_ref().map_or(true, |b| value < b.value);
            if improved {
                self.best = Some(BestState {
                    value,
                    parameters: position,
                });
            }
        }

        self.gradient = derivative;
        self.modify_gradient_by_scales();

        if self.scales_estimator.is_some()
            && (self.do_estimate_learning_rate_at_each_iteration
                || (self.do_estimate_learning_rate_once && self.current_iteration == 0))
        {
            self.estimate_learning_rate()?;
        }
        self.modify_gradient_by_learning_rate();

        metric
            .lock()
            .unwrap()
            .update_transform_parameters(&self.gradient, 1.0)?;

        self.monitor.add_value(value);
        self.current_iteration += 1;

        let event = IterationEvent {
            iteration: self.current_iteration,
            value,
            convergence_value: self.current_convergence_value,
            learning_rate: self.learning_rate,
        };
        self.observers.notify_iteration(&event);
        Ok(())
    }

    /// Divide the gradient by the scales, component-wise. Local-support
    /// transforms repeat the scales with a block stride, hence the modulo
    /// indexing. Skipped entirely for identity scales.
    fn modify_gradient_by_scales(&mut self) {
        if self.scales_are_identity {
            return;
        }
        let scales = &self.scales;
        let num_scales = scales.len();
        Self::modify_over_partitions(&mut self.gradient, self.number_of_threads, |index, g| {
            g / scales[index % num_scales]
        });
    }

    fn modify_gradient_by_learning_rate(&mut self) {
        let learning_rate = self.learning_rate;
        Self::modify_over_partitions(&mut self.gradient, self.number_of_threads, |_, g| {
            g * learning_rate
        });
    }

    /// Apply `f(index, value)` over the gradient, partitioned into
    /// contiguous index ranges across the worker pool when more than one
    /// thread is configured. Partitions never overlap, so the parallel and
    /// serial paths produce identical results.
    fn modify_over_partitions<F>(gradient: &mut DVector<f64>, threads: usize, f: F)
    where
        F: Fn(usize, f64) -> f64 + Sync,
    {
        let slice = gradient.as_mut_slice();
        if threads <= 1 || slice.len() < 2 {
            for (index, g) in slice.iter_mut().enumerate() {
                *g = f(index, *g);
            }
            return;
        }
        let chunk = IndexRange::chunk_len(slice.len(), threads);
        slice
            .par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(chunk_index, chunk_slice)| {
                let base = chunk_index * chunk;
                for (offset, g) in chunk_slice.iter_mut().enumerate() {
                    *g = f(base + offset, *g);
                }
            });
    }

    fn finish_run(&mut self, metric: &Arc<Mutex<dyn CostMetric>>) -> Result<()> {
        if self.state.is_terminal() || self.state == OptimizerState::UserStopped {
            if self.return_best_parameters_and_value {
                if let Some(best) = self.best.take() {
                    metric.lock().unwrap().set_parameters(&best.parameters)?;
                    self.current_value = best.value;
                    self.best = Some(best);
                }
            }
            tracing::info!(
                state = ?self.state,
                iterations = self.current_iteration,
                value = self.current_value,
                "optimization stopped"
            );
            let event = IterationEvent {
                iteration: self.current_iteration,
                value: self.current_value,
                convergence_value: self.current_convergence_value,
                learning_rate: self.learning_rate,
            };
            self.observers.notify_complete(&event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Constant metric in the spirit of the optimizer base-contract tests:
    /// five parameters, three local, fixed value, zero derivative.
    struct ConstantMetric {
        parameters: Vec<f64>,
        num_local: usize,
    }

    impl ConstantMetric {
        fn new() -> Self {
            Self {
                parameters: vec![0.0; 5],
                num_local: 3,
            }
        }
    }

    impl CostMetric for ConstantMetric {
        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn number_of_parameters(&self) -> usize {
            self.parameters.len()
        }

        fn number_of_local_parameters(&self) -> usize {
            self.num_local
        }

        fn parameters(&self) -> &[f64] {
            &self.parameters
        }

        fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
            self.parameters.copy_from_slice(parameters);
            Ok(())
        }

        fn value_and_derivative(&mut self) -> Result<(f64, DVector<f64>)> {
            Ok((1.0, DVector::zeros(self.parameters.len())))
        }

        fn update_transform_parameters(
            &mut self,
            derivative: &DVector<f64>,
            factor: f64,
        ) -> Result<()> {
            for (p, d) in self.parameters.iter_mut().zip(derivative.iter()) {
                *p += factor * d;
            }
            Ok(())
        }

        fn number_of_valid_points(&self) -> usize {
            1
        }
    }

    fn optimizer_with_constant_metric() -> GradientDescentOptimizer {
        let mut optimizer = GradientDescentOptimizer::new();
        optimizer.set_metric(Arc::new(Mutex::new(ConstantMetric::new())));
        optimizer.set_number_of_iterations(5);
        optimizer
    }

    #[test]
    fn test_no_metric_is_configuration_error() {
        let mut optimizer = GradientDescentOptimizer::new();
        let err = optimizer.start_optimization().unwrap_err();
        assert!(matches!(err, RegistrationError::Configuration(_)));
        assert_eq!(optimizer.state(), OptimizerState::Failed);
    }

    #[test]
    fn test_matching_scales_pass_validation() {
        let mut optimizer = optimizer_with_constant_metric();
        optimizer.set_scales(DVector::from_element(3, 3.19));
        assert!(optimizer.start_optimization().is_ok());
    }

    #[test]
    fn test_mismatched_scales_fail() {
        let mut optimizer = optimizer_with_constant_metric();
        optimizer.set_scales(DVector::from_element(4, 3.19));
        let err = optimizer.start_optimization().unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::ScalesLengthMismatch {
                expected: 3,
                actual: 4
            }
        ));
        assert_eq!(optimizer.state(), OptimizerState::Failed);
    }

    #[test]
    fn test_near_identity_scales_set_flag() {
        let mut optimizer = optimizer_with_constant_metric();
        optimizer.set_scales(DVector::from_element(3, 0.999));
        optimizer.start_optimization().unwrap();
        assert!(optimizer.scales_are_identity());

        let mut optimizer = optimizer_with_constant_metric();
        optimizer.set_scales(DVector::from_element(3, 3.19));
        optimizer.start_optimization().unwrap();
        assert!(!optimizer.scales_are_identity());
    }

    #[test]
    fn test_default_scales_are_ones() {
        let mut optimizer = optimizer_with_constant_metric();
        optimizer.start_optimization().unwrap();
        assert_eq!(optimizer.scales(), &DVector::from_element(3, 1.0));
        assert!(optimizer.scales_are_identity());
    }

    #[test]
    fn test_both_estimation_flags_fail_fast() {
        let mut optimizer = optimizer_with_constant_metric();
        optimizer.set_do_estimate_learning_rate_once(true);
        optimizer.set_do_estimate_learning_rate_at_each_iteration(true);
        let err = optimizer.start_optimization().unwrap_err();
        assert!(matches!(err, RegistrationError::Configuration(_)));
    }

    #[test]
    fn test_iteration_budget_reached() {
        let mut optimizer = optimizer_with_constant_metric();
        // constant values converge once the window fills; keep it larger
        // than the budget so the budget is what terminates the run
        optimizer.set_convergence_window_size(50);
        optimizer.start_optimization().unwrap();
        assert_eq!(optimizer.state(), OptimizerState::MaxIterationsReached);
        assert_eq!(optimizer.current_iteration(), 5);
    }

    #[test]
    fn test_constant_values_converge_before_budget() {
        let mut optimizer = optimizer_with_constant_metric();
        optimizer.set_number_of_iterations(100);
        optimizer.set_convergence_window_size(10);
        optimizer.start_optimization().unwrap();
        assert_eq!(optimizer.state(), OptimizerState::Converged);
        assert!(optimizer.current_iteration() < 100);
        assert!(optimizer.convergence_value().unwrap() <= 1e-8);
    }

    #[test]
    fn test_estimate_learning_rate_without_estimator_fails() {
        let mut optimizer = optimizer_with_constant_metric();
        let err = optimizer.estimate_learning_rate().unwrap_err();
        assert!(matches!(err, RegistrationError::Configuration(_)));
    }

    #[test]
    fn test_resume_without_start_fails() {
        let mut optimizer = optimizer_with_constant_metric();
        assert!(optimizer.resume_optimization().is_err());
    }

    #[test]
    fn test_parallel_and_serial_gradient_modification_agree() {
        let values: Vec<f64> = (1..=97).map(|i| i as f64 * 0.37).collect();
        let mut serial = DVector::from_vec(values.clone());
        let mut parallel = DVector::from_vec(values);
        let scale = |i: usize, g: f64| g / ((i % 3) as f64 + 0.5);
        GradientDescentOptimizer::modify_over_partitions(&mut serial, 1, scale);
        GradientDescentOptimizer::modify_over_partitions(&mut parallel, 4, scale);
        assert_eq!(serial, parallel);
    }
}
