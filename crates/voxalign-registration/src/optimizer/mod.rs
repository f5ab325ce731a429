//! Gradient-descent optimization of metric parameters.

pub mod convergence;
pub mod gradient_descent;
pub mod partition;
pub mod scales;

pub use convergence::WindowConvergenceMonitor;
pub use gradient_descent::{GradientDescentOptimizer, OptimizerState};
pub use partition::IndexRange;
pub use scales::ParameterScalesEstimator;
