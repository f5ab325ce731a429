pub mod config;
pub mod domain;
pub mod error;
pub mod metric;
pub mod observer;
pub mod optimizer;

pub use config::{GradientDescentConfig, GradientDescentConfigReader};
pub use domain::VirtualDomain;
pub use error::{RegistrationError, Result};
pub use metric::{CostMetric, ObjectMetric};
pub use observer::{
    ConsoleObserver, HistoryObserver, IterationEvent, IterationObserver, StopHandle,
};
pub use optimizer::{
    GradientDescentOptimizer, IndexRange, OptimizerState, ParameterScalesEstimator,
    WindowConvergenceMonitor,
};
