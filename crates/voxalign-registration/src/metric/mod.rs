//! Metric capability contract consumed by the optimizer.

pub mod trait_;

pub use trait_::{CostMetric, ObjectMetric};
