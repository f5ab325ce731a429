//! Align two point clouds with a translation driven by the gradient-descent
//! optimizer.
//!
//! Run with: `cargo run --example point_set_registration`

use std::sync::{Arc, Mutex};

use anyhow::Result;
use nalgebra::DVector;
use voxalign_registration::{
    ConsoleObserver, CostMetric, GradientDescentConfig, GradientDescentOptimizer,
    HistoryObserver,
};

/// Mean squared distance between corresponding points under a translation.
struct TranslationMetric {
    fixed: Vec<[f64; 2]>,
    moving: Vec<[f64; 2]>,
    parameters: Vec<f64>,
}

impl CostMetric for TranslationMetric {
    fn initialize(&mut self) -> voxalign_registration::Result<()> {
        Ok(())
    }

    fn number_of_parameters(&self) -> usize {
        2
    }

    fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> voxalign_registration::Result<()> {
        self.parameters.copy_from_slice(parameters);
        Ok(())
    }

    fn value_and_derivative(
        &mut self,
    ) -> voxalign_registration::Result<(f64, DVector<f64>)> {
        let n = self.fixed.len() as f64;
        let mut value = 0.0;
        let mut derivative = DVector::zeros(2);
        for (f, m) in self.fixed.iter().zip(&self.moving) {
            let rx = m[0] - (f[0] + self.parameters[0]);
            let ry = m[1] - (f[1] + self.parameters[1]);
            value += rx * rx + ry * ry;
            derivative[0] += 2.0 * rx;
            derivative[1] += 2.0 * ry;
        }
        Ok((value / n, derivative / n))
    }

    fn update_transform_parameters(
        &mut self,
        derivative: &DVector<f64>,
        factor: f64,
    ) -> voxalign_registration::Result<()> {
        for (p, d) in self.parameters.iter_mut().zip(derivative.iter()) {
            *p += factor * d;
        }
        Ok(())
    }

    fn number_of_valid_points(&self) -> usize {
        self.fixed.len()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let fixed: Vec<[f64; 2]> = (0..64)
        .map(|k| {
            let theta = k as f64 * std::f64::consts::TAU / 64.0;
            [100.0 * theta.cos(), 100.0 * theta.sin()]
        })
        .collect();
    let moving: Vec<[f64; 2]> = fixed.iter().map(|p| [p[0] + 2.0, p[1] + 2.0]).collect();

    let metric = Arc::new(Mutex::new(TranslationMetric {
        fixed,
        moving,
        parameters: vec![0.0, 0.0],
    }));

    let config = GradientDescentConfig {
        learning_rate: 0.4,
        number_of_iterations: 50,
        convergence_window_size: 10,
        minimum_convergence_value: 1e-10,
        ..Default::default()
    };

    let history = Arc::new(HistoryObserver::new());
    let mut optimizer = GradientDescentOptimizer::new();
    config.apply(&mut optimizer)?;
    optimizer.set_metric(metric.clone());
    optimizer.add_observer(Arc::new(ConsoleObserver::new(5)));
    optimizer.add_observer(history.clone());
    optimizer.start_optimization()?;

    let translation = metric.lock().unwrap().parameters().to_vec();
    println!(
        "state: {:?}, iterations: {}, final value: {:.3e}",
        optimizer.state(),
        optimizer.current_iteration(),
        optimizer.value()
    );
    println!(
        "recovered translation: ({:.6}, {:.6}), expected (2, 2)",
        translation[0], translation[1]
    );
    println!("first values: {:?}", &history.values()[..5.min(history.values().len())]);
    Ok(())
}
