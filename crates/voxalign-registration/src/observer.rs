//! Iteration observation and cancellation for optimization runs.
//!
//! The optimizer emits one [`IterationEvent`] per completed iteration.
//! Observers implement [`IterationObserver`] and are registered on the
//! optimizer; a [`StopHandle`] can be cloned into a callback (or another
//! thread) to request early termination, which takes effect at the next
//! iteration boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Per-iteration notification payload.
#[derive(Debug, Clone)]
pub struct IterationEvent {
    /// Number of completed iterations, starting at 1 for the first step.
    pub iteration: usize,
    /// Objective value observed at the start of this step.
    pub value: f64,
    /// Convergence score, once the convergence window has filled.
    pub convergence_value: Option<f64>,
    /// Learning rate in effect for this step.
    pub learning_rate: f64,
}

/// Observer of optimization progress.
pub trait IterationObserver: Send + Sync {
    /// Called once per completed iteration.
    fn on_iteration(&self, event: &IterationEvent);

    /// Called when a run starts.
    fn on_start(&self) {}

    /// Called when a run reaches a terminal state without error.
    fn on_complete(&self, _event: &IterationEvent) {}

    /// Called when a run fails.
    fn on_error(&self, _error: &str) {}
}

/// Cancellation signal shared between the optimizer and its callers.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create a fresh, unsignalled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination at the next iteration boundary.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether termination has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear the signal so the handle can be reused for another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Fan-out of events to registered observers.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn IterationObserver>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn add(&mut self, observer: Arc<dyn IterationObserver>) {
        self.observers.push(observer);
    }

    /// Notify observers of a run start.
    pub fn notify_start(&self) {
        for observer in &self.observers {
            observer.on_start();
        }
    }

    /// Notify observers of a completed iteration.
    pub fn notify_iteration(&self, event: &IterationEvent) {
        for observer in &self.observers {
            observer.on_iteration(event);
        }
    }

    /// Notify observers of a finished run.
    pub fn notify_complete(&self, event: &IterationEvent) {
        for observer in &self.observers {
            observer.on_complete(event);
        }
    }

    /// Notify observers of a failed run.
    pub fn notify_error(&self, error: &str) {
        for observer in &self.observers {
            observer.on_error(error);
        }
    }
}

/// Observer that logs iterations through `tracing`.
#[derive(Debug, Clone)]
pub struct ConsoleObserver {
    /// Log every n-th iteration.
    pub log_interval: usize,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleObserver {
    /// Create a console observer logging every `log_interval` iterations.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl IterationObserver for ConsoleObserver {
    fn on_iteration(&self, event: &IterationEvent) {
        if event.iteration % self.log_interval == 0 {
            tracing::info!(
                iteration = event.iteration,
                value = event.value,
                convergence = ?event.convergence_value,
                learning_rate = event.learning_rate,
                "iteration"
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("optimization started");
    }

    fn on_complete(&self, event: &IterationEvent) {
        tracing::info!(
            iterations = event.iteration,
            value = event.value,
            "optimization finished"
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!(error, "optimization failed");
    }
}

/// Observer that records every event for later inspection.
#[derive(Clone, Default)]
pub struct HistoryObserver {
    history: Arc<Mutex<Vec<IterationEvent>>>,
}

impl HistoryObserver {
    /// Create an empty history observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events.
    pub fn events(&self) -> Vec<IterationEvent> {
        self.history.lock().unwrap().clone()
    }

    /// Recorded objective values, in iteration order.
    pub fn values(&self) -> Vec<f64> {
        self.history.lock().unwrap().iter().map(|e| e.value).collect()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.history.lock().unwrap().clear();
    }
}

impl IterationObserver for HistoryObserver {
    fn on_iteration(&self, event: &IterationEvent) {
        self.history.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(iteration: usize, value: f64) -> IterationEvent {
        IterationEvent {
            iteration,
            value,
            convergence_value: None,
            learning_rate: 1.0,
        }
    }

    #[test]
    fn test_stop_handle_is_shared() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_stop_requested());
        clone.request_stop();
        assert!(handle.is_stop_requested());
        handle.reset();
        assert!(!clone.is_stop_requested());
    }

    #[test]
    fn test_history_observer_records() {
        let history = HistoryObserver::new();
        history.on_iteration(&event(1, 3.0));
        history.on_iteration(&event(2, 2.0));
        assert_eq!(history.values(), vec![3.0, 2.0]);
        assert_eq!(history.events()[1].iteration, 2);
    }

    #[test]
    fn test_registry_fan_out() {
        let mut registry = ObserverRegistry::new();
        let a = Arc::new(HistoryObserver::new());
        let b = Arc::new(HistoryObserver::new());
        registry.add(a.clone());
        registry.add(b.clone());
        registry.notify_iteration(&event(1, 1.0));
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }
}
