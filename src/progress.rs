// src/progress.rs

//! Progress reporting for build plan execution
//!
//! The executor reports each step through a [`ProgressTracker`]. Three
//! implementations are provided:
//! - [`LogProgress`]: logs step starts and percentages through `tracing`
//! - [`CallbackProgress`]: forwards [`ProgressEvent`]s to a closure
//! - [`SilentProgress`]: counts steps, reports nothing
//!
//! ```ignore
//! use distpack::progress::{LogProgress, ProgressTracker};
//!
//! let progress = LogProgress::new("myapp", plan.len() as u64);
//! for (index, step) in plan.steps.iter().enumerate() {
//!     progress.step_started(index, &step.to_string());
//!     // ... run the step ...
//!     progress.increment(1);
//! }
//! progress.finish_with_message("build complete");
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, warn};

/// Receives progress updates; shared across threads
pub trait ProgressTracker: Send + Sync {
    /// A step is about to run
    fn step_started(&self, index: usize, description: &str);

    /// Advance by `amount` completed steps
    fn increment(&self, amount: u64);

    fn set_length(&self, length: u64);

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    fn finish_with_message(&self, message: &str);

    fn finish_with_error(&self, message: &str);

    fn is_finished(&self) -> bool;
}

/// Shared counters behind every tracker
#[derive(Debug, Default)]
struct Counters {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl Counters {
    fn with_length(length: u64) -> Self {
        Self {
            length: AtomicU64::new(length),
            ..Self::default()
        }
    }

    /// Returns (old, new) position
    fn advance(&self, amount: u64) -> (u64, u64) {
        let old = self.position.fetch_add(amount, Ordering::Relaxed);
        (old, old + amount)
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

/// No-op tracker for quiet runs and tests
#[derive(Debug, Default)]
pub struct SilentProgress {
    counters: Counters,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_length(length: u64) -> Self {
        Self {
            counters: Counters::with_length(length),
        }
    }
}

impl ProgressTracker for SilentProgress {
    fn step_started(&self, _index: usize, _description: &str) {}

    fn increment(&self, amount: u64) {
        self.counters.advance(amount);
    }

    fn set_length(&self, length: u64) {
        self.counters.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.counters.finish();
    }

    fn finish_with_error(&self, _message: &str) {
        self.counters.finish();
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }
}

/// Logs progress at `info` level
///
/// Every step start is logged; percentages are logged roughly ten times per
/// plan so long plans do not flood the log.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    counters: Counters,
    log_interval: u64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            counters: Counters::with_length(length),
            log_interval: std::cmp::max(1, length / 10),
        }
    }

    pub fn with_log_interval(mut self, interval: u64) -> Self {
        self.log_interval = interval.max(1);
        self
    }
}

impl ProgressTracker for LogProgress {
    fn step_started(&self, index: usize, description: &str) {
        info!("{}: step {}: {}", self.name, index, description);
    }

    fn increment(&self, amount: u64) {
        let (old, new) = self.counters.advance(amount);
        let length = self.length();
        if length > 0 && new / self.log_interval > old / self.log_interval {
            info!("{}: {}% ({}/{})", self.name, (new * 100) / length, new, length);
        }
    }

    fn set_length(&self, length: u64) {
        self.counters.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.counters.finish();
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        self.counters.finish();
        warn!("{}: {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }
}

/// Events delivered to a [`CallbackProgress`] closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StepStarted { index: usize, description: String },
    Position { current: u64, total: u64 },
    Finished(String),
    Error(String),
}

/// Forwards progress to a closure
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
    counters: Counters,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(length: u64, callback: F) -> Self {
        Self {
            callback,
            counters: Counters::with_length(length),
        }
    }
}

impl<F> ProgressTracker for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn step_started(&self, index: usize, description: &str) {
        (self.callback)(ProgressEvent::StepStarted {
            index,
            description: description.to_string(),
        });
    }

    fn increment(&self, amount: u64) {
        let (_, current) = self.counters.advance(amount);
        (self.callback)(ProgressEvent::Position {
            current,
            total: self.length(),
        });
    }

    fn set_length(&self, length: u64) {
        self.counters.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.counters.finish();
        (self.callback)(ProgressEvent::Finished(message.to_string()));
    }

    fn finish_with_error(&self, message: &str) {
        self.counters.finish();
        (self.callback)(ProgressEvent::Error(message.to_string()));
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_silent_progress_counts() {
        let progress = SilentProgress::with_length(3);
        progress.increment(1);
        progress.increment(1);
        assert_eq!(progress.position(), 2);
        assert_eq!(progress.length(), 3);
        assert!(!progress.is_finished());
        progress.finish_with_message("done");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_log_progress_counts() {
        let progress = LogProgress::new("test", 10).with_log_interval(0);
        progress.step_started(0, "generate build.sh");
        progress.increment(4);
        assert_eq!(progress.position(), 4);
        progress.finish_with_error("step 4 failed");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_callback_progress_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress = CallbackProgress::new(2, move |e| sink.lock().unwrap().push(e));

        progress.step_started(0, "run make");
        progress.increment(1);
        progress.finish_with_message("ok");

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ProgressEvent::StepStarted {
                    index: 0,
                    description: "run make".to_string()
                },
                ProgressEvent::Position { current: 1, total: 2 },
                ProgressEvent::Finished("ok".to_string()),
            ]
        );
    }
}
