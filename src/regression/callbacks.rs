use crate::regression::RegressionOutputs;
use crate::utils::{format_number, split_hms};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

/// Regression driver callback trait
///
/// Callbacks observe the row loop at fixed checkpoints; they never alter it.
pub trait RegressionCallback {
    /// Called before the first fit with the number of rows to impute
    fn on_run_begin(&mut self, _total: usize) {}

    /// Called before row `row` (the `position`-th missing row) is fitted
    fn on_row_begin(&mut self, _position: usize, _row: usize) {}

    /// Called after row `row` (the `position`-th missing row) has been fitted
    fn on_row_end(&mut self, _position: usize, _row: usize) {}

    /// Called after the last fit
    fn on_run_end(&mut self, _outputs: &RegressionOutputs) {}
}

/// Callback manager that handles multiple callbacks
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn RegressionCallback>>,
}

impl CallbackManager {
    /// Create new callback manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback
    pub fn add_callback<C: RegressionCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn on_run_begin(&mut self, total: usize) {
        for callback in &mut self.callbacks {
            callback.on_run_begin(total);
        }
    }

    pub fn on_row_begin(&mut self, position: usize, row: usize) {
        for callback in &mut self.callbacks {
            callback.on_row_begin(position, row);
        }
    }

    pub fn on_row_end(&mut self, position: usize, row: usize) {
        for callback in &mut self.callbacks {
            callback.on_row_end(position, row);
        }
    }

    pub fn on_run_end(&mut self, outputs: &RegressionOutputs) {
        for callback in &mut self.callbacks {
            callback.on_run_end(outputs);
        }
    }
}

/// Logs the row index, before its fit, whenever it is a multiple of `every`
pub struct ProgressLoggerCallback {
    every: usize,
}

impl ProgressLoggerCallback {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }

    /// Whether the given row is a logging checkpoint
    pub fn is_checkpoint(&self, row: usize) -> bool {
        row % self.every == 0
    }
}

impl RegressionCallback for ProgressLoggerCallback {
    fn on_row_begin(&mut self, position: usize, row: usize) {
        if self.is_checkpoint(row) {
            tracing::info!("Fitting row {} ({} done)", row, format_number(position));
        }
    }
}

/// Terminal progress bar over the missing rows
#[derive(Default)]
pub struct ProgressBarCallback {
    bar: Option<ProgressBar>,
}

impl ProgressBarCallback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegressionCallback for ProgressBarCallback {
    fn on_run_begin(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} rows ({eta})")
        {
            bar.set_style(style);
        }
        self.bar = Some(bar);
    }

    fn on_row_end(&mut self, _position: usize, _row: usize) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_run_end(&mut self, _outputs: &RegressionOutputs) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Timer callback that reports elapsed time
#[derive(Default)]
pub struct TimerCallback {
    start_time: Option<Instant>,
}

impl TimerCallback {
    /// Create new timer callback
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed time since the run began
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.start_time.map(|t| t.elapsed())
    }
}

impl RegressionCallback for TimerCallback {
    fn on_run_begin(&mut self, total: usize) {
        self.start_time = Some(Instant::now());
        tracing::info!("Fitting {} rows", format_number(total));
    }

    fn on_run_end(&mut self, outputs: &RegressionOutputs) {
        if let Some(elapsed) = self.elapsed() {
            let (hours, minutes, seconds) = split_hms(elapsed);
            tracing::info!(
                "Fitted {} rows in {}h {}m {:.1}s",
                format_number(outputs.len()),
                hours,
                minutes,
                seconds
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        events: Rc<RefCell<Vec<(&'static str, usize)>>>,
    }

    impl RegressionCallback for Recorder {
        fn on_row_begin(&mut self, _position: usize, row: usize) {
            self.events.borrow_mut().push(("begin", row));
        }

        fn on_row_end(&mut self, _position: usize, row: usize) {
            self.events.borrow_mut().push(("end", row));
        }
    }

    #[test]
    fn test_progress_checkpoints() {
        let logger = ProgressLoggerCallback::new(10_000);
        assert!(logger.is_checkpoint(0));
        assert!(logger.is_checkpoint(20_000));
        assert!(!logger.is_checkpoint(10_001));

        let every_row = ProgressLoggerCallback::new(0);
        assert!(every_row.is_checkpoint(7));
    }

    #[test]
    fn test_callback_manager_dispatch() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut manager = CallbackManager::new();
        manager.add_callback(Recorder { events: Rc::clone(&events) });
        manager.add_callback(TimerCallback::new());
        manager.add_callback(ProgressLoggerCallback::new(1));
        assert_eq!(manager.len(), 3);

        manager.on_run_begin(2);
        manager.on_row_begin(0, 4);
        manager.on_row_end(0, 4);
        manager.on_row_begin(1, 9);
        manager.on_row_end(1, 9);
        manager.on_run_end(&RegressionOutputs::default());

        assert_eq!(
            *events.borrow(),
            vec![("begin", 4), ("end", 4), ("begin", 9), ("end", 9)]
        );
    }
}
