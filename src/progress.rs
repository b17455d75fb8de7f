//! Iteration checkpoints for long-running operators.
//!
//! Operators call [`ProgressMonitor::checkpoint`] once before the first
//! iteration (with `completed == 0`) and after each fully completed
//! iteration. Returning `ControlFlow::Break` stops the operator before the
//! next iteration starts, so callers only ever observe whole iterations.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives progress after each completed iteration and may request a stop.
pub trait ProgressMonitor {
    /// `completed` iterations out of `total` are done.
    fn checkpoint(&mut self, completed: usize, total: usize) -> ControlFlow<()>;
}

/// No reporting, never cancels.
impl ProgressMonitor for () {
    fn checkpoint(&mut self, _completed: usize, _total: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F> ProgressMonitor for F
where
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    fn checkpoint(&mut self, completed: usize, total: usize) -> ControlFlow<()> {
        self(completed, total)
    }
}

/// Cancellation flag shared between a UI thread and the running operator.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl ProgressMonitor for CancelFlag {
    fn checkpoint(&mut self, _completed: usize, _total: usize) -> ControlFlow<()> {
        if self.is_cancelled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Run `iterations` steps of `step`, consulting `monitor` before the first
/// step and between steps. Returns the number of steps that completed.
pub fn run_iterations(
    iterations: usize,
    monitor: &mut dyn ProgressMonitor,
    mut step: impl FnMut(usize),
) -> usize {
    if iterations > 0 && monitor.checkpoint(0, iterations).is_break() {
        return 0;
    }
    for i in 0..iterations {
        step(i);
        if monitor.checkpoint(i + 1, iterations).is_break() {
            return i + 1;
        }
    }
    iterations
}
