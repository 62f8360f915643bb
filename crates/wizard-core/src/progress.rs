//! Human-readable progress reporting.

/// Receives progress messages while the wizard works.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, message: &str) {
        tracing::info!(target: "wizard::progress", "{message}");
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}
