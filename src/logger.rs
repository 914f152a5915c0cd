//! Per-run logger threaded through the pipeline.
//!
//! One `Logger` value is created per invocation and passed by reference into
//! each component, so verbosity never leaks between runs through global
//! state. The actual sinks are `tracing` macros; `main` installs the
//! subscriber once.

#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    verbose: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Announce a numbered pipeline stage with its running counts.
    pub fn stage(&self, number: usize, message: &str) {
        tracing::info!(stage = number, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    /// Detail lines only shown with `--verbose`.
    pub fn detail(&self, message: &str) {
        if self.verbose {
            tracing::info!("{message}");
        } else {
            tracing::debug!("{message}");
        }
    }
}
