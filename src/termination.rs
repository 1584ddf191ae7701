use std::{fmt, num::NonZeroUsize};

use serde::Serialize;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    IterationLimit,
    ErrorLimit,
    Cancelled,
    Failed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::IterationLimit => "iteration limit reached",
            StopReason::ErrorLimit => "error limit reached",
            StopReason::Cancelled => "stopped",
            StopReason::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Decides when a run has trained enough.
///
/// Both limits may be set, in which case whichever is hit first wins.
/// With neither, the run continues until cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StopCondition {
    iteration_limit: Option<NonZeroUsize>,
    error_limit: Option<f64>,
}

impl StopCondition {
    pub fn new(iteration_limit: Option<NonZeroUsize>, error_limit: Option<f64>) -> Self {
        Self {
            iteration_limit,
            error_limit,
        }
    }

    /// Stops after exactly `limit` epochs.
    pub fn iterations(limit: NonZeroUsize) -> Self {
        Self::new(Some(limit), None)
    }

    /// Stops on the first epoch whose error is at or below `limit`.
    pub fn error_below(limit: f64) -> Self {
        Self::new(None, Some(limit))
    }

    pub fn either(iterations: NonZeroUsize, error: f64) -> Self {
        Self::new(Some(iterations), Some(error))
    }

    pub fn until_cancelled() -> Self {
        Self::default()
    }

    pub fn iteration_limit(&self) -> Option<NonZeroUsize> {
        self.iteration_limit
    }

    pub fn error_limit(&self) -> Option<f64> {
        self.error_limit
    }

    /// Checks the condition after an epoch.
    ///
    /// # Args
    /// * `completed` - Epochs run so far, including the one just finished.
    /// * `error` - The error that epoch reported.
    ///
    /// # Returns
    /// The reason to stop, or `None` to keep training.
    #[inline]
    pub fn check(&self, completed: usize, error: f64) -> Option<StopReason> {
        if self.error_limit.is_some_and(|limit| error <= limit) {
            return Some(StopReason::ErrorLimit);
        }

        if self.iteration_limit.is_some_and(|limit| completed >= limit.get()) {
            return Some(StopReason::IterationLimit);
        }

        None
    }
}
