use std::fmt;

/// Lifecycle of the supervisor's single run slot.
///
/// `Idle -> Running -> Idle` when the run ends on its own, and
/// `Running -> Stopping -> Idle` when it is stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl RunPhase {
    /// Returns true unless the slot is free.
    pub fn is_active(self) -> bool {
        !matches!(self, RunPhase::Idle)
    }
}

/// Identifies one run of a supervisor. Increases with every `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub(crate) u64);

impl RunId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
