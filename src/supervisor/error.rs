use std::{error::Error, fmt, io};

use crate::dataset::DatasetError;

/// The supervisor module's result type.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Requests the supervisor refuses. None of them change its state.
#[derive(Debug)]
pub enum SupervisorError {
    /// `start` was called while a run is active.
    AlreadyRunning,
    /// The dataset cannot be trained on.
    InvalidDataset(DatasetError),
    /// The worker runtime could not be created.
    Runtime(io::Error),
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::AlreadyRunning => write!(f, "a training run is already active"),
            SupervisorError::InvalidDataset(e) => write!(f, "invalid dataset: {e}"),
            SupervisorError::Runtime(e) => write!(f, "failed to create worker runtime: {e}"),
        }
    }
}

impl Error for SupervisorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SupervisorError::InvalidDataset(e) => Some(e),
            SupervisorError::Runtime(e) => Some(e),
            SupervisorError::AlreadyRunning => None,
        }
    }
}

impl From<DatasetError> for SupervisorError {
    fn from(value: DatasetError) -> Self {
        Self::InvalidDataset(value)
    }
}

impl From<io::Error> for SupervisorError {
    fn from(value: io::Error) -> Self {
        Self::Runtime(value)
    }
}
