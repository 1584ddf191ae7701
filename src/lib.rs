//! Supervision of cancellable, iterative neural-network training runs.
//!
//! A [`TrainingSupervisor`] owns one background run at a time: it validates
//! the dataset, moves the training primitive onto a worker thread, drives the
//! epoch loop and publishes immutable [`Snapshot`]s that the UI thread drains
//! through a [`RunView`] whenever it likes.

pub mod dataset;
pub mod params;
pub mod presets;
pub mod schedule;
pub mod stats;
pub mod supervisor;
pub mod termination;
pub mod trainer;
pub mod view;

pub use dataset::{Dataset, DatasetError};
pub use params::{HyperParameters, ParamSchema, ParamSpec, RangePolicy};
pub use presets::Preset;
pub use schedule::{Rates, Schedule};
pub use stats::StatisticsConfig;
pub use supervisor::{
    RunEvent, RunId, RunOutcome, RunPhase, RunPlan, Snapshot, SupervisorError, TrainingSupervisor,
};
pub use termination::{StopCondition, StopReason};
pub use trainer::{EpochContext, EpochTrainer, InitRange, TrainerError};
pub use view::{RunView, TrainingUi};
