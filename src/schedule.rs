use std::num::NonZeroUsize;

use serde::Serialize;

use crate::params::{names, HyperParameters};

/// The learning coefficients handed to one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub learning_rate: f64,
    pub radius: f64,
    pub momentum: f64,
}

impl Rates {
    /// Reads the base coefficients of a run. Absent settings read as zero.
    pub fn from_params(params: &HyperParameters) -> Self {
        Self {
            learning_rate: params.get(names::LEARNING_RATE).unwrap_or(0.0),
            radius: params.get(names::RADIUS).unwrap_or(0.0),
            momentum: params.get(names::MOMENTUM).unwrap_or(0.0),
        }
    }
}

/// Defines how the coefficients evolve over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Schedule {
    /// Same coefficients for every epoch.
    #[default]
    Constant,
    /// Linear decay used by the self-organizing samples.
    ///
    /// A `1 / divisor` share of the learning rate stays fixed and the rest
    /// drifts to zero; the radius decays to zero. Momentum is untouched.
    LinearDecay { divisor: NonZeroUsize },
}

impl Schedule {
    pub fn linear_decay(divisor: NonZeroUsize) -> Self {
        Schedule::LinearDecay { divisor }
    }

    /// Returns the coefficients for the epoch with 0-based index `iteration`.
    ///
    /// # Args
    /// * `base` - The coefficients the user configured.
    /// * `iteration` - How many epochs already ran.
    /// * `total` - The run's iteration limit; without one there is nothing to decay towards.
    #[inline]
    pub fn rates(&self, base: Rates, iteration: usize, total: Option<NonZeroUsize>) -> Rates {
        let (Schedule::LinearDecay { divisor }, Some(total)) = (self, total) else {
            return base;
        };

        let total = total.get() as f64;
        let remaining = (total - iteration as f64).max(0.0) / total;

        let fixed = base.learning_rate / divisor.get() as f64;
        let drifting = fixed * (divisor.get() - 1) as f64;

        Rates {
            learning_rate: drifting * remaining + fixed,
            radius: base.radius * remaining,
            momentum: base.momentum,
        }
    }
}
