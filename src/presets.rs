use std::{fmt, num::NonZeroUsize, str::FromStr};

use crate::{
    params::{names, HyperParameters, ParamSchema, ParamSpec},
    schedule::Schedule,
    supervisor::RunPlan,
    termination::StopCondition,
};

const RATE_MIN: f64 = 0.00001;
const MAX_ITERATIONS: f64 = 1_000_000.0;

const SOM_DECAY: NonZeroUsize = nonzero(10);
const ELASTIC_DECAY: NonZeroUsize = nonzero(20);
const COLOR_PUBLISH_EVERY: NonZeroUsize = nonzero(10);

const fn nonzero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => NonZeroUsize::MIN,
    }
}

/// The training samples this crate ships settings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// 2-D self-organizing map over a point cloud.
    Som2d,
    /// Self-organizing map clustering random colors.
    Color,
    /// Elastic net searching a travelling-salesman tour.
    Tsp,
    /// Backpropagation on the XOR problem.
    Xor,
    /// Single-layer threshold perceptron classifier.
    Perceptron,
    /// Single-layer sigmoid network trained with the delta rule.
    DeltaRule,
    /// Backpropagation predicting a sliding window of a series.
    TimeSeries,
    /// Backpropagation fitting a 1-D function.
    Approximation,
}

impl Preset {
    pub const ALL: [Preset; 8] = [
        Preset::Som2d,
        Preset::Color,
        Preset::Tsp,
        Preset::Xor,
        Preset::Perceptron,
        Preset::DeltaRule,
        Preset::TimeSeries,
        Preset::Approximation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Som2d => "som2d",
            Preset::Color => "color",
            Preset::Tsp => "tsp",
            Preset::Xor => "xor",
            Preset::Perceptron => "perceptron",
            Preset::DeltaRule => "delta_rule",
            Preset::TimeSeries => "time_series",
            Preset::Approximation => "approximation",
        }
    }

    /// The settings this sample exposes, with ranges and defaults.
    pub fn schema(self) -> ParamSchema {
        use ParamSpec as P;

        let rate = |default| P::real(names::LEARNING_RATE, RATE_MIN, 1.0, default);
        let iterations = |min, default| P::integer(names::ITERATIONS, min, MAX_ITERATIONS, default);
        let momentum = P::real(names::MOMENTUM, 0.0, 0.5, 0.0);
        let error_limit = P::real(names::ERROR_LIMIT, 0.0, f64::INFINITY, 0.1);

        let specs = match self {
            Preset::Som2d => vec![
                P::integer(names::SIZE, 5.0, 50.0, 15.0),
                iterations(10.0, 500.0),
                rate(0.3),
                P::integer(names::RADIUS, 1.0, 30.0, 3.0),
            ],
            Preset::Color => vec![
                iterations(10.0, 5000.0),
                rate(0.1),
                P::integer(names::RADIUS, 5.0, 75.0, 15.0),
            ],
            Preset::Tsp => vec![
                P::integer(names::NEURONS, 5.0, 50.0, 20.0),
                iterations(10.0, 500.0),
                rate(0.5),
                P::real(names::RADIUS, RATE_MIN, 1.0, 0.5),
            ],
            Preset::Xor => vec![
                rate(0.1),
                momentum,
                P::real(names::ALPHA, 0.01, 100.0, 2.0),
                error_limit,
            ],
            Preset::Perceptron => vec![rate(0.1)],
            Preset::DeltaRule => vec![
                rate(0.1),
                P::real(names::ALPHA, 0.01, 100.0, 2.0),
                error_limit,
                P::integer(names::ITERATIONS, 0.0, f64::INFINITY, 1000.0),
                P::integer(names::USE_ERROR_LIMIT, 0.0, 1.0, 1.0),
            ],
            Preset::TimeSeries => vec![
                rate(0.1),
                momentum,
                P::real(names::ALPHA, 0.001, 50.0, 2.0),
                P::integer(names::WINDOW, 1.0, 15.0, 5.0),
                P::integer(names::PREDICTION, 1.0, 10.0, 1.0),
                iterations(0.0, 1000.0),
            ],
            Preset::Approximation => vec![
                rate(0.1),
                momentum,
                P::real(names::ALPHA, 0.001, 50.0, 2.0),
                P::integer(names::NEURONS, 5.0, 50.0, 20.0),
                iterations(0.0, 1000.0),
            ],
        };

        ParamSchema::new(specs)
    }

    /// Builds the run policy for settings resolved through [`Preset::schema`].
    ///
    /// Where an iteration count of 0 is accepted it means "until stopped".
    pub fn plan(self, params: &HyperParameters) -> RunPlan {
        let iterations = NonZeroUsize::new(params.count(names::ITERATIONS).unwrap_or(0));
        let error_limit = params.get(names::ERROR_LIMIT).unwrap_or(0.0);

        match self {
            Preset::Som2d => RunPlan::new(StopCondition::new(iterations, None))
                .with_schedule(Schedule::linear_decay(SOM_DECAY)),
            Preset::Color => RunPlan::new(StopCondition::new(iterations, None))
                .with_schedule(Schedule::linear_decay(SOM_DECAY))
                .publish_every(COLOR_PUBLISH_EVERY),
            Preset::Tsp => RunPlan::new(StopCondition::new(iterations, None))
                .with_schedule(Schedule::linear_decay(ELASTIC_DECAY)),
            Preset::Xor => RunPlan::new(StopCondition::error_below(error_limit)),
            Preset::Perceptron => RunPlan::new(StopCondition::error_below(0.0)),
            Preset::DeltaRule => {
                let stop = if params.flag(names::USE_ERROR_LIMIT).unwrap_or(true) {
                    StopCondition::error_below(error_limit)
                } else {
                    StopCondition::new(iterations, None)
                };
                RunPlan::new(stop)
            }
            Preset::TimeSeries | Preset::Approximation => {
                RunPlan::new(StopCondition::new(iterations, None))
            }
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error for an unrecognised preset name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPreset(pub String);

impl fmt::Display for UnknownPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<_> = Preset::ALL.iter().map(|p| p.name()).collect();
        write!(f, "unknown preset '{}', expected one of: {}", self.0, known.join(", "))
    }
}

impl std::error::Error for UnknownPreset {}

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn som_defaults_match_the_sample() {
        let p = Preset::Som2d.schema().defaults();
        assert_eq!(p.count(names::SIZE), Some(15));
        assert_eq!(p.count(names::ITERATIONS), Some(500));
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.3));
        assert_eq!(p.count(names::RADIUS), Some(3));

        let plan = Preset::Som2d.plan(&p);
        assert_eq!(plan.stop.iteration_limit(), NonZeroUsize::new(500));
        assert_eq!(plan.stop.error_limit(), None);
        assert_eq!(plan.schedule, Schedule::linear_decay(SOM_DECAY));
    }

    #[test]
    fn unparsable_rate_takes_the_sample_default() {
        let p = Preset::Som2d.schema().resolve(&[("learning_rate", "abc")]);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.3));

        let p = Preset::Tsp.schema().resolve(&[("learning_rate", "abc")]);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.5));
    }

    #[test]
    fn color_publishes_every_tenth_epoch() {
        let plan = Preset::Color.plan(&Preset::Color.schema().defaults());
        assert_eq!(plan.publish_every.get(), 10);
        assert_eq!(plan.stop.iteration_limit(), NonZeroUsize::new(5000));
    }

    #[test]
    fn error_driven_presets() {
        let xor = Preset::Xor.plan(&Preset::Xor.schema().defaults());
        assert_eq!(xor.stop, StopCondition::error_below(0.1));

        let perceptron = Preset::Perceptron.plan(&Preset::Perceptron.schema().defaults());
        assert_eq!(perceptron.stop, StopCondition::error_below(0.0));
    }

    #[test]
    fn delta_rule_switches_on_the_flag() {
        let schema = Preset::DeltaRule.schema();

        let with_limit = Preset::DeltaRule.plan(&schema.resolve(&[("error_limit", "0.2")]));
        assert_eq!(with_limit.stop, StopCondition::error_below(0.2));

        let without = Preset::DeltaRule.plan(&schema.resolve(&[("use_error_limit", "0")]));
        assert_eq!(without.stop.iteration_limit(), NonZeroUsize::new(1000));
        assert_eq!(without.stop.error_limit(), None);

        let unbounded = Preset::DeltaRule.plan(
            &schema.resolve(&[("use_error_limit", "0"), ("iterations", "0")]),
        );
        assert_eq!(unbounded.stop, StopCondition::until_cancelled());
    }

    #[test]
    fn zero_iterations_means_until_stopped() {
        for preset in [Preset::TimeSeries, Preset::Approximation] {
            let p = preset.schema().resolve(&[("iterations", "0")]);
            assert_eq!(preset.plan(&p).stop, StopCondition::until_cancelled(), "{preset}");
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for preset in Preset::ALL {
            assert_eq!(preset.name().parse::<Preset>(), Ok(preset));
        }
        assert!("hopfield".parse::<Preset>().is_err());
    }
}
