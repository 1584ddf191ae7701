use std::fmt;

use log::{debug, warn};
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;

/// Well-known hyperparameter names shared by the presets and the worker.
pub mod names {
    pub const LEARNING_RATE: &str = "learning_rate";
    pub const MOMENTUM: &str = "momentum";
    pub const RADIUS: &str = "radius";
    pub const ITERATIONS: &str = "iterations";
    pub const ERROR_LIMIT: &str = "error_limit";
    pub const USE_ERROR_LIMIT: &str = "use_error_limit";
    pub const ALPHA: &str = "alpha";
    pub const SIZE: &str = "size";
    pub const NEURONS: &str = "neurons";
    pub const WINDOW: &str = "window";
    pub const PREDICTION: &str = "prediction";
}

/// Numeric domain of a single setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    Real,
    /// Only whole numbers parse; `"2.5"` is treated as unparsable text.
    Integer,
}

/// What to do with a value that parses but falls outside `[min, max]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangePolicy {
    /// Replace the value with the setting's default.
    #[default]
    Default,
    /// Pull the value back to the nearest bound.
    Clamp,
}

/// Why a raw value was not used as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NormalizeReason {
    Unparsable,
    OutOfRange,
}

/// Records a substitution made while resolving user input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalization {
    pub name: &'static str,
    pub raw: String,
    pub used: f64,
    pub reason: NormalizeReason,
}

/// Describes one user-tunable setting: its valid range and fallback value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamSpec {
    /// Creates a real-valued setting.
    pub const fn real(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Real,
            min,
            max,
            default,
        }
    }

    /// Creates a whole-number setting.
    pub const fn integer(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            min,
            max,
            default,
        }
    }

    /// Resolves raw user text into the value a run will use.
    ///
    /// # Args
    /// * `raw` - The text typed by the user, if any.
    /// * `policy` - How out-of-range values are handled.
    ///
    /// # Returns
    /// The effective value and, when it differs from what was typed, the reason.
    pub fn resolve(&self, raw: Option<&str>, policy: RangePolicy) -> (f64, Option<Normalization>) {
        let Some(raw) = raw else {
            return (self.default, None);
        };

        let Some(value) = self.parse(raw) else {
            let normalization = self.normalized(raw, self.default, NormalizeReason::Unparsable);
            return (self.default, Some(normalization));
        };

        if self.contains(value) {
            return (value, None);
        }

        let used = match policy {
            RangePolicy::Default => self.default,
            RangePolicy::Clamp => value.clamp(self.min, self.max),
        };
        (used, Some(self.normalized(raw, used, NormalizeReason::OutOfRange)))
    }

    /// Returns true if `value` lies inside the setting's range.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    fn parse(&self, raw: &str) -> Option<f64> {
        let raw = raw.trim();
        match self.kind {
            ParamKind::Real => raw.parse::<f64>().ok().filter(|v| v.is_finite()),
            ParamKind::Integer => raw.parse::<i64>().ok().map(|v| v as f64),
        }
    }

    fn normalized(&self, raw: &str, used: f64, reason: NormalizeReason) -> Normalization {
        Normalization {
            name: self.name,
            raw: raw.to_string(),
            used,
            reason,
        }
    }
}

/// The ordered set of settings a sample exposes.
#[derive(Debug, Clone)]
pub struct ParamSchema {
    specs: Vec<ParamSpec>,
    policy: RangePolicy,
}

impl ParamSchema {
    /// Creates a schema that falls back to defaults for out-of-range input.
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        Self {
            specs,
            policy: RangePolicy::Default,
        }
    }

    /// Replaces the out-of-range policy.
    pub fn with_policy(mut self, policy: RangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    /// Looks up a setting by name.
    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Returns the parameters a run uses when the user typed nothing.
    pub fn defaults(&self) -> HyperParameters {
        self.resolve(&[])
    }

    /// Resolves `name = text` pairs, as read from a settings form.
    ///
    /// Never fails: missing entries take their default, bad entries are
    /// normalized and recorded.
    pub fn resolve(&self, raw: &[(&str, &str)]) -> HyperParameters {
        for (name, _) in raw {
            if self.spec(name).is_none() {
                warn!("ignoring unknown setting: {name}");
            }
        }

        self.collect(|name| {
            raw.iter()
                .rev()
                .find(|(n, _)| *n == name)
                .map(|(_, text)| text.to_string())
        })
    }

    /// Resolves settings from a JSON object.
    ///
    /// Numbers and strings are both accepted. Anything else, or a non-object
    /// document, counts as unparsable input.
    pub fn resolve_json(&self, doc: &Value) -> HyperParameters {
        let Some(obj) = doc.as_object() else {
            warn!("settings document is not an object, using defaults");
            return self.collect(|name| Some(format!("<{name}: not an object>")));
        };

        for name in obj.keys() {
            if self.spec(name).is_none() {
                warn!("ignoring unknown setting: {name}");
            }
        }

        self.collect(|name| {
            obj.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            })
        })
    }

    fn collect<F>(&self, mut lookup: F) -> HyperParameters
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut values = Vec::with_capacity(self.specs.len());
        let mut normalizations = Vec::new();

        for spec in &self.specs {
            let raw = lookup(spec.name);
            let (value, normalization) = spec.resolve(raw.as_deref(), self.policy);

            if let Some(n) = normalization {
                debug!(
                    "setting {} normalized: raw={:?} used={} reason={:?}",
                    n.name, n.raw, n.used, n.reason
                );
                normalizations.push(n);
            }
            values.push((spec.name, value));
        }

        HyperParameters {
            values,
            normalizations,
        }
    }
}

/// Immutable, validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperParameters {
    values: Vec<(&'static str, f64)>,
    normalizations: Vec<Normalization>,
}

impl HyperParameters {
    /// Returns the effective value of a setting.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Returns a whole-number setting as a count.
    pub fn count(&self, name: &str) -> Option<usize> {
        self.get(name).map(|v| v.max(0.0) as usize)
    }

    /// Returns true if a 0/1 setting is switched on.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v != 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.values.iter().copied()
    }

    /// Substitutions made while resolving user input, in schema order.
    pub fn normalizations(&self) -> &[Normalization] {
        &self.normalizations
    }
}

impl fmt::Display for HyperParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for HyperParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParamSchema {
        ParamSchema::new(vec![
            ParamSpec::real(names::LEARNING_RATE, 0.00001, 1.0, 0.3),
            ParamSpec::integer(names::RADIUS, 1.0, 30.0, 3.0),
            ParamSpec::integer(names::ITERATIONS, 10.0, 1_000_000.0, 500.0),
        ])
    }

    #[test]
    fn valid_input_is_used_as_is() {
        let p = schema().resolve(&[
            ("learning_rate", "0.5"),
            ("radius", "7"),
            ("iterations", "42"),
        ]);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.5));
        assert_eq!(p.count(names::RADIUS), Some(7));
        assert_eq!(p.count(names::ITERATIONS), Some(42));
        assert!(p.normalizations().is_empty());
    }

    #[test]
    fn unparsable_input_falls_back_to_default() {
        let p = schema().resolve(&[("learning_rate", "abc"), ("radius", "2.5")]);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.3));
        assert_eq!(p.count(names::RADIUS), Some(3));

        let reasons: Vec<_> = p.normalizations().iter().map(|n| (n.name, n.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (names::LEARNING_RATE, NormalizeReason::Unparsable),
                (names::RADIUS, NormalizeReason::Unparsable),
            ]
        );
    }

    #[test]
    fn out_of_range_uses_default_unless_clamping() {
        let raw = [("learning_rate", "0"), ("radius", "31"), ("iterations", "9")];

        let p = schema().resolve(&raw);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.3));
        assert_eq!(p.count(names::RADIUS), Some(3));
        assert_eq!(p.count(names::ITERATIONS), Some(500));

        let p = schema().with_policy(RangePolicy::Clamp).resolve(&raw);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.00001));
        assert_eq!(p.count(names::RADIUS), Some(30));
        assert_eq!(p.count(names::ITERATIONS), Some(10));
        assert_eq!(p.normalizations().len(), 3);
    }

    #[test]
    fn non_finite_reals_are_unparsable() {
        for raw in ["NaN", "inf", "-inf"] {
            let p = schema().resolve(&[("learning_rate", raw)]);
            assert_eq!(p.get(names::LEARNING_RATE), Some(0.3), "raw={raw}");
        }
    }

    #[test]
    fn missing_entries_take_defaults_silently() {
        let p = schema().defaults();
        assert_eq!(p.to_string(), "learning_rate=0.3 radius=3 iterations=500");
        assert!(p.normalizations().is_empty());
    }

    #[test]
    fn json_accepts_numbers_and_strings() {
        let doc = serde_json::json!({
            "learning_rate": 0.25,
            "radius": "12",
            "iterations": true,
            "unknown": 1,
        });
        let p = schema().resolve_json(&doc);
        assert_eq!(p.get(names::LEARNING_RATE), Some(0.25));
        assert_eq!(p.count(names::RADIUS), Some(12));
        assert_eq!(p.count(names::ITERATIONS), Some(500));
        assert_eq!(p.get("unknown"), None);
    }

    #[test]
    fn serializes_effective_values_in_order() {
        let p = schema().resolve(&[("radius", "5")]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"learning_rate":0.3,"radius":5.0,"iterations":500.0}"#);
    }
}
