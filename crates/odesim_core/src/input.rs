//! Exogenous input sources.
//!
//! Every source is fixed at construction and evaluated lazily at whatever
//! times the integrator asks for, including adaptive sub-steps that never
//! appear on the caller's output grid.

use crate::control::FeedbackLoop;
use crate::error::{check_dimension, ConfigurationError, SimResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// A right-continuous step function given by `(threshold, value)` pairs.
///
/// `value_at(t)` returns the value paired with the greatest threshold `<= t`.
/// Times before the first threshold take the first value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiecewiseConstant {
    thresholds: Vec<f64>,
    values: Vec<f64>,
}

impl PiecewiseConstant {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, ConfigurationError> {
        if points.is_empty() {
            return Err(ConfigurationError::InvalidInput {
                what: "piecewise schedule needs at least one (threshold, value) pair".into(),
            });
        }
        for (index, window) in points.windows(2).enumerate() {
            if window[1].0 <= window[0].0 {
                return Err(ConfigurationError::InvalidInput {
                    what: format!(
                        "piecewise thresholds must be strictly increasing (pair {} at {} follows {})",
                        index + 1,
                        window[1].0,
                        window[0].0
                    ),
                });
            }
        }
        if points.iter().any(|(t, v)| !t.is_finite() || !v.is_finite()) {
            return Err(ConfigurationError::NonFiniteValue {
                what: "piecewise schedule entry",
            });
        }
        let (thresholds, values) = points.into_iter().unzip();
        Ok(Self { thresholds, values })
    }

    pub fn value_at(&self, t: f64) -> f64 {
        let passed = self.thresholds.partition_point(|&threshold| threshold <= t);
        self.values[passed.saturating_sub(1)]
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Longest sequence a PRBS source will materialize.
pub const MAX_PRBS_LENGTH: usize = 1 << 24;

/// A pseudo-random multi-level sequence held for `period` seconds per level.
///
/// The sequence is drawn once, at construction, from a ChaCha8 generator
/// seeded with `seed`, so equal seeds always give equal sequences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prbs {
    levels: Vec<f64>,
    period: f64,
    seed: u64,
    sequence: Vec<f64>,
}

impl Prbs {
    pub fn new(
        levels: Vec<f64>,
        period: f64,
        length: usize,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        if levels.is_empty() {
            return Err(ConfigurationError::InvalidInput {
                what: "PRBS needs at least one level".into(),
            });
        }
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(ConfigurationError::NonFiniteValue { what: "PRBS level" });
        }
        if !period.is_finite() || period <= 0.0 {
            return Err(ConfigurationError::InvalidInput {
                what: format!("PRBS switching period must be positive, got {period}"),
            });
        }
        if length == 0 {
            return Err(ConfigurationError::InvalidInput {
                what: "PRBS sequence length must be positive".into(),
            });
        }
        if length > MAX_PRBS_LENGTH {
            return Err(ConfigurationError::InvalidParameter {
                what: format!("PRBS sequence length {length} exceeds {MAX_PRBS_LENGTH}"),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let sequence = (0..length)
            .map(|_| levels[rng.random_range(0..levels.len())])
            .collect();

        Ok(Self {
            levels,
            period,
            seed,
            sequence,
        })
    }

    /// A sequence with one level per switching slot in `[0, horizon]`,
    /// both ends included.
    pub fn covering(
        levels: Vec<f64>,
        period: f64,
        horizon: f64,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        if !horizon.is_finite() || horizon < 0.0 {
            return Err(ConfigurationError::InvalidInput {
                what: format!("PRBS horizon must be non-negative, got {horizon}"),
            });
        }
        if !period.is_finite() || period <= 0.0 {
            return Err(ConfigurationError::InvalidInput {
                what: format!("PRBS switching period must be positive, got {period}"),
            });
        }
        let slots = (horizon / period).floor();
        let length = if slots < MAX_PRBS_LENGTH as f64 {
            (slots as usize).checked_add(1)
        } else {
            None
        };
        let Some(length) = length else {
            return Err(ConfigurationError::InvalidParameter {
                what: format!(
                    "PRBS horizon {horizon} spans more than {MAX_PRBS_LENGTH} periods of {period}"
                ),
            });
        };
        Self::new(levels, period, length, seed)
    }

    pub fn value_at(&self, t: f64) -> f64 {
        let slot = if t > 0.0 {
            (t / self.period).floor() as usize
        } else {
            0
        };
        self.sequence[slot.min(self.sequence.len() - 1)]
    }

    pub fn sequence(&self) -> &[f64] {
        &self.sequence
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Where a model's inputs come from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InputSource {
    /// The same vector at every time.
    Constant(Vec<f64>),
    /// One scalar channel following a step schedule.
    PiecewiseConstant(PiecewiseConstant),
    /// One scalar channel following a pseudo-random sequence.
    Prbs(Prbs),
    /// Closed-loop PID output computed from the current state.
    Controller(Box<FeedbackLoop>),
    /// Concatenation of independent sources, in order.
    Channels(Vec<InputSource>),
}

impl InputSource {
    pub fn constant(values: impl Into<Vec<f64>>) -> Self {
        InputSource::Constant(values.into())
    }

    /// The empty input of an autonomous model.
    pub fn none() -> Self {
        InputSource::Constant(Vec::new())
    }

    pub fn piecewise(points: Vec<(f64, f64)>) -> Result<Self, ConfigurationError> {
        PiecewiseConstant::new(points).map(InputSource::PiecewiseConstant)
    }

    pub fn controller(feedback: FeedbackLoop) -> Self {
        InputSource::Controller(Box::new(feedback))
    }

    /// Number of values produced per evaluation.
    pub fn dimension(&self) -> usize {
        match self {
            InputSource::Constant(values) => values.len(),
            InputSource::PiecewiseConstant(_) | InputSource::Prbs(_) => 1,
            InputSource::Controller(feedback) => feedback.dimension(),
            InputSource::Channels(channels) => channels.iter().map(InputSource::dimension).sum(),
        }
    }

    /// Whether evaluation reads the state vector.
    pub fn depends_on_state(&self) -> bool {
        match self {
            InputSource::Controller(_) => true,
            InputSource::Channels(channels) => channels.iter().any(InputSource::depends_on_state),
            _ => false,
        }
    }

    /// Evaluates the source at time `t` and state `x` into `out`.
    pub fn evaluate(&self, t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()> {
        check_dimension("input buffer", self.dimension(), out.len())?;
        match self {
            InputSource::Constant(values) => out.copy_from_slice(values),
            InputSource::PiecewiseConstant(schedule) => out[0] = schedule.value_at(t),
            InputSource::Prbs(prbs) => out[0] = prbs.value_at(t),
            InputSource::Controller(feedback) => feedback.evaluate(t, x, out)?,
            InputSource::Channels(channels) => {
                let mut offset = 0;
                for channel in channels {
                    let width = channel.dimension();
                    channel.evaluate(t, x, &mut out[offset..offset + width])?;
                    offset += width;
                }
            }
        }
        Ok(())
    }

    /// Evaluates a source that depends on time only.
    pub fn value_at(&self, t: f64) -> SimResult<Vec<f64>> {
        if self.depends_on_state() {
            return Err(ConfigurationError::InvalidInput {
                what: "source depends on the state; evaluate it along a trajectory".into(),
            }
            .into());
        }
        let mut out = vec![0.0; self.dimension()];
        self.evaluate(t, &[], &mut out)?;
        Ok(out)
    }
}

impl From<PiecewiseConstant> for InputSource {
    fn from(schedule: PiecewiseConstant) -> Self {
        InputSource::PiecewiseConstant(schedule)
    }
}

impl From<Prbs> for InputSource {
    fn from(prbs: Prbs) -> Self {
        InputSource::Prbs(prbs)
    }
}
