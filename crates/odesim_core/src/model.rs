//! Model-side plumbing: physical bounds, closure models, and the binding of
//! a model to an input source.

use crate::error::{check_dimension, ConfigurationError, NumericalFailure, SimResult};
use crate::input::InputSource;
use crate::traits::{DynamicalSystem, Scalar, StateSpaceModel};
use serde::{Deserialize, Serialize};

/// A closed interval a single state component is physically confined to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateBound {
    pub index: usize,
    pub min: f64,
    pub max: f64,
}

impl StateBound {
    pub fn new(index: usize, min: f64, max: f64) -> Result<Self, ConfigurationError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ConfigurationError::NonFiniteValue {
                what: "state bound",
            });
        }
        if min > max {
            return Err(ConfigurationError::InvalidParameter {
                what: format!("bound on state {index} has min {min} > max {max}"),
            });
        }
        Ok(Self { index, min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// How declared bounds take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundPolicy {
    /// Clamp before every derivative evaluation and clip the returned trajectory.
    Enforce,
    /// Integrate the raw state, clip only the returned trajectory.
    ClipOutput,
    /// Clip nothing; excursions stay visible and are reported.
    Report,
}

/// The bounds a model declares together with the policy that applies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBounds {
    pub limits: Vec<StateBound>,
    pub policy: BoundPolicy,
}

impl StateBounds {
    pub fn new(limits: Vec<StateBound>, policy: BoundPolicy) -> Self {
        Self { limits, policy }
    }

    /// Clamps bounded components of `x` in place.
    pub fn clamp<T: Scalar>(&self, x: &mut [T]) {
        for bound in &self.limits {
            if let Some(value) = x.get_mut(bound.index) {
                let lo = T::lift(bound.min);
                let hi = T::lift(bound.max);
                if *value < lo {
                    *value = lo;
                } else if *value > hi {
                    *value = hi;
                }
            }
        }
    }

    pub fn clamps_during_integration(&self) -> bool {
        self.policy == BoundPolicy::Enforce
    }

    pub fn clips_output(&self) -> bool {
        matches!(self.policy, BoundPolicy::Enforce | BoundPolicy::ClipOutput)
    }

    pub(crate) fn validate(&self, dimension: usize) -> SimResult<()> {
        for bound in &self.limits {
            if bound.index >= dimension {
                return Err(ConfigurationError::InvalidParameter {
                    what: format!(
                        "bound refers to state {} of a {}-dimensional model",
                        bound.index, dimension
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// A model given directly as a closure `f(t, x, u, out)`.
///
/// Auxiliary arguments (parameters, lookup tables, ...) are captured by the
/// closure and reach every evaluation unchanged.
pub struct FnModel<F> {
    dimension: usize,
    input_dimension: usize,
    f: F,
}

impl<F> FnModel<F>
where
    F: Fn(f64, &[f64], &[f64], &mut [f64]),
{
    pub fn new(dimension: usize, input_dimension: usize, f: F) -> Self {
        Self {
            dimension,
            input_dimension,
            f,
        }
    }
}

impl<F> StateSpaceModel<f64> for FnModel<F>
where
    F: Fn(f64, &[f64], &[f64], &mut [f64]),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn input_dimension(&self) -> usize {
        self.input_dimension
    }

    fn derivative(&self, t: f64, x: &[f64], u: &[f64], out: &mut [f64]) -> SimResult<()> {
        (self.f)(t, x, u, out);
        Ok(())
    }
}

/// A model with its input source bound, seen by the integrators as a closed
/// system. Declared bounds with [`BoundPolicy::Enforce`] are applied here, so
/// every evaluation, including rejected trial steps, sees the clamped state.
pub struct Driven<'a, M> {
    model: &'a M,
    input: &'a InputSource,
}

impl<'a, M: StateSpaceModel<f64>> Driven<'a, M> {
    pub fn new(model: &'a M, input: &'a InputSource) -> SimResult<Self> {
        check_dimension("input source", model.input_dimension(), input.dimension())?;
        if let Some(bounds) = model.bounds() {
            bounds.validate(model.dimension())?;
        }
        Ok(Self { model, input })
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn input(&self) -> &InputSource {
        self.input
    }
}

impl<M: StateSpaceModel<f64>> DynamicalSystem for Driven<'_, M> {
    fn dimension(&self) -> usize {
        self.model.dimension()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()> {
        let mut u = vec![0.0; self.input.dimension()];
        self.input.evaluate(t, x, &mut u)?;
        if u.iter().any(|v| !v.is_finite()) {
            return Err(NumericalFailure::NonFinite {
                what: "input source",
                t,
            }
            .into());
        }
        match self.model.bounds() {
            Some(bounds) if bounds.clamps_during_integration() => {
                let mut clamped = x.to_vec();
                bounds.clamp(&mut clamped);
                self.model.derivative(t, &clamped, &u, out)
            }
            _ => self.model.derivative(t, x, &u, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Valve {
        bounds: StateBounds,
    }

    impl StateSpaceModel<f64> for Valve {
        fn dimension(&self) -> usize {
            1
        }

        fn input_dimension(&self) -> usize {
            0
        }

        fn derivative(&self, _t: f64, x: &[f64], _u: &[f64], out: &mut [f64]) -> SimResult<()> {
            // Reports the state it was given so the clamp is observable.
            out[0] = x[0];
            Ok(())
        }

        fn bounds(&self) -> Option<&StateBounds> {
            Some(&self.bounds)
        }
    }

    #[test]
    fn state_bound_rejects_inverted_interval() {
        assert!(StateBound::new(0, 1.0, 0.0).is_err());
        assert!(StateBound::new(0, f64::NAN, 1.0).is_err());
        let bound = StateBound::new(2, -1.0, 1.0).expect("valid bound");
        assert!(bound.contains(1.0));
        assert!(!bound.contains(1.0001));
    }

    #[test]
    fn enforce_policy_clamps_before_evaluation() {
        let valve = Valve {
            bounds: StateBounds::new(
                vec![StateBound::new(0, 0.0, 0.5).unwrap()],
                BoundPolicy::Enforce,
            ),
        };
        let input = InputSource::Constant(vec![]);
        let driven = Driven::new(&valve, &input).unwrap();
        let mut out = [0.0];
        driven.apply(0.0, &[0.9], &mut out).unwrap();
        assert_eq!(out[0], 0.5);
    }

    #[test]
    fn clip_output_policy_leaves_integration_state_untouched() {
        let valve = Valve {
            bounds: StateBounds::new(
                vec![StateBound::new(0, 0.0, 0.5).unwrap()],
                BoundPolicy::ClipOutput,
            ),
        };
        let input = InputSource::Constant(vec![]);
        let driven = Driven::new(&valve, &input).unwrap();
        let mut out = [0.0];
        driven.apply(0.0, &[0.9], &mut out).unwrap();
        assert_eq!(out[0], 0.9);
    }

    #[test]
    fn driven_rejects_input_dimension_mismatch() {
        let model = FnModel::new(1, 2, |_t, _x, u, out| out[0] = u[0] + u[1]);
        let input = InputSource::Constant(vec![1.0]);
        let err = Driven::new(&model, &input).err().expect("mismatch");
        assert!(err.is_configuration());
    }

    #[test]
    fn bounds_outside_state_are_rejected() {
        let valve = Valve {
            bounds: StateBounds::new(
                vec![StateBound::new(3, 0.0, 1.0).unwrap()],
                BoundPolicy::Report,
            ),
        };
        let input = InputSource::Constant(vec![]);
        assert!(Driven::new(&valve, &input).is_err());
    }
}
