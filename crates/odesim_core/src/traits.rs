use crate::error::SimResult;
use crate::model::StateBounds;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in state-space models.
/// Implemented by `f64` for simulation and by `Dual` for differentiation.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Lifts an `f64` constant into the scalar type.
    fn lift(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }

    /// The real (primal) part as `f64`.
    fn primal(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// An input-driven continuous-time model `dx/dt = f(t, x, u)`.
///
/// Implementations must be pure: the integrator evaluates `derivative` an
/// arbitrary number of times per output interval, including trial steps that
/// are later rejected.
pub trait StateSpaceModel<T: Scalar> {
    /// Length of the state vector.
    fn dimension(&self) -> usize;

    /// Length of the input vector.
    fn input_dimension(&self) -> usize;

    /// Evaluates the state derivative.
    /// t: current time
    /// x: state (length `dimension()`)
    /// u: input (length `input_dimension()`)
    /// out: buffer receiving dx/dt
    fn derivative(&self, t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()>;

    /// Physical limits declared by the model, with the policy used to honor them.
    fn bounds(&self) -> Option<&StateBounds> {
        None
    }
}

impl<T: Scalar, M: StateSpaceModel<T> + ?Sized> StateSpaceModel<T> for &M {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn input_dimension(&self) -> usize {
        (**self).input_dimension()
    }

    fn derivative(&self, t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        (**self).derivative(t, x, u, out)
    }

    fn bounds(&self) -> Option<&StateBounds> {
        (**self).bounds()
    }
}

/// A closed system `dx/dt = f(t, x)` as seen by the integrators, with all
/// inputs already bound.
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field into `out`.
    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()>;
}

impl<S: DynamicalSystem + ?Sized> DynamicalSystem for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()> {
        (**self).apply(t, x, out)
    }
}
