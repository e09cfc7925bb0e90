//! Systems written in mass-matrix form `M(x)·dx/dt = f(t, x, u)`.

use crate::error::{NumericalFailure, SimError, SimResult};
use crate::model::StateBounds;
use crate::traits::{Scalar, StateSpaceModel};

/// A model whose derivative is defined implicitly through a state-dependent
/// mass matrix.
pub trait MassMatrixSystem<T: Scalar> {
    fn dimension(&self) -> usize;

    fn input_dimension(&self) -> usize;

    /// Writes `M(x)` row-major into `out` (length `dimension()²`).
    fn mass_matrix(&self, x: &[T], out: &mut [T]) -> SimResult<()>;

    /// Writes the right-hand side `f(t, x, u)`.
    fn forcing(&self, t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()>;

    fn bounds(&self) -> Option<&StateBounds> {
        None
    }
}

/// Explicit view of a [`MassMatrixSystem`]: every evaluation solves
/// `M(x)·dx/dt = f` for `dx/dt`.
#[derive(Debug, Clone)]
pub struct Implicit<S> {
    system: S,
}

impl<S> Implicit<S> {
    pub fn new(system: S) -> Self {
        Self { system }
    }

    pub fn inner(&self) -> &S {
        &self.system
    }
}

impl<T: Scalar, S: MassMatrixSystem<T>> StateSpaceModel<T> for Implicit<S> {
    fn dimension(&self) -> usize {
        self.system.dimension()
    }

    fn input_dimension(&self) -> usize {
        self.system.input_dimension()
    }

    fn derivative(&self, t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let n = self.system.dimension();
        let mut mass = vec![T::zero(); n * n];
        self.system.mass_matrix(x, &mut mass)?;
        self.system.forcing(t, x, u, out)?;
        solve_in_place(n, &mut mass, out).map_err(|err| match err {
            SimError::Numerical(NumericalFailure::SingularMatrix { what, t: None }) => {
                NumericalFailure::SingularMatrix {
                    what,
                    t: Some(t.primal()),
                }
                .into()
            }
            other => other,
        })
    }

    fn bounds(&self) -> Option<&StateBounds> {
        self.system.bounds()
    }
}

/// Solves `a·x = b` by Gaussian elimination with partial pivoting,
/// overwriting `b` with `x`. `a` (row-major, n×n) is destroyed.
///
/// Works on any [`Scalar`], so derivatives flow through the solve when the
/// entries are dual numbers.
pub fn solve_in_place<T: Scalar>(n: usize, a: &mut [T], b: &mut [T]) -> SimResult<()> {
    let scale = a
        .iter()
        .fold(0.0f64, |acc, v| acc.max(v.primal().abs()));
    let singular = NumericalFailure::SingularMatrix {
        what: "mass matrix",
        t: None,
    };
    if scale == 0.0 || !scale.is_finite() {
        return Err(singular.into());
    }
    let tiny = scale * f64::EPSILON * n as f64;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r, &s| {
                a[r * n + col]
                    .primal()
                    .abs()
                    .total_cmp(&a[s * n + col].primal().abs())
            })
            .unwrap_or(col);
        if a[pivot_row * n + col].primal().abs() <= tiny {
            return Err(singular.into());
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        let pivot = a[col * n + col];
        for row in col + 1..n {
            let factor = a[row * n + col] / pivot;
            if factor.is_zero() {
                continue;
            }
            for k in col..n {
                let upper = a[col * n + k];
                a[row * n + k] = a[row * n + k] - factor * upper;
            }
            let upper = b[col];
            b[row] = b[row] - factor * upper;
        }
    }

    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in row + 1..n {
            acc = acc - a[row * n + k] * b[k];
        }
        b[row] = acc / a[row * n + row];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::model_jacobians;
    use crate::input::InputSource;
    use crate::integrator::{simulate, SolverSettings};

    /// A point mass on a spring written with an explicit inertia row.
    struct Oscillator {
        mass: f64,
        stiffness: f64,
    }

    impl<T: Scalar> MassMatrixSystem<T> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn input_dimension(&self) -> usize {
            0
        }

        fn mass_matrix(&self, _x: &[T], out: &mut [T]) -> SimResult<()> {
            out.copy_from_slice(&[T::one(), T::zero(), T::zero(), T::lift(self.mass)]);
            Ok(())
        }

        fn forcing(&self, _t: T, x: &[T], _u: &[T], out: &mut [T]) -> SimResult<()> {
            out[0] = x[1];
            out[1] = -T::lift(self.stiffness) * x[0];
            Ok(())
        }
    }

    #[test]
    fn solves_with_pivoting() {
        let mut a = vec![0.0, 2.0, 1.0, 1.0];
        let mut b: Vec<f64> = vec![4.0, 3.0];
        solve_in_place(2, &mut a, &mut b).unwrap();
        assert!((b[0] - 1.0).abs() < 1e-12);
        assert!((b[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_a_numerical_failure() {
        let mut a = vec![1.0, 2.0, 2.0, 4.0];
        let mut b = vec![1.0, 1.0];
        let err = solve_in_place(2, &mut a, &mut b).unwrap_err();
        assert!(err.is_numerical());
        assert!(err.to_string().contains("singular"));
    }

    /// `x0` drains at unit rate; its value is the second diagonal entry of
    /// `M`, which becomes singular once the tank is empty at t = 1.
    struct Draining;

    impl<T: Scalar> MassMatrixSystem<T> for Draining {
        fn dimension(&self) -> usize {
            2
        }

        fn input_dimension(&self) -> usize {
            0
        }

        fn mass_matrix(&self, x: &[T], out: &mut [T]) -> SimResult<()> {
            let level = if x[0].primal() > 0.0 { x[0] } else { T::zero() };
            out.copy_from_slice(&[T::one(), T::zero(), T::zero(), level]);
            Ok(())
        }

        fn forcing(&self, _t: T, _x: &[T], _u: &[T], out: &mut [T]) -> SimResult<()> {
            out[0] = -T::one();
            out[1] = T::zero();
            Ok(())
        }
    }

    #[test]
    fn singular_mass_matrix_stops_the_simulation_at_its_time() {
        let err = simulate(
            &Implicit::new(Draining),
            &InputSource::none(),
            &[1.0, 0.5],
            (0.0, 2.0),
            &[2.0],
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert!(err.is_numerical());
        assert!(err.to_string().contains("mass matrix is singular at t = "));
        let t = err.time().unwrap();
        assert!((0.99..=2.0).contains(&t), "failed at t = {t}");
    }

    #[test]
    fn implicit_model_divides_by_mass() {
        let model = Implicit::new(Oscillator {
            mass: 4.0,
            stiffness: 8.0,
        });
        let mut out = [0.0; 2];
        model.derivative(0.0, &[1.0, 3.0], &[], &mut out).unwrap();
        assert_eq!(out, [3.0, -2.0]);
    }

    #[test]
    fn derivatives_flow_through_the_solve() {
        let model = Implicit::new(Oscillator {
            mass: 4.0,
            stiffness: 8.0,
        });
        let (a, _) = model_jacobians(&model, 0.0, &[0.2, 0.0], &[]).unwrap();
        assert!((a[(0, 1)] - 1.0).abs() < 1e-12);
        assert!((a[(1, 0)] + 2.0).abs() < 1e-12);
    }
}
