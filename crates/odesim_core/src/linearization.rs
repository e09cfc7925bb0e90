use crate::autodiff::{model_jacobians, Dual};
use crate::error::{check_dimension, SimResult};
use crate::traits::{Scalar, StateSpaceModel};
use crate::trajectory::Trajectory;
use crate::transfer::TransferFunctionMatrix;
use nalgebra::{Complex, DMatrix};
use tracing::{debug, warn};

/// Residual norm above which an operating point is not treated as an
/// equilibrium.
const EQUILIBRIUM_TOLERANCE: f64 = 1e-6;

/// First-order model around an operating point `(x0, u0)`.
///
/// The state is the deviation `x̄ = x - x0`; inputs are absolute and shifted
/// by `u0` internally, so the same `InputSource` drives both this model and
/// the nonlinear one it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    x0: Vec<f64>,
    u0: Vec<f64>,
}

impl LinearModel {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, x0: Vec<f64>, u0: Vec<f64>) -> SimResult<Self> {
        let n = a.nrows();
        check_dimension("A columns", n, a.ncols())?;
        check_dimension("B rows", n, b.nrows())?;
        check_dimension("operating state", n, x0.len())?;
        check_dimension("operating input", b.ncols(), u0.len())?;
        Ok(Self { a, b, x0, u0 })
    }

    /// `∂f/∂x` at the operating point.
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// `∂f/∂u` at the operating point.
    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn operating_state(&self) -> &[f64] {
        &self.x0
    }

    pub fn operating_input(&self) -> &[f64] {
        &self.u0
    }

    pub fn deviation_state(&self, x: &[f64]) -> SimResult<Vec<f64>> {
        check_dimension("state", self.x0.len(), x.len())?;
        Ok(x.iter().zip(&self.x0).map(|(x, x0)| x - x0).collect())
    }

    /// Shifts a deviation trajectory back to absolute coordinates.
    pub fn to_absolute(&self, deviation: &Trajectory) -> SimResult<Trajectory> {
        check_dimension("deviation trajectory", self.x0.len(), deviation.dimension())?;
        deviation.map_states(self.x0.len(), |_, x, out| {
            for ((o, x), x0) in out.iter_mut().zip(x).zip(&self.x0) {
                *o = x + x0;
            }
            Ok(())
        })
    }

    pub fn eigenvalues(&self) -> Vec<Complex<f64>> {
        self.a.complex_eigenvalues().iter().copied().collect()
    }

    /// `G(s) = (sI - A)⁻¹B` with one entry per (state, input) pair.
    pub fn transfer_matrix(&self) -> SimResult<TransferFunctionMatrix> {
        TransferFunctionMatrix::from_state_space(&self.a, &self.b)
    }
}

impl<T: Scalar> StateSpaceModel<T> for LinearModel {
    fn dimension(&self) -> usize {
        self.a.nrows()
    }

    fn input_dimension(&self) -> usize {
        self.b.ncols()
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let n = self.a.nrows();
        let m = self.b.ncols();
        for i in 0..n {
            let mut acc = T::zero();
            for j in 0..n {
                acc = acc + T::lift(self.a[(i, j)]) * x[j];
            }
            for j in 0..m {
                acc = acc + T::lift(self.b[(i, j)]) * (u[j] - T::lift(self.u0[j]));
            }
            out[i] = acc;
        }
        Ok(())
    }
}

/// Linearizes `model` at `(x0, u0)` with `t = 0`.
///
/// The point does not have to be an equilibrium, but a warning is logged
/// when it is not: the constant drift `f(x0, u0)` is dropped.
pub fn linearize<M>(model: &M, x0: &[f64], u0: &[f64]) -> SimResult<LinearModel>
where
    M: StateSpaceModel<f64> + StateSpaceModel<Dual>,
{
    let n = StateSpaceModel::<f64>::dimension(model);
    check_dimension("operating state", n, x0.len())?;
    check_dimension(
        "operating input",
        StateSpaceModel::<f64>::input_dimension(model),
        u0.len(),
    )?;

    let mut drift = vec![0.0; n];
    StateSpaceModel::<f64>::derivative(model, 0.0, x0, u0, &mut drift)?;
    let residual = drift.iter().map(|v| v * v).sum::<f64>().sqrt();
    if residual > EQUILIBRIUM_TOLERANCE {
        warn!(residual, "linearizing away from an equilibrium");
    }

    let (a, b) = model_jacobians(model, 0.0, x0, u0)?;
    debug!(states = n, inputs = b.ncols(), "linearized model");
    LinearModel::new(a, b, x0.to_vec(), u0.to_vec())
}
