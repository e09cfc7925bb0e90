use crate::autodiff::{model_jacobians, Dual};
use crate::error::{check_dimension, ConfigurationError, NumericalFailure, SimResult};
use crate::traits::StateSpaceModel;
use nalgebra::linalg::SVD;
use nalgebra::{Complex, DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex<f64>> for ComplexNumber {
    fn from(value: Complex<f64>) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenPair {
    pub value: ComplexNumber,
    pub vector: Vec<ComplexNumber>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumResult {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
    /// Row-major `∂f/∂x` at the solution.
    pub jacobian: Vec<f64>,
    pub eigenpairs: Vec<EigenPair>,
}

impl EquilibriumResult {
    /// Every eigenvalue has a negative real part.
    pub fn is_stable(&self) -> bool {
        self.eigenpairs.iter().all(|pair| pair.value.re < 0.0)
    }
}

/// Finds `x` with `f(0, x, u0) = 0` by damped Newton iteration from
/// `initial_guess`.
pub fn solve_equilibrium<M>(
    model: &M,
    u0: &[f64],
    initial_guess: &[f64],
    settings: NewtonSettings,
) -> SimResult<EquilibriumResult>
where
    M: StateSpaceModel<f64> + StateSpaceModel<Dual>,
{
    let dim = StateSpaceModel::<f64>::dimension(model);
    if dim == 0 {
        return Err(ConfigurationError::InvalidParameter {
            what: "model has zero dimension".into(),
        }
        .into());
    }
    check_dimension("initial guess", dim, initial_guess.len())?;
    check_dimension("input", StateSpaceModel::<f64>::input_dimension(model), u0.len())?;
    if settings.max_steps == 0 {
        return Err(ConfigurationError::InvalidSetting {
            what: "max_steps must be greater than zero",
        }
        .into());
    }
    if !(settings.damping > 0.0) {
        return Err(ConfigurationError::InvalidSetting {
            what: "damping must be positive",
        }
        .into());
    }
    if !(settings.tolerance > 0.0) {
        return Err(ConfigurationError::InvalidSetting {
            what: "tolerance must be positive",
        }
        .into());
    }

    let mut state = initial_guess.to_vec();
    let mut residual = vec![0.0; dim];
    StateSpaceModel::<f64>::derivative(model, 0.0, &state, u0, &mut residual)?;
    let mut residual_norm = l2_norm(&residual);
    let mut iterations = 0usize;

    loop {
        if residual_norm <= settings.tolerance {
            break;
        }

        if iterations >= settings.max_steps || !residual_norm.is_finite() {
            return Err(NumericalFailure::NewtonDiverged {
                iterations,
                residual_norm,
            }
            .into());
        }

        let (jacobian, _) = model_jacobians(model, 0.0, &state, u0)?;
        let delta = jacobian
            .lu()
            .solve(&DVector::from_column_slice(&residual))
            .ok_or(NumericalFailure::SingularMatrix {
                what: "Jacobian during Newton iteration",
                t: None,
            })?;

        for i in 0..dim {
            state[i] -= settings.damping * delta[i];
        }

        iterations += 1;
        StateSpaceModel::<f64>::derivative(model, 0.0, &state, u0, &mut residual)?;
        residual_norm = l2_norm(&residual);
    }

    debug!(iterations, residual_norm, "equilibrium converged");

    let (jacobian, _) = model_jacobians(model, 0.0, &state, u0)?;
    let eigenpairs = compute_eigenpairs(&jacobian)?;

    Ok(EquilibriumResult {
        state,
        residual_norm,
        iterations,
        jacobian: jacobian.transpose().as_slice().to_vec(),
        eigenpairs,
    })
}

/// Eigenvalues with unit-norm eigenvectors taken from the null space of
/// `A - λI`.
pub fn compute_eigenpairs(matrix: &DMatrix<f64>) -> SimResult<Vec<EigenPair>> {
    let dim = matrix.nrows();
    let eigenvalues = matrix.clone().complex_eigenvalues();
    let complex_matrix = matrix.map(|v| Complex::new(v, 0.0));

    let mut pairs = Vec::with_capacity(dim);
    for idx in 0..dim {
        let lambda = eigenvalues[idx];

        let mut shifted = complex_matrix.clone();
        for i in 0..dim {
            shifted[(i, i)] -= lambda;
        }

        let svd = SVD::new(shifted, true, true);
        let v_t = svd.v_t.ok_or(NumericalFailure::SingularMatrix {
            what: "eigenvector decomposition",
            t: None,
        })?;
        let row_index = v_t.nrows().saturating_sub(1);
        let row = v_t.row(row_index);
        // rows of V^H are conjugated right singular vectors
        let mut vector: Vec<Complex<f64>> = row.iter().map(|c| c.conj()).collect();
        normalize_complex_vector(&mut vector);

        pairs.push(EigenPair {
            value: ComplexNumber::from(lambda),
            vector: vector.into_iter().map(ComplexNumber::from).collect(),
        });
    }
    Ok(pairs)
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn normalize_complex_vector(vec: &mut [Complex<f64>]) {
    let norm = vec.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        for entry in vec {
            *entry /= norm;
        }
    }
}
