//! Error taxonomy for simulation and analysis.
//!
//! Configuration problems are detected before any derivative evaluation;
//! numerical failures are raised while integrating or solving. Neither is
//! retried.

use thiserror::Error;

/// Invalid setup detected before any computation starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{what} dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("output time grid is empty")]
    EmptyOutputGrid,

    #[error("degenerate integration interval [{t0}, {tf}]: final time must exceed initial time")]
    DegenerateInterval { t0: f64, tf: f64 },

    #[error("output times must be strictly increasing (index {index}: {previous} then {current})")]
    NonIncreasingOutputTimes {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("output time {time} lies outside the integration interval [{t0}, {tf}]")]
    OutputTimeOutOfRange { time: f64, t0: f64, tf: f64 },

    #[error("{what} must be finite")]
    NonFiniteValue { what: &'static str },

    #[error("invalid setting: {what}")]
    InvalidSetting { what: &'static str },

    #[error("invalid input source: {what}")]
    InvalidInput { what: String },

    #[error("invalid model parameter: {what}")]
    InvalidParameter { what: String },
}

/// Failure of a numerical procedure that was correctly configured.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalFailure {
    #[error("step size {step:e} fell below the floor {floor:e} at t = {t}")]
    StepSizeUnderflow { t: f64, step: f64, floor: f64 },

    #[error("maximum number of steps ({max_steps}) exceeded at t = {t}")]
    MaxStepsExceeded { t: f64, max_steps: usize },

    #[error("non-finite value encountered in {what} at t = {t}")]
    NonFinite { what: &'static str, t: f64 },

    #[error("{what} is singular{}", at_time(.t))]
    SingularMatrix { what: &'static str, t: Option<f64> },

    #[error("Newton iteration failed to converge in {iterations} steps (residual norm {residual_norm:e})")]
    NewtonDiverged {
        iterations: usize,
        residual_norm: f64,
    },

    #[error("polynomial root finding failed: {what}")]
    RootFinding { what: &'static str },
}

fn at_time(t: &Option<f64>) -> String {
    t.map(|t| format!(" at t = {t}")).unwrap_or_default()
}

impl NumericalFailure {
    /// Simulation time at which the failure occurred, when known.
    pub fn time(&self) -> Option<f64> {
        match self {
            NumericalFailure::StepSizeUnderflow { t, .. }
            | NumericalFailure::MaxStepsExceeded { t, .. }
            | NumericalFailure::NonFinite { t, .. } => Some(*t),
            NumericalFailure::SingularMatrix { t, .. } => *t,
            NumericalFailure::NewtonDiverged { .. } | NumericalFailure::RootFinding { .. } => None,
        }
    }
}

/// Any error produced by the simulation core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("numerical failure: {0}")]
    Numerical(#[from] NumericalFailure),
}

impl SimError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, SimError::Configuration(_))
    }

    pub fn is_numerical(&self) -> bool {
        matches!(self, SimError::Numerical(_))
    }

    /// See [`NumericalFailure::time`].
    pub fn time(&self) -> Option<f64> {
        match self {
            SimError::Numerical(failure) => failure.time(),
            SimError::Configuration(_) => None,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

/// Checks a slice length against an expected dimension.
pub(crate) fn check_dimension(what: &'static str, expected: usize, got: usize) -> SimResult<()> {
    if expected != got {
        return Err(ConfigurationError::DimensionMismatch {
            what,
            expected,
            got,
        }
        .into());
    }
    Ok(())
}
