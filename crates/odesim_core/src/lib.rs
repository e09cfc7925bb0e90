//! The `odesim_core` crate simulates continuous-time dynamical systems driven
//! by time-varying inputs or feedback control, and linearizes them for
//! frequency-domain analysis.
//!
//! Models are written once, generically over [`Scalar`], so the same
//! derivative runs on `f64` during integration and on [`Dual`] numbers when
//! Jacobians are needed.
//!
//! Key components:
//! - **Traits**: `StateSpaceModel` (`dx/dt = f(t, x, u)`), `DynamicalSystem` (closed systems seen by the integrators).
//! - **Inputs**: `InputSource` (constant, piecewise constant, PRBS, PID feedback, channels).
//! - **Integrators**: adaptive Tsit5 / Dormand-Prince, the stiff Rosenbrock23, fixed-step RK4, all with dense output.
//! - **Analysis**: `linearize`, `TransferFunctionMatrix`, `solve_equilibrium`.
pub mod autodiff;
pub mod control;
pub mod equilibrium;
pub mod error;
pub mod input;
pub mod integrator;
pub mod linearization;
pub mod mass_matrix;
pub mod model;
pub mod polynomial;
mod solvers;
pub mod trajectory;
pub mod traits;
pub mod transfer;

pub use autodiff::Dual;
pub use control::{ErrorIntegrator, FeedbackLoop, PidController};
pub use equilibrium::{solve_equilibrium, EquilibriumResult, NewtonSettings};
pub use error::{ConfigurationError, NumericalFailure, SimError, SimResult};
pub use input::{InputSource, PiecewiseConstant, Prbs};
pub use integrator::{integrate, linspace, simulate, Method, SolverSettings};
pub use linearization::{linearize, LinearModel};
pub use mass_matrix::{Implicit, MassMatrixSystem};
pub use model::{BoundPolicy, Driven, FnModel, StateBound, StateBounds};
pub use trajectory::{BoundViolation, IntegrationStats, Trajectory};
pub use traits::{DynamicalSystem, Scalar, StateSpaceModel};
pub use transfer::{TransferEntry, TransferFunction, TransferFunctionMatrix};
