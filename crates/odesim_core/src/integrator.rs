//! Adaptive time integration with dense output.

use crate::error::{check_dimension, ConfigurationError, NumericalFailure, SimResult};
use crate::input::InputSource;
use crate::model::Driven;
use crate::solvers::{
    DenseSegment, ExplicitRk, Rhs, Rk4, Rosenbrock23, Tolerance, Trial, DORMAND_PRINCE, TSIT5,
};
use crate::traits::{DynamicalSystem, StateSpaceModel};
use crate::trajectory::{IntegrationStats, Trajectory};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Method {
    /// Tsitouras 5(4), explicit. The default for non-stiff problems.
    #[default]
    Tsit5,
    /// Dormand-Prince 5(4), explicit.
    DormandPrince,
    /// Rosenbrock 2(3), linearly implicit, for stiff problems.
    Rosenbrock23,
    /// Classic fourth-order Runge-Kutta with a fixed step. Tolerances are
    /// ignored.
    Rk4 { step: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub method: Method,
    pub rtol: f64,
    pub atol: f64,
    /// Initial step; chosen automatically when absent.
    pub first_step: Option<f64>,
    /// Upper limit on the step size; unlimited when absent.
    pub max_step: Option<f64>,
    /// Accepted plus rejected steps before giving up.
    pub max_steps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: Method::Tsit5,
            rtol: 1e-3,
            atol: 1e-6,
            first_step: None,
            max_step: None,
            max_steps: 500_000,
        }
    }
}

impl SolverSettings {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(ConfigurationError::InvalidSetting {
                what: "rtol must be positive and finite",
            });
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(ConfigurationError::InvalidSetting {
                what: "atol must be positive and finite",
            });
        }
        if let Some(h) = self.first_step {
            if !(h.is_finite() && h > 0.0) {
                return Err(ConfigurationError::InvalidSetting {
                    what: "first_step must be positive and finite",
                });
            }
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0) {
                return Err(ConfigurationError::InvalidSetting {
                    what: "max_step must be positive",
                });
            }
        }
        if let Method::Rk4 { step } = self.method {
            if !(step.is_finite() && step > 0.0) {
                return Err(ConfigurationError::InvalidSetting {
                    what: "RK4 step must be positive and finite",
                });
            }
        }
        if self.max_steps == 0 {
            return Err(ConfigurationError::InvalidSetting {
                what: "max_steps must be greater than zero",
            });
        }
        Ok(())
    }
}

/// Checks everything that can be checked without evaluating the system.
fn validate_problem(
    dimension: usize,
    x0: &[f64],
    t_span: (f64, f64),
    t_eval: &[f64],
    settings: &SolverSettings,
) -> SimResult<()> {
    let (t0, tf) = t_span;
    if !t0.is_finite() || !tf.is_finite() {
        return Err(ConfigurationError::NonFiniteValue {
            what: "integration interval",
        }
        .into());
    }
    if t0 >= tf {
        return Err(ConfigurationError::DegenerateInterval { t0, tf }.into());
    }
    check_dimension("initial state", dimension, x0.len())?;
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(ConfigurationError::NonFiniteValue {
            what: "initial state",
        }
        .into());
    }
    if t_eval.is_empty() {
        return Err(ConfigurationError::EmptyOutputGrid.into());
    }
    for (index, window) in t_eval.windows(2).enumerate() {
        if !(window[1] > window[0]) {
            return Err(ConfigurationError::NonIncreasingOutputTimes {
                index: index + 1,
                previous: window[0],
                current: window[1],
            }
            .into());
        }
    }
    for &time in t_eval {
        if !(time >= t0 && time <= tf) {
            return Err(ConfigurationError::OutputTimeOutOfRange { time, t0, tf }.into());
        }
    }
    settings.validate()?;
    Ok(())
}

enum Stepper {
    Explicit(ExplicitRk),
    Rosenbrock(Rosenbrock23),
    Fixed(Rk4, f64),
}

impl Stepper {
    fn new(method: Method, dim: usize) -> Self {
        match method {
            Method::Tsit5 => Stepper::Explicit(ExplicitRk::new(&TSIT5, dim)),
            Method::DormandPrince => Stepper::Explicit(ExplicitRk::new(&DORMAND_PRINCE, dim)),
            Method::Rosenbrock23 => Stepper::Rosenbrock(Rosenbrock23::new(dim)),
            Method::Rk4 { step } => Stepper::Fixed(Rk4::new(dim), step),
        }
    }

    fn error_order(&self) -> i32 {
        match self {
            Stepper::Explicit(rk) => rk.error_order(),
            Stepper::Rosenbrock(ros) => ros.error_order(),
            Stepper::Fixed(..) => 4,
        }
    }

    fn attempt<S: DynamicalSystem + ?Sized>(
        &mut self,
        rhs: &Rhs<'_, S>,
        t: f64,
        y: &[f64],
        f0: &[f64],
        h: f64,
        tol: Tolerance,
    ) -> SimResult<Trial> {
        match self {
            Stepper::Explicit(rk) => rk.attempt(rhs, t, y, f0, h, tol),
            Stepper::Rosenbrock(ros) => ros.attempt(rhs, t, y, f0, h, tol),
            Stepper::Fixed(rk4, _) => rk4.step(rhs, t, y, f0, h),
        }
    }

    fn segment(&self, t: f64, h: f64, y: &[f64], f0: &[f64], trial: &Trial) -> DenseSegment {
        match self {
            Stepper::Explicit(rk) => rk.segment(t, h, y, f0, trial),
            Stepper::Rosenbrock(ros) => ros.segment(t, h, y),
            Stepper::Fixed(..) => DenseSegment::hermite(t, h, y, f0, trial),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rejection {
    ErrorTooLarge,
    NonFinite,
}

/// Smallest step allowed at time `t`.
fn step_floor(t: f64) -> f64 {
    10.0 * f64::EPSILON * t.abs().max(f64::MIN_POSITIVE)
}

fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Initial step heuristic of Hairer, Nørsett and Wanner (II.4).
fn initial_step<S: DynamicalSystem + ?Sized>(
    rhs: &Rhs<'_, S>,
    t0: f64,
    y0: &[f64],
    f0: &[f64],
    order: i32,
    tol: Tolerance,
) -> SimResult<f64> {
    if y0.is_empty() {
        return Ok(f64::INFINITY);
    }
    let scale: Vec<f64> = y0.iter().map(|y| tol.atol + y.abs() * tol.rtol).collect();
    let scaled = |v: &[f64]| -> Vec<f64> { v.iter().zip(&scale).map(|(a, s)| a / s).collect() };
    let d0 = rms(&scaled(y0));
    let d1 = rms(&scaled(f0));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; y0.len()];
    rhs.call(t0 + h0, &y1, &mut f1)?;
    let diff: Vec<f64> = f1.iter().zip(f0).map(|(a, b)| a - b).collect();
    let d2 = rms(&scaled(&diff)) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / f64::from(order + 1))
    };
    let h = (100.0 * h0).min(h1);
    Ok(if h.is_finite() { h } else { h0 })
}

/// Integrates a closed system over `t_span`, returning the state at every
/// time in `t_eval`.
///
/// All configuration problems are reported before the first evaluation of
/// `system`.
pub fn integrate<S: DynamicalSystem + ?Sized>(
    system: &S,
    x0: &[f64],
    t_span: (f64, f64),
    t_eval: &[f64],
    settings: &SolverSettings,
) -> SimResult<Trajectory> {
    let dim = system.dimension();
    validate_problem(dim, x0, t_span, t_eval, settings)?;
    let (t0, tf) = t_span;

    let rhs = Rhs::new(system);
    let tol = Tolerance {
        rtol: settings.rtol,
        atol: settings.atol,
    };
    let max_step = settings.max_step.unwrap_or(f64::INFINITY);
    let mut stepper = Stepper::new(settings.method, dim);
    let exponent = 1.0 / f64::from(stepper.error_order() + 1);

    let mut t = t0;
    let mut y = x0.to_vec();
    let mut f = vec![0.0; dim];
    rhs.call(t, &y, &mut f)?;
    if f.iter().any(|v| !v.is_finite()) {
        return Err(NumericalFailure::NonFinite {
            what: "derivative at the initial state",
            t,
        }
        .into());
    }

    let mut times = Vec::with_capacity(t_eval.len());
    let mut states = Vec::with_capacity(t_eval.len() * dim);
    let mut next_output = 0;
    while next_output < t_eval.len() && t_eval[next_output] <= t0 {
        times.push(t_eval[next_output]);
        states.extend_from_slice(&y);
        next_output += 1;
    }

    let mut h = match (settings.method, settings.first_step) {
        (Method::Rk4 { step }, _) => step,
        (_, Some(h)) => h,
        (_, None) => initial_step(&rhs, t0, &y, &f, stepper.error_order(), tol)?,
    };

    let mut stats = IntegrationStats::default();
    let mut interpolated = vec![0.0; dim];
    let mut last_rejection: Option<Rejection> = None;

    while t < tf {
        if stats.accepted + stats.rejected >= settings.max_steps {
            return Err(NumericalFailure::MaxStepsExceeded {
                t,
                max_steps: settings.max_steps,
            }
            .into());
        }

        let floor = step_floor(t);
        h = h.min(max_step);
        if h < floor {
            return Err(match last_rejection {
                Some(Rejection::NonFinite) => NumericalFailure::NonFinite {
                    what: "trial step",
                    t,
                },
                _ => NumericalFailure::StepSizeUnderflow { t, step: h, floor },
            }
            .into());
        }
        // Land exactly on tf and never leave a sliver behind.
        let last = t + h >= tf || tf - (t + h) < step_floor(tf);
        if last {
            h = tf - t;
        }

        let trial = stepper.attempt(&rhs, t, &y, &f, h, tol)?;

        if let Stepper::Fixed(..) = stepper {
            if trial.error.is_infinite() {
                return Err(NumericalFailure::NonFinite {
                    what: "fixed-step state",
                    t: t + h,
                }
                .into());
            }
        }

        if trial.error <= 1.0 {
            let t_new = if last { tf } else { t + h };
            let segment = stepper.segment(t, h, &y, &f, &trial);
            while next_output < t_eval.len() && t_eval[next_output] <= t_new {
                let time = t_eval[next_output];
                times.push(time);
                if time == t_new {
                    states.extend_from_slice(&trial.y_new);
                } else {
                    segment.evaluate(time, &mut interpolated);
                    states.extend_from_slice(&interpolated);
                }
                next_output += 1;
            }

            stats.accepted += 1;
            let factor = match &stepper {
                Stepper::Fixed(_, step) => *step / h,
                _ if trial.error == 0.0 => MAX_FACTOR,
                _ => (SAFETY * trial.error.powf(-exponent)).min(MAX_FACTOR),
            };
            let factor = if last_rejection.is_some() {
                factor.min(1.0)
            } else {
                factor
            };
            t = t_new;
            y = trial.y_new;
            f = trial.f_new;
            h *= factor;
            last_rejection = None;
        } else {
            stats.rejected += 1;
            let (factor, reason) = if !trial.error.is_finite() {
                (MIN_FACTOR, Rejection::NonFinite)
            } else {
                (
                    (SAFETY * trial.error.powf(-exponent)).max(MIN_FACTOR),
                    Rejection::ErrorTooLarge,
                )
            };
            trace!(t, h, error = trial.error, ?reason, "step rejected");
            h *= factor;
            last_rejection = Some(reason);
        }
    }

    stats.evaluations = rhs.calls();
    debug!(
        method = ?settings.method,
        accepted = stats.accepted,
        rejected = stats.rejected,
        evaluations = stats.evaluations,
        "integration finished"
    );
    Trajectory::new(times, states, dim, stats)
}

/// Simulates `model` driven by `input` and applies the model's bound
/// policy to the result.
pub fn simulate<M: StateSpaceModel<f64>>(
    model: &M,
    input: &InputSource,
    x0: &[f64],
    t_span: (f64, f64),
    t_eval: &[f64],
    settings: &SolverSettings,
) -> SimResult<Trajectory> {
    let driven = Driven::new(model, input)?;
    let trajectory = integrate(&driven, x0, t_span, t_eval, settings)?;
    let Some(bounds) = model.bounds() else {
        return Ok(trajectory);
    };
    if bounds.clips_output() {
        return Ok(trajectory.clipped(bounds));
    }
    let violations = trajectory.bound_violations(bounds);
    if let Some(first) = violations.first() {
        warn!(
            count = violations.len(),
            first_time = first.time,
            state = first.index,
            value = first.value,
            "trajectory leaves declared state bounds"
        );
    }
    Ok(trajectory)
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut grid: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            grid[n - 1] = end;
            grid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundPolicy, FnModel, StateBound, StateBounds};
    use crate::solvers::ROS_D;
    use crate::SimError;
    use std::cell::Cell;

    fn assert_err_contains(err: SimError, needle: &str) {
        let message = err.to_string();
        assert!(
            message.contains(needle),
            "expected error containing '{needle}', got '{message}'"
        );
    }

    /// Counts evaluations so tests can check nothing ran.
    struct Counting {
        calls: Cell<usize>,
    }

    impl DynamicalSystem for Counting {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()> {
            self.calls.set(self.calls.get() + 1);
            out[0] = x[1];
            out[1] = -x[0];
            Ok(())
        }
    }

    fn counting() -> Counting {
        Counting {
            calls: Cell::new(0),
        }
    }

    #[test]
    fn degenerate_interval_fails_before_evaluation() {
        let system = counting();
        let err = integrate(
            &system,
            &[1.0, 0.0],
            (1.0, 1.0),
            &[1.0],
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert_err_contains(err, "degenerate");
        assert_eq!(system.calls.get(), 0);
    }

    #[test]
    fn dimension_mismatch_fails_before_evaluation() {
        let system = counting();
        let err = integrate(
            &system,
            &[1.0],
            (0.0, 1.0),
            &[0.0, 1.0],
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert_err_contains(err, "initial state dimension mismatch");
        assert_eq!(system.calls.get(), 0);
    }

    #[test]
    fn output_grid_is_validated() {
        let system = counting();
        let settings = SolverSettings::default();
        let x0 = [1.0, 0.0];
        let cases: [(&[f64], &str); 3] = [
            (&[], "empty"),
            (&[0.0, 0.5, 0.5], "strictly increasing"),
            (&[0.0, 2.0], "outside"),
        ];
        for (grid, needle) in cases {
            let err = integrate(&system, &x0, (0.0, 1.0), grid, &settings).unwrap_err();
            assert!(err.is_configuration());
            assert_err_contains(err, needle);
        }
        let bad = SolverSettings {
            rtol: -1.0,
            ..SolverSettings::default()
        };
        assert!(integrate(&system, &x0, (0.0, 1.0), &[1.0], &bad).is_err());
        assert_eq!(system.calls.get(), 0);
    }

    #[test]
    fn adaptive_methods_track_the_harmonic_oscillator() {
        let grid = linspace(0.0, 10.0, 101);
        for method in [Method::Tsit5, Method::DormandPrince, Method::Rosenbrock23] {
            let system = counting();
            let settings = SolverSettings::default()
                .with_method(method)
                .with_tolerances(1e-8, 1e-10);
            let traj = integrate(&system, &[1.0, 0.0], (0.0, 10.0), &grid, &settings).unwrap();
            assert_eq!(traj.len(), 101);
            let mut worst: f64 = 0.0;
            for (t, x) in traj.iter() {
                worst = worst.max((x[0] - t.cos()).abs());
            }
            let limit = if method == Method::Rosenbrock23 { 1e-4 } else { 1e-5 };
            assert!(worst < limit, "{method:?}: error {worst}");
            assert_eq!(traj.times()[100], 10.0);
            assert!(traj.stats().evaluations > 0);
        }
    }

    #[test]
    fn fixed_step_rk4_lands_on_final_time() {
        let system = counting();
        let settings = SolverSettings::default().with_method(Method::Rk4 { step: 0.03 });
        let traj = integrate(&system, &[1.0, 0.0], (0.0, 1.0), &[0.5, 1.0], &settings).unwrap();
        assert!((traj.state(1)[0] - 1.0f64.cos()).abs() < 1e-6);
        assert!((traj.state(0)[0] - 0.5f64.cos()).abs() < 1e-5);
        assert_eq!(traj.stats().accepted, 34);
    }

    #[test]
    fn finite_time_blowup_is_a_numerical_failure() {
        // x' = x^2 from x(0) = 1 escapes at t = 1
        let model = FnModel::new(1, 0, |_t, x, _u, out| out[0] = x[0] * x[0]);
        let err = simulate(
            &model,
            &InputSource::none(),
            &[1.0],
            (0.0, 2.0),
            &[2.0],
            &SolverSettings::default(),
        )
        .unwrap_err();
        assert!(err.is_numerical(), "{err}");
    }

    #[test]
    fn rosenbrock_handles_forced_stiff_systems_like_autonomous_ones() {
        // x' = -1e4·(x - cos t), and the same system with t carried as a state
        let settings = SolverSettings::default()
            .with_method(Method::Rosenbrock23)
            .with_tolerances(1e-6, 1e-9);
        let forced = FnModel::new(1, 0, |t: f64, x, _u, out| {
            out[0] = -1.0e4 * (x[0] - t.cos());
        });
        let augmented = FnModel::new(2, 0, |_t, x, _u, out| {
            out[0] = -1.0e4 * (x[0] - x[1].cos());
            out[1] = 1.0;
        });
        let none = InputSource::none();
        let forced = simulate(&forced, &none, &[1.0], (0.0, 5.0), &[5.0], &settings).unwrap();
        let augmented =
            simulate(&augmented, &none, &[1.0, 0.0], (0.0, 5.0), &[5.0], &settings).unwrap();

        let (forced_steps, augmented_steps) = (forced.stats().accepted, augmented.stats().accepted);
        // without ∂f/∂t the forced run needs roughly 40 times more steps
        assert!(
            (forced_steps as f64) < 1.5 * augmented_steps as f64,
            "forced {forced_steps} vs augmented {augmented_steps}"
        );
        let (x_forced, x_augmented) = (forced.state(0)[0], augmented.state(0)[0]);
        assert!((x_forced - x_augmented).abs() < 1e-4);
        assert!((x_forced - 5.0f64.cos()).abs() < 1e-3);
    }

    #[test]
    fn singular_rosenbrock_matrix_stops_the_run_with_its_time() {
        // J = 1 exactly at x = 0, and h·d rounds to one
        let model = FnModel::new(1, 0, |_t, x, _u, out| {
            out[0] = x[0];
        });
        let settings = SolverSettings {
            first_step: Some(1.0 / ROS_D),
            ..SolverSettings::default().with_method(Method::Rosenbrock23)
        };
        let err = simulate(&model, &InputSource::none(), &[0.0], (0.0, 10.0), &[10.0], &settings)
            .unwrap_err();
        assert!(err.is_numerical());
        assert_eq!(err.time(), Some(0.0));
        assert_err_contains(err, "Rosenbrock iteration matrix is singular at t = 0");
    }

    #[test]
    fn max_steps_is_enforced() {
        let system = counting();
        let settings = SolverSettings {
            max_steps: 3,
            ..SolverSettings::default().with_tolerances(1e-10, 1e-12)
        };
        let err = integrate(&system, &[1.0, 0.0], (0.0, 100.0), &[100.0], &settings).unwrap_err();
        assert_err_contains(err, "maximum number of steps (3)");
    }

    #[test]
    fn constant_input_at_equilibrium_stays_put() {
        // x' = -2 (x - u): equilibrium x = u
        let model = FnModel::new(1, 1, |_t, x, u, out| out[0] = -2.0 * (x[0] - u[0]));
        let traj = simulate(
            &model,
            &InputSource::constant(vec![3.5]),
            &[3.5],
            (0.0, 50.0),
            &linspace(0.0, 50.0, 11),
            &SolverSettings::default(),
        )
        .unwrap();
        for (_, x) in traj.iter() {
            assert!((x[0] - 3.5).abs() < 1e-12);
        }
    }

    struct Leaky {
        bounds: StateBounds,
    }

    impl StateSpaceModel<f64> for Leaky {
        fn dimension(&self) -> usize {
            1
        }

        fn input_dimension(&self) -> usize {
            0
        }

        fn derivative(&self, _t: f64, x: &[f64], _u: &[f64], out: &mut [f64]) -> SimResult<()> {
            // grows while below 2, rests at 2
            out[0] = if x[0] < 2.0 { 1.0 } else { 0.0 };
            Ok(())
        }

        fn bounds(&self) -> Option<&StateBounds> {
            Some(&self.bounds)
        }
    }

    fn leaky(policy: BoundPolicy) -> Leaky {
        Leaky {
            bounds: StateBounds::new(vec![StateBound::new(0, 0.0, 1.0).unwrap()], policy),
        }
    }

    #[test]
    fn bound_policies_shape_the_returned_trajectory() {
        let grid = [0.0, 0.5, 0.9, 1.5];
        let run = |policy| {
            simulate(
                &leaky(policy),
                &InputSource::none(),
                &[0.0],
                (0.0, 1.5),
                &grid,
                &SolverSettings::default(),
            )
            .unwrap()
        };
        let clipped = run(BoundPolicy::ClipOutput);
        assert_eq!(clipped.final_state(), Some(&[1.0][..]));

        let reported = run(BoundPolicy::Report);
        assert!((reported.final_state().unwrap()[0] - 1.5).abs() < 1e-9);
        assert_eq!(reported.bound_violations(&leaky(BoundPolicy::Report).bounds).len(), 1);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: SolverSettings =
            serde_json::from_str(r#"{"method": "Rosenbrock23", "rtol": 1e-6}"#).unwrap();
        assert_eq!(settings.method, Method::Rosenbrock23);
        assert_eq!(settings.rtol, 1e-6);
        assert_eq!(settings.atol, 1e-6);
        assert_eq!(settings.max_step, None);

        let fixed: SolverSettings =
            serde_json::from_str(r#"{"method": {"Rk4": {"step": 0.01}}}"#).unwrap();
        assert_eq!(fixed.method, Method::Rk4 { step: 0.01 });
    }

    #[test]
    fn linspace_hits_both_ends() {
        let grid = linspace(0.0, 3.0, 7);
        assert_eq!(grid.len(), 7);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[6], 3.0);
        assert!((grid[1] - 0.5).abs() < 1e-15);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
