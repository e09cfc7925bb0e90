//! Ready-made experiments over the model catalog.
//!
//! Each scenario runs one or more simulations and returns plain serializable
//! data; plotting and reporting are left to the caller.

use crate::circuits::RcCircuit;
use crate::constants::celsius;
use crate::mechanical::{CartPendulum, MassSpringDamper};
use crate::oscillators::Pendulum;
use crate::tanks::{CubicTank, HeatedTank};
use anyhow::Context;
use nalgebra::DMatrix;
use num_complex::Complex;
use odesim_core::{
    linearize, linspace, simulate, ErrorIntegrator, FeedbackLoop, Implicit, InputSource, Method,
    PidController, Prbs, SolverSettings, TransferEntry, Trajectory,
};
use serde::Serialize;
use tracing::{debug, info};

/// A sampled trajectory flattened into per-component series.
#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub times: Vec<f64>,
    /// `components[j][i]` is state `j` at `times[i]`.
    pub components: Vec<Vec<f64>>,
}

impl Series {
    fn from_trajectory(trajectory: &Trajectory) -> anyhow::Result<Self> {
        let components = (0..trajectory.dimension())
            .map(|j| trajectory.component(j))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            times: trajectory.times().to_vec(),
            components,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RcComparison {
    pub times: Vec<f64>,
    pub numeric: Vec<f64>,
    pub analytic: Vec<f64>,
    /// Mean of `|numeric - analytic| / analytic` in percent, over samples
    /// where the analytic charge is positive.
    pub mean_percent_error: f64,
    /// Worst sample of the same relative error.
    pub max_percent_error: f64,
}

/// Charges the default RC circuit at 5 V from empty and compares against
/// the closed-form solution on 1000 samples over 3 s.
pub fn rc_analytic_comparison() -> anyhow::Result<RcComparison> {
    let circuit = RcCircuit::default();
    let voltage = 5.0;
    let times = linspace(0.0, 3.0, 1000);
    let trajectory = simulate(
        &circuit,
        &InputSource::constant([voltage]),
        &[0.0],
        (0.0, 3.0),
        &times,
        &SolverSettings::default(),
    )
    .context("RC charging run failed")?;

    let numeric = trajectory.component(0)?;
    let analytic: Vec<f64> = times
        .iter()
        .map(|&t| circuit.charge_at(t, voltage, 0.0))
        .collect();
    let errors: Vec<f64> = numeric
        .iter()
        .zip(&analytic)
        .filter(|(_, exact)| **exact > 0.0)
        .map(|(q, exact)| 100.0 * (q - exact).abs() / exact)
        .collect();
    if errors.is_empty() {
        anyhow::bail!("no positive analytic samples to compare against");
    }
    let mean_percent_error = errors.iter().sum::<f64>() / errors.len() as f64;
    let max_percent_error = errors.iter().copied().fold(0.0, f64::max);
    info!(mean_percent_error, max_percent_error, "RC comparison finished");

    Ok(RcComparison {
        times,
        numeric,
        analytic,
        mean_percent_error,
        max_percent_error,
    })
}

pub const DAMPING_RATIOS: [f64; 7] = [-1.8, -1.0, -0.2, 0.0, 0.2, 1.0, 1.8];

#[derive(Debug, Clone, Serialize)]
pub struct DampingResponse {
    pub damping_ratio: f64,
    pub displacement: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DampingSweep {
    pub times: Vec<f64>,
    pub responses: Vec<DampingResponse>,
}

/// Step response of the default mass-spring-damper to a 10 N force for
/// each ratio in [`DAMPING_RATIOS`], over 6 s.
pub fn damping_sweep() -> anyhow::Result<DampingSweep> {
    let force = InputSource::constant([10.0]);
    let times = linspace(0.0, 6.0, 601);
    let mut responses = Vec::with_capacity(DAMPING_RATIOS.len());
    for &zeta in &DAMPING_RATIOS {
        let model = MassSpringDamper::default().with_damping_ratio(zeta);
        let trajectory = simulate(
            &model,
            &force,
            &[0.0, 0.0],
            (0.0, 6.0),
            &times,
            &SolverSettings::default(),
        )
        .with_context(|| format!("damping ratio {zeta} failed"))?;
        debug!(zeta, steps = trajectory.stats().accepted, "damping run");
        responses.push(DampingResponse {
            damping_ratio: zeta,
            displacement: trajectory.component(0)?,
        });
    }
    Ok(DampingSweep { times, responses })
}

#[derive(Debug, Clone, Serialize)]
pub struct PrbsResponse {
    pub times: Vec<f64>,
    pub inflow: Vec<f64>,
    pub level: Vec<f64>,
}

/// Drives the cubic tank from `h = 0.2 m` with a PRBS inflow switching
/// between 0.3 and 1.0 m³/s every 20 s for 600 s.
pub fn cubic_tank_prbs(seed: u64) -> anyhow::Result<PrbsResponse> {
    let horizon = 600.0;
    let prbs = Prbs::covering(vec![0.3, 1.0], 20.0, horizon, seed)?;
    let times = linspace(0.0, horizon, 601);
    let inflow = times.iter().map(|&t| prbs.value_at(t)).collect();
    let trajectory = simulate(
        &CubicTank::default(),
        &InputSource::Prbs(prbs),
        &[0.2],
        (0.0, horizon),
        &times,
        &SolverSettings::default().with_max_step(5.0),
    )
    .context("PRBS tank run failed")?;
    Ok(PrbsResponse {
        times,
        inflow,
        level: trajectory.component(0)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PidPendulumRun {
    pub times: Vec<f64>,
    pub angle: Vec<f64>,
    pub cart_position: Vec<f64>,
    /// Force applied to the cart, recomputed from the sampled states.
    pub force: Vec<f64>,
}

/// Gains that hold the default cart pendulum upright.
pub fn default_pendulum_gains() -> PidController {
    PidController::new(-500.0, -300.0, -20.0)
}

/// Stabilizes the cart pendulum at `θ = 0` starting from
/// `initial_angle_deg`, with the angular rate as the derivative channel.
pub fn pid_inverted_pendulum(
    controller: PidController,
    initial_angle_deg: f64,
    horizon: f64,
) -> anyhow::Result<PidPendulumRun> {
    let plant = ErrorIntegrator::new(Implicit::new(CartPendulum::default()));
    let feedback = FeedbackLoop::new(controller, InputSource::constant([0.0]), 0, 0, &plant)?
        .with_rate_state(1)?;
    let x0 = plant.initial_state(&[initial_angle_deg.to_radians(), 0.0, 0.0, 0.0])?;
    let times = linspace(0.0, horizon, 201);
    let trajectory = simulate(
        &plant,
        &InputSource::controller(feedback.clone()),
        &x0,
        (0.0, horizon),
        &times,
        &SolverSettings::default(),
    )
    .context("closed-loop pendulum run failed")?;

    let force = feedback.control_signal(&trajectory)?;
    let angle = trajectory.component(0)?;
    if let Some(last) = angle.last() {
        info!(final_angle = *last, "PID pendulum run finished");
    }
    Ok(PidPendulumRun {
        times,
        angle,
        cart_position: trajectory.component(2)?,
        force,
    })
}

/// Operating point of the heated tank used by the linearization scenarios:
/// `(state, input)` with 0.4 m³/s inflow at 30 °C and 0.015 kg/s of steam.
pub fn heated_tank_operating_point(tank: &HeatedTank) -> ([f64; 2], [f64; 3]) {
    let input = [0.4, 0.015, celsius(30.0)];
    (tank.steady_state(input[0], input[1], input[2]), input)
}

fn heated_tank_schedule() -> anyhow::Result<InputSource> {
    Ok(InputSource::Channels(vec![
        InputSource::piecewise(vec![(0.0, 0.4), (100.0, 0.22), (1000.0, 0.5), (2000.0, 0.6)])?,
        InputSource::piecewise(vec![(0.0, 0.015), (1000.0, 0.002), (1500.0, 0.035)])?,
        InputSource::piecewise(vec![
            (0.0, celsius(30.0)),
            (2000.0, celsius(20.0)),
            (2500.0, celsius(40.0)),
        ])?,
    ]))
}

#[derive(Debug, Clone, Serialize)]
pub struct LinearizationComparison {
    pub operating_state: [f64; 2],
    pub operating_input: [f64; 3],
    /// `[L, T]` from the nonlinear model.
    pub nonlinear: Series,
    /// `[L, T]` from the linearized model, shifted back to absolute values.
    pub linear: Series,
}

/// Runs the heated tank and its linearization side by side through a
/// schedule of inflow, steam and inlet temperature steps over 3500 s.
pub fn heated_tank_linearization() -> anyhow::Result<LinearizationComparison> {
    let tank = HeatedTank::default();
    let (x0, u0) = heated_tank_operating_point(&tank);
    let inputs = heated_tank_schedule()?;
    let times = linspace(0.0, 3500.0, 701);
    let settings = SolverSettings::default().with_max_step(5.0);

    let nonlinear = simulate(
        &tank,
        &inputs,
        &x0,
        (0.0, 3500.0),
        &times,
        &settings.with_method(Method::Rosenbrock23),
    )
    .context("nonlinear heated tank run failed")?;

    let linear_model = linearize(&tank, &x0, &u0)?;
    let deviation = simulate(
        &linear_model,
        &inputs,
        &linear_model.deviation_state(&x0)?,
        (0.0, 3500.0),
        &times,
        &settings,
    )
    .context("linearized heated tank run failed")?;
    let linear = linear_model.to_absolute(&deviation)?;

    Ok(LinearizationComparison {
        operating_state: x0,
        operating_input: u0,
        nonlinear: Series::from_trajectory(&nonlinear)?,
        linear: Series::from_trajectory(&linear)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub output: usize,
    pub input: usize,
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
    pub poles: Vec<Complex<f64>>,
    pub dc_gain: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferAnalysis {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
    pub eigenvalues: Vec<Complex<f64>>,
    /// Nonzero entries only, row-major.
    pub entries: Vec<EntryReport>,
}

/// Transfer matrix of the heated tank linearized at its operating point.
pub fn heated_tank_transfer_analysis() -> anyhow::Result<TransferAnalysis> {
    let tank = HeatedTank::default();
    let (x0, u0) = heated_tank_operating_point(&tank);
    let linear_model = linearize(&tank, &x0, &u0)?;
    let matrix = linear_model.transfer_matrix()?;

    let mut entries = Vec::new();
    for output in 0..matrix.outputs() {
        for input in 0..matrix.inputs() {
            let TransferEntry::Rational(function) = matrix.entry(output, input) else {
                continue;
            };
            entries.push(EntryReport {
                output,
                input,
                numerator: function.numerator.coefficients().to_vec(),
                denominator: function.denominator.coefficients().to_vec(),
                poles: function
                    .poles()
                    .with_context(|| format!("poles of G[{output}][{input}]"))?,
                dc_gain: function.dc_gain(),
            });
        }
    }
    info!(entries = entries.len(), "heated tank transfer analysis");

    Ok(TransferAnalysis {
        a: rows(linear_model.a()),
        b: rows(linear_model.b()),
        eigenvalues: linear_model.eigenvalues(),
        entries,
    })
}

fn rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PendulumComparison {
    pub initial_angle_deg: f64,
    pub nonlinear_angle: Vec<f64>,
    pub linear_angle: Vec<f64>,
    pub max_deviation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendulumStudy {
    pub times: Vec<f64>,
    pub runs: Vec<PendulumComparison>,
}

/// Releases the simple pendulum from rest at each angle and compares it
/// with its linearization about the hanging position over 10 s.
pub fn pendulum_linear_vs_nonlinear(angles_deg: &[f64]) -> anyhow::Result<PendulumStudy> {
    let pendulum = Pendulum::default();
    let linear_model = linearize(&pendulum, &[0.0, 0.0], &[])?;
    let times = linspace(0.0, 10.0, 501);
    let settings = SolverSettings::default().with_tolerances(1e-8, 1e-10);

    let mut runs = Vec::with_capacity(angles_deg.len());
    for &angle in angles_deg {
        let x0 = [angle.to_radians(), 0.0];
        let nonlinear = simulate(
            &pendulum,
            &InputSource::none(),
            &x0,
            (0.0, 10.0),
            &times,
            &settings,
        )?;
        let linear = simulate(
            &linear_model,
            &InputSource::none(),
            &linear_model.deviation_state(&x0)?,
            (0.0, 10.0),
            &times,
            &settings,
        )?;
        let nonlinear_angle = nonlinear.component(0)?;
        let linear_angle = linear_model.to_absolute(&linear)?.component(0)?;
        let max_deviation = nonlinear_angle
            .iter()
            .zip(&linear_angle)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        debug!(angle, max_deviation, "pendulum comparison");
        runs.push(PendulumComparison {
            initial_angle_deg: angle,
            nonlinear_angle,
            linear_angle,
            max_deviation,
        });
    }
    Ok(PendulumStudy { times, runs })
}
