//! Single-step kernels used by the integrator.
//!
//! Each kernel takes one trial step from `(t, y)` with the derivative `f0`
//! already known and reports the new state, the derivative there and a
//! scaled error estimate. Step-size control lives in `integrator`.

use crate::error::{NumericalFailure, SimResult};
use crate::traits::DynamicalSystem;
use nalgebra::{DMatrix, DVector};
use std::cell::Cell;

/// Right-hand side with an evaluation counter.
pub(crate) struct Rhs<'a, S: ?Sized> {
    system: &'a S,
    calls: Cell<usize>,
}

impl<'a, S: DynamicalSystem + ?Sized> Rhs<'a, S> {
    pub fn new(system: &'a S) -> Self {
        Self {
            system,
            calls: Cell::new(0),
        }
    }

    pub fn call(&self, t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()> {
        self.calls.set(self.calls.get() + 1);
        self.system.apply(t, x, out)
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

/// Mixed absolute/relative tolerance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Tolerance {
    /// RMS of `err / (atol + rtol·max(|y0|, |y1|))`.
    pub fn scaled_norm(&self, err: &[f64], y0: &[f64], y1: &[f64]) -> f64 {
        if err.is_empty() {
            return 0.0;
        }
        let sum: f64 = err
            .iter()
            .zip(y0.iter().zip(y1))
            .map(|(e, (a, b))| {
                let scale = self.atol + self.rtol * a.abs().max(b.abs());
                (e / scale).powi(2)
            })
            .sum();
        (sum / err.len() as f64).sqrt()
    }
}

/// Outcome of one trial step.
pub(crate) struct Trial {
    pub y_new: Vec<f64>,
    pub f_new: Vec<f64>,
    /// Scaled error; `<= 1` accepts. Infinite when the step produced
    /// non-finite values.
    pub error: f64,
}

/// Data needed to evaluate the solution anywhere inside an accepted step.
pub(crate) enum DenseSegment {
    /// Cubic Hermite through both endpoints and their derivatives.
    Hermite {
        t0: f64,
        h: f64,
        y0: Vec<f64>,
        f0: Vec<f64>,
        y1: Vec<f64>,
        f1: Vec<f64>,
    },
    /// `y0 + h·Σ bᵢ(θ)·kᵢ` over all seven stages of an explicit pair.
    Interpolant {
        t0: f64,
        h: f64,
        y0: Vec<f64>,
        k: Vec<Vec<f64>>,
        weights: fn(f64) -> [f64; 7],
    },
    /// Continuous extension of the Rosenbrock 2(3) pair.
    Rosenbrock {
        t0: f64,
        h: f64,
        y0: Vec<f64>,
        k1: Vec<f64>,
        k2: Vec<f64>,
    },
}

impl DenseSegment {
    pub fn hermite(t0: f64, h: f64, y0: &[f64], f0: &[f64], trial: &Trial) -> Self {
        DenseSegment::Hermite {
            t0,
            h,
            y0: y0.to_vec(),
            f0: f0.to_vec(),
            y1: trial.y_new.clone(),
            f1: trial.f_new.clone(),
        }
    }

    pub fn evaluate(&self, t: f64, out: &mut [f64]) {
        match self {
            DenseSegment::Hermite {
                t0,
                h,
                y0,
                f0,
                y1,
                f1,
            } => {
                let s = (t - t0) / h;
                let h00 = (1.0 + 2.0 * s) * (1.0 - s).powi(2);
                let h10 = s * (1.0 - s).powi(2);
                let h01 = s * s * (3.0 - 2.0 * s);
                let h11 = s * s * (s - 1.0);
                for i in 0..out.len() {
                    out[i] = h00 * y0[i] + h10 * h * f0[i] + h01 * y1[i] + h11 * h * f1[i];
                }
            }
            DenseSegment::Interpolant {
                t0,
                h,
                y0,
                k,
                weights,
            } => {
                let b = weights((t - t0) / h);
                for i in 0..out.len() {
                    let acc: f64 = b.iter().zip(k).map(|(w, stage)| w * stage[i]).sum();
                    out[i] = y0[i] + h * acc;
                }
            }
            DenseSegment::Rosenbrock { t0, h, y0, k1, k2 } => {
                let s = (t - t0) / h;
                let w1 = s * (1.0 - s) / (1.0 - 2.0 * ROS_D);
                let w2 = s * (s - 2.0 * ROS_D) / (1.0 - 2.0 * ROS_D);
                for i in 0..out.len() {
                    out[i] = y0[i] + h * (w1 * k1[i] + w2 * k2[i]);
                }
            }
        }
    }
}

/// Seven-stage FSAL embedded pair. Stage 7 is evaluated at the new state
/// and only enters the error estimate.
pub(crate) struct ButcherTableau {
    pub c: [f64; 6],
    /// Row `s` holds the coefficients of stages `0..s`.
    pub a: [[f64; 5]; 6],
    pub b: [f64; 6],
    pub e: [f64; 7],
    /// Order of the embedded error estimate.
    pub error_order: i32,
    /// Continuous extension weights; `None` falls back to Hermite.
    pub interpolant: Option<fn(f64) -> [f64; 7]>,
}

// Tsit5 Coefficients
pub(crate) const TSIT5: ButcherTableau = ButcherTableau {
    c: [0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0],
    a: [
        [0.0, 0.0, 0.0, 0.0, 0.0],
        [0.161, 0.0, 0.0, 0.0, 0.0],
        [-0.008480655492356989, 0.335480655492357, 0.0, 0.0, 0.0],
        [2.897153057105493, -6.359448489975075, 4.3622954328695815, 0.0, 0.0],
        [
            5.325864828439257,
            -11.748883564062828,
            7.4955393428898365,
            -0.09249506636175525,
            0.0,
        ],
        [
            5.86145544294642,
            -12.92096931784711,
            8.159367898576159,
            -0.071584973281401,
            -0.028269050394068383,
        ],
    ],
    b: [
        0.09646076681806523,
        0.01,
        0.4798896504144996,
        1.379008574103742,
        -3.290069515436099,
        2.324710524099774,
    ],
    e: [
        -0.00178001105222577714,
        -0.0008164344596567469,
        0.007880878010261995,
        -0.1447110071732629,
        0.5823571654525552,
        -0.45808210592918697,
        0.015151515151515152,
    ],
    error_order: 4,
    interpolant: Some(tsit5_weights),
};

/// Tsitouras' free 4th-order interpolant, weights of `k1..k7` at `θ`.
fn tsit5_weights(theta: f64) -> [f64; 7] {
    let t = theta;
    let t2 = t * t;
    [
        -1.0530884977290216
            * t
            * (t - 1.3299890189751412)
            * (t2 - 1.4364028541716351 * t + 0.7139816917074209),
        0.1017 * t2 * (t2 - 2.1966568338249754 * t + 1.2949852507374631),
        2.490627285651253 * t2 * (t2 - 2.3853564547206166 * t + 1.5780346820809249),
        -16.548102889244902 * (t - 1.2171292729553325) * (t - 0.6162040603780009) * t2,
        47.37952196281928 * (t - 1.2030712083723626) * (t - 0.6580472926535474) * t2,
        -34.87065786149661 * (t - 1.2) * (t - 0.6666666666666666) * t2,
        2.5 * (t - 1.0) * (t - 0.6) * t2,
    ]
}

pub(crate) const DORMAND_PRINCE: ButcherTableau = ButcherTableau {
    c: [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0],
    a: [
        [0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
        [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
        [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
        [
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
            0.0,
        ],
        [
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
    ],
    b: [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
    e: [
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ],
    error_order: 4,
    interpolant: None,
};

/// Embedded explicit Runge-Kutta stepper over a [`ButcherTableau`].
pub(crate) struct ExplicitRk {
    tableau: &'static ButcherTableau,
    k: Vec<Vec<f64>>,
    tmp: Vec<f64>,
    err: Vec<f64>,
}

impl ExplicitRk {
    pub fn new(tableau: &'static ButcherTableau, dim: usize) -> Self {
        Self {
            tableau,
            k: vec![vec![0.0; dim]; 6],
            tmp: vec![0.0; dim],
            err: vec![0.0; dim],
        }
    }

    pub fn error_order(&self) -> i32 {
        self.tableau.error_order
    }

    pub fn attempt<S: DynamicalSystem + ?Sized>(
        &mut self,
        rhs: &Rhs<'_, S>,
        t: f64,
        y: &[f64],
        f0: &[f64],
        h: f64,
        tol: Tolerance,
    ) -> SimResult<Trial> {
        let tab = self.tableau;
        let n = y.len();
        self.k[0].copy_from_slice(f0);

        for s in 1..6 {
            for i in 0..n {
                let mut acc = 0.0;
                for j in 0..s {
                    acc += tab.a[s][j] * self.k[j][i];
                }
                self.tmp[i] = y[i] + h * acc;
            }
            rhs.call(t + tab.c[s] * h, &self.tmp, &mut self.k[s])?;
        }

        let mut y_new = vec![0.0; n];
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..6 {
                acc += tab.b[j] * self.k[j][i];
            }
            y_new[i] = y[i] + h * acc;
        }

        let mut f_new = vec![0.0; n];
        rhs.call(t + h, &y_new, &mut f_new)?;

        for i in 0..n {
            let mut acc = tab.e[6] * f_new[i];
            for j in 0..6 {
                acc += tab.e[j] * self.k[j][i];
            }
            self.err[i] = h * acc;
        }

        let error = finite_or_infinite(tol.scaled_norm(&self.err, y, &y_new), &y_new, &f_new);
        Ok(Trial {
            y_new,
            f_new,
            error,
        })
    }

    /// Dense output for the step just accepted; the stages of the last
    /// attempt must belong to `trial`.
    pub fn segment(&self, t0: f64, h: f64, y0: &[f64], f0: &[f64], trial: &Trial) -> DenseSegment {
        let Some(weights) = self.tableau.interpolant else {
            return DenseSegment::hermite(t0, h, y0, f0, trial);
        };
        let mut k = self.k.clone();
        k.push(trial.f_new.clone());
        DenseSegment::Interpolant {
            t0,
            h,
            y0: y0.to_vec(),
            k,
            weights,
        }
    }
}

// Rosenbrock23 Coefficients
pub(crate) const ROS_D: f64 = 0.2928932188134525; // 1 / (2 + sqrt(2))
const ROS_E32: f64 = 7.414213562373095; // 6 + sqrt(2)

/// Forward-difference linearization of the right-hand side at one point.
struct Linearization {
    t: f64,
    jacobian: DMatrix<f64>,
    /// `∂f/∂t`
    dfdt: Vec<f64>,
}

/// Linearly implicit Rosenbrock 2(3) stepper, L-stable, for stiff systems.
///
/// `∂f/∂y` and `∂f/∂t` are approximated by forward differences and reused
/// while the step is retried from the same point.
pub(crate) struct Rosenbrock23 {
    linearization: Option<Linearization>,
    k1: Vec<f64>,
    k2: Vec<f64>,
}

impl Rosenbrock23 {
    pub fn new(dim: usize) -> Self {
        Self {
            linearization: None,
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
        }
    }

    pub fn error_order(&self) -> i32 {
        2
    }

    pub fn attempt<S: DynamicalSystem + ?Sized>(
        &mut self,
        rhs: &Rhs<'_, S>,
        t: f64,
        y: &[f64],
        f0: &[f64],
        h: f64,
        tol: Tolerance,
    ) -> SimResult<Trial> {
        let n = y.len();
        let lin = match self.linearization.take() {
            Some(lin) if lin.t == t => lin,
            _ => Linearization {
                t,
                jacobian: finite_difference_jacobian(rhs, t, y, f0)?,
                dfdt: finite_difference_time_derivative(rhs, t, y, f0)?,
            },
        };

        let hd = h * ROS_D;
        let w = DMatrix::<f64>::identity(n, n) - &lin.jacobian * hd;
        let lu = w.lu();
        let solve = |b: DVector<f64>| {
            lu.solve(&b).ok_or(NumericalFailure::SingularMatrix {
                what: "Rosenbrock iteration matrix",
                t: Some(t),
            })
        };

        let k1 = solve(DVector::from_iterator(
            n,
            (0..n).map(|i| f0[i] + hd * lin.dfdt[i]),
        ))?;

        let mut stage = vec![0.0; n];
        for i in 0..n {
            stage[i] = y[i] + 0.5 * h * k1[i];
        }
        let mut f1 = vec![0.0; n];
        rhs.call(t + 0.5 * h, &stage, &mut f1)?;

        let k2 = solve(DVector::from_iterator(n, (0..n).map(|i| f1[i] - k1[i])))? + &k1;

        let y_new: Vec<f64> = (0..n).map(|i| y[i] + h * k2[i]).collect();
        let mut f_new = vec![0.0; n];
        rhs.call(t + h, &y_new, &mut f_new)?;

        let k3 = solve(DVector::from_iterator(
            n,
            (0..n).map(|i| {
                f_new[i] - ROS_E32 * (k2[i] - f1[i]) - 2.0 * (k1[i] - f0[i]) + hd * lin.dfdt[i]
            }),
        ))?;

        let err: Vec<f64> = (0..n)
            .map(|i| h / 6.0 * (k1[i] - 2.0 * k2[i] + k3[i]))
            .collect();
        let error = finite_or_infinite(tol.scaled_norm(&err, y, &y_new), &y_new, &f_new);

        self.linearization = Some(lin);
        self.k1.copy_from_slice(k1.as_slice());
        self.k2.copy_from_slice(k2.as_slice());
        Ok(Trial {
            y_new,
            f_new,
            error,
        })
    }

    /// Dense output for the step just accepted.
    pub fn segment(&self, t0: f64, h: f64, y0: &[f64]) -> DenseSegment {
        DenseSegment::Rosenbrock {
            t0,
            h,
            y0: y0.to_vec(),
            k1: self.k1.clone(),
            k2: self.k2.clone(),
        }
    }
}

/// Classic Runge-Kutta 4th Order Solver, fixed step.
pub(crate) struct Rk4 {
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk4 {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// `k1` is the known derivative `f0`; the returned trial carries
    /// `f(t + h, y_new)` so the next step can reuse it.
    pub fn step<S: DynamicalSystem + ?Sized>(
        &mut self,
        rhs: &Rhs<'_, S>,
        t: f64,
        y: &[f64],
        f0: &[f64],
        h: f64,
    ) -> SimResult<Trial> {
        let n = y.len();

        // k2 = f(t + h/2, y + h*k1/2)
        for i in 0..n {
            self.tmp[i] = y[i] + 0.5 * h * f0[i];
        }
        rhs.call(t + 0.5 * h, &self.tmp, &mut self.k2)?;

        // k3 = f(t + h/2, y + h*k2/2)
        for i in 0..n {
            self.tmp[i] = y[i] + 0.5 * h * self.k2[i];
        }
        rhs.call(t + 0.5 * h, &self.tmp, &mut self.k3)?;

        // k4 = f(t + h, y + h*k3)
        for i in 0..n {
            self.tmp[i] = y[i] + h * self.k3[i];
        }
        rhs.call(t + h, &self.tmp, &mut self.k4)?;

        // y_next = y + h/6 * (k1 + 2k2 + 2k3 + k4)
        let y_new: Vec<f64> = (0..n)
            .map(|i| y[i] + h / 6.0 * (f0[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]))
            .collect();
        let mut f_new = vec![0.0; n];
        rhs.call(t + h, &y_new, &mut f_new)?;

        let error = finite_or_infinite(0.0, &y_new, &f_new);
        Ok(Trial {
            y_new,
            f_new,
            error,
        })
    }
}

/// Forward-difference Jacobian of the right-hand side at `(t, y)`.
pub(crate) fn finite_difference_jacobian<S: DynamicalSystem + ?Sized>(
    rhs: &Rhs<'_, S>,
    t: f64,
    y: &[f64],
    f0: &[f64],
) -> SimResult<DMatrix<f64>> {
    let n = y.len();
    let sqrt_eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::zeros(n, n);
    let mut shifted = y.to_vec();
    let mut f = vec![0.0; n];
    for j in 0..n {
        let delta = sqrt_eps * y[j].abs().max(1.0);
        shifted[j] = y[j] + delta;
        // representable step
        let delta = shifted[j] - y[j];
        rhs.call(t, &shifted, &mut f)?;
        shifted[j] = y[j];
        for i in 0..n {
            jac[(i, j)] = (f[i] - f0[i]) / delta;
        }
    }
    if jac.iter().any(|v| !v.is_finite()) {
        return Err(NumericalFailure::NonFinite {
            what: "finite-difference Jacobian",
            t,
        }
        .into());
    }
    Ok(jac)
}

/// Forward-difference `∂f/∂t` at `(t, y)`.
pub(crate) fn finite_difference_time_derivative<S: DynamicalSystem + ?Sized>(
    rhs: &Rhs<'_, S>,
    t: f64,
    y: &[f64],
    f0: &[f64],
) -> SimResult<Vec<f64>> {
    let delta = f64::EPSILON.sqrt() * t.abs().max(1.0);
    let delta = (t + delta) - t;
    let mut f = vec![0.0; y.len()];
    rhs.call(t + delta, y, &mut f)?;
    let dfdt: Vec<f64> = f.iter().zip(f0).map(|(a, b)| (a - b) / delta).collect();
    if dfdt.iter().any(|v| !v.is_finite()) {
        return Err(NumericalFailure::NonFinite {
            what: "finite-difference time derivative",
            t,
        }
        .into());
    }
    Ok(dfdt)
}

fn finite_or_infinite(error: f64, y: &[f64], f: &[f64]) -> f64 {
    if error.is_finite() && y.iter().chain(f).all(|v| v.is_finite()) {
        error
    } else {
        f64::INFINITY
    }
}
