//! Unforced nonlinear oscillators. State `[x, v]` throughout, no inputs.

use crate::constants::GRAVITY;
use odesim_core::{Scalar, SimResult, StateSpaceModel};
use serde::{Deserialize, Serialize};

/// `x'' = μ·(1 - x²)·x' - x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VanDerPol {
    pub mu: f64,
}

impl Default for VanDerPol {
    fn default() -> Self {
        Self { mu: 1.0 }
    }
}

impl<T: Scalar> StateSpaceModel<T> for VanDerPol {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        0
    }

    fn derivative(&self, _t: T, x: &[T], _u: &[T], out: &mut [T]) -> SimResult<()> {
        let (position, velocity) = (x[0], x[1]);
        out[0] = velocity;
        out[1] = T::lift(self.mu) * (T::one() - position * position) * velocity - position;
        Ok(())
    }
}

/// Hardening spring without damping, `x'' = -α·x - x³`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Duffing {
    pub alpha: f64,
}

impl Default for Duffing {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Duffing {
    /// Conserved energy `v²/2 + α·x²/2 + x⁴/4`.
    pub fn energy(&self, x: &[f64]) -> f64 {
        let (position, velocity) = (x[0], x[1]);
        0.5 * velocity * velocity + 0.5 * self.alpha * position * position + 0.25 * position.powi(4)
    }
}

impl<T: Scalar> StateSpaceModel<T> for Duffing {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        0
    }

    fn derivative(&self, _t: T, x: &[T], _u: &[T], out: &mut [T]) -> SimResult<()> {
        let position = x[0];
        out[0] = x[1];
        out[1] = -T::lift(self.alpha) * position - position * position * position;
        Ok(())
    }
}

/// Frictionless simple pendulum, `θ'' = -(g / L)·sin θ`.
///
/// State: `[θ, ω]`, angle from the downward vertical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pendulum {
    pub length: f64,
    pub gravity: f64,
}

impl Default for Pendulum {
    fn default() -> Self {
        Self {
            length: 1.0,
            gravity: GRAVITY,
        }
    }
}

impl Pendulum {
    /// Small-angle period `2π·sqrt(L / g)`.
    pub fn small_angle_period(&self) -> f64 {
        std::f64::consts::TAU * (self.length / self.gravity).sqrt()
    }
}

impl<T: Scalar> StateSpaceModel<T> for Pendulum {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        0
    }

    fn derivative(&self, _t: T, x: &[T], _u: &[T], out: &mut [T]) -> SimResult<()> {
        out[0] = x[1];
        out[1] = -T::lift(self.gravity / self.length) * x[0].sin();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odesim_core::{linspace, simulate, InputSource, SolverSettings};

    fn tight() -> SolverSettings {
        SolverSettings::default().with_tolerances(1e-9, 1e-11)
    }

    #[test]
    fn duffing_conserves_energy() {
        let duffing = Duffing::default();
        let trajectory = simulate(
            &duffing,
            &InputSource::none(),
            &[1.0, 0.0],
            (0.0, 10.0),
            &linspace(0.0, 10.0, 51),
            &tight(),
        )
        .unwrap();
        let initial = duffing.energy(&[1.0, 0.0]);
        for (_, x) in trajectory.iter() {
            assert!((duffing.energy(x) - initial).abs() < 1e-6);
        }
    }

    #[test]
    fn van_der_pol_reaches_its_limit_cycle() {
        let trajectory = simulate(
            &VanDerPol::default(),
            &InputSource::none(),
            &[1.0, 0.0],
            (0.0, 50.0),
            &linspace(30.0, 50.0, 2001),
            &tight(),
        )
        .unwrap();
        let amplitude = trajectory
            .iter()
            .map(|(_, x)| x[0].abs())
            .fold(0.0, f64::max);
        // the μ = 1 cycle peaks at x ≈ 2.009
        assert!((amplitude - 2.009).abs() < 0.01);
    }

    #[test]
    fn small_swings_keep_the_linear_period() {
        let pendulum = Pendulum::default();
        let period = pendulum.small_angle_period();
        let trajectory = simulate(
            &pendulum,
            &InputSource::none(),
            &[0.01, 0.0],
            (0.0, period),
            &[period],
            &tight(),
        )
        .unwrap();
        let x = trajectory.final_state().unwrap();
        assert!((x[0] - 0.01).abs() < 1e-6);
    }
}
