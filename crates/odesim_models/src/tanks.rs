//! Liquid tanks and gas vessels.

use crate::constants::{GAS_CONSTANT, GRAVITY};
use odesim_core::{Scalar, SimResult, StateSpaceModel};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Square tank draining by gravity through a bottom pipe with quadratic
/// friction, `A·dh/dt = Q_in - α·sqrt(h)`.
///
/// State: `[h]` level [m]. Input: `[Q_in]` [m³/s].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubicTank {
    /// Tank side length [m].
    pub side: f64,
    pub pipe_diameter: f64,
    /// Pipe friction coefficient [kg/m].
    pub friction: f64,
    pub density: f64,
    pub gravity: f64,
}

impl Default for CubicTank {
    fn default() -> Self {
        Self {
            side: 4.0,
            pipe_diameter: 0.20,
            friction: 1.0,
            density: 1000.0,
            gravity: GRAVITY,
        }
    }
}

impl CubicTank {
    pub fn area(&self) -> f64 {
        self.side * self.side
    }

    pub fn pipe_area(&self) -> f64 {
        PI * (self.pipe_diameter / 2.0).powi(2)
    }

    /// Outlet discharge parameter `α` [m^2.5/s].
    pub fn discharge(&self) -> f64 {
        let specific_weight = self.density * self.gravity;
        self.pipe_area() * (specific_weight * self.pipe_area() / self.friction).sqrt()
    }

    /// Level at which the outflow matches a constant inflow.
    pub fn equilibrium_level(&self, inflow: f64) -> f64 {
        (inflow / self.discharge()).powi(2)
    }
}

impl<T: Scalar> StateSpaceModel<T> for CubicTank {
    fn dimension(&self) -> usize {
        1
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        out[0] = (u[0] - T::lift(self.discharge()) * x[0].sqrt()) / T::lift(self.area());
        Ok(())
    }
}

/// Square tank whose inflow and outflow are both imposed by pumps.
///
/// The level cannot fall below the floor or rise above the rim: at either
/// wall a derivative pushing outward is zeroed.
///
/// State: `[h]`. Inputs: `[Q_in, Q_out]` [m³/s].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpedTank {
    pub side: f64,
}

impl Default for PumpedTank {
    fn default() -> Self {
        Self { side: 4.0 }
    }
}

impl<T: Scalar> StateSpaceModel<T> for PumpedTank {
    fn dimension(&self) -> usize {
        1
    }

    fn input_dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let level = x[0];
        let rate = (u[0] - u[1]) / T::lift(self.side * self.side);
        let empty = level <= T::zero() && rate < T::zero();
        let full = level >= T::lift(self.side) && rate > T::zero();
        out[0] = if empty || full { T::zero() } else { rate };
        Ok(())
    }
}

/// [`CubicTank`] with the inertia of the liquid column in the outlet pipe.
///
/// State: `[h, v_p]`, level [m] and pipe velocity [m/s]. Input: `[Q_in]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankWithPipeMomentum {
    pub tank: CubicTank,
    pub pipe_length: f64,
}

impl Default for TankWithPipeMomentum {
    fn default() -> Self {
        Self {
            tank: CubicTank::default(),
            pipe_length: 1.0,
        }
    }
}

impl TankWithPipeMomentum {
    /// Mass of liquid inside the pipe [kg].
    pub fn pipe_mass(&self) -> f64 {
        self.tank.density * self.tank.pipe_area() * self.pipe_length
    }
}

impl<T: Scalar> StateSpaceModel<T> for TankWithPipeMomentum {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let (level, velocity) = (x[0], x[1]);
        let pipe_area = T::lift(self.tank.pipe_area());
        let specific_weight = T::lift(self.tank.density * self.tank.gravity);
        out[0] = (u[0] - pipe_area * velocity) / T::lift(self.tank.area());
        out[1] = (specific_weight * pipe_area * level
            - T::lift(self.tank.friction) * velocity * velocity)
            / T::lift(self.pipe_mass());
        Ok(())
    }
}

/// Inverted cone (apex down) with a square-root outlet.
///
/// State: `[h]`. Input: `[q_in]` [m³/s].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConicalTank {
    pub height: f64,
    pub top_radius: f64,
    /// [m^2.5/s]
    pub discharge: f64,
}

impl Default for ConicalTank {
    fn default() -> Self {
        Self {
            height: 4.0,
            top_radius: 1.5,
            discharge: 0.8,
        }
    }
}

impl<T: Scalar> StateSpaceModel<T> for ConicalTank {
    fn dimension(&self) -> usize {
        1
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let h = x[0];
        let shape = T::lift(self.height * self.height / (PI * self.top_radius * self.top_radius));
        out[0] = shape * (u[0] / (h * h) - T::lift(self.discharge) / (h * h * h).sqrt());
        Ok(())
    }
}

/// Properties of liquid water and its condensing steam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterProperties {
    /// [kg/m³]
    pub density: f64,
    /// [J/(kg·K)]
    pub heat_capacity: f64,
    /// Condensate density at 100 °C [kg/m³].
    pub condensate_density: f64,
    /// Latent heat of condensation [J/kg].
    pub latent_heat: f64,
}

impl Default for WaterProperties {
    fn default() -> Self {
        Self {
            density: 1000.0,
            heat_capacity: 4180.0,
            condensate_density: 958.0,
            latent_heat: 2.256e6,
        }
    }
}

impl WaterProperties {
    /// Heat released by condensing a volumetric flow `q` [W].
    fn condensation_heat<T: Scalar>(&self, q: T) -> T {
        T::lift(self.condensate_density * self.latent_heat) * q
    }
}

/// Cylindrical tank heated by a steam jacket, draining through a
/// square-root outlet.
///
/// State: `[L, T]`, level [m] and liquid temperature [K].
/// Inputs: `[q_in, q_j, T_in]`, inlet flow [m³/s], jacket condensate flow
/// [m³/s] and inlet temperature [K].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatedTank {
    pub water: WaterProperties,
    /// Cross-sectional area [m²].
    pub area: f64,
    /// [m^2.5/s]
    pub discharge: f64,
}

impl Default for HeatedTank {
    fn default() -> Self {
        Self {
            water: WaterProperties::default(),
            area: PI * 1.5 * 1.5,
            discharge: 0.12,
        }
    }
}

impl HeatedTank {
    /// Closed-form operating point `[L, T]` for constant inputs.
    pub fn steady_state(&self, inflow: f64, condensate: f64, inlet_temperature: f64) -> [f64; 2] {
        let w = &self.water;
        let level = (inflow / self.discharge).powi(2);
        let heating = w.condensation_heat(condensate) / (w.density * inflow * w.heat_capacity);
        [level, inlet_temperature + heating]
    }
}

impl<T: Scalar> StateSpaceModel<T> for HeatedTank {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        3
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let w = &self.water;
        let (level, temperature) = (x[0], x[1]);
        let (inflow, condensate, inlet_temperature) = (u[0], u[1], u[2]);
        let rho_cp = T::lift(w.density * w.heat_capacity);
        let area = T::lift(self.area);

        out[0] = (inflow - T::lift(self.discharge) * level.sqrt()) / area;
        let heat_in = rho_cp * inflow * (inlet_temperature - temperature);
        out[1] = (heat_in + w.condensation_heat(condensate)) / (rho_cp * area * level);
        Ok(())
    }
}

/// Stirred tank mixing two feeds of species A and B, heated by condensing
/// steam.
///
/// State: `[V, C_A, C_B, T]`.
/// Inputs: `[q1, q2, q, C_A1, C_A2, C_B1, C_B2, T1, T2, q_c]`: the two feed
/// flows and the outflow [m³/s], feed concentrations [mol/m³], feed
/// temperatures [K] and the condensate flow [m³/s].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerWithHeating {
    pub water: WaterProperties,
}

impl<T: Scalar> StateSpaceModel<T> for MixerWithHeating {
    fn dimension(&self) -> usize {
        4
    }

    fn input_dimension(&self) -> usize {
        10
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let w = &self.water;
        let (volume, c_a, c_b, temperature) = (x[0], x[1], x[2], x[3]);
        let (q1, q2, q) = (u[0], u[1], u[2]);
        let (c_a1, c_a2, c_b1, c_b2) = (u[3], u[4], u[5], u[6]);
        let (t1, t2, q_c) = (u[7], u[8], u[9]);
        let rho_cp = T::lift(w.density * w.heat_capacity);

        out[0] = q1 + q2 - q;
        out[1] = ((c_a1 - c_a) * q1 + (c_a2 - c_a) * q2) / volume;
        out[2] = ((c_b1 - c_b) * q1 + (c_b2 - c_b) * q2) / volume;
        let heat_in = rho_cp * (q1 * (t1 - temperature) + q2 * (t2 - temperature))
            + w.condensation_heat(q_c);
        out[3] = heat_in / (rho_cp * volume);
        Ok(())
    }
}

/// Rigid gas vessel at constant temperature between an inlet and an outlet
/// restriction.
///
/// State: `[P]` vessel pressure [Pa]. Inputs: `[P1, P2]`, upstream and
/// downstream pressures [Pa]. Valid for `P2 <= P <= P1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsothermalAccumulator {
    /// [m³]
    pub volume: f64,
    /// [kg/mol]
    pub molar_mass: f64,
    /// [K]
    pub temperature: f64,
    /// [kg/(s·Pa^0.5)]
    pub inlet_coefficient: f64,
    pub outlet_coefficient: f64,
}

impl Default for IsothermalAccumulator {
    fn default() -> Self {
        Self {
            volume: 1.0,
            molar_mass: 0.0289647,
            temperature: 293.0,
            inlet_coefficient: 0.01,
            outlet_coefficient: 0.015,
        }
    }
}

impl IsothermalAccumulator {
    /// Pressure at which inflow and outflow balance.
    pub fn equilibrium_pressure(&self, upstream: f64, downstream: f64) -> f64 {
        let k1 = self.inlet_coefficient.powi(2);
        let k2 = self.outlet_coefficient.powi(2);
        (k1 * upstream + k2 * downstream) / (k1 + k2)
    }
}

impl<T: Scalar> StateSpaceModel<T> for IsothermalAccumulator {
    fn dimension(&self) -> usize {
        1
    }

    fn input_dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let p = x[0];
        let gain = T::lift(GAS_CONSTANT * self.temperature / (self.volume * self.molar_mass));
        let inflow = T::lift(self.inlet_coefficient) * (u[0] - p).sqrt();
        let outflow = T::lift(self.outlet_coefficient) * (p - u[1]).sqrt();
        out[0] = gain * (inflow - outflow);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{celsius, ATM};
    use odesim_core::{linspace, simulate, solve_equilibrium, InputSource, NewtonSettings, SolverSettings};

    fn tight() -> SolverSettings {
        SolverSettings::default().with_tolerances(1e-8, 1e-10)
    }

    #[test]
    fn cubic_tank_fills_to_its_equilibrium() {
        let tank = CubicTank::default();
        let target = tank.equilibrium_level(1.0);
        assert!((target - 3.2888).abs() < 1e-3);
        let trajectory = simulate(
            &tank,
            &InputSource::constant([1.0]),
            &[0.1],
            (0.0, 3000.0),
            &[3000.0],
            &tight(),
        )
        .unwrap();
        assert!((trajectory.final_state().unwrap()[0] - target).abs() < 1e-4);
    }

    #[test]
    fn pumped_tank_stops_at_the_floor() {
        let tank = PumpedTank::default();
        let trajectory = simulate(
            &tank,
            &InputSource::constant([0.3, 0.7]),
            &[2.0],
            (0.0, 100.0),
            &[40.0, 100.0],
            &SolverSettings::default(),
        )
        .unwrap();
        // empties at 2 m · 16 m² / 0.4 m³/s = 80 s
        assert!((trajectory.state(0)[0] - 1.0).abs() < 1e-9);
        assert!(trajectory.state(1)[0].abs() < 1e-3);

        let mut out = [1.0];
        StateSpaceModel::<f64>::derivative(&tank, 0.0, &[4.0], &[0.7, 0.3], &mut out).unwrap();
        assert_eq!(out, [0.0]);
    }

    #[test]
    fn pipe_momentum_does_not_move_the_equilibrium() {
        let model = TankWithPipeMomentum::default();
        let expected_level = model.tank.equilibrium_level(1.0);
        let expected_velocity = 1.0 / model.tank.pipe_area();
        let result = solve_equilibrium(
            &model,
            &[1.0],
            &[3.0, 30.0],
            NewtonSettings::default(),
        )
        .unwrap();
        assert!((result.state[0] - expected_level).abs() < 1e-9);
        assert!((result.state[1] - expected_velocity).abs() < 1e-9);
    }

    #[test]
    fn conical_tank_settles() {
        let tank = ConicalTank::default();
        let trajectory = simulate(
            &tank,
            &InputSource::constant([1.5]),
            &[0.5],
            (0.0, 400.0),
            &[400.0],
            &tight(),
        )
        .unwrap();
        // q / h² = k / h^1.5  =>  h = (q / k)²
        let expected = (1.5f64 / 0.8).powi(2);
        assert!((trajectory.final_state().unwrap()[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn heated_tank_steady_state_matches_newton() {
        let tank = HeatedTank::default();
        let inputs = [0.4, 0.015, celsius(30.0)];
        let closed_form = tank.steady_state(inputs[0], inputs[1], inputs[2]);
        assert!((closed_form[0] - 11.111111111111).abs() < 1e-9);
        assert!((closed_form[1] - 322.5391866028708).abs() < 1e-9);

        let result =
            solve_equilibrium(&tank, &inputs, &[10.0, 320.0], NewtonSettings::default()).unwrap();
        assert!((result.state[0] - closed_form[0]).abs() < 1e-6);
        assert!((result.state[1] - closed_form[1]).abs() < 1e-6);
        assert!(result.is_stable());
    }

    #[test]
    fn mixer_approaches_the_feed_blend() {
        let mixer = MixerWithHeating::default();
        let (q1, q2) = (0.10, 0.08);
        let input = InputSource::constant([
            q1,
            q2,
            q1 + q2,
            2.0,
            1.5,
            3.0,
            2.5,
            celsius(25.0),
            celsius(35.0),
            0.0,
        ]);
        let trajectory = simulate(
            &mixer,
            &input,
            &[2.0, 1.0, 1.0, celsius(28.0)],
            (0.0, 300.0),
            &linspace(0.0, 300.0, 4),
            &tight(),
        )
        .unwrap();
        let last = trajectory.final_state().unwrap();
        let blend = |a: f64, b: f64| (a * q1 + b * q2) / (q1 + q2);
        assert!((last[0] - 2.0).abs() < 1e-9);
        assert!((last[1] - blend(2.0, 1.5)).abs() < 1e-6);
        assert!((last[2] - blend(3.0, 2.5)).abs() < 1e-6);
        assert!((last[3] - blend(celsius(25.0), celsius(35.0))).abs() < 1e-4);
    }

    #[test]
    fn accumulator_pressure_balances_the_restrictions() {
        let vessel = IsothermalAccumulator::default();
        let (upstream, downstream) = (2.0 * ATM, ATM);
        let trajectory = simulate(
            &vessel,
            &InputSource::constant([upstream, downstream]),
            &[1.5 * ATM],
            (0.0, 3.0),
            &[3.0],
            &tight(),
        )
        .unwrap();
        let expected = vessel.equilibrium_pressure(upstream, downstream);
        let reached = trajectory.final_state().unwrap()[0];
        assert!((reached - expected).abs() / expected < 1e-4);
    }
}
