//! Translational and rotational mechanisms.

use crate::constants::GRAVITY;
use odesim_core::{
    BoundPolicy, ConfigurationError, MassMatrixSystem, Scalar, SimResult, StateBound, StateBounds,
    StateSpaceModel,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mass on a linear spring with viscous damping.
///
/// State: `[x, v]` [m, m/s]. Input: `[F]` external force [N].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MassSpringDamper {
    pub mass: f64,
    pub damping: f64,
    pub stiffness: f64,
}

impl Default for MassSpringDamper {
    fn default() -> Self {
        Self {
            mass: 1.0,
            damping: 2.0,
            stiffness: 20.0,
        }
    }
}

impl MassSpringDamper {
    /// Same mass and spring, damping set from the ratio `ζ = c / (2·sqrt(k·m))`.
    /// Negative ratios give an unstable, energy-injecting damper.
    pub fn with_damping_ratio(self, zeta: f64) -> Self {
        Self {
            damping: zeta * 2.0 * (self.stiffness * self.mass).sqrt(),
            ..self
        }
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    pub fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    /// Static displacement under a constant force.
    pub fn static_deflection(&self, force: f64) -> f64 {
        force / self.stiffness
    }
}

impl<T: Scalar> StateSpaceModel<T> for MassSpringDamper {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let (position, velocity) = (x[0], x[1]);
        out[0] = velocity;
        out[1] = (u[0] - T::lift(self.damping) * velocity - T::lift(self.stiffness) * position)
            / T::lift(self.mass);
        Ok(())
    }
}

/// Two masses coupled by one spring-damper; the force acts on the second.
///
/// State: `[x1, v1, x2, v2]`. Input: `[F]` on mass 2 [N].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoMassSpringDamper {
    pub mass1: f64,
    pub mass2: f64,
    pub damping: f64,
    pub stiffness: f64,
}

impl Default for TwoMassSpringDamper {
    fn default() -> Self {
        Self {
            mass1: 5.0,
            mass2: 2.0,
            damping: 1.0,
            stiffness: 8.0,
        }
    }
}

impl<T: Scalar> StateSpaceModel<T> for TwoMassSpringDamper {
    fn dimension(&self) -> usize {
        4
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let stretch = x[2] - x[0];
        let rate = x[3] - x[1];
        let coupling = T::lift(self.damping) * rate + T::lift(self.stiffness) * stretch;
        out[0] = x[1];
        out[1] = coupling / T::lift(self.mass1);
        out[2] = x[3];
        out[3] = (u[0] - coupling) / T::lift(self.mass2);
        Ok(())
    }
}

/// Armature-controlled DC motor with negligible inductance.
///
/// State: `[θ, ω]` [rad, rad/s]. Input: `[ε]` armature voltage [V].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcMotor {
    /// [kg·m²]
    pub inertia: f64,
    /// [N·m·s/rad]
    pub friction: f64,
    /// [N·m/A]
    pub torque_constant: f64,
    /// [V·s/rad]
    pub back_emf_constant: f64,
    pub resistance: f64,
}

impl Default for DcMotor {
    fn default() -> Self {
        Self {
            inertia: 0.03,
            friction: 0.02,
            torque_constant: 0.01,
            back_emf_constant: 0.01,
            resistance: 10.0,
        }
    }
}

impl DcMotor {
    fn effective_friction(&self) -> f64 {
        self.torque_constant * self.back_emf_constant / self.resistance + self.friction
    }

    /// Speed reached under a constant voltage.
    pub fn steady_speed(&self, voltage: f64) -> f64 {
        self.torque_constant / self.resistance * voltage / self.effective_friction()
    }
}

impl<T: Scalar> StateSpaceModel<T> for DcMotor {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let omega = x[1];
        let drive = T::lift(self.torque_constant / self.resistance) * u[0];
        out[0] = omega;
        out[1] = (drive - T::lift(self.effective_friction()) * omega) / T::lift(self.inertia);
        Ok(())
    }
}

/// Uniform rod swinging about one end, with viscous damping at the pivot.
///
/// State: `[θ, ω]`, angle from the downward vertical. No inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalPendulum {
    pub mass: f64,
    /// Pivot to center of mass; the rod is twice as long [m].
    pub half_length: f64,
    /// [N·m·s/rad]
    pub damping: f64,
    pub gravity: f64,
}

impl Default for PhysicalPendulum {
    fn default() -> Self {
        Self {
            mass: 1.0,
            half_length: 0.5,
            damping: 0.3,
            gravity: GRAVITY,
        }
    }
}

impl PhysicalPendulum {
    /// Moment of inertia about the pivot [kg·m²].
    pub fn inertia(&self) -> f64 {
        self.mass * (2.0 * self.half_length).powi(2) / 3.0
    }
}

impl<T: Scalar> StateSpaceModel<T> for PhysicalPendulum {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        0
    }

    fn derivative(&self, _t: T, x: &[T], _u: &[T], out: &mut [T]) -> SimResult<()> {
        let (theta, omega) = (x[0], x[1]);
        let restoring = T::lift(3.0 * self.gravity / (4.0 * self.half_length));
        out[0] = omega;
        out[1] = -T::lift(self.damping / self.inertia()) * omega - restoring * theta.sin();
        Ok(())
    }
}

/// Inverted pendulum (uniform rod) on a cart with viscous rail friction.
///
/// State: `[θ, ω, x, v]`, `θ` measured from upright. Input: `[F]` on the cart.
/// The rod and cart accelerations are coupled, so the model is given in
/// mass-matrix form; wrap it in `Implicit` to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPendulum {
    pub cart_mass: f64,
    pub pole_mass: f64,
    /// Pivot to the rod's center of mass [m].
    pub half_length: f64,
    /// [N·s/m]
    pub cart_damping: f64,
    pub gravity: f64,
}

impl Default for CartPendulum {
    fn default() -> Self {
        Self {
            cart_mass: 1.0,
            pole_mass: 0.2,
            half_length: 0.5,
            cart_damping: 10.0,
            gravity: GRAVITY,
        }
    }
}

impl CartPendulum {
    /// Rod inertia about its center of mass [kg·m²].
    pub fn pole_inertia(&self) -> f64 {
        self.pole_mass * (2.0 * self.half_length).powi(2) / 12.0
    }
}

impl<T: Scalar> MassMatrixSystem<T> for CartPendulum {
    fn dimension(&self) -> usize {
        4
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn mass_matrix(&self, x: &[T], out: &mut [T]) -> SimResult<()> {
        let ml = self.pole_mass * self.half_length;
        let coupling = T::lift(ml) * x[0].cos();
        out.fill(T::zero());
        out[0] = T::one();
        out[5] = T::lift(ml * self.half_length + self.pole_inertia());
        out[7] = coupling;
        out[10] = T::one();
        out[13] = coupling;
        out[15] = T::lift(self.cart_mass + self.pole_mass);
        Ok(())
    }

    fn forcing(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let (theta, omega, velocity) = (x[0], x[1], x[3]);
        let ml = T::lift(self.pole_mass * self.half_length);
        out[0] = omega;
        out[1] = ml * T::lift(self.gravity) * theta.sin();
        out[2] = velocity;
        out[3] = u[0] - T::lift(self.cart_damping) * velocity + ml * omega * omega * theta.sin();
        Ok(())
    }
}

/// Travel limits shared by the valve models: `(min, max)` stem position.
fn travel_bounds(min: f64, max: f64, policy: BoundPolicy) -> Result<StateBounds, ConfigurationError> {
    Ok(StateBounds::new(vec![StateBound::new(0, min, max)?], policy))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PneumaticValveParameters {
    /// Moving mass [kg].
    pub mass: f64,
    /// [N·s/m]
    pub damping: f64,
    /// [N/m]
    pub stiffness: f64,
    /// Diaphragm area [m²].
    pub area: f64,
    /// Fully open stem position [m].
    pub open_position: f64,
    /// Fully closed stem position [m].
    pub closed_position: f64,
}

impl Default for PneumaticValveParameters {
    fn default() -> Self {
        Self {
            mass: 0.5,
            damping: 200.0,
            stiffness: 8000.0,
            area: PI * 0.06 * 0.06,
            open_position: 2.92 / 100.0,
            closed_position: 14.62 / 100.0,
        }
    }
}

/// Spring-return diaphragm valve positioned by a pneumatic pressure signal.
///
/// State: `[x, v]`, stem position [m] and velocity. Input: `[P]` [Pa].
/// The stem travel is bounded to `[open_position, closed_position]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PneumaticValve {
    pub parameters: PneumaticValveParameters,
    bounds: StateBounds,
}

impl PneumaticValve {
    pub fn new(
        parameters: PneumaticValveParameters,
        policy: BoundPolicy,
    ) -> Result<Self, ConfigurationError> {
        let bounds = travel_bounds(parameters.open_position, parameters.closed_position, policy)?;
        Ok(Self { parameters, bounds })
    }
}

impl<T: Scalar> StateSpaceModel<T> for PneumaticValve {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let p = &self.parameters;
        let (position, velocity) = (x[0], x[1]);
        out[0] = velocity;
        out[1] = (T::lift(p.area) * u[0]
            - T::lift(p.damping) * velocity
            - T::lift(p.stiffness) * position)
            / T::lift(p.mass);
        Ok(())
    }

    fn bounds(&self) -> Option<&StateBounds> {
        Some(&self.bounds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolenoidValveParameters {
    pub mass: f64,
    pub damping: f64,
    pub stiffness: f64,
    /// Coil resistance [Ω].
    pub resistance: f64,
    /// Area the pressure differential acts on [m²].
    pub area: f64,
    /// Inductance `L(x) = l0 + l1 / (gap - x)`: constant part [H].
    pub l0: f64,
    /// [H·m]
    pub l1: f64,
    /// [m]
    pub gap: f64,
    pub closed_position: f64,
    pub open_position: f64,
}

impl Default for SolenoidValveParameters {
    fn default() -> Self {
        Self {
            mass: 0.02,
            damping: 50.0,
            stiffness: 500.0,
            resistance: 2.0,
            area: PI * 0.025 * 0.025,
            l0: 0.005,
            l1: 0.0005,
            gap: 4.0 / 100.0,
            closed_position: 0.0,
            open_position: 3.0 / 100.0,
        }
    }
}

/// Plunger valve pulled open by a coil against a spring and the fluid force.
///
/// State: `[x, v, i]`, plunger position [m], velocity and coil current [A].
/// Inputs: `[u, ΔP]`, coil voltage [V] and pressure differential [Pa].
/// The plunger travel is bounded to `[closed_position, open_position]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolenoidValve {
    pub parameters: SolenoidValveParameters,
    bounds: StateBounds,
}

impl SolenoidValve {
    pub fn new(
        parameters: SolenoidValveParameters,
        policy: BoundPolicy,
    ) -> Result<Self, ConfigurationError> {
        let bounds = travel_bounds(parameters.closed_position, parameters.open_position, policy)?;
        Ok(Self { parameters, bounds })
    }

    pub fn inductance<T: Scalar>(&self, x: T) -> T {
        let p = &self.parameters;
        T::lift(p.l0) + T::lift(p.l1) / (T::lift(p.gap) - x)
    }

    /// `dL/dx` [H/m].
    pub fn inductance_gradient<T: Scalar>(&self, x: T) -> T {
        let p = &self.parameters;
        let air = T::lift(p.gap) - x;
        T::lift(p.l1) / (air * air)
    }

    pub fn magnetic_force<T: Scalar>(&self, current: T, x: T) -> T {
        T::lift(0.5) * self.inductance_gradient(x) * current * current
    }

    /// Pressure force, proportional to the opening.
    pub fn fluid_force<T: Scalar>(&self, pressure: T, x: T) -> T {
        let p = &self.parameters;
        pressure * T::lift(p.area) * x / T::lift(p.open_position)
    }
}

impl<T: Scalar> StateSpaceModel<T> for SolenoidValve {
    fn dimension(&self) -> usize {
        3
    }

    fn input_dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let p = &self.parameters;
        let (position, velocity, current) = (x[0], x[1], x[2]);
        let (voltage, pressure) = (u[0], u[1]);
        let gradient = self.inductance_gradient(position);

        out[0] = velocity;
        out[1] = (self.magnetic_force(current, position)
            - T::lift(p.damping) * velocity
            - T::lift(p.stiffness) * position
            - self.fluid_force(pressure, position))
            / T::lift(p.mass);
        out[2] = (voltage - T::lift(p.resistance) * current - current * gradient * velocity)
            / self.inductance(position);
        Ok(())
    }

    fn bounds(&self) -> Option<&StateBounds> {
        Some(&self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PSI;
    use odesim_core::{linspace, simulate, Implicit, InputSource, SolverSettings};

    fn tight() -> SolverSettings {
        SolverSettings::default().with_tolerances(1e-8, 1e-10)
    }

    #[test]
    fn mass_spring_damper_settles_at_static_deflection() {
        let msd = MassSpringDamper::default();
        let trajectory = simulate(
            &msd,
            &InputSource::constant([10.0]),
            &[0.0, 0.0],
            (0.0, 10.0),
            &linspace(0.0, 10.0, 101),
            &SolverSettings::default(),
        )
        .unwrap();
        let last = trajectory.final_state().unwrap();
        assert!((last[0] - 0.5).abs() < 5e-3);
        assert!(last[1].abs() < 1e-2);
        assert!((msd.static_deflection(10.0) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn damping_ratio_round_trips() {
        let msd = MassSpringDamper::default().with_damping_ratio(0.2);
        assert!((msd.damping_ratio() - 0.2).abs() < 1e-12);
        assert!((msd.natural_frequency() - 20f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn dc_motor_reaches_its_steady_speed() {
        let motor = DcMotor::default();
        // mechanical time constant J / (K1 K2 / R + b) is about 1.5 s
        let trajectory = simulate(
            &motor,
            &InputSource::constant([24.0]),
            &[0.0, 0.0],
            (0.0, 20.0),
            &[20.0],
            &tight(),
        )
        .unwrap();
        let omega = trajectory.final_state().unwrap()[1];
        assert!((omega - motor.steady_speed(24.0)).abs() < 1e-3);
    }

    #[test]
    fn two_masses_accelerate_together() {
        let system = TwoMassSpringDamper::default();
        let trajectory = simulate(
            &system,
            &InputSource::constant([2.0]),
            &[0.0; 4],
            (0.0, 40.0),
            &[40.0],
            &tight(),
        )
        .unwrap();
        let x = trajectory.final_state().unwrap();
        // common acceleration F / (m1 + m2); stretch F·m1 / ((m1 + m2)·k)
        assert!((x[1] - 2.0 / 7.0 * 40.0).abs() < 1e-3);
        assert!((x[2] - x[0] - 2.0 * 5.0 / (7.0 * 8.0)).abs() < 1e-3);
    }

    #[test]
    fn damped_rod_comes_to_rest() {
        let pendulum = PhysicalPendulum::default();
        let trajectory = simulate(
            &pendulum,
            &InputSource::none(),
            &[30f64.to_radians(), 0.0],
            (0.0, 30.0),
            &[30.0],
            &tight(),
        )
        .unwrap();
        assert!(trajectory.final_state().unwrap()[0].abs() < 1e-2);
    }

    #[test]
    fn cart_pendulum_falls_without_control() {
        let model = Implicit::new(CartPendulum::default());
        let trajectory = simulate(
            &model,
            &InputSource::constant([0.0]),
            &[10f64.to_radians(), 0.0, 0.0, 0.0],
            (0.0, 0.5),
            &[0.5],
            &tight(),
        )
        .unwrap();
        let x = trajectory.final_state().unwrap();
        assert!(x[0] > 10f64.to_radians());
        // the cart is pushed the other way
        assert!(x[2] < 0.0);
    }

    #[test]
    fn pneumatic_valve_policies_differ_only_in_output() {
        let pressure = InputSource::piecewise(vec![(0.0, 3.0 * PSI), (0.5, 15.0 * PSI)]).unwrap();
        let grid = linspace(0.0, 1.0, 21);
        let parameters = PneumaticValveParameters::default();
        let run = |policy| {
            let valve = PneumaticValve::new(parameters, policy).unwrap();
            simulate(&valve, &pressure, &[parameters.open_position, 0.0], (0.0, 1.0), &grid, &tight())
                .unwrap()
        };

        // 15 psi on the diaphragm balances the spring slightly past full travel
        let reported = run(BoundPolicy::Report);
        let raw = reported.final_state().unwrap()[0];
        assert!(raw > parameters.closed_position);
        assert!(raw - parameters.closed_position < 1e-4);
        let valve = PneumaticValve::new(parameters, BoundPolicy::Report).unwrap();
        let bounds = StateSpaceModel::<f64>::bounds(&valve).unwrap();
        assert!(!reported.bound_violations(bounds).is_empty());

        let clipped = run(BoundPolicy::ClipOutput);
        assert_eq!(clipped.final_state().unwrap()[0], parameters.closed_position);
        assert_eq!(clipped.final_state().unwrap()[1], reported.final_state().unwrap()[1]);
    }

    #[test]
    fn solenoid_valve_opens_at_full_voltage() {
        let valve =
            SolenoidValve::new(SolenoidValveParameters::default(), BoundPolicy::Enforce).unwrap();
        let input = InputSource::Channels(vec![
            InputSource::piecewise(vec![(0.0, 0.0), (0.2, 12.0), (0.6, 24.0)]).unwrap(),
            InputSource::constant([20_000.0]),
        ]);
        let trajectory = simulate(
            &valve,
            &input,
            &[0.0, 0.0, 0.0],
            (0.0, 1.0),
            &[0.1, 0.5, 1.0],
            &SolverSettings::default().with_tolerances(1e-6, 1e-9),
        )
        .unwrap();
        assert_eq!(trajectory.state(0)[0], 0.0);
        // 12 V holds the plunger part way against spring and fluid force
        let partial = trajectory.state(1)[0];
        assert!(partial > 0.0035 && partial < 0.004);
        assert_eq!(trajectory.state(2)[0], 0.03);
    }

    #[test]
    fn inverted_travel_limits_are_rejected() {
        let parameters = PneumaticValveParameters {
            open_position: 0.2,
            closed_position: 0.1,
            ..PneumaticValveParameters::default()
        };
        assert!(PneumaticValve::new(parameters, BoundPolicy::Report).is_err());
    }
}
