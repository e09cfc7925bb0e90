use crate::constants::GAS_CONSTANT;
use odesim_core::{Scalar, SimResult, StateSpaceModel};
use serde::{Deserialize, Serialize};

/// Continuous stirred-tank reactor running an exothermic first-order
/// reaction `A -> B`, cooled through a jacket.
///
/// State: `[V, C_A, T, T_c]`, reactor volume [m³], concentration of A
/// [mol/m³], reactor temperature [K] and coolant temperature [K].
/// Inputs: `[q1, q, C_A1, T1, q_c, T_c0]`, feed flow and outflow [m³/s],
/// feed concentration, feed temperature, coolant flow and coolant inlet
/// temperature.
///
/// The Arrhenius term makes the system stiff near runaway; simulate it with
/// `Method::Rosenbrock23`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooledCstr {
    pub density: f64,
    pub heat_capacity: f64,
    pub coolant_density: f64,
    pub coolant_heat_capacity: f64,
    /// [1/s]
    pub pre_exponential: f64,
    /// [J/mol]
    pub activation_energy: f64,
    /// Negative for an exothermic reaction [J/mol].
    pub reaction_enthalpy: f64,
    /// [W/(m²·K)]
    pub heat_transfer_coefficient: f64,
    /// [m²]
    pub heat_transfer_area: f64,
    pub jacket_volume: f64,
}

impl Default for CooledCstr {
    fn default() -> Self {
        Self {
            density: 1000.0,
            heat_capacity: 239.0,
            coolant_density: 1000.0,
            coolant_heat_capacity: 4180.0,
            pre_exponential: 1.2e9,
            activation_energy: 8.75e3 * GAS_CONSTANT,
            reaction_enthalpy: -5.0e7,
            heat_transfer_coefficient: 915.6,
            heat_transfer_area: 2.7520,
            jacket_volume: 0.55,
        }
    }
}

impl CooledCstr {
    /// Volumetric reaction rate `k0·exp(-E / (R·T))·C_A` [mol/(m³·s)].
    pub fn reaction_rate<T: Scalar>(&self, temperature: T, concentration: T) -> T {
        let activation = T::lift(self.activation_energy / GAS_CONSTANT);
        T::lift(self.pre_exponential) * (-activation / temperature).exp() * concentration
    }
}

impl<T: Scalar> StateSpaceModel<T> for CooledCstr {
    fn dimension(&self) -> usize {
        4
    }

    fn input_dimension(&self) -> usize {
        6
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let (volume, c_a, temperature, coolant) = (x[0], x[1], x[2], x[3]);
        let (q1, q, c_a1, t1, q_c, t_c0) = (u[0], u[1], u[2], u[3], u[4], u[5]);

        let rate = self.reaction_rate(temperature, c_a);
        let rho_cp = T::lift(self.density * self.heat_capacity);
        let coolant_rho_cp = T::lift(self.coolant_density * self.coolant_heat_capacity);
        let exchange =
            T::lift(self.heat_transfer_coefficient * self.heat_transfer_area) * (coolant - temperature);

        out[0] = q1 - q;
        out[1] = ((c_a1 - c_a) * q1 - rate * volume) / volume;
        out[2] = (rho_cp * q1 * (t1 - temperature)
            + T::lift(-self.reaction_enthalpy) * rate * volume
            + exchange)
            / (rho_cp * volume);
        out[3] = (coolant_rho_cp * q_c * (t_c0 - coolant) - exchange)
            / (coolant_rho_cp * T::lift(self.jacket_volume));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::celsius;
    use odesim_core::{simulate, InputSource, Method, SolverSettings};

    fn feed() -> InputSource {
        InputSource::constant([0.1, 0.1, 1.0, celsius(50.0), 0.005, celsius(20.0)])
    }

    fn initial() -> [f64; 4] {
        [1.5, 0.9, celsius(25.0), celsius(20.0)]
    }

    #[test]
    fn rosenbrock_run_heats_toward_the_feed_temperature() {
        let settings = SolverSettings::default()
            .with_method(Method::Rosenbrock23)
            .with_tolerances(1e-6, 1e-8);
        let trajectory = simulate(
            &CooledCstr::default(),
            &feed(),
            &initial(),
            (0.0, 1200.0),
            &[1200.0],
            &settings,
        )
        .unwrap();
        let last = trajectory.final_state().unwrap();
        assert!((last[0] - 1.5).abs() < 1e-9);
        assert!((last[1] - 0.93187).abs() < 1e-3);
        assert!((last[2] - 333.597).abs() < 0.05);
        assert!((last[3] - 297.499).abs() < 0.05);
    }

    #[test]
    fn stiff_and_explicit_methods_agree() {
        let run = |method| {
            let settings = SolverSettings::default()
                .with_method(method)
                .with_tolerances(1e-7, 1e-9);
            simulate(
                &CooledCstr::default(),
                &feed(),
                &initial(),
                (0.0, 600.0),
                &[600.0],
                &settings,
            )
            .unwrap()
        };
        let stiff = run(Method::Rosenbrock23);
        let explicit = run(Method::Tsit5);
        for (a, b) in stiff
            .final_state()
            .unwrap()
            .iter()
            .zip(explicit.final_state().unwrap())
        {
            assert!((a - b).abs() < 1e-3 * b.abs().max(1.0));
        }
    }

    #[test]
    fn reaction_rate_follows_arrhenius() {
        let reactor = CooledCstr::default();
        let slow: f64 = reactor.reaction_rate(300.0, 1.0);
        let fast: f64 = reactor.reaction_rate(330.0, 1.0);
        let expected_ratio = (8750.0_f64 * (1.0 / 300.0 - 1.0 / 330.0)).exp();
        assert!((fast / slow - expected_ratio).abs() / expected_ratio < 1e-12);
    }
}
