//! Series circuits driven by a source voltage `ε` (input 0, volts).

use odesim_core::{Scalar, SimResult, StateSpaceModel};
use serde::{Deserialize, Serialize};

/// Series RC circuit in charge form.
///
/// State: `[q]`, capacitor charge [C].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcCircuit {
    /// [Ω]
    pub resistance: f64,
    /// [F]
    pub capacitance: f64,
}

impl Default for RcCircuit {
    fn default() -> Self {
        Self {
            resistance: 50.0,
            capacitance: 5000e-6,
        }
    }
}

impl RcCircuit {
    pub fn time_constant(&self) -> f64 {
        self.resistance * self.capacitance
    }

    /// Closed-form charge under a constant voltage, starting from `q0`.
    pub fn charge_at(&self, t: f64, voltage: f64, q0: f64) -> f64 {
        let q_final = voltage * self.capacitance;
        q_final + (q0 - q_final) * (-t / self.time_constant()).exp()
    }
}

impl<T: Scalar> StateSpaceModel<T> for RcCircuit {
    fn dimension(&self) -> usize {
        1
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let r = T::lift(self.resistance);
        out[0] = -x[0] / (r * T::lift(self.capacitance)) + u[0] / r;
        Ok(())
    }
}

/// Series RLC circuit in charge form.
///
/// State: `[q, i]`, capacitor charge [C] and loop current [A].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlcCircuit {
    pub resistance: f64,
    pub inductance: f64,
    pub capacitance: f64,
}

impl Default for RlcCircuit {
    fn default() -> Self {
        Self {
            resistance: 10.0,
            inductance: 2.0,
            capacitance: 5000e-6,
        }
    }
}

impl<T: Scalar> StateSpaceModel<T> for RlcCircuit {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let (q, i) = (x[0], x[1]);
        out[0] = i;
        out[1] = (u[0] - T::lift(self.resistance) * i - q / T::lift(self.capacitance))
            / T::lift(self.inductance);
        Ok(())
    }
}

/// Series RL branch feeding a capacitor with a Shockley diode in parallel.
///
/// State: `[v_c, i]`, capacitor voltage [V] and source current [A].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlcDiodeCircuit {
    pub resistance: f64,
    pub inductance: f64,
    pub capacitance: f64,
    /// Reverse saturation current [A].
    pub saturation_current: f64,
    pub ideality: f64,
    /// [V]
    pub thermal_voltage: f64,
}

impl Default for RlcDiodeCircuit {
    fn default() -> Self {
        Self {
            resistance: 100.0,
            inductance: 100e-3,
            capacitance: 5000e-6,
            saturation_current: 1e-12,
            ideality: 1.5,
            thermal_voltage: 26e-3,
        }
    }
}

impl RlcDiodeCircuit {
    /// Shockley equation `i_s·(exp(v / (n·V_T)) - 1)`.
    pub fn diode_current<T: Scalar>(&self, voltage: T) -> T {
        let scale = T::lift(self.ideality * self.thermal_voltage);
        T::lift(self.saturation_current) * ((voltage / scale).exp() - T::one())
    }
}

impl<T: Scalar> StateSpaceModel<T> for RlcDiodeCircuit {
    fn dimension(&self) -> usize {
        2
    }

    fn input_dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let (v_c, i) = (x[0], x[1]);
        out[0] = (i - self.diode_current(v_c)) / T::lift(self.capacitance);
        out[1] = (u[0] - T::lift(self.resistance) * i - v_c) / T::lift(self.inductance);
        Ok(())
    }
}
