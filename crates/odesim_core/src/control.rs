//! PID feedback.
//!
//! The controller itself is a pure function of `(e, de, ie)`. The integral
//! `ie` is not kept inside the controller: [`ErrorIntegrator`] appends it to
//! the plant state and the integrator advances it with `d(ie)/dt = e`, where
//! `e` arrives as a trailing input channel produced by [`FeedbackLoop`].

use crate::error::{check_dimension, ConfigurationError, SimResult};
use crate::input::InputSource;
use crate::model::StateBounds;
use crate::traits::{Scalar, StateSpaceModel};
use crate::trajectory::Trajectory;
use serde::{Deserialize, Serialize};

/// Proportional-integral-derivative gains, used exactly as given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidController {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    /// `u = Kp·e + Kd·de + Ki·ie`
    pub fn action(&self, e: f64, de: f64, ie: f64) -> f64 {
        self.kp * e + self.kd * de + self.ki * ie
    }
}

/// A plant augmented with one extra state holding the integral of the
/// control error.
///
/// State layout: the plant's `n` states, then the integral.
/// Input layout: the plant's `m` inputs, then the error `e`.
#[derive(Debug, Clone)]
pub struct ErrorIntegrator<M> {
    plant: M,
}

impl<M> ErrorIntegrator<M> {
    pub fn new(plant: M) -> Self {
        Self { plant }
    }

    pub fn plant(&self) -> &M {
        &self.plant
    }
}

impl<M: StateSpaceModel<f64>> ErrorIntegrator<M> {
    /// Index of the integral state.
    pub fn integral_index(&self) -> usize {
        self.plant.dimension()
    }

    /// Appends a zero integral to a plant state.
    pub fn initial_state(&self, plant_state: &[f64]) -> SimResult<Vec<f64>> {
        check_dimension("plant state", self.plant.dimension(), plant_state.len())?;
        let mut x = plant_state.to_vec();
        x.push(0.0);
        Ok(x)
    }
}

impl<T: Scalar, M: StateSpaceModel<T>> StateSpaceModel<T> for ErrorIntegrator<M> {
    fn dimension(&self) -> usize {
        self.plant.dimension() + 1
    }

    fn input_dimension(&self) -> usize {
        self.plant.input_dimension() + 1
    }

    fn derivative(&self, t: T, x: &[T], u: &[T], out: &mut [T]) -> SimResult<()> {
        let n = self.plant.dimension();
        let m = self.plant.input_dimension();
        self.plant.derivative(t, &x[..n], &u[..m], &mut out[..n])?;
        out[n] = u[m];
        Ok(())
    }

    fn bounds(&self) -> Option<&StateBounds> {
        self.plant.bounds()
    }
}

/// Wiring of a PID controller around an [`ErrorIntegrator`] plant.
///
/// Produces the plant input vector with the control action in the
/// `actuated` slot, followed by the error channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackLoop {
    controller: PidController,
    setpoint: Box<InputSource>,
    measured: usize,
    rate: Option<usize>,
    integral: usize,
    actuated: usize,
    plant_inputs: usize,
    exogenous: Option<Box<InputSource>>,
}

impl FeedbackLoop {
    /// `measured` is the plant state compared against the setpoint and
    /// `actuated` the plant input receiving the control action.
    pub fn new<M: StateSpaceModel<f64>>(
        controller: PidController,
        setpoint: InputSource,
        measured: usize,
        actuated: usize,
        plant: &ErrorIntegrator<M>,
    ) -> SimResult<Self> {
        let states = plant.plant().dimension();
        let plant_inputs = plant.plant().input_dimension();
        if setpoint.dimension() != 1 || setpoint.depends_on_state() {
            return Err(ConfigurationError::InvalidInput {
                what: "setpoint must be a single time-only channel".into(),
            }
            .into());
        }
        if measured >= states {
            return Err(ConfigurationError::InvalidInput {
                what: format!("measured state {measured} out of range for {states} plant states"),
            }
            .into());
        }
        if actuated >= plant_inputs {
            return Err(ConfigurationError::InvalidInput {
                what: format!(
                    "actuated input {actuated} out of range for {plant_inputs} plant inputs"
                ),
            }
            .into());
        }
        Ok(Self {
            controller,
            setpoint: Box::new(setpoint),
            measured,
            rate: None,
            integral: plant.integral_index(),
            actuated,
            plant_inputs,
            exogenous: None,
        })
    }

    /// Uses `de = -x[index]`, for a setpoint that is constant in time.
    pub fn with_rate_state(mut self, index: usize) -> SimResult<Self> {
        if index >= self.integral {
            return Err(ConfigurationError::InvalidInput {
                what: format!("rate state {index} out of range for {} plant states", self.integral),
            }
            .into());
        }
        self.rate = Some(index);
        Ok(self)
    }

    /// Supplies the plant inputs not driven by the controller. The value in
    /// the actuated slot is overwritten.
    pub fn with_exogenous(mut self, source: InputSource) -> SimResult<Self> {
        check_dimension("exogenous input", self.plant_inputs, source.dimension())?;
        if source.depends_on_state() {
            return Err(ConfigurationError::InvalidInput {
                what: "exogenous inputs must not depend on the state".into(),
            }
            .into());
        }
        self.exogenous = Some(Box::new(source));
        Ok(self)
    }

    pub fn controller(&self) -> &PidController {
        &self.controller
    }

    pub fn dimension(&self) -> usize {
        self.plant_inputs + 1
    }

    /// Control error at `(t, x)`.
    pub fn error(&self, t: f64, x: &[f64]) -> SimResult<f64> {
        self.check_state(x)?;
        let mut setpoint = [0.0];
        self.setpoint.evaluate(t, x, &mut setpoint)?;
        Ok(setpoint[0] - x[self.measured])
    }

    /// Control action `u(t, x)`.
    pub fn action(&self, t: f64, x: &[f64]) -> SimResult<f64> {
        let e = self.error(t, x)?;
        let de = self.rate.map_or(0.0, |index| -x[index]);
        Ok(self.controller.action(e, de, x[self.integral]))
    }

    pub fn evaluate(&self, t: f64, x: &[f64], out: &mut [f64]) -> SimResult<()> {
        check_dimension("controller output", self.dimension(), out.len())?;
        let e = self.error(t, x)?;
        let de = self.rate.map_or(0.0, |index| -x[index]);
        let (plant, tail) = out.split_at_mut(self.plant_inputs);
        match &self.exogenous {
            Some(source) => source.evaluate(t, x, plant)?,
            None => plant.fill(0.0),
        }
        plant[self.actuated] = self.controller.action(e, de, x[self.integral]);
        tail[0] = e;
        Ok(())
    }

    /// Recomputes the control action at every sample of a closed-loop run.
    pub fn control_signal(&self, trajectory: &Trajectory) -> SimResult<Vec<f64>> {
        trajectory
            .iter()
            .map(|(t, x)| self.action(t, x))
            .collect()
    }

    fn check_state(&self, x: &[f64]) -> SimResult<()> {
        check_dimension("closed-loop state", self.integral + 1, x.len())
    }
}
