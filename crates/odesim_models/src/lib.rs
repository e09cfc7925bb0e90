//! Physical models built on `odesim_core`, and the experiments run on them.
//!
//! Every model is a parameter struct whose `Default` holds the reference
//! constants, implementing `StateSpaceModel<T>` for any `Scalar` so it can be
//! simulated and linearized from the same code. State and input layouts are
//! documented on each type.
pub mod circuits;
pub mod constants;
pub mod mechanical;
pub mod oscillators;
pub mod reactor;
pub mod scenarios;
pub mod tanks;

pub use circuits::{RcCircuit, RlcCircuit, RlcDiodeCircuit};
pub use mechanical::{
    CartPendulum, DcMotor, MassSpringDamper, PhysicalPendulum, PneumaticValve, SolenoidValve,
    TwoMassSpringDamper,
};
pub use oscillators::{Duffing, Pendulum, VanDerPol};
pub use reactor::CooledCstr;
pub use tanks::{
    ConicalTank, CubicTank, HeatedTank, IsothermalAccumulator, MixerWithHeating, PumpedTank,
    TankWithPipeMomentum,
};
