//! Physical constants shared by the catalog (CODATA / SI exact values).

/// Standard acceleration of gravity [m/s²].
pub const GRAVITY: f64 = 9.80665;

/// Molar gas constant [J/(mol·K)].
pub const GAS_CONSTANT: f64 = 8.314462618;

/// 0 °C in kelvin.
pub const ZERO_CELSIUS: f64 = 273.15;

/// Standard atmosphere [Pa].
pub const ATM: f64 = 101_325.0;

/// One pound-force per square inch [Pa].
pub const PSI: f64 = 6_894.757293168361;

/// Converts a temperature in °C to kelvin.
pub fn celsius(value: f64) -> f64 {
    value + ZERO_CELSIUS
}
