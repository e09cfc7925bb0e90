//! Transfer functions of linear state-space models.
//!
//! `G(s) = (sI - A)⁻¹B` is formed symbolically in `s` with the
//! Faddeev-LeVerrier recurrence, which yields the characteristic polynomial
//! of `A` together with the coefficient matrices of its adjugate.

use crate::error::{check_dimension, SimResult};
use crate::polynomial::Polynomial;
use nalgebra::{Complex, DMatrix};
use serde::{Deserialize, Serialize};

/// Relative distance under which a numerator root and a denominator root
/// are treated as the same and cancelled.
const CANCEL_TOLERANCE: f64 = 1e-6;

/// Numerator coefficients below this fraction of the largest coefficient in
/// the whole matrix are round-off.
const ZERO_TOLERANCE: f64 = 1e-12;

/// A rational transfer function with a monic denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    pub numerator: Polynomial,
    pub denominator: Polynomial,
}

impl TransferFunction {
    /// Builds `num / den`, normalizing the denominator to be monic.
    pub fn new(numerator: Polynomial, denominator: Polynomial) -> Self {
        let lead = denominator.leading();
        let scale = |p: &Polynomial| Polynomial::new(p.coefficients().iter().map(|c| c / lead).collect());
        Self {
            numerator: scale(&numerator),
            denominator: scale(&denominator),
        }
    }

    pub fn poles(&self) -> SimResult<Vec<Complex<f64>>> {
        self.denominator.roots()
    }

    pub fn zeros(&self) -> SimResult<Vec<Complex<f64>>> {
        self.numerator.roots()
    }

    pub fn evaluate(&self, s: Complex<f64>) -> Complex<f64> {
        self.numerator.evaluate(s) / self.denominator.evaluate(s)
    }

    /// Magnitude and phase (radians) at angular frequency `omega`.
    pub fn frequency_response(&self, omega: f64) -> (f64, f64) {
        let g = self.evaluate(Complex::new(0.0, omega));
        (g.norm(), g.arg())
    }

    /// `G(0)`; infinite when the denominator has a root at the origin.
    pub fn dc_gain(&self) -> f64 {
        let den = self.denominator.evaluate_real(0.0);
        if den == 0.0 {
            return f64::INFINITY;
        }
        self.numerator.evaluate_real(0.0) / den
    }

    /// All poles in the open left half plane.
    pub fn is_stable(&self) -> SimResult<bool> {
        Ok(self.poles()?.iter().all(|p| p.re < 0.0))
    }

    /// Removes root pairs shared by numerator and denominator.
    pub fn simplified(&self) -> SimResult<Self> {
        if self.numerator.is_zero() {
            return Ok(self.clone());
        }
        let mut zeros = self.numerator.roots()?;
        let mut poles = self.denominator.roots()?;
        let mut cancelled = false;

        let mut i = 0;
        while i < zeros.len() {
            let z = zeros[i];
            let closest = poles
                .iter()
                .enumerate()
                .map(|(j, p)| (j, (z - p).norm()))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match closest {
                Some((j, distance)) if distance <= CANCEL_TOLERANCE * poles[j].norm().max(1.0) => {
                    zeros.swap_remove(i);
                    poles.swap_remove(j);
                    cancelled = true;
                }
                _ => i += 1,
            }
        }

        if !cancelled {
            return Ok(self.clone());
        }
        Ok(Self::new(
            Polynomial::from_roots(self.numerator.leading(), &zeros),
            Polynomial::from_roots(self.denominator.leading(), &poles),
        ))
    }
}

/// One entry of a transfer function matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferEntry {
    /// The input has no path to the output.
    Zero,
    Rational(TransferFunction),
}

impl TransferEntry {
    pub fn as_rational(&self) -> Option<&TransferFunction> {
        match self {
            TransferEntry::Zero => None,
            TransferEntry::Rational(tf) => Some(tf),
        }
    }

    pub fn evaluate(&self, s: Complex<f64>) -> Complex<f64> {
        match self {
            TransferEntry::Zero => Complex::new(0.0, 0.0),
            TransferEntry::Rational(tf) => tf.evaluate(s),
        }
    }
}

/// Poles of one nonzero entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoles {
    pub output: usize,
    pub input: usize,
    pub poles: Vec<Complex<f64>>,
}

/// `outputs × inputs` matrix of transfer functions, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunctionMatrix {
    outputs: usize,
    inputs: usize,
    entries: Vec<TransferEntry>,
}

impl TransferFunctionMatrix {
    /// Builds `(sI - A)⁻¹B` with every entry simplified.
    pub fn from_state_space(a: &DMatrix<f64>, b: &DMatrix<f64>) -> SimResult<Self> {
        let n = a.nrows();
        check_dimension("A columns", n, a.ncols())?;
        check_dimension("B rows", n, b.nrows())?;
        let m = b.ncols();

        let (characteristic, adjugate) = faddeev_leverrier(a);
        let products: Vec<DMatrix<f64>> = adjugate.iter().map(|mk| mk * b).collect();
        let largest = products
            .iter()
            .flat_map(|p| p.iter())
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        let zero_tol = ZERO_TOLERANCE * largest.max(f64::MIN_POSITIVE);

        let mut entries = Vec::with_capacity(n * m);
        for i in 0..n {
            for j in 0..m {
                let numerator =
                    Polynomial::new(products.iter().map(|p| p[(i, j)]).collect()).chop(zero_tol);
                if numerator.is_zero() {
                    entries.push(TransferEntry::Zero);
                } else {
                    let tf = TransferFunction::new(numerator, characteristic.clone());
                    entries.push(TransferEntry::Rational(tf.simplified()?));
                }
            }
        }
        Ok(Self {
            outputs: n,
            inputs: m,
            entries,
        })
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn entry(&self, output: usize, input: usize) -> &TransferEntry {
        &self.entries[output * self.inputs + input]
    }

    /// Poles of every nonzero entry, in row-major order. Zero entries have no
    /// poles and are skipped.
    pub fn poles(&self) -> SimResult<Vec<EntryPoles>> {
        let mut result = Vec::new();
        for output in 0..self.outputs {
            for input in 0..self.inputs {
                if let TransferEntry::Rational(tf) = self.entry(output, input) {
                    result.push(EntryPoles {
                        output,
                        input,
                        poles: tf.poles()?,
                    });
                }
            }
        }
        Ok(result)
    }

    pub fn evaluate(&self, s: Complex<f64>) -> DMatrix<Complex<f64>> {
        DMatrix::from_fn(self.outputs, self.inputs, |i, j| self.entry(i, j).evaluate(s))
    }
}

/// Characteristic polynomial `det(sI - A)` and the matrices `M_1..M_n` with
/// `adj(sI - A) = Σ M_k s^(n-k)`.
fn faddeev_leverrier(a: &DMatrix<f64>) -> (Polynomial, Vec<DMatrix<f64>>) {
    let n = a.nrows();
    let identity = DMatrix::<f64>::identity(n, n);
    let mut coefficients = vec![1.0];
    let mut adjugate = Vec::with_capacity(n);
    let mut m = identity.clone();
    for k in 1..=n {
        if k > 1 {
            m = a * &m + &identity * coefficients[k - 1];
        }
        let am = a * &m;
        coefficients.push(-am.trace() / k as f64);
        adjugate.push(m.clone());
    }
    (Polynomial::new(coefficients), adjugate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heated_tank() -> (DMatrix<f64>, DMatrix<f64>) {
        let a = DMatrix::from_row_slice(
            2,
            2,
            &[
                -0.00254647908947033,
                0.0,
                0.125202737391988,
                -0.00509295817894066,
            ],
        );
        let b = DMatrix::from_row_slice(
            2,
            3,
            &[
                0.141471060526129,
                0.0,
                0.0,
                -3.72472460767435,
                6.58322109947318,
                0.00509295817894066,
            ],
        );
        (a, b)
    }

    #[test]
    fn characteristic_polynomial_matches_determinant() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -20.0, -2.0]);
        let (p, adj) = faddeev_leverrier(&a);
        assert_eq!(p.coefficients(), &[1.0, 2.0, 20.0]);
        // adj(sI - A) = I s + (A + 2I)
        assert_eq!(adj[1], DMatrix::from_row_slice(2, 2, &[2.0, 1.0, -20.0, 0.0]));
    }

    #[test]
    fn mass_spring_damper_transfer_function() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -20.0, -2.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let g = TransferFunctionMatrix::from_state_space(&a, &b).unwrap();
        let position = g.entry(0, 0).as_rational().unwrap();
        assert_eq!(position.numerator.coefficients(), &[1.0]);
        assert!((position.dc_gain() - 0.05).abs() < 1e-15);
        let (magnitude, _) = position.frequency_response(0.0);
        assert!((magnitude - 0.05).abs() < 1e-15);
    }

    #[test]
    fn heated_tank_entries_cancel_and_vanish() {
        let (a, b) = heated_tank();
        let g = TransferFunctionMatrix::from_state_space(&a, &b).unwrap();

        assert_eq!(g.entry(0, 1), &TransferEntry::Zero);
        assert_eq!(g.entry(0, 2), &TransferEntry::Zero);

        let level = g.entry(0, 0).as_rational().unwrap();
        assert_eq!(level.denominator.degree(), 1);
        let pole = level.poles().unwrap()[0];
        assert!((pole.re + 0.00254647908947033).abs() < 1e-12);
        assert!((level.numerator.coefficients()[0] - 0.141471060526129).abs() < 1e-9);

        let steam = g.entry(1, 1).as_rational().unwrap();
        assert_eq!(steam.denominator.degree(), 1);
        assert!((steam.poles().unwrap()[0].re + 0.00509295817894066).abs() < 1e-12);

        // level -> temperature keeps both modes
        let coupled = g.entry(1, 0).as_rational().unwrap();
        assert_eq!(coupled.denominator.degree(), 2);

        let poles = g.poles().unwrap();
        assert_eq!(poles.len(), 4);
        assert!(poles.iter().all(|entry| !(entry.output == 0 && entry.input > 0)));
    }

    #[test]
    fn simplification_preserves_the_response() {
        let (a, b) = heated_tank();
        let g = TransferFunctionMatrix::from_state_space(&a, &b).unwrap();
        let s = Complex::new(0.0, 0.01);
        // direct evaluation of (sI - A)^-1 B
        let shifted = DMatrix::from_fn(2, 2, |i, j| {
            let eye = if i == j { s } else { Complex::new(0.0, 0.0) };
            eye - Complex::new(a[(i, j)], 0.0)
        });
        let inverse = shifted.try_inverse().unwrap();
        let direct = inverse * b.map(|v| Complex::new(v, 0.0));
        let from_entries = g.evaluate(s);
        for (x, y) in direct.iter().zip(from_entries.iter()) {
            assert!((x - y).norm() < 1e-8 * (1.0 + x.norm()));
        }
    }

    #[test]
    fn dimensions_are_checked() {
        let a = DMatrix::zeros(2, 2);
        let b = DMatrix::zeros(3, 1);
        assert!(TransferFunctionMatrix::from_state_space(&a, &b).is_err());
    }
}
