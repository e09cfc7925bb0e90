use crate::error::{NumericalFailure, SimResult};
use nalgebra::{Complex, DMatrix};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Real polynomial in `s`, coefficients from the highest power down.
///
/// Leading zeros are stripped, so the first coefficient is nonzero unless the
/// polynomial is identically zero (stored as `[0.0]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        let first = coefficients
            .iter()
            .position(|c| *c != 0.0)
            .unwrap_or(coefficients.len());
        let mut coefficients = coefficients[first..].to_vec();
        if coefficients.is_empty() {
            coefficients.push(0.0);
        }
        Self { coefficients }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// `gain · Π (s - r)`. Complex roots must come in conjugate pairs for
    /// the result to be real; imaginary residue is dropped.
    pub fn from_roots(gain: f64, roots: &[Complex<f64>]) -> Self {
        let mut acc = vec![Complex::new(gain, 0.0)];
        for root in roots {
            let mut next = vec![Complex::new(0.0, 0.0); acc.len() + 1];
            for (k, c) in acc.iter().enumerate() {
                next[k] += *c;
                next[k + 1] -= *c * *root;
            }
            acc = next;
        }
        Self::new(acc.into_iter().map(|c| c.re).collect())
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|c| *c == 0.0)
    }

    pub fn leading(&self) -> f64 {
        self.coefficients[0]
    }

    pub fn evaluate(&self, s: Complex<f64>) -> Complex<f64> {
        self.coefficients
            .iter()
            .fold(Complex::new(0.0, 0.0), |acc, c| acc * s + *c)
    }

    pub fn evaluate_real(&self, s: f64) -> f64 {
        self.coefficients.iter().fold(0.0, |acc, c| acc * s + c)
    }

    /// Coefficients whose magnitude is at most `tolerance` become zero.
    pub fn chop(&self, tolerance: f64) -> Self {
        Self::new(
            self.coefficients
                .iter()
                .map(|c| if c.abs() <= tolerance { 0.0 } else { *c })
                .collect(),
        )
    }

    /// Roots as eigenvalues of the companion matrix.
    pub fn roots(&self) -> SimResult<Vec<Complex<f64>>> {
        let n = self.degree();
        if n == 0 {
            return Ok(Vec::new());
        }
        let lead = self.leading();
        if n == 1 {
            return Ok(vec![Complex::new(-self.coefficients[1] / lead, 0.0)]);
        }

        let mut companion = DMatrix::<f64>::zeros(n, n);
        for j in 0..n {
            companion[(0, j)] = -self.coefficients[j + 1] / lead;
        }
        for i in 1..n {
            companion[(i, i - 1)] = 1.0;
        }
        let roots: Vec<Complex<f64>> = companion.complex_eigenvalues().iter().copied().collect();
        if roots.iter().any(|r| !r.re.is_finite() || !r.im.is_finite()) {
            return Err(NumericalFailure::RootFinding {
                what: "companion matrix produced non-finite eigenvalues",
            }
            .into());
        }
        Ok(roots)
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let n = self.degree();
        let mut first = true;
        for (k, c) in self.coefficients.iter().enumerate() {
            if *c == 0.0 {
                continue;
            }
            let power = n - k;
            let sign = if *c < 0.0 { "-" } else { "+" };
            if first {
                if *c < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            first = false;
            let magnitude = c.abs();
            match power {
                0 => write!(f, "{magnitude}")?,
                1 => write!(f, "{magnitude}·s")?,
                _ => write!(f, "{magnitude}·s^{power}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_real(mut roots: Vec<Complex<f64>>) -> Vec<f64> {
        roots.sort_by(|a, b| a.re.total_cmp(&b.re));
        roots.into_iter().map(|r| r.re).collect()
    }

    #[test]
    fn leading_zeros_are_stripped() {
        let p = Polynomial::new(vec![0.0, 0.0, 2.0, 1.0]);
        assert_eq!(p.degree(), 1);
        assert_eq!(p.coefficients(), &[2.0, 1.0]);
        assert!(Polynomial::new(vec![0.0, 0.0]).is_zero());
    }

    #[test]
    fn roots_of_real_quadratic() {
        // (s + 1)(s + 3)
        let p = Polynomial::new(vec![1.0, 4.0, 3.0]);
        let roots = sorted_real(p.roots().unwrap());
        assert!((roots[0] + 3.0).abs() < 1e-12);
        assert!((roots[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn complex_roots_come_in_pairs() {
        // s^2 + 2s + 5 -> -1 ± 2i
        let roots = Polynomial::new(vec![1.0, 2.0, 5.0]).roots().unwrap();
        assert_eq!(roots.len(), 2);
        for r in &roots {
            assert!((r.re + 1.0).abs() < 1e-12);
            assert!((r.im.abs() - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn from_roots_rebuilds_coefficients() {
        let roots = [
            Complex::new(-1.0, 2.0),
            Complex::new(-1.0, -2.0),
            Complex::new(-0.5, 0.0),
        ];
        let p = Polynomial::from_roots(2.0, &roots);
        // 2 (s^2 + 2s + 5)(s + 0.5)
        let expected = [2.0, 5.0, 12.0, 5.0];
        for (a, b) in p.coefficients().iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn evaluation_and_display() {
        let p = Polynomial::new(vec![1.0, -3.0, 0.0, 2.0]);
        assert_eq!(p.evaluate_real(2.0), -2.0);
        assert_eq!(p.evaluate(Complex::new(2.0, 0.0)), Complex::new(-2.0, 0.0));
        assert_eq!(p.to_string(), "1·s^3 - 3·s^2 + 2");
        assert_eq!(Polynomial::constant(0.0).to_string(), "0");
        assert_eq!(Polynomial::new(vec![-0.5, 1.0]).to_string(), "-0.5·s + 1");
    }

    #[test]
    fn chop_removes_round_off() {
        let p = Polynomial::new(vec![1e-18, 1.0, 1e-17]).chop(1e-12);
        assert_eq!(p.coefficients(), &[1.0, 0.0]);
        assert!(p.roots().unwrap()[0].norm() < 1e-300);
    }
}
