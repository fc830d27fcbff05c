//! Feldman secret-sharing polynomials

use super::{decode_point, encode_point, sample_nonzero_scalar};
use crate::hash::WriteHash;
use crate::Result;
use k256::{ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use std::fmt;
use zeroize::Zeroize;

/// Secret polynomial f(X) = c₀ + c₁X + … + c_tX^t
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// Sample a polynomial of exactly `degree` with the given constant term.
    ///
    /// Coefficients 1..=degree are uniform non-zero scalars.
    pub fn sample(rng: &mut dyn CryptoRngCore, degree: usize, constant: Scalar) -> Result<Self> {
        let mut coefficients = Vec::with_capacity(degree + 1);
        coefficients.push(constant);
        for _ in 0..degree {
            coefficients.push(sample_nonzero_scalar(rng)?);
        }
        Ok(Self { coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// f(0)
    pub fn constant(&self) -> &Scalar {
        &self.coefficients[0]
    }

    pub fn coefficients(&self) -> &[Scalar] {
        &self.coefficients
    }

    /// Evaluate f(x) using Horner's method
    pub fn evaluate(&self, x: &Scalar) -> Scalar {
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coef| acc * x + coef)
    }

    /// Public Feldman commitment F(X) = f(X)·G
    pub fn exponentiate(&self) -> PolynomialExponent {
        PolynomialExponent {
            coefficients: self
                .coefficients
                .iter()
                .map(|coef| ProjectivePoint::GENERATOR * coef)
                .collect(),
        }
    }
}

impl Zeroize for Polynomial {
    fn zeroize(&mut self) {
        self.coefficients.iter_mut().for_each(Zeroize::zeroize);
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Polynomial")
            .field("degree", &self.degree())
            .finish_non_exhaustive()
    }
}

/// Polynomial in the exponent: F[i] = cᵢ·G
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolynomialExponent {
    coefficients: Vec<ProjectivePoint>,
}

impl PolynomialExponent {
    pub fn new(coefficients: Vec<ProjectivePoint>) -> Self {
        Self { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn coefficients(&self) -> &[ProjectivePoint] {
        &self.coefficients
    }

    /// F(0), the public counterpart of the constant term
    pub fn constant(&self) -> ProjectivePoint {
        self.coefficients
            .first()
            .copied()
            .unwrap_or(ProjectivePoint::IDENTITY)
    }

    /// Evaluate F(x) = f(x)·G without knowing f
    pub fn evaluate(&self, x: &Scalar) -> ProjectivePoint {
        self.coefficients
            .iter()
            .rev()
            .fold(ProjectivePoint::IDENTITY, |acc, coef| acc * x + coef)
    }

    /// Feldman check: `share·G == F(x)`
    pub fn verify_share(&self, x: &Scalar, share: &Scalar) -> bool {
        ProjectivePoint::GENERATOR * share == self.evaluate(x)
    }

    /// SEC1-compressed coefficients
    pub fn to_bytes(&self) -> Vec<Vec<u8>> {
        self.coefficients.iter().map(encode_point).collect()
    }

    /// Parse coefficients received from the wire
    pub fn from_bytes(encoded: &[Vec<u8>]) -> Option<Self> {
        let coefficients = encoded
            .iter()
            .map(|bytes| decode_point(bytes))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { coefficients })
    }
}

impl WriteHash for PolynomialExponent {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        self.coefficients.write_hash(hasher);
    }
}

/// Lagrange coefficient at zero for `x_i` over the evaluation points `xs`.
///
/// Returns `None` when two points coincide.
pub fn lagrange_coefficient(x_i: &Scalar, xs: &[Scalar]) -> Option<Scalar> {
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for x_j in xs.iter().filter(|x_j| *x_j != x_i) {
        numerator *= x_j;
        denominator *= *x_j - x_i;
    }

    Option::<Scalar>::from(denominator.invert()).map(|inv| numerator * inv)
}

/// Reconstruct f(0) from `(x, f(x))` pairs
pub fn interpolate_at_zero(points: &[(Scalar, Scalar)]) -> Option<Scalar> {
    let xs: Vec<Scalar> = points.iter().map(|(x, _)| *x).collect();
    for (i, x) in xs.iter().enumerate() {
        if xs[..i].contains(x) {
            return None;
        }
    }

    points.iter().try_fold(Scalar::ZERO, |acc, (x, y)| {
        lagrange_coefficient(x, &xs).map(|lambda| acc + lambda * y)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_zeroize_clears_coefficients() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let mut poly = Polynomial::sample(&mut rng, 2, Scalar::from(7u64)).unwrap();

        poly.zeroize();
        assert_eq!(poly.degree(), 2);
        assert!(poly.coefficients().iter().all(|c| *c == Scalar::ZERO));
    }

    #[test]
    fn test_refresh_constant_is_zero() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..16 {
            let poly = Polynomial::sample(&mut rng, 3, Scalar::ZERO).unwrap();
            assert_eq!(poly.evaluate(&Scalar::ZERO), Scalar::ZERO);
            assert_eq!(poly.exponentiate().constant(), ProjectivePoint::IDENTITY);
        }
    }

    #[test]
    fn test_feldman_rejects_wrong_share() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let poly = Polynomial::sample(&mut rng, 2, Scalar::from(5u64)).unwrap();
        let exp = poly.exponentiate();

        let x = Scalar::from(0x41u64);
        let share = poly.evaluate(&x);
        assert!(exp.verify_share(&x, &share));
        assert!(!exp.verify_share(&x, &(share + Scalar::ONE)));
        assert!(!exp.verify_share(&Scalar::from(0x42u64), &share));
    }

    #[test]
    fn test_exponent_bytes() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let exp = Polynomial::sample(&mut rng, 2, Scalar::ZERO).unwrap().exponentiate();

        let bytes = exp.to_bytes();
        assert_eq!(bytes[0], vec![0u8]);
        assert_eq!(PolynomialExponent::from_bytes(&bytes), Some(exp));

        let mut broken = bytes;
        broken[1][5] ^= 0xff;
        broken[1][0] = 0x05;
        assert!(PolynomialExponent::from_bytes(&broken).is_none());
    }

    #[test]
    fn test_interpolation_rejects_repeated_points() {
        let one = Scalar::ONE;
        assert!(interpolate_at_zero(&[(one, one), (one, one)]).is_none());
    }

    proptest! {
        #[test]
        fn prop_constant_term_and_degree(
            seed in any::<u64>(),
            degree in 1usize..6,
            c in any::<u64>(),
        ) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let constant = Scalar::from(c);
            let poly = Polynomial::sample(&mut rng, degree, constant).unwrap();

            prop_assert_eq!(poly.degree(), degree);
            prop_assert_eq!(poly.coefficients().len(), degree + 1);
            prop_assert_eq!(poly.evaluate(&Scalar::ZERO), constant);
            prop_assert!(poly.coefficients()[degree] != Scalar::ZERO);
        }

        #[test]
        fn prop_feldman_coefficients(seed in any::<u64>(), degree in 1usize..6) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let constant = sample_nonzero_scalar(&mut rng).unwrap();
            let poly = Polynomial::sample(&mut rng, degree, constant).unwrap();
            let exp = poly.exponentiate();

            for (coef, point) in poly.coefficients().iter().zip(exp.coefficients()) {
                prop_assert_eq!(ProjectivePoint::GENERATOR * coef, *point);
            }

            let x = Scalar::from(seed | 1);
            prop_assert!(exp.verify_share(&x, &poly.evaluate(&x)));
        }

        #[test]
        fn prop_any_threshold_subset_reconstructs(seed in any::<u64>(), degree in 1usize..5) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let secret = sample_nonzero_scalar(&mut rng).unwrap();
            let poly = Polynomial::sample(&mut rng, degree, secret).unwrap();

            let shares: Vec<(Scalar, Scalar)> = (1..=(degree as u64 + 2))
                .map(|i| {
                    let x = Scalar::from(i);
                    (x, poly.evaluate(&x))
                })
                .collect();

            prop_assert_eq!(interpolate_at_zero(&shares[..degree + 1]), Some(secret));
            prop_assert_eq!(interpolate_at_zero(&shares[1..]), Some(secret));
        }
    }
}
