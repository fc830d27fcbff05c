//! Scalar and point helpers shared by the rounds

pub mod polynomial;
pub mod schnorr;

pub use polynomial::{interpolate_at_zero, lagrange_coefficient, Polynomial, PolynomialExponent};
pub use schnorr::SchnorrRandomness;

use crate::paillier::MAX_SAMPLING_ATTEMPTS;
use crate::{Error, Result};
use k256::{
    elliptic_curve::{
        sec1::{FromEncodedPoint, ToEncodedPoint},
        PrimeField,
    },
    AffinePoint, FieldBytes, ProjectivePoint, Scalar,
};
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRngCore, SeedableRng};
use zeroize::Zeroizing;

/// Sample a uniform non-zero scalar by rejection.
///
/// Draws go through `try_fill_bytes`, so a failing entropy source surfaces as
/// [`Error::RandomnessFailure`].
pub fn sample_nonzero_scalar(rng: &mut dyn CryptoRngCore) -> Result<Scalar> {
    let mut bytes = Zeroizing::new([0u8; 32]);
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        rng.try_fill_bytes(&mut bytes[..])?;
        let candidate: Option<Scalar> =
            Scalar::from_repr(FieldBytes::clone_from_slice(&bytes[..])).into();
        match candidate {
            Some(scalar) if scalar != Scalar::ZERO => return Ok(scalar),
            _ => continue,
        }
    }
    Err(Error::ArithmeticInvariantViolation(format!(
        "no non-zero scalar after {} attempts",
        MAX_SAMPLING_ATTEMPTS
    )))
}

/// Seed a local ChaCha20 stream from `rng`, failing if the source does
pub(crate) fn seeded_rng(rng: &mut dyn CryptoRngCore) -> Result<ChaCha20Rng> {
    Ok(ChaCha20Rng::from_rng(rng)?)
}

/// Draw `len` bytes, surfacing RNG failure instead of panicking
pub fn sample_security_bytes(rng: &mut dyn CryptoRngCore, len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// SEC1-compressed encoding; the identity encodes as a single zero byte
pub fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Parse a SEC1 point, rejecting anything that is not on the curve
pub fn decode_point(bytes: &[u8]) -> Option<ProjectivePoint> {
    let encoded = k256::EncodedPoint::from_bytes(bytes).ok()?;
    let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    affine.map(ProjectivePoint::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::testing::FailingRng;

    #[test]
    fn test_sampling_surfaces_rng_failure() {
        assert!(matches!(
            sample_nonzero_scalar(&mut FailingRng),
            Err(Error::RandomnessFailure(_))
        ));
        assert!(matches!(
            Polynomial::sample(&mut FailingRng, 2, Scalar::ONE),
            Err(Error::RandomnessFailure(_))
        ));
        assert!(matches!(
            SchnorrRandomness::sample(&mut FailingRng, 2),
            Err(Error::RandomnessFailure(_))
        ));
        assert!(matches!(
            sample_security_bytes(&mut FailingRng, 32),
            Err(Error::RandomnessFailure(_))
        ));
    }

    #[test]
    fn test_sample_nonzero_scalar() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(3);
        let a = sample_nonzero_scalar(&mut rng).unwrap();
        let b = sample_nonzero_scalar(&mut rng).unwrap();
        assert_ne!(a, Scalar::ZERO);
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_point() {
        let point = ProjectivePoint::GENERATOR * Scalar::from(42u64);
        assert_eq!(decode_point(&encode_point(&point)), Some(point));
        assert_eq!(
            decode_point(&encode_point(&ProjectivePoint::IDENTITY)),
            Some(ProjectivePoint::IDENTITY)
        );

        // x-coordinate above the field modulus
        let mut out_of_range = [0xffu8; 33];
        out_of_range[0] = 0x02;
        assert!(decode_point(&out_of_range).is_none());

        assert!(decode_point(&[0x02, 0x01]).is_none());
        assert!(decode_point(&[]).is_none());
    }
}
