//! Paillier key generation
//!
//! Keys are built from two safe primes of the configured size. The modulus is
//! held in a 2048-bit integer, so primes of up to 1024 bits are supported.

mod pedersen;

pub use pedersen::{Lambda, PedersenParams};

use crate::math::seeded_rng;
use crate::{Error, Result, SecurityParams};
use crypto_bigint::{NonZero, U2048};
use crypto_primes::{generate_safe_prime_with_rng, is_safe_prime_with_rng};
use rand_chacha::ChaCha20Rng;
use rand_core::CryptoRngCore;
use std::fmt;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Retry budget for every rejection-sampling step in key material generation
pub const MAX_SAMPLING_ATTEMPTS: usize = 16;

/// Paillier public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    n: U2048,
}

impl PublicKey {
    /// Modulus N = p·q
    pub fn n(&self) -> &U2048 {
        &self.n
    }
}

/// Paillier secret key: the factorization of N
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    #[zeroize(skip)]
    public: PublicKey,
    p: U2048,
    q: U2048,
    phi: U2048,
}

impl SecretKey {
    /// Sample a fresh key from two distinct safe primes
    pub fn generate(rng: &mut dyn CryptoRngCore, params: &SecurityParams) -> Result<Self> {
        params.validate()?;
        let bits = params.paillier_prime_bits;

        for attempt in 1..=MAX_SAMPLING_ATTEMPTS {
            let (p, q) = sample_prime_pair(rng, bits)?;
            if p == q {
                warn!(attempt, "Sampled identical Paillier primes, retrying");
                continue;
            }

            let n = p.wrapping_mul(&q);
            let phi = p
                .wrapping_sub(&U2048::ONE)
                .wrapping_mul(&q.wrapping_sub(&U2048::ONE));

            debug!(modulus_bits = n.bits(), "Generated Paillier key");
            return Ok(Self {
                public: PublicKey { n },
                p,
                q,
                phi,
            });
        }

        Err(Error::ArithmeticInvariantViolation(format!(
            "no distinct safe primes after {} attempts",
            MAX_SAMPLING_ATTEMPTS
        )))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// φ(N) = (p-1)(q-1)
    pub(crate) fn phi(&self) -> &U2048 {
        &self.phi
    }

    /// Whether `x` is invertible modulo N
    pub(crate) fn is_unit(&self, x: &U2048) -> bool {
        if *x == U2048::ZERO {
            return false;
        }
        [self.p, self.q].iter().all(|prime| {
            Option::<NonZero<U2048>>::from(NonZero::new(*prime))
                .map(|prime| x.rem(&prime) != U2048::ZERO)
                .unwrap_or(false)
        })
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "multi-thread")]
fn sample_prime_pair(rng: &mut dyn CryptoRngCore, bits: usize) -> Result<(U2048, U2048)> {
    let mut rng_p = seeded_rng(rng)?;
    let mut rng_q = seeded_rng(rng)?;
    let (p, q) = rayon::join(
        || sample_safe_prime(&mut rng_p, bits),
        || sample_safe_prime(&mut rng_q, bits),
    );
    Ok((p?, q?))
}

#[cfg(not(feature = "multi-thread"))]
fn sample_prime_pair(rng: &mut dyn CryptoRngCore, bits: usize) -> Result<(U2048, U2048)> {
    let mut rng = seeded_rng(rng)?;
    let p = sample_safe_prime(&mut rng, bits)?;
    let q = sample_safe_prime(&mut rng, bits)?;
    Ok((p, q))
}

/// Safe prime of exactly `bits` bits, re-checked before it is accepted
fn sample_safe_prime(rng: &mut ChaCha20Rng, bits: usize) -> Result<U2048> {
    for attempt in 1..=MAX_SAMPLING_ATTEMPTS {
        let candidate: U2048 = generate_safe_prime_with_rng(rng, Some(bits));
        if candidate.bits() == bits && is_safe_prime_with_rng(rng, &candidate) {
            return Ok(candidate);
        }
        warn!(attempt, bits, "Rejected safe prime candidate");
    }

    Err(Error::ArithmeticInvariantViolation(format!(
        "no {}-bit safe prime after {} attempts",
        bits, MAX_SAMPLING_ATTEMPTS
    )))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    pub(crate) const TEST_PRIME_BITS: usize = 128;

    pub(crate) fn test_params() -> SecurityParams {
        SecurityParams::with_prime_bits(TEST_PRIME_BITS)
    }

    #[test]
    fn test_generate_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let sk = SecretKey::generate(&mut rng, &test_params()).unwrap();

        assert_ne!(sk.p, sk.q);
        assert_eq!(sk.p.bits(), TEST_PRIME_BITS);
        assert_eq!(sk.q.bits(), TEST_PRIME_BITS);
        assert!(is_safe_prime_with_rng(&mut rng, &sk.p));
        assert!(is_safe_prime_with_rng(&mut rng, &sk.q));
        assert_eq!(sk.public_key().n(), &sk.p.wrapping_mul(&sk.q));

        let n_bits = sk.public_key().n().bits();
        assert!(n_bits == 2 * TEST_PRIME_BITS || n_bits == 2 * TEST_PRIME_BITS - 1);
    }

    #[test]
    fn test_is_unit() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let sk = SecretKey::generate(&mut rng, &test_params()).unwrap();

        assert!(sk.is_unit(&U2048::ONE));
        assert!(!sk.is_unit(&U2048::ZERO));
        assert!(!sk.is_unit(&sk.p));
        assert!(!sk.is_unit(&sk.q.wrapping_mul(&U2048::from_u64(3))));
    }

    #[test]
    fn test_rng_failure_is_reported() {
        use crate::state_machine::testing::FailingRng;

        let result = SecretKey::generate(&mut FailingRng, &test_params());
        assert!(matches!(result, Err(Error::RandomnessFailure(_))));

        let mut rng = ChaCha20Rng::seed_from_u64(24);
        let sk = SecretKey::generate(&mut rng, &test_params()).unwrap();
        assert!(matches!(
            sk.generate_pedersen(&mut FailingRng),
            Err(Error::RandomnessFailure(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_primes() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let result = SecretKey::generate(&mut rng, &SecurityParams::with_prime_bits(4096));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
