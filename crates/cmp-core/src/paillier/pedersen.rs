//! Ring-Pedersen parameters derived from a Paillier key

use super::{SecretKey, MAX_SAMPLING_ATTEMPTS};
use crate::hash::WriteHash;
use crate::math::seeded_rng;
use crate::{Error, Result};
use crypto_bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    Encoding, NonZero, RandomMod, U2048,
};
use rand_core::CryptoRngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public ring-Pedersen parameters (N, S, T) with S = T^λ mod N
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PedersenParams {
    n: U2048,
    s: U2048,
    t: U2048,
}

/// Private exponent λ relating S and T
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Lambda(U2048);

impl Lambda {
    pub fn as_uint(&self) -> &U2048 {
        &self.0
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lambda(..)")
    }
}

impl PedersenParams {
    /// Parameters from already-parsed integers; see [`PedersenParams::validate`]
    pub fn new(n: U2048, s: U2048, t: U2048) -> Self {
        Self { n, s, t }
    }

    pub fn n(&self) -> &U2048 {
        &self.n
    }

    pub fn s(&self) -> &U2048 {
        &self.s
    }

    pub fn t(&self) -> &U2048 {
        &self.t
    }

    /// Structural checks on parameters received from a peer
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.n.bit_vartime(0) || self.n <= U2048::ONE {
            return Err("Pedersen modulus must be odd and greater than one".into());
        }
        for (name, value) in [("S", &self.s), ("T", &self.t)] {
            if *value == U2048::ZERO || *value >= self.n {
                return Err(format!("Pedersen {} out of range", name));
            }
        }
        if self.s == self.t {
            return Err("Pedersen S and T must differ".into());
        }
        Ok(())
    }

    /// Fixed-width big-endian encodings of (N, S, T)
    pub fn to_bytes(&self) -> [Vec<u8>; 3] {
        [
            self.n.to_be_bytes().to_vec(),
            self.s.to_be_bytes().to_vec(),
            self.t.to_be_bytes().to_vec(),
        ]
    }

    /// Parse (N, S, T); every field must be exactly 256 bytes
    pub fn from_bytes(n: &[u8], s: &[u8], t: &[u8]) -> Option<Self> {
        Some(Self {
            n: decode_uint(n)?,
            s: decode_uint(s)?,
            t: decode_uint(t)?,
        })
    }
}

fn decode_uint(bytes: &[u8]) -> Option<U2048> {
    (bytes.len() == U2048::BYTES).then(|| U2048::from_be_slice(bytes))
}

impl WriteHash for PedersenParams {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        self.n.write_hash(hasher);
        self.s.write_hash(hasher);
        self.t.write_hash(hasher);
    }
}

impl SecretKey {
    /// Derive ring-Pedersen parameters: λ ← [0, φ(N)), T = τ² mod N, S = T^λ mod N
    pub fn generate_pedersen(
        &self,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<(PedersenParams, Lambda)> {
        let mut rng = seeded_rng(rng)?;
        let n = *self.public_key().n();
        let n_nz = non_zero(n)?;
        let phi_nz = non_zero(*self.phi())?;
        let residue_params = DynResidueParams::new(&n);

        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            let tau = U2048::random_mod(&mut rng, &n_nz);
            if !self.is_unit(&tau) {
                continue;
            }
            let lambda = Lambda(U2048::random_mod(&mut rng, &phi_nz));

            let t = DynResidue::new(&tau, residue_params).square();
            let s = t.pow(lambda.as_uint());
            let params = PedersenParams {
                n,
                s: s.retrieve(),
                t: t.retrieve(),
            };

            if params.validate().is_ok() {
                return Ok((params, lambda));
            }
        }

        Err(Error::ArithmeticInvariantViolation(format!(
            "no valid Pedersen parameters after {} attempts",
            MAX_SAMPLING_ATTEMPTS
        )))
    }
}

fn non_zero(value: U2048) -> Result<NonZero<U2048>> {
    Option::from(NonZero::new(value))
        .ok_or_else(|| Error::ArithmeticInvariantViolation("unexpected zero modulus".into()))
}
