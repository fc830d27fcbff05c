//! Schnorr commitment randomness for the polynomial coefficients

use super::sample_nonzero_scalar;
use crate::Result;
use k256::{ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use std::fmt;
use zeroize::Zeroize;

/// Random aₗ and the public Aₗ = aₗ·G, one per polynomial coefficient
pub struct SchnorrRandomness {
    secrets: Vec<Scalar>,
    commitments: Vec<ProjectivePoint>,
}

impl SchnorrRandomness {
    pub fn sample(rng: &mut dyn CryptoRngCore, count: usize) -> Result<Self> {
        let secrets = (0..count)
            .map(|_| sample_nonzero_scalar(rng))
            .collect::<Result<Vec<Scalar>>>()?;
        let commitments = secrets
            .iter()
            .map(|a| ProjectivePoint::GENERATOR * a)
            .collect();
        Ok(Self {
            secrets,
            commitments,
        })
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn secrets(&self) -> &[Scalar] {
        &self.secrets
    }

    pub fn commitments(&self) -> &Vec<ProjectivePoint> {
        &self.commitments
    }
}

impl Zeroize for SchnorrRandomness {
    fn zeroize(&mut self) {
        self.secrets.iter_mut().for_each(Zeroize::zeroize);
    }
}

impl Drop for SchnorrRandomness {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for SchnorrRandomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchnorrRandomness")
            .field("commitments", &self.commitments)
            .finish_non_exhaustive()
    }
}
