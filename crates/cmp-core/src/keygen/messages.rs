//! Key generation message types

use super::PartyPublic;
use crate::hash::Decommitment;
use crate::math::{decode_point, encode_point, PolynomialExponent};
use crate::paillier::PedersenParams;
use crate::{Mode, SessionContext, SEC_BYTES};
use k256::ProjectivePoint;
use serde::{Deserialize, Serialize};

/// Round 2 input: hash of the sender's round-3 reveal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenCommitment {
    /// Commitment hash
    #[serde(with = "hex::serde")]
    pub hash: Vec<u8>,
}

/// Round 3 input: opening of the round-2 commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenReveal {
    /// Sender's contribution to the shared randomness
    #[serde(with = "hex::serde")]
    pub rho: Vec<u8>,
    /// Commitment nonce
    #[serde(with = "hex::serde")]
    pub decommitment: Vec<u8>,
    /// Feldman commitments F_j (compressed points)
    pub polynomial_exponent: Vec<Vec<u8>>,
    /// Schnorr commitments A_j (compressed points)
    pub schnorr_commitments: Vec<Vec<u8>>,
    /// Ring-Pedersen modulus
    #[serde(with = "hex::serde")]
    pub pedersen_n: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub pedersen_s: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub pedersen_t: Vec<u8>,
}

impl KeygenReveal {
    pub(crate) fn new(public: &PartyPublic, decommitment: &Decommitment) -> Self {
        let [pedersen_n, pedersen_s, pedersen_t] = public.pedersen.to_bytes();
        Self {
            rho: public.rho.clone(),
            decommitment: decommitment.as_bytes().to_vec(),
            polynomial_exponent: public.polynomial_exponent.to_bytes(),
            schnorr_commitments: public.schnorr_commitments.iter().map(encode_point).collect(),
            pedersen_n,
            pedersen_s,
            pedersen_t,
        }
    }

    /// Parse and structurally validate a peer's reveal.
    ///
    /// The commitment itself is checked by the caller.
    pub(crate) fn decode(
        &self,
        ctx: &SessionContext,
    ) -> std::result::Result<(Decommitment, PartyPublic), String> {
        let expected = ctx.threshold() + 1;

        if self.rho.len() != SEC_BYTES {
            return Err(format!("rho must be {} bytes", SEC_BYTES));
        }
        let decommitment = Decommitment::from_slice(&self.decommitment)
            .ok_or("decommitment has the wrong length")?;

        if self.polynomial_exponent.len() != expected {
            return Err(format!(
                "expected {} polynomial commitments, got {}",
                expected,
                self.polynomial_exponent.len()
            ));
        }
        let polynomial_exponent = PolynomialExponent::from_bytes(&self.polynomial_exponent)
            .ok_or("invalid point in polynomial commitment")?;

        let constant_is_identity = polynomial_exponent.constant() == ProjectivePoint::IDENTITY;
        match ctx.mode() {
            Mode::KeyGen if constant_is_identity => {
                return Err("polynomial constant must not be the identity".into())
            }
            Mode::Refresh if !constant_is_identity => {
                return Err("refresh polynomial constant must be the identity".into())
            }
            _ => {}
        }
        if polynomial_exponent.coefficients()[expected - 1] == ProjectivePoint::IDENTITY {
            return Err("polynomial degree is below the threshold".into());
        }

        if self.schnorr_commitments.len() != expected {
            return Err(format!(
                "expected {} Schnorr commitments, got {}",
                expected,
                self.schnorr_commitments.len()
            ));
        }
        let schnorr_commitments = self
            .schnorr_commitments
            .iter()
            .map(|bytes| decode_point(bytes))
            .collect::<Option<Vec<_>>>()
            .ok_or("invalid Schnorr commitment")?;
        if schnorr_commitments.contains(&ProjectivePoint::IDENTITY) {
            return Err("Schnorr commitment is the identity".into());
        }

        let pedersen =
            PedersenParams::from_bytes(&self.pedersen_n, &self.pedersen_s, &self.pedersen_t)
                .ok_or("Pedersen parameters have the wrong length")?;
        pedersen.validate()?;
        let min_bits = 2 * ctx.params().paillier_prime_bits - 1;
        if pedersen.n().bits() < min_bits {
            return Err(format!(
                "Pedersen modulus has {} bits, expected at least {}",
                pedersen.n().bits(),
                min_bits
            ));
        }
        Ok((
            decommitment,
            PartyPublic {
                rho: self.rho.clone(),
                polynomial_exponent,
                schnorr_commitments,
                pedersen,
            },
        ))
    }
}
