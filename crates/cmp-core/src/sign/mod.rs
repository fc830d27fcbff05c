//! FROST-style nonce commitment rounds for threshold signing
//!
//! Round 1 samples two nonces (d, e) and broadcasts D = d·G and E = e·G.
//! Round 2 binds every signer's pair to the message digest and the full
//! commitment list, producing the group commitment R = Σ (D_j + ρ_j·E_j).

mod messages;
mod round1;
mod round2;

pub use messages::SignCommitments;
pub use round1::Round1;

use crate::hash::write_len_prefixed;
use crate::math::encode_point;
use crate::mpc::{run_session, Relay};
use crate::state_machine::StateMachine;
use crate::{Error, PartyId, Result, SessionContext};
use k256::{elliptic_curve::ops::Reduce, ProjectivePoint, Scalar, U256};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;
use zeroize::Zeroize;

const BINDING_DOMAIN: &[u8] = b"cmp-ecdsa/frost/rho";

/// A signer's public nonce commitments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceCommitment {
    pub d: ProjectivePoint,
    pub e: ProjectivePoint,
}

/// A signer's secret nonces
pub struct SigningNonces {
    d: Scalar,
    e: Scalar,
}

impl SigningNonces {
    pub(crate) fn new(d: Scalar, e: Scalar) -> Self {
        Self { d, e }
    }

    pub fn commitment(&self) -> NonceCommitment {
        NonceCommitment {
            d: ProjectivePoint::GENERATOR * self.d,
            e: ProjectivePoint::GENERATOR * self.e,
        }
    }

    /// k = d + ρ·e
    pub fn combined(&self, binding_factor: &Scalar) -> Scalar {
        self.d + self.e * binding_factor
    }
}

impl Zeroize for SigningNonces {
    fn zeroize(&mut self) {
        self.d.zeroize();
        self.e.zeroize();
    }
}

impl Drop for SigningNonces {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for SigningNonces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningNonces(..)")
    }
}

/// Result of the nonce commitment rounds
#[derive(Debug)]
pub struct SigningOutput {
    pub party: PartyId,
    pub message_hash: [u8; 32],
    /// Commitment list B in canonical party order
    pub commitments: BTreeMap<PartyId, NonceCommitment>,
    pub binding_factors: BTreeMap<PartyId, Scalar>,
    /// Group commitment R
    pub group_commitment: ProjectivePoint,
    pub nonces: SigningNonces,
}

impl SigningOutput {
    /// This party's share of the signing nonce, d + ρ·e
    pub fn nonce_share(&self) -> Option<Scalar> {
        self.binding_factors
            .get(&self.party)
            .map(|rho| self.nonces.combined(rho))
    }

    /// SEC1-compressed R
    pub fn group_commitment_bytes(&self) -> Vec<u8> {
        encode_point(&self.group_commitment)
    }
}

/// ρ_j = H(domain, session, id_j, msg_hash, B) for every signer in B
pub fn binding_factors(
    ctx: &SessionContext,
    message_hash: &[u8; 32],
    commitments: &BTreeMap<PartyId, NonceCommitment>,
) -> BTreeMap<PartyId, Scalar> {
    let mut encoded_list = Vec::new();
    for (id, commitment) in commitments {
        write_len_prefixed(&mut encoded_list, id.as_bytes());
        write_len_prefixed(&mut encoded_list, &encode_point(&commitment.d));
        write_len_prefixed(&mut encoded_list, &encode_point(&commitment.e));
    }

    commitments
        .keys()
        .map(|id| {
            let mut id_bytes = Vec::new();
            write_len_prefixed(&mut id_bytes, id.as_bytes());

            let digest = Sha256::new()
                .chain_update(BINDING_DOMAIN)
                .chain_update(ctx.session_id())
                .chain_update(&id_bytes)
                .chain_update(message_hash)
                .chain_update(&encoded_list)
                .finalize();
            (id.clone(), <Scalar as Reduce<U256>>::reduce_bytes(&digest))
        })
        .collect()
}

/// R = Σ (D_j + ρ_j·E_j)
pub fn group_commitment(
    commitments: &BTreeMap<PartyId, NonceCommitment>,
    binding_factors: &BTreeMap<PartyId, Scalar>,
) -> Option<ProjectivePoint> {
    commitments
        .iter()
        .try_fold(ProjectivePoint::IDENTITY, |acc, (id, commitment)| {
            let rho = binding_factors.get(id)?;
            Some(acc + commitment.d + commitment.e * rho)
        })
}

/// Run the signing commitment rounds over `relay`
#[instrument(skip_all, fields(party = %ctx.self_id()))]
pub async fn run_signing<R: Relay>(
    ctx: Arc<SessionContext>,
    message_hash: [u8; 32],
    relay: &R,
) -> Result<SigningOutput> {
    let (machine, outbox) = StateMachine::signing(ctx, message_hash, Box::new(OsRng))?;
    run_session(machine, outbox, relay)
        .await?
        .into_sign()
        .ok_or_else(|| Error::InvalidConfig("session did not run signing".into()))
}
