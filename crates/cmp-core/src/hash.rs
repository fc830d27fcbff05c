//! Session-bound commitments
//!
//! Every commitment is a blake3 digest over a prefix that binds the session
//! (ID, mode, threshold and party set), the committing party's ID, a fresh
//! 32-byte opening nonce, and the committed values. Values are length-prefixed
//! so that distinct tuples never share an encoding.

use crate::{Mode, PartyId, Result, SessionId};
use crypto_bigint::{Encoding, U2048};
use k256::{elliptic_curve::sec1::ToEncodedPoint, ProjectivePoint};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

const DOMAIN: &[u8] = b"cmp-ecdsa/session/v1";

/// Length of a commitment digest and of its opening nonce
pub const COMMITMENT_LEN: usize = 32;

/// Values that can be absorbed into a session hash
pub trait WriteHash {
    fn write_hash(&self, hasher: &mut blake3::Hasher);
}

pub(crate) fn write_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Append `bytes` to `buf` behind a big-endian length prefix
pub(crate) fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

impl WriteHash for Vec<u8> {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        write_bytes(hasher, self);
    }
}

impl<const N: usize> WriteHash for [u8; N] {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        write_bytes(hasher, self);
    }
}

impl WriteHash for PartyId {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        write_bytes(hasher, self.as_bytes());
    }
}

impl WriteHash for ProjectivePoint {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        write_bytes(hasher, self.to_affine().to_encoded_point(true).as_bytes());
    }
}

impl WriteHash for Vec<ProjectivePoint> {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&(self.len() as u64).to_le_bytes());
        for point in self {
            point.write_hash(hasher);
        }
    }
}

impl WriteHash for U2048 {
    fn write_hash(&self, hasher: &mut blake3::Hasher) {
        write_bytes(hasher, &self.to_be_bytes());
    }
}

/// Commitment digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; COMMITMENT_LEN]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }

    /// Parse a digest received from the wire
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Commitment)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(self.0))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Opening data for a [`Commitment`]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decommitment(pub [u8; COMMITMENT_LEN]);

impl Decommitment {
    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Decommitment)
    }
}

impl fmt::Debug for Decommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Decommitment(..)")
    }
}

/// Hash state pre-seeded with the session parameters
#[derive(Clone)]
pub struct SessionHash {
    state: blake3::Hasher,
}

impl SessionHash {
    pub(crate) fn new(
        session_id: &SessionId,
        mode: Mode,
        threshold: usize,
        parties: &[PartyId],
    ) -> Self {
        let mut state = blake3::Hasher::new();
        write_bytes(&mut state, DOMAIN);
        write_bytes(&mut state, session_id);
        write_bytes(&mut state, mode.tag());
        state.update(&(threshold as u64).to_le_bytes());
        state.update(&(parties.len() as u64).to_le_bytes());
        for id in parties {
            id.write_hash(&mut state);
        }
        Self { state }
    }

    /// Commit to `values` on behalf of `id`
    pub fn commit(
        &self,
        rng: &mut dyn CryptoRngCore,
        id: &PartyId,
        values: &[&dyn WriteHash],
    ) -> Result<(Commitment, Decommitment)> {
        let mut nonce = [0u8; COMMITMENT_LEN];
        rng.try_fill_bytes(&mut nonce)?;
        let decommitment = Decommitment(nonce);
        let commitment = self.digest(id, &decommitment, values);
        Ok((commitment, decommitment))
    }

    /// Check that `decommitment` and `values` reproduce `commitment`
    pub fn verify(
        &self,
        commitment: &Commitment,
        decommitment: &Decommitment,
        id: &PartyId,
        values: &[&dyn WriteHash],
    ) -> bool {
        let expected = self.digest(id, decommitment, values);
        expected.0.ct_eq(&commitment.0).into()
    }

    fn digest(
        &self,
        id: &PartyId,
        decommitment: &Decommitment,
        values: &[&dyn WriteHash],
    ) -> Commitment {
        let mut hasher = self.state.clone();
        write_bytes(&mut hasher, b"commit");
        id.write_hash(&mut hasher);
        write_bytes(&mut hasher, &decommitment.0);
        hasher.update(&(values.len() as u64).to_le_bytes());
        for value in values {
            value.write_hash(&mut hasher);
        }
        Commitment(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for SessionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHash").finish_non_exhaustive()
    }
}
