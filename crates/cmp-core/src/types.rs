//! Core types for CMP sessions

use crate::hash::SessionHash;
use crate::{Error, Result};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    Scalar,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for a session
pub type SessionId = [u8; 32];

/// Smallest Paillier prime size accepted by [`SecurityParams`]
pub const MIN_PAILLIER_PRIME_BITS: usize = 64;

/// Largest Paillier prime size; the modulus must fit a 2048-bit integer
pub const MAX_PAILLIER_PRIME_BITS: usize = 1024;

/// Identifier of a protocol participant.
///
/// IDs are opaque byte strings of at most 32 bytes. Ordering is bytewise, which
/// gives every party the same canonical order for the party set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId(String);

impl PartyId {
    /// Create a party ID, rejecting empty IDs and IDs longer than a scalar
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > 32 {
            return Err(Error::InvalidConfig(format!(
                "Party ID must be 1..=32 bytes, got {}",
                id.len()
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Map the ID to the scalar used as its evaluation point.
    ///
    /// The bytes are read as a big-endian integer and reduced modulo the group order.
    pub fn to_scalar(&self) -> Scalar {
        let raw = self.as_bytes();
        let mut bytes = [0u8; 32];
        bytes[32 - raw.len()..].copy_from_slice(raw);
        <Scalar as Reduce<U256>>::reduce_bytes(&bytes.into())
    }
}

impl TryFrom<String> for PartyId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        PartyId::new(value)
    }
}

impl From<PartyId> for String {
    fn from(id: PartyId) -> Self {
        id.0
    }
}

impl std::str::FromStr for PartyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PartyId::new(s)
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which protocol a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Fresh distributed key generation
    KeyGen,
    /// Re-sharing of an existing key; the joint secret is unchanged
    Refresh,
    /// Threshold signing
    Sign,
}

impl Mode {
    pub(crate) fn tag(&self) -> &'static [u8] {
        match self {
            Mode::KeyGen => b"keygen",
            Mode::Refresh => b"refresh",
            Mode::Sign => b"sign",
        }
    }
}

/// Tunable security parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityParams {
    /// Bit length of each Paillier safe prime
    pub paillier_prime_bits: usize,
}

impl SecurityParams {
    /// Parameters with a custom prime size. Small sizes are only meant for tests.
    pub fn with_prime_bits(paillier_prime_bits: usize) -> Self {
        Self {
            paillier_prime_bits,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAILLIER_PRIME_BITS..=MAX_PAILLIER_PRIME_BITS).contains(&self.paillier_prime_bits)
        {
            return Err(Error::InvalidConfig(format!(
                "Paillier prime size must be within {}..={} bits, got {}",
                MIN_PAILLIER_PRIME_BITS, MAX_PAILLIER_PRIME_BITS, self.paillier_prime_bits
            )));
        }
        Ok(())
    }
}

impl Default for SecurityParams {
    fn default() -> Self {
        Self {
            paillier_prime_bits: MAX_PAILLIER_PRIME_BITS,
        }
    }
}

/// Read-only parameters shared by every round of one session
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    self_id: PartyId,
    parties: Vec<PartyId>,
    threshold: usize,
    mode: Mode,
    params: SecurityParams,
    hash: SessionHash,
}

impl SessionContext {
    /// Create a new session context.
    ///
    /// `parties` is sorted into canonical order. The set must hold at least
    /// `threshold + 1` distinct parties, including `self_id`.
    pub fn new(
        session_id: SessionId,
        self_id: PartyId,
        mut parties: Vec<PartyId>,
        threshold: usize,
        mode: Mode,
        params: SecurityParams,
    ) -> Result<Self> {
        params.validate()?;

        parties.sort();
        let before = parties.len();
        parties.dedup();
        if parties.len() != before {
            return Err(Error::InvalidConfig("Duplicate party IDs".into()));
        }

        if threshold < 1 {
            return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
        }
        if parties.len() < threshold + 1 {
            return Err(Error::InvalidConfig(format!(
                "Threshold {} needs at least {} parties, got {}",
                threshold,
                threshold + 1,
                parties.len()
            )));
        }
        if parties.binary_search(&self_id).is_err() {
            return Err(Error::InvalidConfig(format!(
                "Party {} is not part of the party set",
                self_id
            )));
        }

        let mut points = BTreeSet::new();
        for id in &parties {
            let x = id.to_scalar();
            if x == Scalar::ZERO {
                return Err(Error::InvalidConfig(format!(
                    "Party {} maps to the zero scalar",
                    id
                )));
            }
            if !points.insert(x.to_bytes().to_vec()) {
                return Err(Error::InvalidConfig(format!(
                    "Party {} maps to the same scalar as another party",
                    id
                )));
            }
        }

        let hash = SessionHash::new(&session_id, mode, threshold, &parties);

        Ok(Self {
            session_id,
            self_id,
            parties,
            threshold,
            mode,
            params,
            hash,
        })
    }

    /// Generate a random session ID
    pub fn random_session_id() -> SessionId {
        rand::random()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn self_id(&self) -> &PartyId {
        &self.self_id
    }

    /// All parties in canonical order
    pub fn parties(&self) -> &[PartyId] {
        &self.parties
    }

    /// Every party except this one
    pub fn others(&self) -> impl Iterator<Item = &PartyId> {
        self.parties.iter().filter(move |id| **id != self.self_id)
    }

    pub fn is_party(&self, id: &PartyId) -> bool {
        self.parties.binary_search(id).is_ok()
    }

    pub fn n_parties(&self) -> usize {
        self.parties.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn params(&self) -> &SecurityParams {
        &self.params
    }

    /// Commitment helper bound to this session
    pub fn hash(&self) -> &SessionHash {
        &self.hash
    }
}
