//! Distributed key generation and key refresh
//!
//! Both protocols share one three-round chain:
//!
//! 1. Sample Paillier/Pedersen material, a degree-t polynomial and Schnorr
//!    randomness, then broadcast a commitment to the public parts.
//! 2. Collect every peer's commitment and broadcast the opening.
//! 3. Check every opening against its commitment and combine the results.
//!
//! Key generation samples a random non-zero constant term; refresh fixes it to
//! zero, so the joint public key is unchanged once the new shares are applied.

mod messages;
mod round1;
mod round2;
mod round3;

pub use messages::{KeygenCommitment, KeygenReveal};
pub use round1::Round1;

use crate::hash::WriteHash;
use crate::math::{encode_point, Polynomial, PolynomialExponent, SchnorrRandomness};
use crate::mpc::{run_session, Relay};
use crate::paillier::{Lambda, PedersenParams, SecretKey};
use crate::state_machine::StateMachine;
use crate::{Error, Mode, PartyId, Result, SessionContext, SEC_BYTES};
use k256::{ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;
use zeroize::Zeroize;

/// Everything a party reveals about its contribution in round 3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyPublic {
    /// Contribution to the shared randomness
    pub rho: Vec<u8>,
    /// Feldman commitment F(X) = f(X)·G
    pub polynomial_exponent: PolynomialExponent,
    /// Schnorr commitments A_l = a_l·G
    pub schnorr_commitments: Vec<ProjectivePoint>,
    /// Ring-Pedersen parameters over the party's Paillier modulus
    pub pedersen: PedersenParams,
}

impl PartyPublic {
    /// The tuple bound by the round-1 commitment, in commitment order
    pub(crate) fn committed_values(&self) -> [&dyn WriteHash; 4] {
        [
            &self.rho,
            &self.polynomial_exponent,
            &self.schnorr_commitments,
            &self.pedersen,
        ]
    }
}

/// Private material produced by this party's round 1
pub struct KeygenSecrets {
    polynomial: Polynomial,
    share: Scalar,
    schnorr: SchnorrRandomness,
    paillier: SecretKey,
    lambda: Lambda,
}

impl KeygenSecrets {
    /// The local polynomial f
    pub fn polynomial(&self) -> &Polynomial {
        &self.polynomial
    }

    /// f(x_self), this party's evaluation of its own polynomial
    pub fn self_share(&self) -> &Scalar {
        &self.share
    }

    pub fn schnorr(&self) -> &SchnorrRandomness {
        &self.schnorr
    }

    pub fn paillier(&self) -> &SecretKey {
        &self.paillier
    }

    /// Exponent relating the Pedersen S and T
    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }
}

impl Drop for KeygenSecrets {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}

impl fmt::Debug for KeygenSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeygenSecrets")
            .field("polynomial", &self.polynomial)
            .field("paillier", &self.paillier)
            .finish_non_exhaustive()
    }
}

/// Result of a key generation or refresh session
#[derive(Debug)]
pub struct KeygenOutput {
    pub mode: Mode,
    /// XOR of every party's rho
    pub rid: [u8; SEC_BYTES],
    /// Sum of every F_j(0): the joint public key for key generation, the
    /// identity for refresh
    pub public_key: ProjectivePoint,
    /// Verified public contributions, including this party's own
    pub parties: BTreeMap<PartyId, PartyPublic>,
    pub secrets: KeygenSecrets,
}

impl KeygenOutput {
    /// Σ_j F_j(x_id): the public counterpart of `id`'s combined share
    pub fn public_share(&self, id: &PartyId) -> ProjectivePoint {
        let x = id.to_scalar();
        self.parties
            .values()
            .map(|party| party.polynomial_exponent.evaluate(&x))
            .fold(ProjectivePoint::IDENTITY, |acc, point| acc + point)
    }

    /// SEC1-compressed public key
    pub fn public_key_bytes(&self) -> Vec<u8> {
        encode_point(&self.public_key)
    }
}

/// Run key generation (or refresh, per the context's mode) over `relay`
#[instrument(skip_all, fields(party = %ctx.self_id(), mode = ?ctx.mode()))]
pub async fn run_keygen<R: Relay>(ctx: Arc<SessionContext>, relay: &R) -> Result<KeygenOutput> {
    let (machine, outbox) = StateMachine::keygen(ctx, Box::new(OsRng))?;
    run_session(machine, outbox, relay)
        .await?
        .into_keygen()
        .ok_or_else(|| Error::InvalidConfig("session did not run key generation".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::interpolate_at_zero;
    use crate::message::{BroadcastClass, Content, Message};
    use crate::round::Output;
    use crate::state_machine::testing::{contexts, run_to_completion, FailingRng, Harness};
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn keygen_outputs(mode: Mode, seed: u64) -> Vec<KeygenOutput> {
        let ctxs = contexts(&["A", "B", "C"], 1, mode);
        run_to_completion(Harness::keygen(ctxs, seed))
            .into_iter()
            .map(|output| output.into_keygen().unwrap())
            .collect()
    }

    /// Combined share of `id`: Σ_j f_j(x_id) over every party's polynomial
    fn combined_share(outputs: &[KeygenOutput], id: &PartyId) -> Scalar {
        let x = id.to_scalar();
        outputs
            .iter()
            .map(|o| o.secrets.polynomial().evaluate(&x))
            .fold(Scalar::ZERO, |acc, s| acc + s)
    }

    #[test]
    fn test_keygen_three_parties() {
        let outputs = keygen_outputs(Mode::KeyGen, 1);

        let public_key = outputs[0].public_key;
        assert_ne!(public_key, ProjectivePoint::IDENTITY);
        for output in &outputs {
            assert_eq!(output.public_key, public_key);
            assert_eq!(output.rid, outputs[0].rid);
            assert_eq!(output.parties.len(), 3);
            assert_eq!(output.parties, outputs[0].parties);
        }

        let mut expected_rid = [0u8; SEC_BYTES];
        for party in outputs[0].parties.values() {
            for (acc, byte) in expected_rid.iter_mut().zip(&party.rho) {
                *acc ^= byte;
            }
        }
        assert_eq!(outputs[0].rid, expected_rid);

        let ids: Vec<PartyId> = outputs[0].parties.keys().cloned().collect();
        let shares: Vec<(Scalar, Scalar)> = ids
            .iter()
            .map(|id| (id.to_scalar(), combined_share(&outputs, id)))
            .collect();

        // every pair of parties reconstructs the same secret key
        for pair in [[0, 1], [0, 2], [1, 2]] {
            let subset: Vec<_> = pair.iter().map(|i| shares[*i]).collect();
            let secret = interpolate_at_zero(&subset).unwrap();
            assert_eq!(ProjectivePoint::GENERATOR * secret, public_key);
        }

        for (id, (_, share)) in ids.iter().zip(&shares) {
            assert_eq!(outputs[0].public_share(id), ProjectivePoint::GENERATOR * share);
        }
    }

    #[test]
    fn test_self_share_matches_commitment() {
        let outputs = keygen_outputs(Mode::KeyGen, 2);
        for output in &outputs {
            let (id, own) = output
                .parties
                .iter()
                .find(|(_, p)| p.polynomial_exponent == output.secrets.polynomial().exponentiate())
                .unwrap();
            assert!(own
                .polynomial_exponent
                .verify_share(&id.to_scalar(), output.secrets.self_share()));
            assert_eq!(own.schnorr_commitments, *output.secrets.schnorr().commitments());
            assert_eq!(own.polynomial_exponent.degree(), 1);
        }
    }

    #[test]
    fn test_refresh_preserves_secret() {
        let outputs = keygen_outputs(Mode::Refresh, 3);

        for output in &outputs {
            assert_eq!(output.public_key, ProjectivePoint::IDENTITY);
            for party in output.parties.values() {
                assert_eq!(party.polynomial_exponent.constant(), ProjectivePoint::IDENTITY);
            }
        }

        // refresh deltas interpolate to zero, so adding them keeps the key
        let shares: Vec<(Scalar, Scalar)> = outputs[0]
            .parties
            .keys()
            .take(2)
            .map(|id| (id.to_scalar(), combined_share(&outputs, id)))
            .collect();
        assert_eq!(interpolate_at_zero(&shares), Some(Scalar::ZERO));
    }

    #[test]
    fn test_tampered_reveal_is_rejected() {
        let ctxs = contexts(&["A", "B", "C"], 1, Mode::KeyGen);
        let mut harness = Harness::keygen(ctxs, 4);

        harness.step_all(); // round 1 -> commitments
        harness.deliver_all();
        harness.step_all(); // round 2 -> reveals

        let mut reveal = harness.message_from("B", 3);
        if let Content::KeygenReveal(ref mut msg) = reveal.content {
            msg.rho[0] ^= 1;
        }

        let victim = harness.machine_mut("A");
        let err = victim.handle_message(reveal).unwrap_err();
        assert!(matches!(
            err,
            Error::CommitmentMismatch { round: 3, ref from } if from.as_str() == "B"
        ));
    }

    #[test]
    fn test_refresh_rejects_nonzero_constant() {
        let ctxs = contexts(&["A", "B", "C"], 1, Mode::Refresh);
        let mut harness = Harness::keygen(ctxs, 5);

        harness.step_all();
        harness.deliver_all();
        harness.step_all();

        let mut reveal: Message = harness.message_from("C", 3);
        if let Content::KeygenReveal(ref mut msg) = reveal.content {
            let point = ProjectivePoint::GENERATOR * Scalar::from(9u64);
            msg.polynomial_exponent[0] = encode_point(&point);
        }

        let err = harness.machine_mut("A").handle_message(reveal).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { round: 3, .. }));
    }

    #[test]
    fn test_duplicate_commitment_is_rejected() {
        let ctxs = contexts(&["A", "B", "C"], 1, Mode::KeyGen);
        let mut harness = Harness::keygen(ctxs, 6);

        harness.step_all();
        let commitment = harness.message_from("B", 2);

        let machine = harness.machine_mut("A");
        machine.handle_message(commitment.clone()).unwrap();
        let err = machine.handle_message(commitment).unwrap_err();
        assert!(matches!(err, Error::DuplicateSender { round: 2, .. }));
        assert!(err.is_recoverable());
        assert!(!machine.can_finalize());
    }

    #[test]
    fn test_short_commitment_is_malformed() {
        let ctxs = contexts(&["A", "B", "C"], 1, Mode::KeyGen);
        let mut harness = Harness::keygen(ctxs, 7);

        harness.step_all();
        let mut commitment = harness.message_from("B", 2);
        if let Content::KeygenCommitment(ref mut msg) = commitment.content {
            msg.hash.truncate(16);
        }

        let machine = harness.machine_mut("A");
        let err = machine.handle_message(commitment).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { round: 2, .. }));

        // the rejected message left the round untouched
        let commitment = harness.message_from("B", 2);
        harness.machine_mut("A").handle_message(commitment).unwrap();
    }

    #[test]
    fn test_rng_failure_aborts_round1() {
        let ctx = Arc::new(contexts(&["A", "B"], 1, Mode::KeyGen).remove(0));
        let (mut machine, _outbox) = StateMachine::keygen(ctx, Box::new(FailingRng)).unwrap();

        let err = machine.finalize().unwrap_err();
        assert!(matches!(err, Error::RandomnessFailure(_)));
        assert!(matches!(machine.finalize(), Err(Error::SessionFinished)));
    }

    #[test]
    fn test_round1_message() {
        let mut hashes = Vec::new();
        for (i, ctx) in contexts(&["A", "B", "C"], 1, Mode::KeyGen).into_iter().enumerate() {
            let rng = ChaCha20Rng::seed_from_u64(20 + i as u64);
            let (mut machine, mut outbox) =
                StateMachine::keygen(Arc::new(ctx), Box::new(rng)).unwrap();
            machine.finalize().unwrap();

            let message = outbox.try_recv().unwrap();
            assert!(outbox.try_recv().is_err());
            assert_eq!(message.round, 2);
            assert_eq!(message.broadcast, BroadcastClass::Reliable);
            let Content::KeygenCommitment(commitment) = message.content else {
                panic!("unexpected content");
            };
            assert_eq!(commitment.hash.len(), 32);
            hashes.push(commitment.hash);
        }

        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[0], hashes[2]);
        assert_ne!(hashes[1], hashes[2]);
    }

    #[test]
    fn test_constant_term_follows_mode() {
        for seed in 30..34 {
            for output in keygen_outputs(Mode::KeyGen, seed) {
                assert_ne!(*output.secrets.polynomial().constant(), Scalar::ZERO);
                for party in output.parties.values() {
                    assert_ne!(party.polynomial_exponent.constant(), ProjectivePoint::IDENTITY);
                }
            }
        }
        for output in keygen_outputs(Mode::Refresh, 34) {
            assert_eq!(*output.secrets.polynomial().constant(), Scalar::ZERO);
        }
    }

    #[test]
    fn test_keygen_rejects_sign_mode() {
        let ctx = Arc::new(contexts(&["A", "B"], 1, Mode::Sign).remove(0));
        let rng = ChaCha20Rng::seed_from_u64(9);
        assert!(matches!(
            StateMachine::keygen(ctx, Box::new(rng)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_output_variant() {
        let output = Output::Keygen(keygen_outputs(Mode::KeyGen, 10).remove(0));
        assert!(output.into_sign().is_none());
    }
}
