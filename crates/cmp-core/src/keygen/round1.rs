use super::round2::Round2;
use super::{KeygenCommitment, KeygenSecrets, PartyPublic};
use crate::math::{sample_nonzero_scalar, sample_security_bytes, Polynomial, SchnorrRandomness};
use crate::message::{BroadcastClass, Content, ContentKind};
use crate::paillier::SecretKey;
use crate::round::{send, Outbox, Round, Transition};
use crate::{Error, Mode, PartyId, Result, SessionContext, SEC_BYTES};
use k256::Scalar;
use rand_core::CryptoRngCore;
use std::sync::Arc;
use tracing::{debug, info};

/// Key generation round 1: sample local material and commit to it
pub struct Round1 {
    ctx: Arc<SessionContext>,
}

impl Round1 {
    pub const NUMBER: u16 = 1;

    pub fn new(ctx: Arc<SessionContext>) -> Result<Self> {
        if ctx.mode() == Mode::Sign {
            return Err(Error::InvalidConfig(
                "Key generation needs KeyGen or Refresh mode".into(),
            ));
        }
        Ok(Self { ctx })
    }
}

impl Round for Round1 {
    fn number(&self) -> u16 {
        Self::NUMBER
    }

    fn expected_content(&self) -> ContentKind {
        ContentKind::First
    }

    fn process_message(&mut self, _from: &PartyId, _content: Content) -> Result<()> {
        Ok(())
    }

    fn finalize(self: Box<Self>, rng: &mut dyn CryptoRngCore, out: &Outbox) -> Result<Transition> {
        let ctx = self.ctx;
        let threshold = ctx.threshold();

        let schnorr = SchnorrRandomness::sample(rng, threshold + 1)?;

        let paillier = SecretKey::generate(rng, ctx.params())?;
        let (pedersen, lambda) = paillier.generate_pedersen(rng)?;
        debug!(party = %ctx.self_id(), "Generated Paillier and Pedersen parameters");

        let constant = match ctx.mode() {
            Mode::Refresh => Scalar::ZERO,
            _ => sample_nonzero_scalar(rng)?,
        };
        let polynomial = Polynomial::sample(rng, threshold, constant)?;
        let share = polynomial.evaluate(&ctx.self_id().to_scalar());

        let public = PartyPublic {
            rho: sample_security_bytes(rng, SEC_BYTES)?,
            polynomial_exponent: polynomial.exponentiate(),
            schnorr_commitments: schnorr.commitments().clone(),
            pedersen,
        };

        let (commitment, decommitment) =
            ctx.hash()
                .commit(rng, ctx.self_id(), &public.committed_values())?;

        send(
            &ctx,
            Round2::NUMBER,
            BroadcastClass::Reliable,
            Content::KeygenCommitment(KeygenCommitment {
                hash: commitment.as_bytes().to_vec(),
            }),
            out,
        )?;

        info!(
            party = %ctx.self_id(),
            mode = ?ctx.mode(),
            commitment = %commitment,
            "Keygen round 1 complete"
        );

        let secrets = KeygenSecrets {
            polynomial,
            share,
            schnorr,
            paillier,
            lambda,
        };
        Ok(Transition::Next(Box::new(Round2::new(
            ctx,
            secrets,
            public,
            decommitment,
        ))))
    }
}
