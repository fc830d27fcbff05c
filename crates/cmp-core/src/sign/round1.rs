use super::round2::Round2;
use super::{SignCommitments, SigningNonces};
use crate::math::{encode_point, sample_nonzero_scalar};
use crate::message::{BroadcastClass, Content, ContentKind};
use crate::round::{send, Outbox, Round, Transition};
use crate::{Error, Mode, PartyId, Result, SessionContext};
use rand_core::CryptoRngCore;
use std::sync::Arc;
use tracing::info;

/// Signing round 1: sample nonces and broadcast their commitments.
///
/// Only the message digest enters this and later rounds.
pub struct Round1 {
    ctx: Arc<SessionContext>,
    message_hash: [u8; 32],
}

impl Round1 {
    pub const NUMBER: u16 = 1;

    pub fn new(ctx: Arc<SessionContext>, message_hash: [u8; 32]) -> Result<Self> {
        if ctx.mode() != Mode::Sign {
            return Err(Error::InvalidConfig("Signing needs Sign mode".into()));
        }
        Ok(Self { ctx, message_hash })
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
        let d = sample_nonzero_scalar(rng)?;
        let e = sample_nonzero_scalar(rng)?;
        let nonces = SigningNonces::new(d, e);
        let commitment = nonces.commitment();

        send(
            &self.ctx,
            Round2::NUMBER,
            BroadcastClass::BestEffort,
            Content::SignCommitments(SignCommitments {
                d: encode_point(&commitment.d),
                e: encode_point(&commitment.e),
            }),
            out,
        )?;

        info!(party = %self.ctx.self_id(), "Signing round 1 complete");

        Ok(Transition::Next(Box::new(Round2::new(
            self.ctx,
            self.message_hash,
            nonces,
        ))))
    }
}
