use super::round3::Round3;
use super::{KeygenReveal, KeygenSecrets, PartyPublic};
use crate::hash::{Commitment, Decommitment};
use crate::message::{BroadcastClass, Content, ContentKind};
use crate::round::{send, Outbox, PeerMap, Round, Transition};
use crate::{Error, PartyId, Result, SessionContext};
use rand_core::CryptoRngCore;
use std::sync::Arc;
use tracing::{debug, info};

/// Key generation round 2: collect commitments, then open our own
pub(crate) struct Round2 {
    ctx: Arc<SessionContext>,
    secrets: KeygenSecrets,
    public: PartyPublic,
    decommitment: Decommitment,
    commitments: PeerMap<Commitment>,
}

impl Round2 {
    pub const NUMBER: u16 = 2;

    pub(super) fn new(
        ctx: Arc<SessionContext>,
        secrets: KeygenSecrets,
        public: PartyPublic,
        decommitment: Decommitment,
    ) -> Self {
        Self {
            ctx,
            secrets,
            public,
            decommitment,
            commitments: PeerMap::new(Self::NUMBER),
        }
    }
}

impl Round for Round2 {
    fn number(&self) -> u16 {
        Self::NUMBER
    }

    fn expected_content(&self) -> ContentKind {
        ContentKind::KeygenCommitment
    }

    fn process_message(&mut self, from: &PartyId, content: Content) -> Result<()> {
        let Content::KeygenCommitment(msg) = content else {
            return Err(Error::malformed(Self::NUMBER, from, "expected a keygen commitment"));
        };
        self.commitments.check_sender(&self.ctx, from)?;

        let commitment = Commitment::from_slice(&msg.hash)
            .ok_or_else(|| Error::malformed(Self::NUMBER, from, "commitment must be 32 bytes"))?;

        debug!(from = %from, commitment = %commitment, "Accepted keygen commitment");
        self.commitments.insert(from.clone(), commitment)
    }

    fn finalize(self: Box<Self>, _rng: &mut dyn CryptoRngCore, out: &Outbox) -> Result<Transition> {
        let Round2 {
            ctx,
            secrets,
            public,
            decommitment,
            commitments,
        } = *self;
        commitments.ensure_complete(&ctx)?;

        send(
            &ctx,
            Round3::NUMBER,
            BroadcastClass::Reliable,
            Content::KeygenReveal(KeygenReveal::new(&public, &decommitment)),
            out,
        )?;

        info!(party = %ctx.self_id(), "Keygen round 2 complete");

        Ok(Transition::Next(Box::new(Round3::new(
            ctx,
            secrets,
            public,
            commitments.into_inner(),
        ))))
    }
}
