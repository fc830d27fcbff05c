use super::{KeygenOutput, KeygenSecrets, PartyPublic};
use crate::hash::Commitment;
use crate::message::{Content, ContentKind};
use crate::round::{Outbox, Output, PeerMap, Round, Transition};
use crate::{Error, Mode, PartyId, Result, SessionContext, SEC_BYTES};
use k256::ProjectivePoint;
use rand_core::CryptoRngCore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key generation round 3: verify openings and combine contributions
pub(crate) struct Round3 {
    ctx: Arc<SessionContext>,
    secrets: KeygenSecrets,
    public: PartyPublic,
    commitments: BTreeMap<PartyId, Commitment>,
    reveals: PeerMap<PartyPublic>,
}

impl Round3 {
    pub const NUMBER: u16 = 3;

    pub(super) fn new(
        ctx: Arc<SessionContext>,
        secrets: KeygenSecrets,
        public: PartyPublic,
        commitments: BTreeMap<PartyId, Commitment>,
    ) -> Self {
        Self {
            ctx,
            secrets,
            public,
            commitments,
            reveals: PeerMap::new(Self::NUMBER),
        }
    }
}

impl Round for Round3 {
    fn number(&self) -> u16 {
        Self::NUMBER
    }

    fn expected_content(&self) -> ContentKind {
        ContentKind::KeygenReveal
    }

    fn process_message(&mut self, from: &PartyId, content: Content) -> Result<()> {
        let Content::KeygenReveal(msg) = content else {
            return Err(Error::malformed(Self::NUMBER, from, "expected a keygen reveal"));
        };
        self.reveals.check_sender(&self.ctx, from)?;

        let (decommitment, public) = msg
            .decode(&self.ctx)
            .map_err(|reason| Error::malformed(Self::NUMBER, from, reason))?;

        let commitment = self
            .commitments
            .get(from)
            .ok_or_else(|| Error::malformed(Self::NUMBER, from, "no commitment on record"))?;

        if !self
            .ctx
            .hash()
            .verify(commitment, &decommitment, from, &public.committed_values())
        {
            warn!(from = %from, "Keygen reveal does not match commitment");
            return Err(Error::CommitmentMismatch {
                round: Self::NUMBER,
                from: from.clone(),
            });
        }

        debug!(from = %from, "Accepted keygen reveal");
        self.reveals.insert(from.clone(), public)
    }

    fn finalize(
        self: Box<Self>,
        _rng: &mut dyn CryptoRngCore,
        _out: &Outbox,
    ) -> Result<Transition> {
        let Round3 {
            ctx,
            secrets,
            public,
            reveals,
            ..
        } = *self;
        reveals.ensure_complete(&ctx)?;

        let mut parties = reveals.into_inner();
        parties.insert(ctx.self_id().clone(), public);

        let mut rid = [0u8; SEC_BYTES];
        for party in parties.values() {
            for (acc, byte) in rid.iter_mut().zip(&party.rho) {
                *acc ^= byte;
            }
        }

        let public_key = parties
            .values()
            .map(|party| party.polynomial_exponent.constant())
            .fold(ProjectivePoint::IDENTITY, |acc, point| acc + point);

        match ctx.mode() {
            Mode::KeyGen if public_key == ProjectivePoint::IDENTITY => {
                return Err(Error::ArithmeticInvariantViolation(
                    "joint public key is the identity".into(),
                ))
            }
            Mode::Refresh if public_key != ProjectivePoint::IDENTITY => {
                return Err(Error::ArithmeticInvariantViolation(
                    "refresh changed the joint public key".into(),
                ))
            }
            _ => {}
        }

        info!(
            party = %ctx.self_id(),
            mode = ?ctx.mode(),
            rid = %hex::encode(rid),
            "Keygen complete"
        );

        Ok(Transition::Done(Output::Keygen(KeygenOutput {
            mode: ctx.mode(),
            rid,
            public_key,
            parties,
            secrets,
        })))
    }
}
