use super::{binding_factors, group_commitment, NonceCommitment, SigningNonces, SigningOutput};
use crate::math::decode_point;
use crate::message::{Content, ContentKind};
use crate::round::{Outbox, Output, PeerMap, Round, Transition};
use crate::{Error, PartyId, Result, SessionContext};
use k256::ProjectivePoint;
use rand_core::CryptoRngCore;
use std::sync::Arc;
use tracing::{debug, info};

/// Signing round 2: collect nonce commitments and derive R
pub(crate) struct Round2 {
    ctx: Arc<SessionContext>,
    message_hash: [u8; 32],
    nonces: SigningNonces,
    commitments: PeerMap<NonceCommitment>,
}

impl Round2 {
    pub const NUMBER: u16 = 2;

    pub(super) fn new(
        ctx: Arc<SessionContext>,
        message_hash: [u8; 32],
        nonces: SigningNonces,
    ) -> Self {
        Self {
            ctx,
            message_hash,
            nonces,
            commitments: PeerMap::new(Self::NUMBER),
        }
    }

    fn decode(from: &PartyId, bytes: &[u8], name: &str) -> Result<ProjectivePoint> {
        let point = decode_point(bytes).ok_or_else(|| {
            Error::malformed(Self::NUMBER, from, format!("invalid nonce commitment {}", name))
        })?;
        if point == ProjectivePoint::IDENTITY {
            return Err(Error::malformed(
                Self::NUMBER,
                from,
                format!("nonce commitment {} is the identity", name),
            ));
        }
        Ok(point)
    }
}

impl Round for Round2 {
    fn number(&self) -> u16 {
        Self::NUMBER
    }

    fn expected_content(&self) -> ContentKind {
        ContentKind::SignCommitments
    }

    fn process_message(&mut self, from: &PartyId, content: Content) -> Result<()> {
        let Content::SignCommitments(msg) = content else {
            return Err(Error::malformed(Self::NUMBER, from, "expected nonce commitments"));
        };
        self.commitments.check_sender(&self.ctx, from)?;

        let commitment = NonceCommitment {
            d: Self::decode(from, &msg.d, "D")?,
            e: Self::decode(from, &msg.e, "E")?,
        };

        debug!(from = %from, "Accepted nonce commitments");
        self.commitments.insert(from.clone(), commitment)
    }

    fn finalize(
        self: Box<Self>,
        _rng: &mut dyn CryptoRngCore,
        _out: &Outbox,
    ) -> Result<Transition> {
        let Round2 {
            ctx,
            message_hash,
            nonces,
            commitments,
        } = *self;
        commitments.ensure_complete(&ctx)?;

        let mut commitments = commitments.into_inner();
        commitments.insert(ctx.self_id().clone(), nonces.commitment());

        let binding_factors = binding_factors(&ctx, &message_hash, &commitments);
        let r = group_commitment(&commitments, &binding_factors)
            .filter(|r| *r != ProjectivePoint::IDENTITY)
            .ok_or_else(|| {
                Error::ArithmeticInvariantViolation("group commitment is the identity".into())
            })?;

        info!(
            party = %ctx.self_id(),
            signers = commitments.len(),
            "Signing round 2 complete"
        );

        Ok(Transition::Done(Output::Sign(SigningOutput {
            party: ctx.self_id().clone(),
            message_hash,
            commitments,
            binding_factors,
            group_commitment: r,
            nonces,
        })))
    }
}
