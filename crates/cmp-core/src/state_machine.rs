//! Session state machine
//!
//! Wraps a chain of [`Round`]s with the checks every round shares: session
//! binding, round numbering, sender membership, duplicate suppression and
//! payload kind. Rounds only ever see messages that passed these checks.

use crate::message::{ContentKind, Message};
use crate::round::{Output, Round, Transition};
use crate::{keygen, sign, Error, PartyId, Result, SessionContext};
use rand_core::CryptoRngCore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Drives one party through one protocol session
pub struct StateMachine {
    ctx: Arc<SessionContext>,
    round: Option<Box<dyn Round>>,
    accepted: BTreeSet<PartyId>,
    output: Option<Output>,
    rng: Box<dyn CryptoRngCore + Send>,
    outbox: UnboundedSender<Message>,
}

impl StateMachine {
    /// Start a session at `first`; outbound messages appear on the receiver
    pub fn new(
        ctx: Arc<SessionContext>,
        first: Box<dyn Round>,
        rng: Box<dyn CryptoRngCore + Send>,
    ) -> (Self, UnboundedReceiver<Message>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let machine = Self {
            ctx,
            round: Some(first),
            accepted: BTreeSet::new(),
            output: None,
            rng,
            outbox,
        };
        (machine, rx)
    }

    /// Key generation or refresh, per the context's mode
    pub fn keygen(
        ctx: Arc<SessionContext>,
        rng: Box<dyn CryptoRngCore + Send>,
    ) -> Result<(Self, UnboundedReceiver<Message>)> {
        let first = keygen::Round1::new(ctx.clone())?;
        Ok(Self::new(ctx, Box::new(first), rng))
    }

    /// Signing commitments over `message_hash`
    pub fn signing(
        ctx: Arc<SessionContext>,
        message_hash: [u8; 32],
        rng: Box<dyn CryptoRngCore + Send>,
    ) -> Result<(Self, UnboundedReceiver<Message>)> {
        let first = sign::Round1::new(ctx.clone(), message_hash)?;
        Ok(Self::new(ctx, Box::new(first), rng))
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Current round number, or `None` once the session ended
    pub fn round_number(&self) -> Option<u16> {
        self.round.as_ref().map(|round| round.number())
    }

    pub fn expected_content(&self) -> Option<ContentKind> {
        self.round.as_ref().map(|round| round.expected_content())
    }

    /// Whether the session ended, with an output or by aborting
    pub fn is_finished(&self) -> bool {
        self.round.is_none()
    }

    /// Peers the current round is still waiting for
    pub fn missing(&self) -> Vec<PartyId> {
        match &self.round {
            Some(round) => self.missing_for(round.as_ref()),
            None => Vec::new(),
        }
    }

    fn missing_for(&self, round: &dyn Round) -> Vec<PartyId> {
        if round.expected_content() == ContentKind::First {
            return Vec::new();
        }
        self.ctx
            .others()
            .filter(|id| !self.accepted.contains(*id))
            .cloned()
            .collect()
    }

    pub fn can_finalize(&self) -> bool {
        self.round.is_some() && self.missing().is_empty()
    }

    /// Check `message` against the session and hand it to the current round.
    ///
    /// A rejected message leaves the round unchanged.
    pub fn handle_message(&mut self, message: Message) -> Result<()> {
        let round = self.round.as_mut().ok_or(Error::SessionFinished)?;
        let number = round.number();
        let from = &message.from;

        if message.session_id != *self.ctx.session_id() {
            return Err(Error::malformed(number, from, "session ID mismatch"));
        }
        if message.round != number {
            return Err(Error::malformed(
                number,
                from,
                format!("message is for round {}", message.round),
            ));
        }
        if !self.ctx.is_party(from) || from == self.ctx.self_id() {
            return Err(Error::malformed(number, from, "sender is not a peer"));
        }
        if self.accepted.contains(from) {
            return Err(Error::DuplicateSender {
                round: number,
                from: from.clone(),
            });
        }
        let expected = round.expected_content();
        if message.kind() != expected {
            return Err(Error::malformed(
                number,
                from,
                format!("expected {}, got {}", expected, message.kind()),
            ));
        }

        round.process_message(&message.from, message.content)?;
        self.accepted.insert(message.from);
        Ok(())
    }

    /// Finalize the current round.
    ///
    /// Fails with [`Error::MissingMessages`] and keeps the round when a peer
    /// has not reported. Any other failure aborts the session.
    pub fn finalize(&mut self) -> Result<()> {
        let round = self.round.take().ok_or(Error::SessionFinished)?;
        let number = round.number();

        let missing = self.missing_for(round.as_ref());
        if !missing.is_empty() {
            self.round = Some(round);
            return Err(Error::MissingMessages {
                round: number,
                missing,
            });
        }

        let transition = round.finalize(&mut *self.rng, &self.outbox).map_err(|e| {
            warn!(party = %self.ctx.self_id(), round = number, error = %e, "Session aborted");
            e
        })?;

        match transition {
            Transition::Next(next) => {
                debug!(
                    party = %self.ctx.self_id(),
                    from = number,
                    to = next.number(),
                    "Advanced round"
                );
                self.accepted.clear();
                self.round = Some(next);
            }
            Transition::Done(output) => {
                info!(party = %self.ctx.self_id(), round = number, "Session finished");
                self.output = Some(output);
            }
        }
        Ok(())
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<Output> {
        self.output.take()
    }
}
