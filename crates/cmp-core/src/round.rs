//! The round contract shared by every protocol step
//!
//! A session is a linear chain of rounds. The caller feeds each peer message to
//! [`Round::process_message`] and calls [`Round::finalize`] exactly once, after
//! every expected sender reported. `finalize` consumes the round, so private
//! state only survives by being moved into the next round.

use crate::keygen::KeygenOutput;
use crate::message::{BroadcastClass, Content, ContentKind, Message};
use crate::sign::SigningOutput;
use crate::{Error, PartyId, Result, SessionContext};
use rand_core::CryptoRngCore;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;

/// Outbound channel written by `finalize`
pub type Outbox = UnboundedSender<Message>;

/// One step of a protocol
pub trait Round: Send {
    /// Position of this round in its protocol, starting at 1
    fn number(&self) -> u16;

    /// The payload variant this round accepts
    fn expected_content(&self) -> ContentKind;

    /// Validate one peer's contribution and fold it into the round
    fn process_message(&mut self, from: &PartyId, content: Content) -> Result<()>;

    /// Emit this round's messages and hand over to the next round
    fn finalize(self: Box<Self>, rng: &mut dyn CryptoRngCore, out: &Outbox) -> Result<Transition>;
}

/// Result of finalizing a round
pub enum Transition {
    Next(Box<dyn Round>),
    Done(Output),
}

/// Terminal output of a protocol
#[derive(Debug)]
pub enum Output {
    Keygen(KeygenOutput),
    Sign(SigningOutput),
}

impl Output {
    pub fn into_keygen(self) -> Option<KeygenOutput> {
        match self {
            Output::Keygen(output) => Some(output),
            Output::Sign(_) => None,
        }
    }

    pub fn into_sign(self) -> Option<SigningOutput> {
        match self {
            Output::Sign(output) => Some(output),
            Output::Keygen(_) => None,
        }
    }
}

/// Queue a message from the local party for `round`
pub(crate) fn send(
    ctx: &SessionContext,
    round: u16,
    broadcast: BroadcastClass,
    content: Content,
    out: &Outbox,
) -> Result<()> {
    let message = Message {
        session_id: *ctx.session_id(),
        round,
        from: ctx.self_id().clone(),
        broadcast,
        content,
    };
    out.send(message)
        .map_err(|_| Error::Relay("outbound channel closed".into()))
}

/// Per-sender accumulator; iteration order is canonical party order
#[derive(Debug)]
pub struct PeerMap<T> {
    round: u16,
    entries: BTreeMap<PartyId, T>,
}

impl<T> PeerMap<T> {
    pub fn new(round: u16) -> Self {
        Self {
            round,
            entries: BTreeMap::new(),
        }
    }

    /// Reject senders that are unknown, local, or already accepted
    pub fn check_sender(&self, ctx: &SessionContext, from: &PartyId) -> Result<()> {
        if !ctx.is_party(from) {
            return Err(Error::malformed(self.round, from, "sender is not a session party"));
        }
        if from == ctx.self_id() {
            return Err(Error::malformed(self.round, from, "message from the local party"));
        }
        if self.entries.contains_key(from) {
            return Err(Error::DuplicateSender {
                round: self.round,
                from: from.clone(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, from: PartyId, value: T) -> Result<()> {
        if self.entries.contains_key(&from) {
            return Err(Error::DuplicateSender {
                round: self.round,
                from,
            });
        }
        self.entries.insert(from, value);
        Ok(())
    }

    pub fn get(&self, id: &PartyId) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Peers that have not reported yet
    pub fn missing(&self, ctx: &SessionContext) -> Vec<PartyId> {
        ctx.others()
            .filter(|id| !self.entries.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Fail with [`Error::MissingMessages`] unless every peer reported
    pub fn ensure_complete(&self, ctx: &SessionContext) -> Result<()> {
        let missing = self.missing(ctx);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingMessages {
                round: self.round,
                missing,
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartyId, &T)> {
        self.entries.iter()
    }

    pub fn into_inner(self) -> BTreeMap<PartyId, T> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mode, SecurityParams};

    fn ctx() -> SessionContext {
        let parties = ["A", "B", "C"]
            .iter()
            .map(|id| PartyId::new(*id).unwrap())
            .collect();
        SessionContext::new(
            [0u8; 32],
            PartyId::new("A").unwrap(),
            parties,
            1,
            Mode::KeyGen,
            SecurityParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_peer_map_rejects_duplicates() {
        let ctx = ctx();
        let b = PartyId::new("B").unwrap();
        let mut map = PeerMap::new(2);

        map.check_sender(&ctx, &b).unwrap();
        map.insert(b.clone(), 1u8).unwrap();

        assert!(matches!(
            map.check_sender(&ctx, &b),
            Err(Error::DuplicateSender { round: 2, .. })
        ));
        assert!(matches!(
            map.insert(b.clone(), 2u8),
            Err(Error::DuplicateSender { .. })
        ));
        assert_eq!(map.get(&b), Some(&1u8));
    }

    #[test]
    fn test_peer_map_rejects_unknown_and_self() {
        let ctx = ctx();
        let map: PeerMap<u8> = PeerMap::new(2);

        let stranger = PartyId::new("Z").unwrap();
        assert!(matches!(
            map.check_sender(&ctx, &stranger),
            Err(Error::MalformedMessage { .. })
        ));
        assert!(matches!(
            map.check_sender(&ctx, ctx.self_id()),
            Err(Error::MalformedMessage { .. })
        ));
    }

    #[test]
    fn test_peer_map_completion() {
        let ctx = ctx();
        let mut map = PeerMap::new(2);

        map.insert(PartyId::new("C").unwrap(), ()).unwrap();
        assert_eq!(map.missing(&ctx), vec![PartyId::new("B").unwrap()]);
        assert!(matches!(
            map.ensure_complete(&ctx),
            Err(Error::MissingMessages { round: 2, .. })
        ));

        map.insert(PartyId::new("B").unwrap(), ()).unwrap();
        assert!(map.ensure_complete(&ctx).is_ok());

        // iteration follows canonical order regardless of arrival order
        let order: Vec<_> = map.iter().map(|(id, _)| id.as_str().to_string()).collect();
        assert_eq!(order, vec!["B", "C"]);
    }
}
