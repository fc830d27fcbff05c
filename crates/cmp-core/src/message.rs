//! Wire-level message envelope

use crate::keygen::{KeygenCommitment, KeygenReveal};
use crate::sign::SignCommitments;
use crate::{PartyId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery guarantee the transport must honour for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastClass {
    /// Eventually delivered, identically, to every live party
    Reliable,
    /// Delivered if possible; inconsistencies are caught later in the protocol
    BestEffort,
}

/// Payload variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    /// No peer input; used by the first round of every protocol
    First,
    KeygenCommitment,
    KeygenReveal,
    SignCommitments,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Round payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    First,
    KeygenCommitment(KeygenCommitment),
    KeygenReveal(KeygenReveal),
    SignCommitments(SignCommitments),
}

impl Content {
    pub fn kind(&self) -> ContentKind {
        match self {
            Content::First => ContentKind::First,
            Content::KeygenCommitment(_) => ContentKind::KeygenCommitment,
            Content::KeygenReveal(_) => ContentKind::KeygenReveal,
            Content::SignCommitments(_) => ContentKind::SignCommitments,
        }
    }
}

/// A unit of protocol communication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Session this message belongs to
    pub session_id: SessionId,
    /// Round that consumes this message
    pub round: u16,
    /// Sender
    pub from: PartyId,
    /// Delivery class requested from the transport
    pub broadcast: BroadcastClass,
    /// Payload
    pub content: Content,
}

impl Message {
    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }
}
