//! Signing message types

use serde::{Deserialize, Serialize};

/// Round 2 input: the sender's nonce commitments D and E
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignCommitments {
    /// D = d·G, compressed
    #[serde(with = "hex::serde")]
    pub d: Vec<u8>,
    /// E = e·G, compressed
    #[serde(with = "hex::serde")]
    pub e: Vec<u8>,
}
