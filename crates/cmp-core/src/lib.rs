//! # CMP Core
//!
//! Round state machine for CMP-style threshold ECDSA.
//!
//! This crate provides the building blocks for:
//! - Distributed Key Generation (DKG)
//! - Key Refresh
//! - FROST-style nonce commitments for threshold signing
//!
//! ## Protocol Overview
//!
//! Every protocol is a chain of rounds. A round collects one message from each
//! other party, then `finalize` emits the party's next messages and hands its
//! private state to the following round. Key generation commits to fresh
//! Paillier/Pedersen parameters, a Feldman polynomial and Schnorr randomness
//! before revealing them, so no party can adapt its contribution to the others.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cmp_core::{keygen, sign, Mode, SessionContext};
//!
//! // Run distributed key generation
//! let output = keygen::run_keygen(ctx, &relay).await?;
//!
//! // Commit to signing nonces for a message digest
//! let commitments = sign::run_signing(sign_ctx, digest, &relay).await?;
//! ```

pub mod error;
pub mod hash;
pub mod keygen;
pub mod math;
pub mod message;
pub mod mpc;
pub mod paillier;
pub mod round;
pub mod sign;
pub mod state_machine;
pub mod types;

pub use error::{Error, Result};
pub use message::{BroadcastClass, Content, ContentKind, Message};
pub use round::{Output, Round, Transition};
pub use state_machine::StateMachine;
pub use types::{Mode, PartyId, SecurityParams, SessionContext, SessionId};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of the shared randomness contributions and commitment nonces
pub const SEC_BYTES: usize = 32;

/// Default threshold for a 3-party setup
pub const DEFAULT_THRESHOLD: usize = 1;

/// Default number of parties
pub const DEFAULT_PARTIES: usize = 3;
