//! MPC coordination utilities

use crate::message::Message;
use crate::round::Output;
use crate::state_machine::StateMachine;
use crate::{Error, Result, SessionId};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

pub use ::async_trait::async_trait;

/// Message relay trait for MPC communication
#[async_trait]
pub trait Relay: Send + Sync {
    /// Broadcast a message to all parties
    async fn broadcast(&self, message: &Message) -> Result<()>;

    /// Wait until at least `count` messages for `round` are available and
    /// return every one of them, in arrival order
    async fn collect_broadcasts(
        &self,
        session_id: &SessionId,
        round: u16,
        count: usize,
    ) -> Result<Vec<Message>>;
}

/// In-memory relay for testing
pub mod memory;

pub use memory::MemoryRelay;

/// How long a round waits for its missing senders before giving up
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Drive `machine` to completion over `relay`
pub async fn run_session<R: Relay + ?Sized>(
    machine: StateMachine,
    outbox: UnboundedReceiver<Message>,
    relay: &R,
) -> Result<Output> {
    run_session_with_timeout(machine, outbox, relay, DEFAULT_ROUND_TIMEOUT).await
}

/// Drive `machine` to completion, bounding the wait of every round.
///
/// The relay keeps each round's messages in arrival order, so only messages
/// past the ones already handled are fed to the machine. Rejected messages are
/// logged and skipped, and collection goes on until every expected sender has
/// been accepted. A round still incomplete after `round_timeout` fails with
/// [`Error::MissingMessages`].
#[instrument(skip_all, fields(party = %machine.context().self_id()))]
pub async fn run_session_with_timeout<R: Relay + ?Sized>(
    mut machine: StateMachine,
    mut outbox: UnboundedReceiver<Message>,
    relay: &R,
    round_timeout: Duration,
) -> Result<Output> {
    let ctx = machine.context().clone();

    loop {
        while let Ok(message) = outbox.try_recv() {
            relay.broadcast(&message).await?;
        }
        let Some(round) = machine.round_number() else {
            break;
        };

        let deadline = Instant::now() + round_timeout;
        let mut seen = 0;
        while !machine.can_finalize() {
            // one message per party on the first pass, then any new arrival
            let wanted = (seen + 1).max(ctx.n_parties());
            let collect = relay.collect_broadcasts(ctx.session_id(), round, wanted);
            let Ok(messages) = tokio::time::timeout_at(deadline, collect).await else {
                warn!(round, missing = ?machine.missing(), "Round timed out");
                break;
            };
            let messages = messages?;
            debug!(round, count = messages.len() - seen, "Collected broadcasts");

            let total = messages.len();
            for message in messages.into_iter().skip(seen) {
                if message.from == *ctx.self_id() {
                    continue;
                }
                if let Err(e) = machine.handle_message(message) {
                    if !e.is_recoverable() {
                        return Err(e);
                    }
                    warn!(round, error = %e, "Rejected message");
                }
            }
            seen = total;
        }

        machine.finalize()?;
    }

    machine.take_output().ok_or(Error::SessionFinished)
}
