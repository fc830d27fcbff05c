//! In-memory relay implementation for testing

use super::{async_trait, Relay};
use crate::message::Message;
use crate::{Result, SessionId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// In-memory message relay for local testing
pub struct MemoryRelay {
    /// Broadcast messages: (session_id, round) -> Vec<message_bytes>
    broadcasts: Arc<DashMap<(SessionId, u16), Vec<Vec<u8>>>>,
    /// Notification channel
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            broadcasts: Arc::new(DashMap::new()),
            notify,
        }
    }

    /// Number of messages stored for a round
    pub fn pending(&self, session_id: &SessionId, round: u16) -> usize {
        self.broadcasts
            .get(&(*session_id, round))
            .map(|messages| messages.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast(&self, message: &Message) -> Result<()> {
        let bytes = message.to_bytes()?;

        self.broadcasts
            .entry((message.session_id, message.round))
            .or_default()
            .push(bytes);

        let _ = self.notify.send(());
        Ok(())
    }

    async fn collect_broadcasts(
        &self,
        session_id: &SessionId,
        round: u16,
        count: usize,
    ) -> Result<Vec<Message>> {
        let mut rx = self.notify.subscribe();

        loop {
            if let Some(messages) = self.broadcasts.get(&(*session_id, round)) {
                if messages.len() >= count {
                    return messages
                        .iter()
                        .map(|bytes| Message::from_bytes(bytes))
                        .collect();
                }
            }

            // Wait for notification with timeout
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => continue,
            }
        }
    }
}
