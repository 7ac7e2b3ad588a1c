// In-process blast runner
// Decision: blasts run as tokio tasks inside the API process (non-durable);
// a crashed process leaves session keys for the reaper

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use beacon_core::error::Result;
use beacon_store::SessionChannel;

use crate::blast::{BlastSender, ReceiverGonePolicy};
use crate::dispatcher::{MessageDispatcher, OutboundSms};

/// Spawns and tracks in-flight blasts
pub struct BlastRunner {
    channel: SessionChannel,
    dispatcher: Arc<dyn MessageDispatcher>,
    /// Active blasts (session_id -> task handle)
    active: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
}

impl BlastRunner {
    pub fn new(channel: SessionChannel, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self {
            channel,
            dispatcher,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a blast as a background task
    pub async fn start_blast(
        &self,
        session_id: String,
        messages: Vec<OutboundSms>,
        policy: ReceiverGonePolicy,
    ) -> Result<()> {
        info!(
            session_id = %session_id,
            count = messages.len(),
            "starting blast task"
        );

        let sender = BlastSender::new(self.channel.clone(), self.dispatcher.clone())
            .with_policy(policy);

        let active = self.active.clone();
        let id = session_id.clone();
        let handle = tokio::spawn(async move {
            sender.run(&id, messages).await;
            active.write().await.remove(&id);
        });

        self.active.write().await.insert(session_id, handle);
        Ok(())
    }

    pub async fn is_running(&self, session_id: &str) -> bool {
        self.active.read().await.contains_key(session_id)
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }
}
