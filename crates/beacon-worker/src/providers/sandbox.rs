// Sandbox dispatcher for local development
//
// Logs each message and fabricates a receipt; nothing leaves the process.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use beacon_core::error::Result;

use crate::dispatcher::{DeliveryReceipt, MessageDispatcher, OutboundSms};

/// Dispatcher that logs instead of sending
#[derive(Default)]
pub struct SandboxDispatcher;

impl SandboxDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageDispatcher for SandboxDispatcher {
    async fn dispatch(&self, message: &OutboundSms) -> Result<DeliveryReceipt> {
        let provider_id = format!("sandbox-{}", Uuid::new_v4());
        info!(to = %message.to, provider_id = %provider_id, "sandbox dispatch");
        Ok(DeliveryReceipt { provider_id })
    }
}
