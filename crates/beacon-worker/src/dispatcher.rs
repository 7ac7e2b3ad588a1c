// The outbound SMS seam
//
// The provider is a black box: send one message, get a delivery id back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use beacon_core::error::Result;

/// One text message awaiting dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundSms {
    /// Destination number, E.164
    pub to: String,
    pub body: String,
}

/// Provider acknowledgment for one dispatched message
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub provider_id: String,
}

/// Trait for SMS providers
///
/// Implementations can:
/// - Call a hosted provider over HTTP
/// - Log and fabricate receipts for local development
/// - Script outcomes for testing
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Send one message. Fails with `BeaconError::Dispatch`; the batch
    /// loop turns that into a per-recipient error event.
    async fn dispatch(&self, message: &OutboundSms) -> Result<DeliveryReceipt>;
}
