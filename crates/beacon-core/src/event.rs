// Push events flowing from a sender worker to a subscribed browser
//
// Events are internally tagged so the browser can switch on `type` without
// knowing anything about this enum. The inbox holds one JSON object per
// entry; order within a session is the order of publication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BeaconError, Result};

/// A discrete unit pushed from producer to consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PushEvent {
    /// First event on every stream
    Connected,

    /// Free-form progress note
    Status { payload: serde_json::Value },

    /// One recipient accepted by the provider
    Delivery {
        recipient: String,
        provider_id: String,
    },

    /// Terminal event; the stream closes after forwarding this
    Complete { timestamp: DateTime<Utc> },

    /// Per-recipient or stream-level failure
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
    },
}

impl PushEvent {
    /// Create a status event
    pub fn status(payload: serde_json::Value) -> Self {
        PushEvent::Status { payload }
    }

    /// Create the terminal event stamped with the current time
    pub fn complete_now() -> Self {
        PushEvent::Complete {
            timestamp: Utc::now(),
        }
    }

    /// Create an error event tied to a single recipient
    pub fn recipient_error(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        PushEvent::Error {
            message: message.into(),
            recipient: Some(recipient.into()),
        }
    }

    /// The wire `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PushEvent::Connected => "connected",
            PushEvent::Status { .. } => "status",
            PushEvent::Delivery { .. } => "delivery",
            PushEvent::Complete { .. } => "complete",
            PushEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, PushEvent::Complete { .. })
    }

    /// Serialize to the inbox wire form
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Decode one inbox entry
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| BeaconError::malformed(format!("{e}: {raw}")))
    }
}
